//! Deterministic round outcomes: majority answer, vote tally, scoring and the
//! final winner. All tie-breaks follow roster order.

use crate::types::*;
use std::collections::HashMap;

/// Points the faker earns for not being caught
pub const EVADED_POINTS: u32 = 2;
/// Points each voter earns for voting for a caught faker
pub const CAUGHT_POINTS: u32 = 1;

/// Vote counts per target in roster order, plus the top candidate
#[derive(Debug, Clone, PartialEq)]
pub struct VoteTally {
    pub counts: Vec<(PlayerId, u32)>,
    pub top: Option<PlayerId>,
}

impl VoteTally {
    pub fn count_for(&self, player_id: &str) -> u32 {
        self.counts
            .iter()
            .find(|(id, _)| id == player_id)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    pub fn to_map(&self) -> HashMap<PlayerId, u32> {
        self.counts.iter().cloned().collect()
    }
}

/// Most frequent non-empty answer among respondents.
///
/// Respondents are walked in roster order; on a tie the answer that showed up
/// first wins. A roster of one has no majority.
pub fn majority_answer(
    roster: &[RosterEntry],
    answers: &HashMap<PlayerId, String>,
) -> Option<String> {
    if roster.len() < 2 {
        return None;
    }

    let mut counts: Vec<(&str, u32)> = Vec::new();
    for entry in roster {
        let Some(text) = answers.get(&entry.id).map(|a| a.trim()) else {
            continue;
        };
        if text.is_empty() {
            continue;
        }
        match counts.iter_mut().find(|(t, _)| *t == text) {
            Some((_, n)) => *n += 1,
            None => counts.push((text, 1)),
        }
    }

    first_max(counts.into_iter()).map(str::to_string)
}

/// Count votes per target. Targets are ordered by their roster position, which
/// is also the tie-break for the top candidate.
pub fn tally_votes(roster: &[RosterEntry], votes: &HashMap<PlayerId, PlayerId>) -> VoteTally {
    let counts: Vec<(PlayerId, u32)> = roster
        .iter()
        .filter_map(|entry| {
            let n = votes.values().filter(|target| **target == entry.id).count() as u32;
            (n > 0).then(|| (entry.id.clone(), n))
        })
        .collect();

    let top = first_max(counts.iter().map(|(id, n)| (id, *n))).cloned();

    VoteTally { counts, top }
}

/// Points earned this round.
///
/// If the top candidate is the faker, everyone who voted for them gets
/// [`CAUGHT_POINTS`]; otherwise the faker alone gets [`EVADED_POINTS`].
/// Awards are listed in roster order.
pub fn score_round(
    roster: &[RosterEntry],
    divergent_player_id: &PlayerId,
    top: Option<&PlayerId>,
    votes: &HashMap<PlayerId, PlayerId>,
) -> Vec<ScoreAward> {
    if top == Some(divergent_player_id) {
        roster
            .iter()
            .filter(|entry| votes.get(&entry.id) == Some(divergent_player_id))
            .map(|entry| ScoreAward {
                player_id: entry.id.clone(),
                points: CAUGHT_POINTS,
            })
            .collect()
    } else {
        vec![ScoreAward {
            player_id: divergent_player_id.clone(),
            points: EVADED_POINTS,
        }]
    }
}

/// Player with the strictly highest score; ties go to the earlier roster slot
pub fn winner(players: &[Player]) -> Option<&Player> {
    first_max(players.iter().map(|p| (p, p.points)))
}

/// First item with the highest count
fn first_max<T>(items: impl Iterator<Item = (T, u32)>) -> Option<T> {
    let mut best: Option<(T, u32)> = None;
    for (item, n) in items {
        match &best {
            Some((_, best_n)) if n <= *best_n => {}
            _ => best = Some((item, n)),
        }
    }
    best.map(|(item, _)| item)
}
