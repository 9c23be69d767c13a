//! Round context: the single-use state for one question of one session.
//!
//! Answers and votes are only accepted in their collection phase and only from
//! the roster snapshot taken at round start. A collection phase advances only
//! through its [`PhaseLatch`], whether the trigger is "everyone responded",
//! the deadline, or a teardown.

use std::collections::{HashMap, HashSet};
use tokio::sync::{oneshot, Mutex};

use super::latch::{PhaseLatch, Trigger};
use crate::types::*;

#[derive(Debug)]
pub struct RoundContext {
    pub id: RoundId,
    /// Tier number, 1-based
    pub round_no: u32,
    /// Question number within the whole session, 1-based
    pub question_no: u32,
    pub divergent_player_id: PlayerId,
    roster: Vec<RosterEntry>,
    inner: Mutex<RoundInner>,
}

#[derive(Debug)]
struct RoundInner {
    phase: RoundPhase,
    answers: HashMap<PlayerId, String>,
    votes: HashMap<PlayerId, PlayerId>,
    /// Snapshot members no longer required for completion (left the session
    /// or excluded by the reconnect policy)
    absent: HashSet<PlayerId>,
    /// Snapshot members whose submissions are ignored
    excluded: HashSet<PlayerId>,
    latch: PhaseLatch,
}

impl RoundContext {
    /// Create a context in `AwaitingAnswers` with the answer latch armed.
    /// `divergent_player_id` must be a member of `roster`.
    pub fn new(
        round_no: u32,
        question_no: u32,
        roster: Vec<RosterEntry>,
        divergent_player_id: PlayerId,
    ) -> (Self, oneshot::Receiver<Trigger>) {
        debug_assert!(roster.iter().any(|e| e.id == divergent_player_id));

        let (latch, rx) = PhaseLatch::arm();
        let ctx = Self {
            id: ulid::Ulid::new().to_string(),
            round_no,
            question_no,
            divergent_player_id,
            roster,
            inner: Mutex::new(RoundInner {
                phase: RoundPhase::AwaitingAnswers,
                answers: HashMap::new(),
                votes: HashMap::new(),
                absent: HashSet::new(),
                excluded: HashSet::new(),
                latch,
            }),
        };
        (ctx, rx)
    }

    pub fn roster(&self) -> &[RosterEntry] {
        &self.roster
    }

    pub fn is_member(&self, player_id: &str) -> bool {
        self.roster.iter().any(|e| e.id == player_id)
    }

    pub async fn phase(&self) -> RoundPhase {
        self.inner.lock().await.phase
    }

    /// Record an answer. Returns false if it was dropped as stale.
    pub async fn record_answer(&self, player_id: &PlayerId, text: String) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.phase != RoundPhase::AwaitingAnswers
            || !self.is_member(player_id)
            || inner.excluded.contains(player_id)
        {
            tracing::debug!(
                "Dropping answer from {} in round {} ({:?})",
                player_id,
                self.id,
                inner.phase
            );
            return false;
        }

        inner.answers.insert(player_id.clone(), text);
        self.resolve_if_complete(&mut inner);
        true
    }

    /// Record a vote. Both voter and target must be in the snapshot.
    pub async fn record_vote(&self, voter_id: &PlayerId, target_id: &PlayerId) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.phase != RoundPhase::AwaitingVotes
            || !self.is_member(voter_id)
            || !self.is_member(target_id)
            || inner.excluded.contains(voter_id)
        {
            tracing::debug!(
                "Dropping vote from {} in round {} ({:?})",
                voter_id,
                self.id,
                inner.phase
            );
            return false;
        }

        inner.votes.insert(voter_id.clone(), target_id.clone());
        self.resolve_if_complete(&mut inner);
        true
    }

    /// Deadline path. Returns the trigger that resolved the phase, which is
    /// not necessarily `Deadline` if an early completion won the race.
    pub async fn expire(&self) -> Trigger {
        let mut inner = self.inner.lock().await;
        Self::resolve(&mut inner, Trigger::Deadline);
        inner.latch.fired().unwrap_or(Trigger::Deadline)
    }

    /// Tear the round down: resolve whatever phase is pending and refuse all
    /// further input.
    pub async fn abort(&self) {
        let mut inner = self.inner.lock().await;
        Self::resolve(&mut inner, Trigger::Aborted);
        inner.phase = RoundPhase::Resolved;
    }

    /// A snapshot member left the session
    pub async fn player_left(&self, player_id: &PlayerId) {
        if !self.is_member(player_id) {
            return;
        }
        let mut inner = self.inner.lock().await;
        inner.absent.insert(player_id.clone());
        self.resolve_if_complete(&mut inner);
    }

    /// Stop accepting input from a snapshot member for the rest of the round
    pub async fn exclude(&self, player_id: &PlayerId) {
        if !self.is_member(player_id) {
            return;
        }
        let mut inner = self.inner.lock().await;
        inner.excluded.insert(player_id.clone());
        inner.absent.insert(player_id.clone());
        self.resolve_if_complete(&mut inner);
    }

    /// Move from `Revealed` to `AwaitingVotes` and arm the vote latch.
    /// Returns `None` if the round was torn down in the meantime.
    pub async fn open_voting(&self) -> Option<oneshot::Receiver<Trigger>> {
        let mut inner = self.inner.lock().await;
        if inner.phase != RoundPhase::Revealed {
            return None;
        }
        let (latch, rx) = PhaseLatch::arm();
        inner.latch = latch;
        inner.phase = RoundPhase::AwaitingVotes;
        // Everyone may have left while the reveal went out
        self.resolve_if_complete(&mut inner);
        Some(rx)
    }

    /// Frozen answers, readable once the answer phase resolved
    pub async fn answers(&self) -> HashMap<PlayerId, String> {
        self.inner.lock().await.answers.clone()
    }

    /// Frozen votes, readable once the vote phase resolved
    pub async fn votes(&self) -> HashMap<PlayerId, PlayerId> {
        self.inner.lock().await.votes.clone()
    }

    fn resolve_if_complete(&self, inner: &mut RoundInner) {
        let mut present = self
            .roster
            .iter()
            .filter(|e| !inner.absent.contains(&e.id))
            .peekable();

        if present.peek().is_none() {
            tracing::info!("Round {} lost all players", self.id);
            Self::resolve(inner, Trigger::Aborted);
            inner.phase = RoundPhase::Resolved;
            return;
        }

        let complete = match inner.phase {
            RoundPhase::AwaitingAnswers => present.all(|e| inner.answers.contains_key(&e.id)),
            RoundPhase::AwaitingVotes => present.all(|e| inner.votes.contains_key(&e.id)),
            _ => false,
        };
        if complete {
            Self::resolve(inner, Trigger::AllSubmitted);
        }
    }

    /// Fire the latch and advance the phase. No-op if the latch already fired.
    fn resolve(inner: &mut RoundInner, trigger: Trigger) {
        if !inner.latch.fire(trigger) {
            return;
        }
        inner.phase = match inner.phase {
            RoundPhase::AwaitingAnswers => RoundPhase::Revealed,
            _ => RoundPhase::Resolved,
        };
    }
}
