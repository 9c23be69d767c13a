//! Round orchestration: one question from prompts to scored outcome.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

use super::Orchestrator;
use crate::error::OrchestratorError;
use crate::protocol::{RevealedAnswer, ServerMessage};
use crate::state::latch::Trigger;
use crate::state::round::RoundContext;
use crate::state::score::{self, VoteTally};
use crate::state::session::SessionHandle;
use crate::types::*;

/// Everything a completed round decided
#[derive(Debug, Clone)]
pub struct RoundOutcome {
    pub round_id: RoundId,
    pub round_no: u32,
    pub question_no: u32,
    pub divergent_player_id: PlayerId,
    pub answers: HashMap<PlayerId, String>,
    pub majority: Option<String>,
    pub tally: VoteTally,
    pub awards: Vec<ScoreAward>,
    /// What closed the answer phase
    pub answers_closed_by: Trigger,
    /// What closed the vote phase
    pub votes_closed_by: Trigger,
}

#[derive(Debug, Clone)]
pub enum RoundEnd {
    Completed(RoundOutcome),
    /// The roster emptied or the session was torn down mid-round
    Aborted,
}

impl Orchestrator {
    /// Run one question on `session`.
    ///
    /// Suspends twice: once for answers, once for votes. Each wait ends when
    /// the phase latch fires, either from ingestion or from the deadline.
    pub async fn run_question(
        &self,
        session: &SessionHandle,
        round_no: u32,
        question_no: u32,
        pair: &QuestionPair,
    ) -> Result<RoundEnd, OrchestratorError> {
        let Some((round, answers_rx)) = session.begin_round(round_no, question_no).await? else {
            return Ok(RoundEnd::Aborted);
        };

        let result = self
            .drive_round(session, &round, answers_rx, pair)
            .await;
        session.end_round(&round).await;

        let end = result?;
        if let RoundEnd::Completed(outcome) = &end {
            tracing::info!(
                session = %session.code,
                round = %outcome.round_id,
                faker = %outcome.divergent_player_id,
                top = ?outcome.tally.top,
                "Round resolved"
            );
        }
        Ok(end)
    }

    async fn drive_round(
        &self,
        session: &SessionHandle,
        round: &RoundContext,
        answers_rx: oneshot::Receiver<Trigger>,
        pair: &QuestionPair,
    ) -> Result<RoundEnd, OrchestratorError> {
        let code = &session.code;
        let config = &self.config;

        tracing::info!(
            session = %code,
            round = %round.id,
            question = round.question_no,
            players = round.roster().len(),
            "Round started"
        );

        self.notifier
            .broadcast(
                code,
                ServerMessage::RoundStartedInfo {
                    round: round.round_no,
                    question: round.question_no,
                    num_players: round.roster().len(),
                },
            )
            .await;

        let (server_now, deadline) = deadline_strings(config.answer_time);
        for entry in round.roster() {
            let prompt = if entry.id == round.divergent_player_id {
                &pair.divergent
            } else {
                &pair.authentic
            };
            self.notifier
                .send_to_player(
                    code,
                    &entry.id,
                    ServerMessage::RoundQuestion {
                        round: round.round_no,
                        question: round.question_no,
                        prompt: prompt.clone(),
                        time_ms: config.answer_time.as_millis() as u64,
                        server_now: server_now.clone(),
                        deadline: deadline.clone(),
                    },
                )
                .await;
        }

        let answers_closed_by = await_phase(round, answers_rx, config.answer_time).await;
        if answers_closed_by == Trigger::Aborted {
            return Ok(RoundEnd::Aborted);
        }

        let answers = round.answers().await;
        let majority = score::majority_answer(round.roster(), &answers);
        let revealed: Vec<RevealedAnswer> = round
            .roster()
            .iter()
            .map(|entry| RevealedAnswer {
                id: entry.id.clone(),
                name: entry.name.clone(),
                answer: answers
                    .get(&entry.id)
                    .map(|a| a.trim().to_string())
                    .filter(|a| !a.is_empty()),
            })
            .collect();

        let (server_now, deadline) = deadline_strings(config.deliberation_time);
        self.notifier
            .broadcast(
                code,
                ServerMessage::RevealAnswers {
                    answers: revealed,
                    majority: majority.clone(),
                    deliberation_time_ms: config.deliberation_time.as_millis() as u64,
                    server_now,
                    deadline,
                },
            )
            .await;

        // Votes are only accepted from here on
        let Some(votes_rx) = round.open_voting().await else {
            return Ok(RoundEnd::Aborted);
        };
        let votes_closed_by = await_phase(round, votes_rx, config.deliberation_time).await;
        if votes_closed_by == Trigger::Aborted {
            return Ok(RoundEnd::Aborted);
        }

        let votes = round.votes().await;
        let tally = score::tally_votes(round.roster(), &votes);
        let awards = score::score_round(
            round.roster(),
            &round.divergent_player_id,
            tally.top.as_ref(),
            &votes,
        );
        session.apply_scores(&awards).await;

        self.notifier
            .broadcast(
                code,
                ServerMessage::VoteResults {
                    vote_counts: tally.to_map(),
                    top_id: tally.top.clone(),
                    faker_id: round.divergent_player_id.clone(),
                    players: session.players().await,
                },
            )
            .await;

        tokio::time::sleep(config.results_pause).await;

        Ok(RoundEnd::Completed(RoundOutcome {
            round_id: round.id.clone(),
            round_no: round.round_no,
            question_no: round.question_no,
            divergent_player_id: round.divergent_player_id.clone(),
            answers,
            majority,
            tally,
            awards,
            answers_closed_by,
            votes_closed_by,
        }))
    }
}

/// Wait for a collection phase to resolve.
///
/// The deadline sleep lives only inside this select, so an early resolution
/// drops it and no stale timer survives into the next phase.
async fn await_phase(
    round: &RoundContext,
    rx: oneshot::Receiver<Trigger>,
    budget: Duration,
) -> Trigger {
    let deadline = Instant::now() + budget;
    tokio::select! {
        fired = rx => fired.unwrap_or(Trigger::Aborted),
        _ = tokio::time::sleep_until(deadline) => round.expire().await,
    }
}

fn deadline_strings(budget: Duration) -> (String, String) {
    let now = chrono::Utc::now();
    let deadline = chrono::Duration::from_std(budget)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(now);
    (now.to_rfc3339(), deadline.to_rfc3339())
}
