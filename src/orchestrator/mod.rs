//! Game orchestration
//!
//! [`Orchestrator::run_session`] sequences every configured question of one
//! session through [`Orchestrator::run_question`] and announces the winner.
//! Each running session gets its own task via [`Orchestrator::spawn_session`].

mod round;

pub use round::{RoundEnd, RoundOutcome};

use std::sync::Arc;

use crate::config::GameConfig;
use crate::error::OrchestratorError;
use crate::notifier::Notifier;
use crate::protocol::ServerMessage;
use crate::questions::QuestionBank;
use crate::state::score;
use crate::state::session::SessionHandle;
use crate::types::Player;

/// How a session's run ended
#[derive(Debug, Clone)]
pub enum SessionEnd {
    Finished {
        players: Vec<Player>,
        winner: Option<Player>,
        rounds: Vec<RoundOutcome>,
    },
    Aborted,
}

#[derive(Clone)]
pub struct Orchestrator {
    pub config: Arc<GameConfig>,
    pub questions: Arc<QuestionBank>,
    pub notifier: Arc<dyn Notifier>,
}

impl Orchestrator {
    pub fn new(
        config: Arc<GameConfig>,
        questions: Arc<QuestionBank>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            questions,
            notifier,
        }
    }

    /// Play every configured question on a started session, then announce the
    /// winner and mark the session finished.
    pub async fn run_session(
        &self,
        session: Arc<SessionHandle>,
    ) -> Result<SessionEnd, OrchestratorError> {
        let mut rounds = Vec::with_capacity(self.config.total_questions());
        let mut question_no = 0u32;

        for tier in 0..self.config.tiers {
            for _ in 0..self.config.questions_per_tier {
                let pair = self
                    .questions
                    .pick(tier)
                    .ok_or(OrchestratorError::MissingTier(tier))?
                    .clone();
                question_no += 1;

                match self
                    .run_question(&session, tier as u32 + 1, question_no, &pair)
                    .await?
                {
                    RoundEnd::Completed(outcome) => rounds.push(outcome),
                    RoundEnd::Aborted => {
                        tracing::info!("Session {} aborted during question {}", session.code, question_no);
                        session.mark_aborted().await;
                        return Ok(SessionEnd::Aborted);
                    }
                }
            }
        }

        let players = session.players().await;
        let winner = score::winner(&players).cloned();
        session.finish().await;

        tracing::info!(
            "Session {} finished, winner: {}",
            session.code,
            winner.as_ref().map(|w| w.name.as_str()).unwrap_or("nobody")
        );

        self.notifier
            .broadcast(
                &session.code,
                ServerMessage::GameOver {
                    players: players.clone(),
                    winner: winner.clone(),
                },
            )
            .await;

        Ok(SessionEnd::Finished {
            players,
            winner,
            rounds,
        })
    }

    /// Run the session on its own task. An invariant breach stops only this
    /// session, which is then marked aborted.
    pub async fn spawn_session(&self, session: Arc<SessionHandle>) {
        let orchestrator = self.clone();
        let task_session = session.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = orchestrator.run_session(task_session.clone()).await {
                tracing::error!("Session {} orchestration failed: {}", task_session.code, e);
                task_session.mark_aborted().await;
            }
        });
        session.set_task(handle).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RevealedAnswer;
    use crate::state::latch::Trigger;
    use crate::state::session::SessionStore;
    use crate::types::*;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Mutex;

    /// Records everything the orchestrator sends
    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(PlayerId, ServerMessage)>>,
        broadcasts: Mutex<Vec<ServerMessage>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send_to_player(&self, _code: &SessionCode, player_id: &PlayerId, msg: ServerMessage) {
            self.sent.lock().await.push((player_id.clone(), msg));
        }

        async fn broadcast(&self, _code: &SessionCode, msg: ServerMessage) {
            self.broadcasts.lock().await.push(msg);
        }
    }

    fn test_config() -> GameConfig {
        GameConfig {
            answer_time: Duration::from_secs(30),
            deliberation_time: Duration::from_secs(40),
            results_pause: Duration::from_secs(5),
            tiers: 1,
            questions_per_tier: 1,
            ..GameConfig::default()
        }
    }

    fn test_bank() -> QuestionBank {
        QuestionBank::new(vec![
            Tier {
                name: "t1".to_string(),
                questions: vec![QuestionPair {
                    authentic: "real".to_string(),
                    divergent: "fake".to_string(),
                }],
            },
            Tier {
                name: "t2".to_string(),
                questions: vec![QuestionPair {
                    authentic: "real2".to_string(),
                    divergent: "fake2".to_string(),
                }],
            },
        ])
        .unwrap()
    }

    async fn setup(
        ids: &[&str],
        config: GameConfig,
    ) -> (Orchestrator, Arc<RecordingNotifier>, Arc<SessionHandle>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let orchestrator = Orchestrator::new(
            Arc::new(config),
            Arc::new(test_bank()),
            notifier.clone(),
        );
        let store = SessionStore::new();
        let session = store.create().await;
        for id in ids {
            session
                .join(
                    PlayerProfile {
                        id: id.to_string(),
                        name: id.to_uppercase(),
                        avatar: String::new(),
                    },
                    format!("conn-{}", id),
                    &GameConfig::default(),
                )
                .await
                .unwrap();
        }
        session.start(&ids[0].to_string()).await.unwrap();
        (orchestrator, notifier, session)
    }

    /// Wait until the round is installed and the prompts went out
    async fn wait_for_round(session: &SessionHandle) -> Arc<crate::state::round::RoundContext> {
        loop {
            if let Some(round) = session.active_round().await {
                return round;
            }
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_prompts_are_targeted() {
        let (orchestrator, notifier, session) = setup(&["a", "b", "c"], test_config()).await;
        let pair = test_bank().pick(0).unwrap().clone();

        let end = orchestrator.run_question(&session, 1, 1, &pair).await.unwrap();
        let RoundEnd::Completed(outcome) = end else {
            panic!("round should complete");
        };

        let sent = notifier.sent.lock().await;
        assert_eq!(sent.len(), 3);
        for (player_id, msg) in sent.iter() {
            let ServerMessage::RoundQuestion { prompt, time_ms, .. } = msg else {
                panic!("expected prompt, got {:?}", msg);
            };
            assert_eq!(*time_ms, 30_000);
            if *player_id == outcome.divergent_player_id {
                assert_eq!(prompt, "fake");
            } else {
                assert_eq!(prompt, "real");
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeouts_with_no_input_let_faker_evade() {
        let (orchestrator, notifier, session) = setup(&["a", "b"], test_config()).await;
        let pair = test_bank().pick(0).unwrap().clone();
        let started = tokio::time::Instant::now();

        let end = orchestrator.run_question(&session, 1, 1, &pair).await.unwrap();
        let RoundEnd::Completed(outcome) = end else {
            panic!("round should complete");
        };

        assert_eq!(outcome.answers_closed_by, Trigger::Deadline);
        assert_eq!(outcome.votes_closed_by, Trigger::Deadline);
        assert!(started.elapsed() >= Duration::from_secs(75));
        assert_eq!(outcome.majority, None);
        assert_eq!(outcome.tally.top, None);

        let players = session.players().await;
        let faker = players
            .iter()
            .find(|p| p.id == outcome.divergent_player_id)
            .unwrap();
        assert_eq!(faker.points, 2);
        assert_eq!(players.iter().map(|p| p.points).sum::<u32>(), 2);

        // Reveal lists everyone with an absent marker
        let broadcasts = notifier.broadcasts.lock().await;
        let reveal = broadcasts
            .iter()
            .find_map(|m| match m {
                ServerMessage::RevealAnswers { answers, .. } => Some(answers.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            reveal,
            vec![
                RevealedAnswer {
                    id: "a".to_string(),
                    name: "A".to_string(),
                    answer: None
                },
                RevealedAnswer {
                    id: "b".to_string(),
                    name: "B".to_string(),
                    answer: None
                },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_early_completion_skips_deadlines_and_scores_once() {
        let (orchestrator, notifier, session) = setup(&["a", "b", "c"], test_config()).await;
        let pair = test_bank().pick(0).unwrap().clone();
        let started = tokio::time::Instant::now();

        let driver = {
            let session = session.clone();
            tokio::spawn(async move {
                let round = wait_for_round(&session).await;
                for entry in round.roster() {
                    round.record_answer(&entry.id, "cat".to_string()).await;
                }
                while round.phase().await != RoundPhase::AwaitingVotes {
                    tokio::task::yield_now().await;
                }
                let faker = round.divergent_player_id.clone();
                let others: Vec<PlayerId> = round
                    .roster()
                    .iter()
                    .map(|e| e.id.clone())
                    .filter(|id| *id != faker)
                    .collect();
                for voter in &others {
                    round.record_vote(voter, &faker).await;
                }
                round.record_vote(&faker, &others[0]).await;
                // Arrives after the phase closed
                assert!(!round.record_vote(&others[0], &others[1]).await);
                assert_eq!(round.expire().await, Trigger::AllSubmitted);
                (faker, others)
            })
        };

        let end = orchestrator.run_question(&session, 1, 1, &pair).await.unwrap();
        let (faker, others) = driver.await.unwrap();
        let RoundEnd::Completed(outcome) = end else {
            panic!("round should complete");
        };

        assert_eq!(outcome.answers_closed_by, Trigger::AllSubmitted);
        assert_eq!(outcome.votes_closed_by, Trigger::AllSubmitted);
        // Only the results pause elapsed
        assert!(started.elapsed() < Duration::from_secs(30));
        assert_eq!(outcome.majority, Some("cat".to_string()));
        assert_eq!(outcome.tally.top, Some(faker.clone()));

        let players = session.players().await;
        for p in &players {
            let expected = if others.contains(&p.id) { 1 } else { 0 };
            assert_eq!(p.points, expected, "points for {}", p.id);
        }

        let results = notifier
            .broadcasts
            .lock()
            .await
            .iter()
            .filter(|m| matches!(m, ServerMessage::VoteResults { .. }))
            .count();
        assert_eq!(results, 1);
        assert!(session.active_round().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_player_round_does_not_crash() {
        let (orchestrator, _notifier, session) = setup(&["solo"], test_config()).await;
        let pair = test_bank().pick(0).unwrap().clone();

        let driver = {
            let session = session.clone();
            tokio::spawn(async move {
                let round = wait_for_round(&session).await;
                round.record_answer(&"solo".to_string(), "cat".to_string()).await;
            })
        };

        let end = orchestrator.run_question(&session, 1, 1, &pair).await.unwrap();
        driver.await.unwrap();
        let RoundEnd::Completed(outcome) = end else {
            panic!("round should complete");
        };
        assert_eq!(outcome.divergent_player_id, "solo");
        assert_eq!(outcome.majority, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_everyone_leaving_aborts_without_results() {
        let (orchestrator, notifier, session) = setup(&["a", "b"], test_config()).await;
        let pair = test_bank().pick(0).unwrap().clone();

        let driver = {
            let session = session.clone();
            tokio::spawn(async move {
                let round = wait_for_round(&session).await;
                round.player_left(&"a".to_string()).await;
                round.player_left(&"b".to_string()).await;
            })
        };

        let end = orchestrator.run_question(&session, 1, 1, &pair).await.unwrap();
        driver.await.unwrap();
        assert!(matches!(end, RoundEnd::Aborted));

        let broadcasts = notifier.broadcasts.lock().await;
        assert!(!broadcasts
            .iter()
            .any(|m| matches!(m, ServerMessage::RevealAnswers { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_session_plays_all_questions_and_announces_winner() {
        let config = GameConfig {
            tiers: 2,
            questions_per_tier: 2,
            ..test_config()
        };
        let (orchestrator, notifier, session) = setup(&["a", "b", "c"], config).await;

        let end = orchestrator.run_session(session.clone()).await.unwrap();
        let SessionEnd::Finished {
            players,
            winner,
            rounds,
        } = end
        else {
            panic!("session should finish");
        };

        assert_eq!(rounds.len(), 4);
        assert_eq!(
            rounds.iter().map(|r| r.question_no).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
        assert_eq!(
            rounds.iter().map(|r| r.round_no).collect::<Vec<_>>(),
            vec![1, 1, 2, 2]
        );
        // Nobody voted, so every faker evaded
        assert_eq!(players.iter().map(|p| p.points).sum::<u32>(), 8);
        assert_eq!(winner.as_ref(), score::winner(&players));
        assert_eq!(session.phase().await, SessionPhase::Finished);

        let broadcasts = notifier.broadcasts.lock().await;
        assert!(matches!(
            broadcasts.last(),
            Some(ServerMessage::GameOver { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_session_missing_tier_is_error() {
        let config = GameConfig {
            tiers: 5,
            ..test_config()
        };
        let (orchestrator, _notifier, session) = setup(&["a"], config).await;

        let result = orchestrator.run_session(session).await;
        assert!(matches!(result, Err(OrchestratorError::MissingTier(2))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_session_stops_when_roster_empties() {
        let (orchestrator, notifier, session) = setup(&["a"], test_config()).await;

        let driver = {
            let session = session.clone();
            tokio::spawn(async move {
                let round = wait_for_round(&session).await;
                round.player_left(&"a".to_string()).await;
            })
        };

        let end = orchestrator.run_session(session.clone()).await.unwrap();
        driver.await.unwrap();
        assert!(matches!(end, SessionEnd::Aborted));
        assert_eq!(session.phase().await, SessionPhase::Aborted);
        assert!(!notifier
            .broadcasts
            .lock()
            .await
            .iter()
            .any(|m| matches!(m, ServerMessage::GameOver { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_session_breach_marks_aborted() {
        let (orchestrator, _notifier, session) = setup(&["a"], test_config()).await;
        // A stray round already occupies the session
        let (_stray, _rx) = session.begin_round(9, 9).await.unwrap().unwrap();

        orchestrator.spawn_session(session.clone()).await;
        for _ in 0..100 {
            if session.phase().await == SessionPhase::Aborted {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(session.phase().await, SessionPhase::Aborted);
    }
}
