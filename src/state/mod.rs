pub mod latch;
mod presence;
pub mod round;
pub mod score;
pub mod session;

use std::sync::Arc;

use crate::config::GameConfig;
use crate::error::GameError;
use crate::notifier::Notifier;
use crate::orchestrator::Orchestrator;
use crate::protocol::ServerMessage;
use crate::questions::QuestionBank;
use crate::types::*;
use crate::ws::hub::ConnectionHub;
use session::{JoinOutcome, SessionHandle, SessionStore};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GameConfig>,
    pub sessions: SessionStore,
    /// Outbound routing for every connection
    pub hub: Arc<ConnectionHub>,
    pub orchestrator: Orchestrator,
}

impl AppState {
    pub fn new(config: GameConfig, questions: QuestionBank) -> Self {
        let config = Arc::new(config);
        let hub = Arc::new(ConnectionHub::new());
        let orchestrator = Orchestrator::new(config.clone(), Arc::new(questions), hub.clone());
        Self {
            config,
            sessions: SessionStore::new(),
            hub,
            orchestrator,
        }
    }

    async fn session(&self, code: &str) -> Result<Arc<SessionHandle>, GameError> {
        self.sessions.get(code).await.ok_or(GameError::GameNotFound)
    }

    pub async fn create_session(&self) -> Arc<SessionHandle> {
        self.sessions.create().await
    }

    /// A code is valid while its session exists and still accepts joins
    pub async fn check_code(&self, code: &str) -> Result<(), GameError> {
        match self.session(code).await?.phase().await {
            SessionPhase::Lobby => Ok(()),
            SessionPhase::InProgress => Err(GameError::AlreadyStarted),
            SessionPhase::Finished | SessionPhase::Aborted => Err(GameError::GameFinished),
        }
    }

    /// Seat a player and route the session's traffic to their connection
    pub async fn join_session(
        &self,
        code: &str,
        profile: PlayerProfile,
        connection_id: &ConnectionId,
    ) -> Result<JoinOutcome, GameError> {
        let session = self.session(code).await?;
        let outcome = session
            .join(profile, connection_id.clone(), &self.config)
            .await?;

        self.hub
            .bind_player(&session.code, &outcome.player.id, connection_id)
            .await;

        if outcome.became_host {
            self.hub
                .broadcast(
                    &session.code,
                    ServerMessage::HostAssigned {
                        player_id: outcome.player.id.clone(),
                    },
                )
                .await;
        }
        self.broadcast_player_list(&session).await;

        Ok(outcome)
    }

    /// Subscribe a connection to a session's broadcasts without seating it
    pub async fn watch_lobby(
        &self,
        code: &str,
        connection_id: &ConnectionId,
    ) -> Result<ServerMessage, GameError> {
        let session = self.session(code).await?;
        self.hub.join_room(&session.code, connection_id).await;

        let snapshot = session.snapshot().await;
        Ok(ServerMessage::LobbyState {
            players: snapshot.players,
            host: snapshot.host,
            phase: snapshot.phase,
        })
    }

    /// Re-attach a seated player to a new connection
    pub async fn rejoin(
        &self,
        code: &str,
        player_id: &PlayerId,
        connection_id: &ConnectionId,
    ) -> Result<ServerMessage, GameError> {
        let session = self.session(code).await?;
        let player = session
            .reconnect(
                player_id,
                connection_id.clone(),
                self.config.allow_reconnected_answers,
            )
            .await
            .ok_or(GameError::NotAuthorized)?;

        self.hub
            .bind_player(&session.code, player_id, connection_id)
            .await;
        self.broadcast_player_list(&session).await;

        let snapshot = session.snapshot().await;
        Ok(ServerMessage::Joined {
            player,
            host: snapshot.host,
            phase: snapshot.phase,
        })
    }

    pub async fn is_host(&self, code: &str, player_id: &str) -> Result<bool, GameError> {
        Ok(self.session(code).await?.is_host(player_id).await)
    }

    /// Start a session and hand it to its own orchestration task
    pub async fn start_game(&self, code: &str, requester: &PlayerId) -> Result<(), GameError> {
        let session = self.session(code).await?;
        session.start(requester).await?;

        self.hub
            .broadcast(
                &session.code,
                ServerMessage::GameStarted {
                    code: session.code.clone(),
                    total_questions: self.config.total_questions(),
                },
            )
            .await;
        self.orchestrator.spawn_session(session).await;
        Ok(())
    }

    /// Route an answer to the active round. Stale input is dropped.
    pub async fn record_answer(&self, code: &str, player_id: &PlayerId, text: &str) {
        let Some(round) = self.active_round(code).await else {
            tracing::debug!("Dropping answer from {}: no active round in {}", player_id, code);
            return;
        };
        let text: String = text.trim().chars().take(self.config.max_answer_chars).collect();
        round.record_answer(player_id, text).await;
    }

    /// Route a vote to the active round. Stale input is dropped.
    pub async fn record_vote(&self, code: &str, voter_id: &PlayerId, target_id: &PlayerId) {
        let Some(round) = self.active_round(code).await else {
            tracing::debug!("Dropping vote from {}: no active round in {}", voter_id, code);
            return;
        };
        round.record_vote(voter_id, target_id).await;
    }

    /// Relay a chat line to everyone in the session
    pub async fn relay_chat(&self, code: &str, name: &str, text: &str) {
        let text: String = text.trim().chars().take(self.config.max_chat_chars).collect();
        if text.is_empty() {
            return;
        }
        let Some(session) = self.sessions.get(code).await else {
            tracing::debug!("Dropping chat for unknown session {}", code);
            return;
        };
        let name: String = name.trim().chars().take(self.config.max_name_chars).collect();
        self.hub
            .broadcast(&session.code, ServerMessage::ChatMessage { name, text })
            .await;
    }

    /// Remove a session from the store, stop its task and drop its routing
    pub async fn remove_session(&self, code: &str) {
        if self.sessions.remove(code).await.is_some() {
            self.hub.close_room(&code.to_string()).await;
            tracing::info!("Session {} removed", code);
        }
    }

    async fn active_round(&self, code: &str) -> Option<Arc<round::RoundContext>> {
        self.sessions.get(code).await?.active_round().await
    }

    async fn broadcast_player_list(&self, session: &SessionHandle) {
        self.hub
            .broadcast(
                &session.code,
                ServerMessage::PlayerListUpdate {
                    players: session.players().await,
                },
            )
            .await;
    }
}
