//! Connection loss handling
//!
//! A dropped connection never frees a seat right away: clients open a new
//! socket on every page change. Seats are held for the reconnect grace
//! period, then released, which also tells the active round to stop waiting
//! on that player.

use std::sync::Arc;

use super::session::SessionHandle;
use super::AppState;
use crate::notifier::Notifier;
use crate::protocol::ServerMessage;
use crate::types::*;

impl AppState {
    /// Called once a socket has closed
    pub async fn handle_disconnect(&self, connection_id: &ConnectionId) {
        for session in self.sessions.all().await {
            let outcome = session.disconnect(connection_id).await;
            for player_id in outcome.pending {
                tracing::info!(
                    "Player {} disconnected from {}, holding seat for {:?}",
                    player_id,
                    session.code,
                    self.config.reconnect_grace
                );
                self.schedule_expiry(session.clone(), player_id, connection_id.clone());
            }
        }
    }

    fn schedule_expiry(
        &self,
        session: Arc<SessionHandle>,
        player_id: PlayerId,
        connection_id: ConnectionId,
    ) {
        let state = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(state.config.reconnect_grace).await;
            let outcome = session.expire_player(&player_id, &connection_id).await;
            if outcome.removed.is_empty() {
                return;
            }
            if let Some(host) = outcome.new_host {
                state
                    .hub
                    .broadcast(&session.code, ServerMessage::HostAssigned { player_id: host })
                    .await;
            }
            state.after_roster_change(&session).await;
        });
    }

    /// Announce the new roster, or tear the session down if nobody is left
    async fn after_roster_change(&self, session: &SessionHandle) {
        let players = session.players().await;
        if players.is_empty() {
            self.remove_session(&session.code).await;
            return;
        }
        self.hub
            .broadcast(&session.code, ServerMessage::PlayerListUpdate { players })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::questions::QuestionBank;
    use std::time::Duration;

    fn profile(id: &str) -> PlayerProfile {
        PlayerProfile {
            id: id.to_string(),
            name: id.to_uppercase(),
            avatar: String::new(),
        }
    }

    fn test_state() -> AppState {
        let config = GameConfig {
            reconnect_grace: Duration::from_secs(10),
            ..GameConfig::default()
        };
        AppState::new(config, QuestionBank::builtin().unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn test_lobby_disconnect_moves_host_after_grace() {
        let state = test_state();
        let session = state.create_session().await;
        let (c1, _r1) = state.hub.register().await;
        let (c2, mut r2) = state.hub.register().await;
        state.join_session(&session.code, profile("a"), &c1).await.unwrap();
        state.join_session(&session.code, profile("b"), &c2).await.unwrap();
        while r2.try_recv().is_ok() {}

        state.hub.unregister(&c1).await;
        state.handle_disconnect(&c1).await;
        assert!(session.is_host("a").await);
        assert!(r2.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(session.is_host("b").await);
        assert!(matches!(
            r2.try_recv(),
            Ok(ServerMessage::HostAssigned { player_id }) if player_id == "b"
        ));
        assert!(matches!(
            r2.try_recv(),
            Ok(ServerMessage::PlayerListUpdate { players }) if players.len() == 1
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_lobby_player_leaving_removes_session() {
        let state = test_state();
        let session = state.create_session().await;
        let (conn, _rx) = state.hub.register().await;
        state.join_session(&session.code, profile("a"), &conn).await.unwrap();

        state.handle_disconnect(&conn).await;
        assert!(state.sessions.get(&session.code).await.is_some());

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(state.sessions.get(&session.code).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lobby_page_change_keeps_seat_and_host() {
        let state = test_state();
        let session = state.create_session().await;
        let (c1, _r1) = state.hub.register().await;
        state.join_session(&session.code, profile("host"), &c1).await.unwrap();

        // The client leaves the join page and opens the lobby page
        state.hub.unregister(&c1).await;
        state.handle_disconnect(&c1).await;
        tokio::time::sleep(Duration::from_secs(3)).await;
        let (c2, _r2) = state.hub.register().await;
        let joined = state
            .rejoin(&session.code, &"host".to_string(), &c2)
            .await
            .unwrap();
        assert!(matches!(joined, ServerMessage::Joined { host: Some(h), .. } if h == "host"));

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(state.sessions.get(&session.code).await.is_some());
        assert_eq!(session.players().await.len(), 1);
        assert!(session.is_host("host").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_period_then_removal() {
        let state = test_state();
        let session = state.create_session().await;
        let (c1, _r1) = state.hub.register().await;
        let (c2, _r2) = state.hub.register().await;
        state.join_session(&session.code, profile("a"), &c1).await.unwrap();
        state.join_session(&session.code, profile("b"), &c2).await.unwrap();
        session.start(&"a".to_string()).await.unwrap();

        state.handle_disconnect(&c2).await;
        assert_eq!(session.players().await.len(), 2);

        tokio::time::sleep(Duration::from_secs(11)).await;
        let players = session.players().await;
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].id, "a");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_within_grace_keeps_seat() {
        let state = test_state();
        let session = state.create_session().await;
        let (c1, _r1) = state.hub.register().await;
        state.join_session(&session.code, profile("a"), &c1).await.unwrap();
        session.start(&"a".to_string()).await.unwrap();

        state.handle_disconnect(&c1).await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        let (c2, _r2) = state.hub.register().await;
        state.rejoin(&session.code, &"a".to_string(), &c2).await.unwrap();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(session.players().await.len(), 1);
        assert!(state.sessions.get(&session.code).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_everyone_gone_tears_down_running_game() {
        let state = test_state();
        let session = state.create_session().await;
        let (c1, _r1) = state.hub.register().await;
        state.join_session(&session.code, profile("a"), &c1).await.unwrap();
        state.start_game(&session.code, &"a".to_string()).await.unwrap();

        state.handle_disconnect(&c1).await;
        tokio::time::sleep(Duration::from_secs(11)).await;

        assert!(state.sessions.get(&session.code).await.is_none());
        assert_eq!(session.phase().await, SessionPhase::Aborted);
        assert_eq!(state.hub.room_size(&session.code).await, 0);
    }
}
