use crate::error::GameError;
use crate::notifier::Notifier;
use crate::state::AppState;
use crate::types::{SessionCode, SessionPhase};
use std::sync::Arc;
use std::time::Duration;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Spawn a background task that drops sessions nobody is using any more
pub fn spawn_session_sweeper(state: Arc<AppState>) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(SWEEP_INTERVAL).await;
            let swept = sweep_idle_sessions(&state).await;
            if !swept.is_empty() {
                tracing::info!("Swept {} idle sessions", swept.len());
            }
        }
    });
}

/// Remove every session that is not running and has been idle longer than
/// the configured TTL. Returns the removed codes.
pub async fn sweep_idle_sessions(state: &AppState) -> Vec<SessionCode> {
    let Ok(ttl) = chrono::Duration::from_std(state.config.session_ttl) else {
        return Vec::new();
    };
    let cutoff = chrono::Utc::now() - ttl;

    let mut swept = Vec::new();
    for session in state.sessions.all().await {
        let snapshot = session.snapshot().await;
        if snapshot.phase == SessionPhase::InProgress || snapshot.updated_at > cutoff {
            continue;
        }
        tracing::debug!("Session {} idle since {}", snapshot.code, snapshot.updated_at);
        // Anyone still attached learns the code is gone
        state
            .hub
            .broadcast(&snapshot.code, GameError::GameNotFound.into())
            .await;
        state.remove_session(&snapshot.code).await;
        swept.push(snapshot.code);
    }
    swept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::questions::QuestionBank;
    use crate::protocol::ServerMessage;
    use crate::types::PlayerProfile;

    fn state_with_ttl(ttl: Duration) -> AppState {
        let config = GameConfig {
            session_ttl: ttl,
            ..GameConfig::default()
        };
        AppState::new(config, QuestionBank::builtin().unwrap())
    }

    #[tokio::test]
    async fn test_fresh_sessions_survive() {
        let state = state_with_ttl(Duration::from_secs(3600));
        state.create_session().await;

        assert!(sweep_idle_sessions(&state).await.is_empty());
        assert_eq!(state.sessions.len().await, 1);
    }

    #[tokio::test]
    async fn test_idle_sessions_are_swept_but_running_ones_kept() {
        let state = state_with_ttl(Duration::ZERO);
        let idle = state.create_session().await;
        let running = state.create_session().await;
        let (conn, _rx) = state.hub.register().await;
        let (lingering, mut lingering_rx) = state.hub.register().await;
        state
            .join_session(
                &idle.code,
                PlayerProfile {
                    id: "z".to_string(),
                    name: "Z".to_string(),
                    avatar: String::new(),
                },
                &lingering,
            )
            .await
            .unwrap();
        while lingering_rx.try_recv().is_ok() {}
        state
            .join_session(
                &running.code,
                PlayerProfile {
                    id: "a".to_string(),
                    name: "A".to_string(),
                    avatar: String::new(),
                },
                &conn,
            )
            .await
            .unwrap();
        running.start(&"a".to_string()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let swept = sweep_idle_sessions(&state).await;
        assert_eq!(swept, vec![idle.code.clone()]);
        assert!(state.sessions.get(&idle.code).await.is_none());
        assert!(state.sessions.get(&running.code).await.is_some());
        assert!(matches!(
            lingering_rx.try_recv(),
            Ok(ServerMessage::Error { code, .. }) if code == "GAME_NOT_FOUND"
        ));
    }
}
