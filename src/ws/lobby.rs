//! Lobby message handlers
//!
//! Session creation, code checks, seating and the host's start command.

use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::types::{ConnectionId, PlayerId, PlayerProfile, SessionCode};
use std::sync::Arc;

pub async fn handle_create_game(state: &Arc<AppState>) -> Option<ServerMessage> {
    let session = state.create_session().await;
    Some(ServerMessage::GameCreated {
        code: session.code.clone(),
    })
}

pub async fn handle_check_game_code(
    state: &Arc<AppState>,
    code: SessionCode,
) -> Option<ServerMessage> {
    match state.check_code(&code).await {
        Ok(()) => Some(ServerMessage::GameCodeValid { code }),
        Err(e) => {
            tracing::debug!("Code check for {} failed: {}", code, e);
            Some(e.into())
        }
    }
}

pub async fn handle_join_game(
    state: &Arc<AppState>,
    connection_id: &ConnectionId,
    code: SessionCode,
    profile: PlayerProfile,
) -> Option<ServerMessage> {
    tracing::info!("Join request for {} from {}", code, profile.id);
    match state.join_session(&code, profile, connection_id).await {
        Ok(outcome) => {
            let session = state.sessions.get(&code).await?;
            Some(ServerMessage::Joined {
                player: outcome.player,
                host: session.host().await,
                phase: session.phase().await,
            })
        }
        Err(e) => {
            tracing::warn!("Join to {} rejected: {}", code, e);
            Some(e.into())
        }
    }
}

pub async fn handle_join_lobby(
    state: &Arc<AppState>,
    connection_id: &ConnectionId,
    code: SessionCode,
) -> Option<ServerMessage> {
    match state.watch_lobby(&code, connection_id).await {
        Ok(lobby) => Some(lobby),
        Err(e) => Some(e.into()),
    }
}

pub async fn handle_is_game_host(
    state: &Arc<AppState>,
    code: SessionCode,
    player_id: PlayerId,
) -> Option<ServerMessage> {
    match state.is_host(&code, &player_id).await {
        Ok(true) => Some(ServerMessage::IsHost),
        Ok(false) => Some(ServerMessage::NotHost),
        Err(e) => Some(e.into()),
    }
}

/// On success the sender hears `game_started` through the session broadcast
pub async fn handle_start_game(
    state: &Arc<AppState>,
    code: SessionCode,
    player_id: PlayerId,
) -> Option<ServerMessage> {
    tracing::info!("Start requested for {} by {}", code, player_id);
    match state.start_game(&code, &player_id).await {
        Ok(()) => None,
        Err(e) => {
            tracing::warn!("Start of {} rejected: {}", code, e);
            Some(e.into())
        }
    }
}
