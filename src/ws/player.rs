//! Player message handlers
//!
//! Reconnects, answers, votes and chat. Answers and votes never get a direct
//! reply; their effect shows up in the next session broadcast.

use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::types::{ConnectionId, PlayerId, SessionCode};
use std::sync::Arc;

pub async fn handle_join_game_room(
    state: &Arc<AppState>,
    connection_id: &ConnectionId,
    code: SessionCode,
    player_id: PlayerId,
) -> Option<ServerMessage> {
    tracing::info!("Player {} rejoining {}", player_id, code);
    match state.rejoin(&code, &player_id, connection_id).await {
        Ok(joined) => Some(joined),
        Err(e) => {
            tracing::warn!("Rejoin of {} to {} rejected: {}", player_id, code, e);
            Some(e.into())
        }
    }
}

pub async fn handle_submit_answer(
    state: &Arc<AppState>,
    code: SessionCode,
    player_id: PlayerId,
    answer: String,
) -> Option<ServerMessage> {
    tracing::debug!("Answer from {} in {}", player_id, code);
    state.record_answer(&code, &player_id, &answer).await;
    None
}

pub async fn handle_submit_vote(
    state: &Arc<AppState>,
    code: SessionCode,
    voter_id: PlayerId,
    voted_for_id: PlayerId,
) -> Option<ServerMessage> {
    tracing::debug!("Vote from {} for {} in {}", voter_id, voted_for_id, code);
    state.record_vote(&code, &voter_id, &voted_for_id).await;
    None
}

pub async fn handle_chat_message(
    state: &Arc<AppState>,
    code: SessionCode,
    name: String,
    text: String,
) -> Option<ServerMessage> {
    state.relay_chat(&code, &name, &text).await;
    None
}
