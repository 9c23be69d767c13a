//! WebSocket message dispatch
//!
//! Entry point for every parsed client message. Lobby traffic goes to
//! `lobby`, in-game traffic to `player`.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::ConnectionId;
use std::sync::Arc;

use super::{lobby, player};

/// Handle client messages and return optional response for the sender
pub async fn handle_message(
    msg: ClientMessage,
    connection_id: &ConnectionId,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match msg {
        // Session directory and lobby
        ClientMessage::CreateGame => lobby::handle_create_game(state).await,

        ClientMessage::CheckGameCode { code } => lobby::handle_check_game_code(state, code).await,

        ClientMessage::JoinGame { code, player } => {
            lobby::handle_join_game(state, connection_id, code, player).await
        }

        ClientMessage::JoinLobby { code } => {
            lobby::handle_join_lobby(state, connection_id, code).await
        }

        ClientMessage::IsGameHost { code, player_id } => {
            lobby::handle_is_game_host(state, code, player_id).await
        }

        ClientMessage::StartGame { code, player_id } => {
            lobby::handle_start_game(state, code, player_id).await
        }

        // In-game
        ClientMessage::JoinGameRoom { code, player_id } => {
            player::handle_join_game_room(state, connection_id, code, player_id).await
        }

        ClientMessage::SubmitAnswer {
            code,
            player_id,
            answer,
        } => player::handle_submit_answer(state, code, player_id, answer).await,

        ClientMessage::SubmitVote {
            code,
            voter_id,
            voted_for_id,
        } => player::handle_submit_vote(state, code, voter_id, voted_for_id).await,

        ClientMessage::ChatMessage { code, name, text } => {
            player::handle_chat_message(state, code, name, text).await
        }
    }
}
