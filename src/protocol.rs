use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    CreateGame,
    CheckGameCode {
        code: SessionCode,
    },
    JoinGame {
        code: SessionCode,
        player: PlayerProfile,
    },
    /// Subscribe to session broadcasts without taking a seat
    JoinLobby {
        code: SessionCode,
    },
    /// Re-attach a known player to a new connection (page change or reconnect)
    JoinGameRoom {
        code: SessionCode,
        player_id: PlayerId,
    },
    IsGameHost {
        code: SessionCode,
        player_id: PlayerId,
    },
    StartGame {
        code: SessionCode,
        player_id: PlayerId,
    },
    SubmitAnswer {
        code: SessionCode,
        player_id: PlayerId,
        answer: String,
    },
    SubmitVote {
        code: SessionCode,
        voter_id: PlayerId,
        voted_for_id: PlayerId,
    },
    ChatMessage {
        code: SessionCode,
        name: String,
        text: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    GameCreated {
        code: SessionCode,
    },
    GameCodeValid {
        code: SessionCode,
    },
    /// Sent to the joining connection once its seat is confirmed
    Joined {
        player: Player,
        host: Option<PlayerId>,
        phase: SessionPhase,
    },
    HostAssigned {
        player_id: PlayerId,
    },
    PlayerListUpdate {
        players: Vec<Player>,
    },
    LobbyState {
        players: Vec<Player>,
        host: Option<PlayerId>,
        phase: SessionPhase,
    },
    IsHost,
    NotHost,
    GameStarted {
        code: SessionCode,
        total_questions: usize,
    },
    RoundStartedInfo {
        round: u32,
        question: u32,
        num_players: usize,
    },
    /// Targeted: the faker's body differs from everyone else's
    RoundQuestion {
        round: u32,
        question: u32,
        prompt: String,
        time_ms: u64,
        server_now: String,
        deadline: String,
    },
    RevealAnswers {
        answers: Vec<RevealedAnswer>,
        majority: Option<String>,
        deliberation_time_ms: u64,
        server_now: String,
        deadline: String,
    },
    VoteResults {
        vote_counts: HashMap<PlayerId, u32>,
        top_id: Option<PlayerId>,
        faker_id: PlayerId,
        players: Vec<Player>,
    },
    GameOver {
        players: Vec<Player>,
        winner: Option<Player>,
    },
    ChatMessage {
        name: String,
        text: String,
    },
    Error {
        code: String,
        msg: String,
    },
}

impl From<crate::error::GameError> for ServerMessage {
    fn from(e: crate::error::GameError) -> Self {
        ServerMessage::Error {
            code: e.code().to_string(),
            msg: e.to_string(),
        }
    }
}

/// One row of the reveal: `answer` is `None` when the player did not answer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RevealedAnswer {
    pub id: PlayerId,
    pub name: String,
    pub answer: Option<String>,
}
