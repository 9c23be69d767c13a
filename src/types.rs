use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type SessionCode = String;
pub type PlayerId = String;
pub type ConnectionId = String;
pub type RoundId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionPhase {
    Lobby,
    InProgress,
    Finished,
    Aborted,
}

impl SessionPhase {
    /// Whether no further rounds can ever run in this session
    pub fn is_over(&self) -> bool {
        matches!(self, SessionPhase::Finished | SessionPhase::Aborted)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundPhase {
    AwaitingAnswers,
    Revealed,
    AwaitingVotes,
    Resolved,
}

/// What a client sends when joining: identity is chosen by the client and
/// stays stable across reconnects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub id: PlayerId,
    pub name: String,
    #[serde(default)]
    pub avatar: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub avatar: String,
    pub points: u32,
    /// Current transport handle, replaced on reconnect
    #[serde(skip)]
    pub connection_id: Option<ConnectionId>,
    #[serde(skip)]
    pub connected: bool,
}

impl Player {
    pub fn new(profile: PlayerProfile, connection_id: ConnectionId) -> Self {
        Self {
            id: profile.id,
            name: profile.name,
            avatar: profile.avatar,
            points: 0,
            connection_id: Some(connection_id),
            connected: true,
        }
    }
}

/// One (authentic, divergent) prompt pair. Everyone but the faker gets
/// `authentic`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionPair {
    pub authentic: String,
    pub divergent: String,
}

/// An ordered group of question pairs of similar difficulty
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tier {
    pub name: String,
    pub questions: Vec<QuestionPair>,
}

/// Frozen view of a roster member taken at round start
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RosterEntry {
    pub id: PlayerId,
    pub name: String,
}

impl From<&Player> for RosterEntry {
    fn from(p: &Player) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
        }
    }
}

/// Points granted to one player in the scoring step of a round
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreAward {
    pub player_id: PlayerId,
    pub points: u32,
}
