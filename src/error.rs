use crate::types::RoundId;

/// Precondition failures surfaced to the caller. Nothing is mutated when one
/// of these is returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GameError {
    #[error("Game not found.")]
    GameNotFound,

    #[error("Game has already started.")]
    AlreadyStarted,

    #[error("Game has already finished.")]
    GameFinished,

    #[error("Only the host can start the game.")]
    NotAuthorized,

    #[error("Cannot start a game without players.")]
    NoPlayers,

    #[error("Game is full ({0} players max).")]
    SessionFull(usize),

    #[error("Invalid player name.")]
    InvalidName,
}

impl GameError {
    /// Stable wire code for the error message sent to clients
    pub fn code(&self) -> &'static str {
        match self {
            GameError::GameNotFound => "GAME_NOT_FOUND",
            GameError::AlreadyStarted => "GAME_ALREADY_STARTED",
            GameError::GameFinished => "GAME_FINISHED",
            GameError::NotAuthorized => "NOT_AUTHORIZED",
            GameError::NoPlayers => "NO_PLAYERS",
            GameError::SessionFull(_) => "SESSION_FULL",
            GameError::InvalidName => "INVALID_NAME",
        }
    }
}

/// Internal invariant breaches. Fatal to the affected session's task only.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("Round {active} is still active in session {code}")]
    RoundAlreadyActive { code: String, active: RoundId },

    #[error("Question bank has no questions for tier {0}")]
    MissingTier(usize),
}
