//! Runtime configuration loaded from environment variables
//!
//! Every knob has a default so the server runs without any `.env`. Values that
//! fail to parse fall back to the default and log a warning.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Timing and sizing knobs used by the orchestrator and the session store
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// How long players have to answer a prompt
    pub answer_time: Duration,
    /// How long players have to vote after the reveal
    pub deliberation_time: Duration,
    /// Cool-down after the vote results before the next prompt goes out
    pub results_pause: Duration,
    /// Number of tiers played, taken from the front of the question bank
    pub tiers: usize,
    pub questions_per_tier: usize,
    pub max_players: usize,
    pub max_name_chars: usize,
    pub max_answer_chars: usize,
    pub max_chat_chars: usize,
    /// How long a disconnected player keeps their seat in a running game
    pub reconnect_grace: Duration,
    /// Whether a player who reconnects mid-round may still answer/vote in it
    pub allow_reconnected_answers: bool,
    /// Finished, aborted or never-joined sessions are swept after this long
    pub session_ttl: Duration,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            answer_time: Duration::from_secs(45),
            deliberation_time: Duration::from_secs(60),
            results_pause: Duration::from_secs(8),
            tiers: 3,
            questions_per_tier: 3,
            max_players: 6,
            max_name_chars: 24,
            max_answer_chars: 200,
            max_chat_chars: 300,
            reconnect_grace: Duration::from_secs(15),
            allow_reconnected_answers: true,
            session_ttl: Duration::from_secs(3600),
        }
    }
}

impl GameConfig {
    /// Load game config from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            answer_time: env_secs("ANSWER_SECONDS", defaults.answer_time),
            deliberation_time: env_secs("DELIBERATION_SECONDS", defaults.deliberation_time),
            results_pause: env_secs("RESULTS_PAUSE_SECONDS", defaults.results_pause),
            tiers: env_parse("TIERS", defaults.tiers),
            questions_per_tier: env_parse("QUESTIONS_PER_TIER", defaults.questions_per_tier),
            max_players: env_parse("MAX_PLAYERS", defaults.max_players),
            max_name_chars: env_parse("MAX_NAME_CHARS", defaults.max_name_chars),
            max_answer_chars: env_parse("MAX_ANSWER_CHARS", defaults.max_answer_chars),
            max_chat_chars: env_parse("MAX_CHAT_CHARS", defaults.max_chat_chars),
            reconnect_grace: env_secs("RECONNECT_GRACE_SECONDS", defaults.reconnect_grace),
            allow_reconnected_answers: env_flag(
                "ALLOW_RECONNECTED_ANSWERS",
                defaults.allow_reconnected_answers,
            ),
            session_ttl: env_secs("SESSION_TTL_SECONDS", defaults.session_ttl),
        };

        tracing::info!(
            answer_secs = config.answer_time.as_secs(),
            deliberation_secs = config.deliberation_time.as_secs(),
            results_pause_secs = config.results_pause.as_secs(),
            tiers = config.tiers,
            questions_per_tier = config.questions_per_tier,
            max_players = config.max_players,
            "Game config loaded"
        );

        config
    }

    /// Total number of questions played in one session
    pub fn total_questions(&self) -> usize {
        self.tiers * self.questions_per_tier
    }
}

/// Process-level configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub static_dir: PathBuf,
    /// Replaces the built-in question bank when set
    pub questions_path: Option<PathBuf>,
    pub game: GameConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT", 3000),
            static_dir: std::env::var("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("static")),
            questions_path: std::env::var("QUESTIONS_PATH")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            game: GameConfig::from_env(),
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!("Ignoring invalid value for {}: {:?}", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}

fn env_secs(key: &str, default: Duration) -> Duration {
    Duration::from_secs(env_parse(key, default.as_secs()))
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v != "0" && v.to_lowercase() != "false")
        .unwrap_or(default)
}
