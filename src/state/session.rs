//! Session store and per-session roster bookkeeping.
//!
//! The store is the only registry of sessions. Each session sits behind its
//! own lock so traffic for one session never waits on another.

use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;

use super::latch::Trigger;
use super::round::RoundContext;
use crate::config::GameConfig;
use crate::error::{GameError, OrchestratorError};
use crate::types::*;

/// Safe character set for session codes (excludes 0/O, 1/I/L to avoid confusion)
const CODE_CHARS: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 6;

fn generate_code() -> SessionCode {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

#[derive(Debug, Clone)]
pub struct Session {
    pub code: SessionCode,
    /// Join order; also the tie-break order for every outcome
    pub players: Vec<Player>,
    pub phase: SessionPhase,
    /// First joiner, fixed at join time
    pub host: Option<PlayerId>,
    pub active_round: Option<Arc<RoundContext>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Session {
    fn new(code: SessionCode) -> Self {
        let now = chrono::Utc::now();
        Self {
            code,
            players: Vec::new(),
            phase: SessionPhase::Lobby,
            host: None,
            active_round: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn touch(&mut self) {
        self.updated_at = chrono::Utc::now();
    }
}

/// Result of a successful join
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub player: Player,
    /// True if this join made the player host
    pub became_host: bool,
    /// True if the player was already seated and only got a new connection
    pub rejoined: bool,
}

/// Result of a connection dropping or a held seat running out
#[derive(Debug, Clone, Default)]
pub struct DisconnectOutcome {
    /// Removed from the roster
    pub removed: Vec<PlayerId>,
    /// Still seated, waiting for a reconnect
    pub pending: Vec<PlayerId>,
    /// Set if the host left the lobby and the seat moved on
    pub new_host: Option<PlayerId>,
}

#[derive(Debug)]
pub struct SessionHandle {
    pub code: SessionCode,
    session: RwLock<Session>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionHandle {
    fn new(code: SessionCode) -> Self {
        Self {
            code: code.clone(),
            session: RwLock::new(Session::new(code)),
            task: Mutex::new(None),
        }
    }

    pub async fn snapshot(&self) -> Session {
        self.session.read().await.clone()
    }

    pub async fn players(&self) -> Vec<Player> {
        self.session.read().await.players.clone()
    }

    pub async fn phase(&self) -> SessionPhase {
        self.session.read().await.phase
    }

    pub async fn host(&self) -> Option<PlayerId> {
        self.session.read().await.host.clone()
    }

    pub async fn is_host(&self, player_id: &str) -> bool {
        self.session.read().await.host.as_deref() == Some(player_id)
    }

    pub async fn active_round(&self) -> Option<Arc<RoundContext>> {
        self.session.read().await.active_round.clone()
    }

    /// Seat a player, or rebind a known player to a new connection
    pub async fn join(
        &self,
        profile: PlayerProfile,
        connection_id: ConnectionId,
        config: &GameConfig,
    ) -> Result<JoinOutcome, GameError> {
        let mut session = self.session.write().await;

        if let Some((player, sit_out)) = rebind(
            &mut session,
            &profile.id,
            connection_id.clone(),
            config.allow_reconnected_answers,
        ) {
            drop(session);
            if let Some(round) = sit_out {
                round.exclude(&player.id).await;
            }
            return Ok(JoinOutcome {
                player,
                became_host: false,
                rejoined: true,
            });
        }

        match session.phase {
            SessionPhase::Lobby => {}
            SessionPhase::InProgress => return Err(GameError::AlreadyStarted),
            SessionPhase::Finished | SessionPhase::Aborted => return Err(GameError::GameFinished),
        }
        if session.players.len() >= config.max_players {
            return Err(GameError::SessionFull(config.max_players));
        }

        let name: String = profile.name.trim().chars().take(config.max_name_chars).collect();
        if name.is_empty() || profile.id.trim().is_empty() {
            return Err(GameError::InvalidName);
        }

        let player = Player::new(PlayerProfile { name, ..profile }, connection_id);
        session.players.push(player.clone());

        let became_host = session.host.is_none();
        if became_host {
            session.host = Some(player.id.clone());
        }
        session.touch();

        tracing::info!(
            "Player {} ({}) joined session {}",
            player.name,
            player.id,
            session.code
        );

        Ok(JoinOutcome {
            player,
            became_host,
            rejoined: false,
        })
    }

    /// Attach a seated player to a new connection. With
    /// `allow_reconnected_answers` off, a player coming back from a
    /// disconnect sits out the round that is already running.
    pub async fn reconnect(
        &self,
        player_id: &PlayerId,
        connection_id: ConnectionId,
        allow_reconnected_answers: bool,
    ) -> Option<Player> {
        let mut session = self.session.write().await;
        let (player, sit_out) = rebind(
            &mut session,
            player_id,
            connection_id,
            allow_reconnected_answers,
        )?;
        drop(session);

        if let Some(round) = sit_out {
            round.exclude(player_id).await;
        }
        Some(player)
    }

    /// Handle a dropped connection. Seats are held for a reconnect in every
    /// phase; [`SessionHandle::expire_player`] releases them.
    pub async fn disconnect(&self, connection_id: &ConnectionId) -> DisconnectOutcome {
        let mut session = self.session.write().await;
        let mut outcome = DisconnectOutcome::default();

        for player in session
            .players
            .iter_mut()
            .filter(|p| p.connected && p.connection_id.as_ref() == Some(connection_id))
        {
            player.connected = false;
            outcome.pending.push(player.id.clone());
        }
        if !outcome.pending.is_empty() {
            session.touch();
        }

        outcome
    }

    /// Remove a seated player if they are still disconnected on the given
    /// connection. A host leaving the lobby hands the seat to the next player.
    pub async fn expire_player(
        &self,
        player_id: &PlayerId,
        connection_id: &ConnectionId,
    ) -> DisconnectOutcome {
        let mut session = self.session.write().await;
        let mut outcome = DisconnectOutcome::default();
        let Some(pos) = session.players.iter().position(|p| {
            &p.id == player_id && !p.connected && p.connection_id.as_ref() == Some(connection_id)
        }) else {
            return outcome;
        };

        session.players.remove(pos);
        if session.phase == SessionPhase::Lobby && session.host.as_ref() == Some(player_id) {
            session.host = session.players.first().map(|p| p.id.clone());
            outcome.new_host = session.host.clone();
        }
        session.touch();
        let round = session.active_round.clone();
        drop(session);

        tracing::info!("Player {} did not reconnect, removed", player_id);
        if let Some(round) = round {
            round.player_left(player_id).await;
        }
        outcome.removed.push(player_id.clone());
        outcome
    }

    /// Lobby → InProgress. Only the host may start, and only with players.
    pub async fn start(&self, requester: &PlayerId) -> Result<(), GameError> {
        let mut session = self.session.write().await;
        match session.phase {
            SessionPhase::Lobby => {}
            SessionPhase::InProgress => return Err(GameError::AlreadyStarted),
            SessionPhase::Finished | SessionPhase::Aborted => return Err(GameError::GameFinished),
        }
        if session.players.is_empty() {
            return Err(GameError::NoPlayers);
        }
        if session.host.as_ref() != Some(requester) {
            return Err(GameError::NotAuthorized);
        }

        session.phase = SessionPhase::InProgress;
        session.touch();
        tracing::info!(
            "Session {} started with {} players",
            session.code,
            session.players.len()
        );
        Ok(())
    }

    /// Snapshot the roster, pick the faker and install a fresh round.
    ///
    /// Returns `Ok(None)` if the session is no longer running or has nobody
    /// left to play.
    pub async fn begin_round(
        &self,
        round_no: u32,
        question_no: u32,
    ) -> Result<Option<(Arc<RoundContext>, oneshot::Receiver<Trigger>)>, OrchestratorError> {
        let mut session = self.session.write().await;
        if let Some(active) = &session.active_round {
            return Err(OrchestratorError::RoundAlreadyActive {
                code: session.code.clone(),
                active: active.id.clone(),
            });
        }
        if session.phase != SessionPhase::InProgress {
            return Ok(None);
        }

        let roster: Vec<RosterEntry> = session.players.iter().map(RosterEntry::from).collect();
        let Some(divergent) = roster.choose(&mut rand::rng()).map(|e| e.id.clone()) else {
            return Ok(None);
        };

        let (ctx, rx) = RoundContext::new(round_no, question_no, roster, divergent);
        let ctx = Arc::new(ctx);
        session.active_round = Some(ctx.clone());
        session.touch();

        Ok(Some((ctx, rx)))
    }

    /// Clear the active round if it is still `round`
    pub async fn end_round(&self, round: &RoundContext) {
        let mut session = self.session.write().await;
        if session
            .active_round
            .as_ref()
            .is_some_and(|active| active.id == round.id)
        {
            session.active_round = None;
        }
    }

    /// The scoring step: the only place points change
    pub async fn apply_scores(&self, awards: &[ScoreAward]) {
        let mut session = self.session.write().await;
        for award in awards {
            if let Some(player) = session.players.iter_mut().find(|p| p.id == award.player_id) {
                player.points += award.points;
            }
        }
        session.touch();
    }

    pub async fn finish(&self) {
        self.set_phase(SessionPhase::Finished).await;
    }

    pub async fn mark_aborted(&self) {
        self.set_phase(SessionPhase::Aborted).await;
    }

    async fn set_phase(&self, phase: SessionPhase) {
        let mut session = self.session.write().await;
        session.phase = phase;
        session.active_round = None;
        session.touch();
    }

    pub async fn set_task(&self, handle: JoinHandle<()>) {
        *self.task.lock().await = Some(handle);
    }

    /// Stop everything the session has in flight: the active round is
    /// resolved as aborted and the orchestration task is cancelled.
    pub async fn teardown(&self) {
        let round = {
            let mut session = self.session.write().await;
            if !session.phase.is_over() {
                session.phase = SessionPhase::Aborted;
            }
            session.active_round.take()
        };
        if let Some(round) = round {
            round.abort().await;
        }
        if let Some(task) = self.task.lock().await.take() {
            task.abort();
        }
        tracing::info!("Session {} torn down", self.code);
    }
}

/// Point a seated player at a new connection. Returns the player and, if the
/// reconnect policy makes them sit out, the round they are excluded from.
fn rebind(
    session: &mut Session,
    player_id: &str,
    connection_id: ConnectionId,
    allow_reconnected_answers: bool,
) -> Option<(Player, Option<Arc<RoundContext>>)> {
    let player = session.players.iter_mut().find(|p| p.id == player_id)?;

    let was_disconnected = !player.connected;
    player.connection_id = Some(connection_id);
    player.connected = true;
    let player = player.clone();
    session.touch();

    let sit_out = match &session.active_round {
        Some(round) if was_disconnected && !allow_reconnected_answers => {
            tracing::info!(
                "Player {} reconnected mid-round, sitting out round {}",
                player.id,
                round.id
            );
            Some(round.clone())
        }
        _ => None,
    };
    Some((player, sit_out))
}

/// Registry of all live sessions, keyed by code
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<SessionCode, Arc<SessionHandle>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session with a fresh unique code
    pub async fn create(&self) -> Arc<SessionHandle> {
        let mut sessions = self.sessions.write().await;
        let code = loop {
            let code = generate_code();
            if !sessions.contains_key(&code) {
                break code;
            }
        };

        let handle = Arc::new(SessionHandle::new(code.clone()));
        sessions.insert(code.clone(), handle.clone());
        tracing::info!("Created session {}", code);
        handle
    }

    /// Create a session under a caller-chosen code. Returns `None` if the code
    /// is taken.
    pub async fn create_with_code(&self, code: &str) -> Option<Arc<SessionHandle>> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(code) {
            return None;
        }
        let handle = Arc::new(SessionHandle::new(code.to_string()));
        sessions.insert(code.to_string(), handle.clone());
        Some(handle)
    }

    pub async fn get(&self, code: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.read().await.get(code).cloned()
    }

    pub async fn all(&self) -> Vec<Arc<SessionHandle>> {
        self.sessions.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Remove a session and tear down whatever it has in flight
    pub async fn remove(&self, code: &str) -> Option<Arc<SessionHandle>> {
        let handle = self.sessions.write().await.remove(code)?;
        handle.teardown().await;
        Some(handle)
    }
}
