//! Connection hub
//!
//! Tracks every live WebSocket connection's outbound channel, which session
//! rooms a connection listens to, and which connection currently speaks for
//! which player. Implements [`Notifier`] for the orchestrator.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::{mpsc, RwLock};

use crate::notifier::Notifier;
use crate::protocol::ServerMessage;
use crate::types::{ConnectionId, PlayerId, SessionCode};

/// Per-connection sender for outbound messages
pub type ConnectionSender = mpsc::UnboundedSender<ServerMessage>;

#[derive(Debug, Default)]
struct HubInner {
    connections: HashMap<ConnectionId, ConnectionSender>,
    /// Connections receiving session broadcasts (players and lobby watchers)
    rooms: HashMap<SessionCode, HashSet<ConnectionId>>,
    /// Current connection per seated player
    bindings: HashMap<SessionCode, HashMap<PlayerId, ConnectionId>>,
}

#[derive(Debug, Default)]
pub struct ConnectionHub {
    inner: RwLock<HubInner>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection and get the receiving end of its channel
    pub async fn register(&self) -> (ConnectionId, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = ulid::Ulid::new().to_string();
        self.inner.write().await.connections.insert(id.clone(), tx);
        (id, rx)
    }

    /// Forget a connection everywhere it was referenced
    pub async fn unregister(&self, connection_id: &ConnectionId) {
        let mut inner = self.inner.write().await;
        inner.connections.remove(connection_id);
        for members in inner.rooms.values_mut() {
            members.remove(connection_id);
        }
        for players in inner.bindings.values_mut() {
            players.retain(|_, conn| conn != connection_id);
        }
    }

    pub async fn join_room(&self, code: &SessionCode, connection_id: &ConnectionId) {
        self.inner
            .write()
            .await
            .rooms
            .entry(code.clone())
            .or_default()
            .insert(connection_id.clone());
    }

    /// Route a player's targeted messages to `connection_id` and subscribe it
    /// to the session room. Replaces any previous binding.
    pub async fn bind_player(
        &self,
        code: &SessionCode,
        player_id: &PlayerId,
        connection_id: &ConnectionId,
    ) {
        let mut inner = self.inner.write().await;
        inner
            .rooms
            .entry(code.clone())
            .or_default()
            .insert(connection_id.clone());
        inner
            .bindings
            .entry(code.clone())
            .or_default()
            .insert(player_id.clone(), connection_id.clone());
    }

    /// Drop all routing for a session
    pub async fn close_room(&self, code: &SessionCode) {
        let mut inner = self.inner.write().await;
        inner.rooms.remove(code);
        inner.bindings.remove(code);
    }

    /// Send straight to one connection (responses outside any session)
    pub async fn send_to_connection(&self, connection_id: &ConnectionId, msg: ServerMessage) {
        if let Some(tx) = self.inner.read().await.connections.get(connection_id) {
            // Receiver gone means the socket task is shutting down
            let _ = tx.send(msg);
        }
    }

    pub async fn room_size(&self, code: &SessionCode) -> usize {
        self.inner
            .read()
            .await
            .rooms
            .get(code)
            .map(|m| m.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Notifier for ConnectionHub {
    async fn send_to_player(&self, code: &SessionCode, player_id: &PlayerId, msg: ServerMessage) {
        let inner = self.inner.read().await;
        let Some(connection_id) = inner.bindings.get(code).and_then(|b| b.get(player_id)) else {
            tracing::debug!("No connection for player {} in {}", player_id, code);
            return;
        };
        if let Some(tx) = inner.connections.get(connection_id) {
            let _ = tx.send(msg);
        }
    }

    async fn broadcast(&self, code: &SessionCode, msg: ServerMessage) {
        let inner = self.inner.read().await;
        let Some(members) = inner.rooms.get(code) else {
            return;
        };
        for connection_id in members {
            if let Some(tx) = inner.connections.get(connection_id) {
                let _ = tx.send(msg.clone());
            }
        }
    }
}
