use async_trait::async_trait;

use crate::protocol::ServerMessage;
use crate::types::{PlayerId, SessionCode};

/// Outbound side of the transport as seen by the orchestrator.
///
/// Delivery is best effort: a player without a live connection simply misses
/// the message, the orchestrator never learns about transport failures.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a message to one player of a session
    async fn send_to_player(&self, code: &SessionCode, player_id: &PlayerId, msg: ServerMessage);

    /// Send a message to every connection attached to a session
    async fn broadcast(&self, code: &SessionCode, msg: ServerMessage);
}
