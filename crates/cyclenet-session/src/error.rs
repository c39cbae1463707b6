//! Error types for the identity layer.

use cyclenet_protocol::PlayerId;
use cyclenet_transport::ConnectionId;

/// Reasons a join (or an identity lookup) can fail.
///
/// A failed join never mutates the store: the connection stays
/// unauthenticated and may try again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The name is known but the password hash does not match.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The identity is already in use by another live connection.
    #[error("player {0} is already connected")]
    AlreadyConnected(PlayerId),

    /// This connection already has a player attached.
    #[error("connection {0} has already joined")]
    ConnectionAlreadyJoined(ConnectionId),

    /// Empty name, or longer than the configured maximum.
    #[error("invalid player name {0:?}")]
    InvalidName(String),

    /// No identity with this id.
    #[error("player {0} not found")]
    NotFound(PlayerId),

    /// Every player id has been allocated.
    #[error("no player ids left")]
    PidExhausted,
}
