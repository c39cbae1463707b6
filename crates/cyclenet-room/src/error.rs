//! Error types for the room layer.

use cyclenet_protocol::RoomId;

/// Errors raised while deciding which rooms a connection needs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// A room name the world graph has never heard of. Host and peer
    /// disagree about the world, so the request is dropped.
    #[error("unknown room {0}")]
    UnknownRoom(RoomId),
}
