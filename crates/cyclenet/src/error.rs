//! Unified error type for cyclenet.

use cyclenet_protocol::ProtocolError;
use cyclenet_room::RoomError;
use cyclenet_session::SessionError;
use cyclenet_transport::TransportError;

/// Top-level error that wraps every sub-crate's error.
///
/// Only server setup surfaces these to the caller; inside the tick loop
/// errors are logged and the offending packet or join is dropped.
#[derive(Debug, thiserror::Error)]
pub enum CyclenetError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Room(#[from] RoomError),

    /// A host config file could not be parsed.
    #[error("invalid config: {0}")]
    Config(#[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use cyclenet_protocol::{PlayerId, RoomId};

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::Upgrade("bad request".into());
        let err: CyclenetError = err.into();
        assert!(matches!(err, CyclenetError::Transport(_)));
        assert!(err.to_string().contains("bad request"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: CyclenetError = ProtocolError::InvalidPacketType(0x999).into();
        assert!(matches!(err, CyclenetError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error() {
        let err: CyclenetError = SessionError::AlreadyConnected(PlayerId(2)).into();
        assert!(matches!(err, CyclenetError::Session(_)));
    }

    #[test]
    fn test_from_room_error() {
        let err: CyclenetError = RoomError::UnknownRoom(RoomId::new("R9")).into();
        assert!(matches!(err, CyclenetError::Room(_)));
        assert!(err.to_string().contains("R9"));
    }
}
