use crate::ConnectionId;

/// Transport failures. None of these are retried.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// TCP was accepted but the WebSocket upgrade did not complete.
    #[error("websocket upgrade failed: {0}")]
    Upgrade(String),

    /// The peer opened TCP but never completed the upgrade.
    #[error("websocket upgrade from {0} timed out")]
    UpgradeTimedOut(std::net::SocketAddr),

    #[error("send to {conn} failed: {reason}")]
    Send { conn: ConnectionId, reason: String },

    #[error("receive from {conn} failed: {reason}")]
    Receive { conn: ConnectionId, reason: String },

    /// The peer did not present the pre-shared connection key.
    #[error("connection key rejected for {0}")]
    KeyRejected(ConnectionId),
}
