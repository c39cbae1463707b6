//! Transport boundary for cyclenet.
//!
//! The transport owns every connection. The rest of the stack only ever sees
//! a [`ConnectionId`] and asks the shared [`ConnectionTable`] what state that
//! connection is in:
//!
//! ```text
//! receive task ──(register / mark_*)──→ ConnectionTable ←──(poll)── tick loop
//! ```
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
mod table;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use table::{ConnectionState, ConnectionTable};
#[cfg(feature = "websocket")]
pub use websocket::{PendingUpgrade, WebSocketConnection, WebSocketTransport};

use std::fmt;

/// Handle for one accepted connection.
///
/// The transport hands these out at accept time. Every per-connection
/// table in the stack is keyed by it; nothing above the transport holds
/// the connection itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wraps a raw id.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw id.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A listener that yields ready-to-use connections.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Resolves once the next peer has connected and finished any
    /// transport-level handshake.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;
}

/// A datagram pipe to one remote peer.
///
/// All methods take `&self` so a reader task and a writer task can share
/// one connection behind an `Arc`.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Delivers `data` reliably and in order.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Next datagram from the peer. `Ok(None)` once the peer has closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Best-effort delivery for per-tick state. Falls back to [`send`](Self::send)
    /// on transports that only have a reliable path.
    async fn send_unreliable(&self, data: &[u8]) -> Result<(), Self::Error> {
        self.send(data).await
    }

    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;
}
