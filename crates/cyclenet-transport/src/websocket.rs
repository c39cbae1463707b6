//! [`Transport`] over binary WebSocket frames (`tokio-tungstenite`).
//!
//! WebSocket is reliable and ordered, so the unreliable path falls back to
//! the default `send`. Each connection keeps its sink and stream behind
//! separate locks: a reader task parked in `recv` must never stall the
//! writer task.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::{Connection, ConnectionId, Transport, TransportError};

// Process-wide, so ids stay unique across several transports in one test binary.
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = WebSocketStream<TcpStream>;

const DEFAULT_UPGRADE_TIMEOUT: Duration = Duration::from_secs(5);

/// Listens on a TCP socket and upgrades every accepted stream.
pub struct WebSocketTransport {
    listener: TcpListener,
    upgrade_timeout: Duration,
}

impl WebSocketTransport {
    /// Binds the listener. Use port 0 to let the OS pick one.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        tracing::info!(addr, "listening for WebSocket peers");
        Ok(Self {
            listener,
            upgrade_timeout: DEFAULT_UPGRADE_TIMEOUT,
        })
    }

    /// How long [`Transport::accept`] waits for the HTTP upgrade.
    pub fn with_upgrade_timeout(mut self, timeout: Duration) -> Self {
        self.upgrade_timeout = timeout;
        self
    }

    /// Accepts a TCP stream without upgrading it.
    ///
    /// Cancel-safe. Callers that run the upgrade in a separate task keep
    /// one slow client from holding up the listener.
    pub async fn accept_tcp(&self) -> Result<PendingUpgrade, TransportError> {
        let (tcp, peer_addr) = self.listener.accept().await.map_err(TransportError::Accept)?;
        Ok(PendingUpgrade { tcp, peer_addr })
    }

    /// The address actually bound, useful after binding port 0.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    /// Accepts one TCP stream and completes the upgrade on it.
    ///
    /// Not cancel-safe: dropping the future mid-upgrade loses that peer.
    async fn accept(&mut self) -> Result<WebSocketConnection, TransportError> {
        self.accept_tcp().await?.upgrade(self.upgrade_timeout).await
    }
}

/// A TCP stream that has not finished the WebSocket handshake.
pub struct PendingUpgrade {
    tcp: TcpStream,
    peer_addr: SocketAddr,
}

impl PendingUpgrade {
    /// Remote address of the TCP stream.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Runs the HTTP upgrade, giving up after `timeout`.
    pub async fn upgrade(self, timeout: Duration) -> Result<WebSocketConnection, TransportError> {
        let peer_addr = self.peer_addr;
        let ws = tokio::time::timeout(timeout, tokio_tungstenite::accept_async(self.tcp))
            .await
            .map_err(|_| TransportError::UpgradeTimedOut(peer_addr))?
            .map_err(|e| TransportError::Upgrade(e.to_string()))?;

        let id = ConnectionId::new(NEXT_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%id, %peer_addr, "websocket upgraded");
        Ok(WebSocketConnection::new(id, ws))
    }
}

/// One upgraded peer.
pub struct WebSocketConnection {
    id: ConnectionId,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl WebSocketConnection {
    fn new(id: ConnectionId, ws: WsStream) -> Self {
        let (sink, stream) = ws.split();
        Self {
            id,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        }
    }

    fn send_error(&self, e: impl std::fmt::Display) -> TransportError {
        TransportError::Send {
            conn: self.id,
            reason: e.to_string(),
        }
    }
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let frame = Message::Binary(data.to_vec().into());
        let mut sink = self.sink.lock().await;
        sink.send(frame).await.map_err(|e| self.send_error(e))
    }

    /// Next binary (or text) frame. Control frames are skipped.
    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut stream = self.stream.lock().await;
        while let Some(frame) = stream.next().await {
            let frame = frame.map_err(|e| TransportError::Receive {
                conn: self.id,
                reason: e.to_string(),
            })?;
            match frame {
                Message::Binary(data) => return Ok(Some(data.into())),
                Message::Text(text) => return Ok(Some(text.as_bytes().to_vec())),
                Message::Close(_) => return Ok(None),
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
        Ok(None)
    }

    async fn close(&self) -> Result<(), TransportError> {
        let mut sink = self.sink.lock().await;
        sink.close().await.map_err(|e| self.send_error(e))
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
