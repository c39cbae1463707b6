//! `HostServer` builder and server loop.
//!
//! Ties the layers together on a real socket:
//!
//! ```text
//! accept task ──→ reader task per connection ──→ InboundRegistry
//!      │                                             │
//!      └─(conn id, writer)──→ tick loop ←────────────┘
//!                               │
//!                    ChannelOutbox ──→ writer task per connection
//! ```

use std::sync::Arc;
use std::time::Duration;

use cyclenet_inbound::{InboundRegistry, QueueConfig};
use cyclenet_room::RoomSyncConfig;
use cyclenet_session::SessionConfig;
use cyclenet_transport::{
    Connection, ConnectionId, ConnectionTable, PendingUpgrade, TransportError,
    WebSocketConnection, WebSocketTransport,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::host::{HostSession, HostSessionConfig, HostWorld};
use crate::outbox::{ChannelOutbox, Frame};
use crate::{receive_frame, CyclenetError, Received, Role, SyncSession};

// ---------------------------------------------------------------------------
// HostConfig
// ---------------------------------------------------------------------------

/// Everything needed to start a host. Every field has a default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub bind_addr: String,
    /// Pre-shared key a peer must send as its first frame.
    pub connection_key: String,
    pub tick_rate_hz: u32,
    /// How long a new connection has to finish the WebSocket upgrade,
    /// and then again to present the key.
    pub handshake_timeout_ms: u64,
    pub weather_interval_ticks: u64,
    pub queues: QueueConfig,
    pub session: SessionConfig,
    pub rooms: RoomSyncConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7777".to_string(),
            connection_key: "cyclenet".to_string(),
            tick_rate_hz: 40,
            handshake_timeout_ms: 5000,
            weather_interval_ticks: 40,
            queues: QueueConfig::default(),
            session: SessionConfig::default(),
            rooms: RoomSyncConfig::default(),
        }
    }
}

impl HostConfig {
    /// Parses a JSON config. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, CyclenetError> {
        serde_json::from_str(json).map_err(CyclenetError::Config)
    }

    fn tick_period(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.tick_rate_hz.max(1)))
    }

    fn session_config(&self) -> HostSessionConfig {
        HostSessionConfig {
            session: self.session.clone(),
            rooms: self.rooms.clone(),
            weather_interval_ticks: self.weather_interval_ticks,
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for configuring and starting a host.
///
/// # Example
///
/// ```rust,ignore
/// use cyclenet::prelude::*;
///
/// let server = HostServer::builder()
///     .bind("0.0.0.0:7777")
///     .connection_key("secret")
///     .build(my_world)
///     .await?;
/// server.run().await
/// ```
#[derive(Debug, Clone, Default)]
pub struct HostServerBuilder {
    config: HostConfig,
}

impl HostServerBuilder {
    /// A builder starting from [`HostConfig::default`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every setting with `config`.
    pub fn config(mut self, config: HostConfig) -> Self {
        self.config = config;
        self
    }

    /// Address to listen on.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Pre-shared key each peer must send first.
    pub fn connection_key(mut self, key: &str) -> Self {
        self.config.connection_key = key.to_string();
        self
    }

    /// Ticks per second.
    pub fn tick_rate_hz(mut self, hz: u32) -> Self {
        self.config.tick_rate_hz = hz;
        self
    }

    /// Inbound queue capacities.
    pub fn queue_config(mut self, config: QueueConfig) -> Self {
        self.config.queues = config;
        self
    }

    /// Identity store settings.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.config.session = config;
        self
    }

    /// Room admission settings.
    pub fn room_config(mut self, config: RoomSyncConfig) -> Self {
        self.config.rooms = config;
        self
    }

    /// Ticks between weather broadcasts. 0 disables them.
    pub fn weather_interval_ticks(mut self, ticks: u64) -> Self {
        self.config.weather_interval_ticks = ticks;
        self
    }

    /// Binds the WebSocket listener and sets up the host session.
    pub async fn build<W: HostWorld>(self, world: W) -> Result<HostServer<W>, CyclenetError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;
        let inbound = Arc::new(InboundRegistry::new(&self.config.queues));
        let connections = Arc::new(ConnectionTable::new());
        let session = HostSession::new(
            self.config.session_config(),
            Arc::clone(&inbound),
            Arc::clone(&connections),
        );

        Ok(HostServer {
            transport,
            config: self.config,
            world,
            session,
        })
    }
}

// ---------------------------------------------------------------------------
// HostServer
// ---------------------------------------------------------------------------

/// A bound host, ready to [`run`](Self::run).
pub struct HostServer<W> {
    transport: WebSocketTransport,
    config: HostConfig,
    world: W,
    session: HostSession,
}

/// What the accept task and every reader task share.
struct ConnectionContext {
    key: String,
    handshake_timeout: Duration,
    inbound: Arc<InboundRegistry>,
    connections: Arc<ConnectionTable>,
}

type Registration = (ConnectionId, mpsc::UnboundedSender<Frame>);

impl HostServer<()> {
    /// Starts configuring a server.
    pub fn builder() -> HostServerBuilder {
        HostServerBuilder::new()
    }
}

impl<W: HostWorld + Send + 'static> HostServer<W> {
    /// The address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The configuration the server was built with.
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// The host session driven by the tick loop.
    pub fn session(&self) -> &HostSession {
        &self.session
    }

    /// Mutable access before the server starts, e.g. to import identities.
    pub fn session_mut(&mut self) -> &mut HostSession {
        &mut self.session
    }

    /// Runs the accept task and the tick loop. Does not return under
    /// normal operation.
    pub async fn run(self) -> Result<(), CyclenetError> {
        let HostServer {
            transport,
            config,
            mut world,
            mut session,
        } = self;

        let ctx = Arc::new(ConnectionContext {
            key: config.connection_key.clone(),
            handshake_timeout: Duration::from_millis(config.handshake_timeout_ms),
            inbound: Arc::clone(session.inbound()),
            connections: Arc::clone(session.connections()),
        });

        let (registrations, mut registered) = mpsc::unbounded_channel::<Registration>();
        tokio::spawn(accept_loop(transport, Arc::clone(&ctx), registrations));

        let mut outbox = ChannelOutbox::new();
        let mut interval = tokio::time::interval(config.tick_period());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut now: u64 = 0;

        tracing::info!(
            addr = %config.bind_addr,
            tick_rate_hz = config.tick_rate_hz,
            "cyclenet host running"
        );

        loop {
            tokio::select! {
                Some((conn, writer)) = registered.recv() => {
                    register_writer(&mut outbox, &ctx.connections, conn, writer);
                }
                _ = interval.tick() => {
                    while let Ok((conn, writer)) = registered.try_recv() {
                        register_writer(&mut outbox, &ctx.connections, conn, writer);
                    }
                    session.tick(now, &mut world, &mut outbox);
                    for conn in session.take_cleaned_up() {
                        outbox.unregister(conn);
                    }
                    now += 1;
                }
            }
        }
    }
}

/// Adds a writer unless the session already forgot its connection.
fn register_writer(
    outbox: &mut ChannelOutbox,
    connections: &ConnectionTable,
    conn: ConnectionId,
    writer: mpsc::UnboundedSender<Frame>,
) {
    if connections.state(conn).is_some() {
        outbox.register(conn, writer);
    } else {
        tracing::debug!(%conn, "writer for forgotten connection dropped");
    }
}

// ---------------------------------------------------------------------------
// Connection tasks
// ---------------------------------------------------------------------------

/// Accepts TCP streams and hands each one to its own upgrade task, so a
/// client that never finishes the upgrade cannot hold up the listener.
async fn accept_loop(
    transport: WebSocketTransport,
    ctx: Arc<ConnectionContext>,
    registrations: mpsc::UnboundedSender<Registration>,
) {
    loop {
        let pending = match transport.accept_tcp().await {
            Ok(pending) => pending,
            Err(e) => {
                tracing::error!(error = %e, "accept failed");
                continue;
            }
        };
        if registrations.is_closed() {
            tracing::debug!("tick loop gone, accept loop stopping");
            return;
        }
        tokio::spawn(upgrade_and_start(pending, Arc::clone(&ctx), registrations.clone()));
    }
}

async fn upgrade_and_start(
    pending: PendingUpgrade,
    ctx: Arc<ConnectionContext>,
    registrations: mpsc::UnboundedSender<Registration>,
) {
    let peer_addr = pending.peer_addr();
    let conn = match pending.upgrade(ctx.handshake_timeout).await {
        Ok(conn) => Arc::new(conn),
        Err(e) => {
            tracing::warn!(%peer_addr, error = %e, "upgrade failed");
            return;
        }
    };
    let id = conn.id();
    ctx.connections.register(id);

    let (writer, frames) = mpsc::unbounded_channel();
    tokio::spawn(write_frames(Arc::clone(&conn), frames));
    if registrations.send((id, writer)).is_err() {
        tracing::debug!(%id, "tick loop gone, dropping connection");
        return;
    }
    tokio::spawn(read_frames(conn, Arc::clone(&ctx)));
}

async fn check_key(conn: &WebSocketConnection, ctx: &ConnectionContext) -> Result<(), TransportError> {
    match tokio::time::timeout(ctx.handshake_timeout, conn.recv()).await {
        Ok(Ok(Some(frame))) if frame == ctx.key.as_bytes() => Ok(()),
        Ok(Err(e)) => Err(e),
        _ => Err(TransportError::KeyRejected(conn.id())),
    }
}

async fn read_frames(conn: Arc<WebSocketConnection>, ctx: Arc<ConnectionContext>) {
    let id = conn.id();

    if let Err(e) = check_key(&conn, &ctx).await {
        tracing::warn!(%id, error = %e, "closing connection");
        let _ = conn.close().await;
        ctx.connections.mark_disconnected(id);
        return;
    }
    ctx.connections.mark_connected(id);
    tracing::info!(%id, "connection accepted");

    loop {
        match conn.recv().await {
            Ok(Some(bytes)) => match receive_frame(Role::Host, &ctx.inbound, id, &bytes) {
                Ok(Received::Enqueued(kind)) => tracing::debug!(%id, %kind, "packet enqueued"),
                Ok(Received::WrongDirection(_)) => {}
                Err(e) => tracing::debug!(%id, error = %e, "malformed packet dropped"),
            },
            Ok(None) => {
                tracing::info!(%id, "connection closed");
                break;
            }
            Err(e) => {
                tracing::debug!(%id, error = %e, "recv error");
                break;
            }
        }
    }
    ctx.connections.mark_disconnected(id);
}

async fn write_frames(conn: Arc<WebSocketConnection>, mut frames: mpsc::UnboundedReceiver<Frame>) {
    while let Some(frame) = frames.recv().await {
        let sent = if frame.is_unreliable() {
            conn.send_unreliable(&frame.bytes).await
        } else {
            conn.send(&frame.bytes).await
        };
        if let Err(e) = sent {
            tracing::debug!(id = %conn.id(), error = %e, "send failed, writer stopping");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_config_default_values() {
        let config = HostConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:7777");
        assert_eq!(config.tick_rate_hz, 40);
        assert_eq!(config.weather_interval_ticks, 40);
        assert_eq!(config.tick_period(), Duration::from_millis(25));
    }

    #[test]
    fn test_from_json_partial_fills_defaults() {
        let config =
            HostConfig::from_json(r#"{"connection_key": "k", "rooms": {"max_unsynced_per_connection": 2}}"#)
                .unwrap();
        assert_eq!(config.connection_key, "k");
        assert_eq!(config.rooms.max_unsynced_per_connection, 2);
        assert_eq!(config.queues.capacity, 1024);
        assert_eq!(config.handshake_timeout_ms, 5000);
    }

    #[test]
    fn test_from_json_malformed_is_config_error() {
        let err = HostConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, CyclenetError::Config(_)));
    }

    #[test]
    fn test_tick_period_zero_rate_clamped() {
        let config = HostConfig {
            tick_rate_hz: 0,
            ..HostConfig::default()
        };
        assert_eq!(config.tick_period(), Duration::from_secs(1));
    }

    #[test]
    fn test_builder_settings_land_in_config() {
        let builder = HostServer::builder()
            .bind("0.0.0.0:1")
            .connection_key("abc")
            .tick_rate_hz(20)
            .weather_interval_ticks(5);
        assert_eq!(builder.config.bind_addr, "0.0.0.0:1");
        assert_eq!(builder.config.connection_key, "abc");
        assert_eq!(builder.config.tick_rate_hz, 20);
        assert_eq!(builder.config.session_config().weather_interval_ticks, 5);
    }
}
