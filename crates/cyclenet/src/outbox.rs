//! The host's outbox: encoded frames into per-connection writer channels.

use std::collections::HashMap;

use cyclenet_protocol::{Channel, Outbox, Packet};
use cyclenet_transport::ConnectionId;
use tokio::sync::mpsc;

/// One encoded packet on its way to a writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub channel: Channel,
    pub bytes: Vec<u8>,
}

impl Frame {
    /// Whether the writer should use the best-effort send path.
    pub fn is_unreliable(&self) -> bool {
        self.channel == Channel::Unreliable
    }
}

/// Routes packets to the writer task of each registered connection.
#[derive(Debug, Default)]
pub struct ChannelOutbox {
    writers: HashMap<ConnectionId, mpsc::UnboundedSender<Frame>>,
}

impl ChannelOutbox {
    /// An outbox with no writers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes later sends for `conn` to `writer`, replacing any previous one.
    pub fn register(&mut self, conn: ConnectionId, writer: mpsc::UnboundedSender<Frame>) {
        self.writers.insert(conn, writer);
    }

    /// Drops the writer sender, which ends the writer task once it drains.
    pub fn unregister(&mut self, conn: ConnectionId) -> bool {
        self.writers.remove(&conn).is_some()
    }

    /// Number of registered writers.
    pub fn len(&self) -> usize {
        self.writers.len()
    }

    /// True if no writers are registered.
    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }
}

impl Outbox for ChannelOutbox {
    fn send_to(&mut self, conn: ConnectionId, channel: Channel, packet: &Packet) {
        let Some(writer) = self.writers.get(&conn) else {
            tracing::debug!(%conn, kind = %packet.kind(), "no writer for connection");
            return;
        };
        let bytes = match packet.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(%conn, kind = %packet.kind(), error = %e, "failed to encode packet");
                return;
            }
        };
        if writer.send(Frame { channel, bytes }).is_err() {
            tracing::debug!(%conn, "writer task gone, frame dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cyclenet_protocol::{PlayerId, PlayerLeft};

    #[test]
    fn test_send_to_registered_connection_delivers_encoded_frame() {
        let mut outbox = ChannelOutbox::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        outbox.register(ConnectionId::new(1), tx);
        let packet = Packet::from(PlayerLeft { player_id: PlayerId(3) });

        outbox.send(ConnectionId::new(1), &packet);

        let frame = rx.try_recv().unwrap();
        assert_eq!(frame.channel, Channel::ReliableOrdered);
        assert_eq!(frame.bytes, packet.encode().unwrap());
        assert!(!frame.is_unreliable());
    }

    #[test]
    fn test_send_to_unknown_connection_is_noop() {
        let mut outbox = ChannelOutbox::new();
        let packet = Packet::from(PlayerLeft { player_id: PlayerId(3) });
        outbox.send_to(ConnectionId::new(9), Channel::Unreliable, &packet);
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_unregister_closes_writer_channel() {
        let mut outbox = ChannelOutbox::new();
        let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();
        outbox.register(ConnectionId::new(1), tx);

        assert!(outbox.unregister(ConnectionId::new(1)));
        assert!(!outbox.unregister(ConnectionId::new(1)));
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }
}
