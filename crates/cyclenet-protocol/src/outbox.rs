//! Outbound sink used by the room and session drivers.
//!
//! The drivers never touch a connection directly. They hand typed packets
//! to an [`Outbox`], and whatever sits behind it (per-connection writer
//! tasks on a real host, a recording buffer in tests) does the I/O.

use cyclenet_transport::ConnectionId;

use crate::{Channel, Packet};

/// Something packets can be sent through.
pub trait Outbox {
    /// Sends `packet` to `conn` on `channel`.
    ///
    /// Never fails from the caller's point of view: a packet that cannot be
    /// encoded or delivered is logged and dropped by the implementation.
    fn send_to(&mut self, conn: ConnectionId, channel: Channel, packet: &Packet);

    /// Sends `packet` on its kind's default channel.
    fn send(&mut self, conn: ConnectionId, packet: &Packet) {
        self.send_to(conn, packet.kind().default_channel(), packet);
    }
}

/// One recorded send.
#[derive(Debug, Clone, PartialEq)]
pub struct Sent {
    pub conn: ConnectionId,
    pub channel: Channel,
    pub packet: Packet,
    /// The encoded form, exactly as it would go on the wire.
    pub bytes: Vec<u8>,
}

/// An [`Outbox`] that encodes and records every packet instead of sending it.
#[derive(Debug, Default)]
pub struct MemoryOutbox {
    sent: Vec<Sent>,
}

impl MemoryOutbox {
    /// An empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far, in send order.
    pub fn sent(&self) -> &[Sent] {
        &self.sent
    }

    /// Takes everything recorded so far, leaving the outbox empty.
    pub fn take(&mut self) -> Vec<Sent> {
        std::mem::take(&mut self.sent)
    }

    /// Packets recorded for one connection, in send order.
    pub fn to(&self, conn: ConnectionId) -> Vec<&Packet> {
        self.sent
            .iter()
            .filter(|s| s.conn == conn)
            .map(|s| &s.packet)
            .collect()
    }

    /// Number of recorded sends.
    pub fn len(&self) -> usize {
        self.sent.len()
    }

    /// True if nothing has been sent.
    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }
}

impl Outbox for MemoryOutbox {
    fn send_to(&mut self, conn: ConnectionId, channel: Channel, packet: &Packet) {
        match packet.encode() {
            Ok(bytes) => self.sent.push(Sent {
                conn,
                channel,
                packet: packet.clone(),
                bytes,
            }),
            Err(e) => {
                tracing::warn!(%conn, kind = %packet.kind(), error = %e, "dropping unencodable packet");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PlayerId, PlayerLeft, RealizeRoom, RoomId};

    // =========================================================================
    // MemoryOutbox
    // =========================================================================

    #[test]
    fn test_send_uses_kind_default_channel() {
        let mut outbox = MemoryOutbox::new();
        let packet = Packet::from(RealizeRoom {
            room: RoomId::new("SU_A22"),
        });
        outbox.send(ConnectionId::new(1), &packet);

        let sent = &outbox.sent()[0];
        assert_eq!(sent.channel, Channel::ReliableOrdered);
        assert_eq!(sent.bytes, packet.encode().unwrap());
    }

    #[test]
    fn test_to_filters_by_connection() {
        let mut outbox = MemoryOutbox::new();
        let a = ConnectionId::new(1);
        let b = ConnectionId::new(2);
        let left = |n| Packet::from(PlayerLeft { player_id: PlayerId(n) });
        outbox.send(a, &left(1));
        outbox.send(b, &left(2));
        outbox.send(a, &left(3));

        assert_eq!(outbox.to(a), vec![&left(1), &left(3)]);
        assert_eq!(outbox.to(b).len(), 1);
    }

    #[test]
    fn test_send_unencodable_packet_is_dropped() {
        let mut outbox = MemoryOutbox::new();
        let packet = Packet::from(RealizeRoom {
            room: RoomId::new("x".repeat(70_000)),
        });
        outbox.send(ConnectionId::new(1), &packet);
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_take_empties_outbox() {
        let mut outbox = MemoryOutbox::new();
        outbox.send(ConnectionId::new(1), &PlayerLeft { player_id: PlayerId(1) }.into());
        assert_eq!(outbox.take().len(), 1);
        assert!(outbox.is_empty());
    }
}
