//! Host and peer roles, and the receive path that filters by them.

use cyclenet_inbound::InboundRegistry;
use cyclenet_protocol::{Direction, Kind, Outbox, Packet, ProtocolError};
use cyclenet_transport::ConnectionId;

/// Which side of the session this endpoint is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The authoritative simulation.
    Host,
    /// A remote viewer.
    Peer,
}

impl Role {
    /// Returns `true` if packets of `kind` are addressed to this role.
    pub fn accepts(self, kind: Kind) -> bool {
        matches!(
            (self, kind.direction()),
            (Role::Host, Direction::PeerToHost) | (Role::Peer, Direction::HostToPeer)
        )
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Host => write!(f, "host"),
            Role::Peer => write!(f, "peer"),
        }
    }
}

/// The interface shared by the host and peer drivers.
///
/// `tick` is called once per simulation tick with the tick number, the
/// role's world adapter, and where to send packets.
pub trait SyncSession<W: ?Sized> {
    fn role(&self) -> Role;

    fn tick<O: Outbox + ?Sized>(&mut self, now: u64, world: &mut W, outbox: &mut O);
}

/// What [`receive_frame`] did with a datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received {
    Enqueued(Kind),
    /// Well-formed, but travelling the wrong way for this role. Dropped.
    WrongDirection(Kind),
}

/// Classifies one raw datagram and enqueues it if `role` should get it.
///
/// # Errors
/// The decode error for a malformed datagram. Nothing is enqueued, and the
/// connection is expected to stay up.
pub fn receive_frame(
    role: Role,
    inbound: &InboundRegistry,
    sender: ConnectionId,
    bytes: &[u8],
) -> Result<Received, ProtocolError> {
    let kind = Packet::peek_kind(bytes)?;
    if !role.accepts(kind) {
        tracing::warn!(%sender, %kind, %role, "dropping packet sent the wrong way");
        return Ok(Received::WrongDirection(kind));
    }
    inbound.enqueue_bytes(sender, bytes).map(Received::Enqueued)
}
