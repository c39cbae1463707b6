//! The kind registry: one numeric tag per packet shape.
//!
//! Tags are stable for the lifetime of the protocol. Below `0x200` travels
//! peer → host, `0x200` and above host → peer. The codec does not enforce
//! the direction; [`Kind::direction`] reports it for callers that do.

use std::fmt;

use crate::{Channel, Direction};

/// Discriminator for every packet shape on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum Kind {
    // -- peer → host --
    JoinRequest = 0x001,
    PlayerInput = 0x002,

    // -- host → peer --
    EnterSession = 0x200,
    JoinRejected = 0x201,
    RealizeRoom = 0x202,
    WeatherSync = 0x203,
    PlayerSnapshot = 0x204,
    RoomSnapshot = 0x205,
    PlayerProfile = 0x206,
    PlayerLeft = 0x207,
}

impl Kind {
    /// Every registered kind, in tag order.
    pub const ALL: [Kind; 10] = [
        Kind::JoinRequest,
        Kind::PlayerInput,
        Kind::EnterSession,
        Kind::JoinRejected,
        Kind::RealizeRoom,
        Kind::WeatherSync,
        Kind::PlayerSnapshot,
        Kind::RoomSnapshot,
        Kind::PlayerProfile,
        Kind::PlayerLeft,
    ];

    /// First tag of the host → peer range.
    pub const HOST_TO_PEER_BASE: u16 = 0x200;

    /// The numeric tag written to the wire.
    pub fn tag(self) -> u16 {
        self as u16
    }

    /// Looks up a tag. `None` means the tag is not registered.
    pub fn from_tag(tag: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.tag() == tag)
    }

    /// Travel direction implied by the tag range.
    pub fn direction(self) -> Direction {
        if self.tag() < Self::HOST_TO_PEER_BASE {
            Direction::PeerToHost
        } else {
            Direction::HostToPeer
        }
    }

    /// The channel this kind is normally sent on.
    pub fn default_channel(self) -> Channel {
        match self {
            Kind::PlayerInput | Kind::PlayerSnapshot | Kind::RoomSnapshot => Channel::Unreliable,
            Kind::WeatherSync => Channel::ReliableSequenced,
            Kind::JoinRequest
            | Kind::EnterSession
            | Kind::JoinRejected
            | Kind::RealizeRoom
            | Kind::PlayerProfile
            | Kind::PlayerLeft => Channel::ReliableOrdered,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}(0x{:03x})", self, self.tag())
    }
}
