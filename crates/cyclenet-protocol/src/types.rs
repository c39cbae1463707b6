//! Value types shared by many packets: ids, vectors, delivery channels,
//! and the bitmask flag groups.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::wire::{impl_wire_flags, WireDecode, WireEncode, WireReader, WireWriter};
use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Persistent numeric identity assigned to a credential (the PID).
///
/// Stable across reconnects. Encoded as a plain `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

impl WireEncode for PlayerId {
    fn write_to(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        self.0.write_to(w)
    }
}

impl WireDecode for PlayerId {
    fn read_from(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        u32::read_from(r).map(Self)
    }
}

/// Name of a room, the world's unit of load granularity (e.g. `"SU_A22"`).
///
/// Rooms are identified by name on the wire so host and peer builds don't
/// have to agree on any index assignment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// Creates a room id from anything string-like.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The room's name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl WireEncode for RoomId {
    fn write_to(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        self.0.write_to(w)
    }
}

impl WireDecode for RoomId {
    fn read_from(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        String::read_from(r).map(Self)
    }
}

// ---------------------------------------------------------------------------
// Vec2
// ---------------------------------------------------------------------------

/// A 2D vector, encoded as two consecutive `f32`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    /// The origin.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Builds a vector from its components.
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl WireEncode for Vec2 {
    fn write_to(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        self.x.write_to(w)?;
        self.y.write_to(w)
    }
}

impl WireDecode for Vec2 {
    fn read_from(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            x: f32::read_from(r)?,
            y: f32::read_from(r)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Channel / Direction
// ---------------------------------------------------------------------------

/// Delivery guarantee requested from the transport for one send.
///
/// The protocol itself never retries; anything that must survive loss is
/// either sent reliably or resent periodically by its producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Channel {
    /// May be lost or reordered. Per-tick state.
    Unreliable,
    /// Delivered, in order.
    #[default]
    ReliableOrdered,
    /// Delivered, but older packets arriving after newer ones are dropped.
    ReliableSequenced,
}

/// Which way a packet kind travels, by tag-range convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Tags below `0x200`.
    PeerToHost,
    /// Tags `0x200` and above.
    HostToPeer,
}

// ---------------------------------------------------------------------------
// Flag groups
// ---------------------------------------------------------------------------
//
// Bit assignments below are part of the wire contract. Never reorder them
// between builds that talk to each other.

bitflags::bitflags! {
    /// Buttons held on a peer's controller this tick.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InputButtons: u8 {
        const JUMP   = 0x1;
        const THROW  = 0x2;
        const PICKUP = 0x4;
        const POINT  = 0x8;
    }
}

bitflags::bitflags! {
    /// Weather cycle phase flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct WeatherFlags: u8 {
        const RAINING  = 0x1;
        const STORM    = 0x2;
        const PRECYCLE = 0x4;
    }
}

bitflags::bitflags! {
    /// Coarse body state of a player.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BodyFlags: u8 {
        const ALIVE    = 0x1;
        const GROUNDED = 0x2;
        const HOLDING  = 0x4;
        const SWIMMING = 0x8;
    }
}

impl_wire_flags!(InputButtons: u8, WeatherFlags: u8, BodyFlags: u8);

// ---------------------------------------------------------------------------
// JoinRejectReason
// ---------------------------------------------------------------------------

/// Why the host refused a `JoinRequest`. Encoded as one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum JoinRejectReason {
    BadPassword = 1,
    AlreadyConnected = 2,
    InvalidName = 3,
    AlreadyJoined = 4,
    /// The host has no player ids left to hand out.
    ServerFull = 5,
}

impl WireEncode for JoinRejectReason {
    fn write_to(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        (*self as u8).write_to(w)
    }
}

impl WireDecode for JoinRejectReason {
    fn read_from(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        match u8::read_from(r)? {
            1 => Ok(Self::BadPassword),
            2 => Ok(Self::AlreadyConnected),
            3 => Ok(Self::InvalidName),
            4 => Ok(Self::AlreadyJoined),
            5 => Ok(Self::ServerFull),
            value => Err(ProtocolError::InvalidEnum {
                field: "JoinRejectReason",
                value,
            }),
        }
    }
}
