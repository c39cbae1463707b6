//! Packet shapes and the tagged [`Packet`] union.
//!
//! Wire layout of every packet:
//!
//! ```text
//! ┌──────────────┬───────────────────────────────────────┐
//! │ kind: u16 LE │ fields, in declaration order, no pad  │
//! └──────────────┴───────────────────────────────────────┘
//! ```
//!
//! Dispatch on the kind is an exhaustive `match`. Adding a [`Kind`] without
//! its packet (or the reverse) fails to compile.

use serde::{Deserialize, Serialize};

use crate::wire::{WireDecode, WireEncode, WireReader, WireWriter};
use crate::{
    BodyFlags, InputButtons, JoinRejectReason, Kind, PlayerId, ProtocolError, RoomId, Vec2,
    WeatherFlags,
};

// ---------------------------------------------------------------------------
// peer → host
// ---------------------------------------------------------------------------

crate::wire_record! {
    /// "Let me in." Sent once right after the connection key is accepted.
    pub struct JoinRequest {
        pub username: String,
        pub password: String,
    }
}

crate::wire_record! {
    /// One tick of controller state from a peer.
    pub struct PlayerInput {
        /// Peer-side tick the input was sampled on. The host ignores input
        /// older than the last one it applied.
        pub tick: u32,
        pub analog: Vec2,
        pub buttons: InputButtons,
    }
}

// ---------------------------------------------------------------------------
// host → peer
// ---------------------------------------------------------------------------

crate::wire_record! {
    /// Reply to a successful join.
    pub struct EnterSession {
        pub player_id: PlayerId,
        /// World/cycle seed so the peer's simulation matches the host's.
        pub seed: u32,
        pub start_room: RoomId,
    }
}

crate::wire_record! {
    /// Reply to a refused join. The connection stays open.
    pub struct JoinRejected {
        pub reason: JoinRejectReason,
        pub message: String,
    }
}

crate::wire_record! {
    /// Instructs the peer to load a room.
    pub struct RealizeRoom {
        pub room: RoomId,
    }
}

crate::wire_record! {
    /// Current weather cycle state. Resent periodically; only the newest
    /// matters on arrival.
    pub struct WeatherSync {
        pub cycle_tick: u32,
        pub cycle_length: u32,
        pub rain_intensity: f32,
        pub flags: WeatherFlags,
    }
}

crate::wire_record! {
    /// Where a player's body is this tick.
    pub struct PlayerSnapshot {
        pub player_id: PlayerId,
        pub room: RoomId,
        pub position: Vec2,
        pub velocity: Vec2,
        pub flags: BodyFlags,
    }
}

crate::wire_record! {
    /// One live entity inside a room snapshot.
    pub struct EntityState {
        pub id: u32,
        pub position: Vec2,
        pub velocity: Vec2,
    }
}

crate::wire_record! {
    /// Room-scoped state of the entities in one room.
    pub struct RoomSnapshot {
        pub room: RoomId,
        pub entities: Vec<EntityState>,
    }
}

crate::wire_record! {
    /// An 8-bit-per-channel color.
    #[derive(Copy, Default, Serialize, Deserialize)]
    pub struct Rgb {
        pub r: u8,
        pub g: u8,
        pub b: u8,
    }
}

crate::wire_record! {
    /// A player's generated attributes, sent so every peer renders and
    /// simulates them the same way.
    pub struct PlayerProfile {
        pub player_id: PlayerId,
        pub username: String,
        pub body_color: Rgb,
        pub eye_color: Rgb,
        pub body_scale: f32,
        pub run_speed: f32,
        pub jump_boost: f32,
        pub lung_capacity: f32,
    }
}

crate::wire_record! {
    /// A player's connection went away. Their identity lives on.
    pub struct PlayerLeft {
        pub player_id: PlayerId,
    }
}

// ---------------------------------------------------------------------------
// Packet
// ---------------------------------------------------------------------------

macro_rules! packets {
    ($($name:ident),* $(,)?) => {
        /// Every message that can travel on the wire.
        #[derive(Debug, Clone, PartialEq)]
        pub enum Packet {
            $( $name($name), )*
        }

        impl Packet {
            /// The kind tag for this packet.
            pub fn kind(&self) -> Kind {
                match self {
                    $( Packet::$name(_) => Kind::$name, )*
                }
            }

            fn write_body(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
                match self {
                    $( Packet::$name(p) => p.write_to(w), )*
                }
            }

            fn read_body(kind: Kind, r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
                match kind {
                    $( Kind::$name => $name::read_from(r).map(Packet::$name), )*
                }
            }
        }

        $(
            impl From<$name> for Packet {
                fn from(packet: $name) -> Self {
                    Packet::$name(packet)
                }
            }
        )*
    };
}

packets!(
    JoinRequest,
    PlayerInput,
    EnterSession,
    JoinRejected,
    RealizeRoom,
    WeatherSync,
    PlayerSnapshot,
    RoomSnapshot,
    PlayerProfile,
    PlayerLeft,
);

impl Packet {
    /// Serializes the packet: kind tag, then fields.
    ///
    /// # Errors
    /// [`ProtocolError::FieldTooLong`] if a string or array exceeds its
    /// 2-byte prefix.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut w = WireWriter::new();
        w.put(&self.kind().tag().to_le_bytes());
        self.write_body(&mut w)?;
        Ok(w.into_bytes())
    }

    /// Parses one packet that must occupy `bytes` exactly.
    ///
    /// # Errors
    /// - [`ProtocolError::PacketTooSmall`]: a field ran past the end
    /// - [`ProtocolError::PacketTooLarge`]: bytes left after the last field
    /// - [`ProtocolError::InvalidPacketType`]: unregistered tag
    /// - content errors (bad UTF-8, flag bits, enum values)
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let mut r = WireReader::new(bytes);
        let kind = read_kind(&mut r)?;
        r.set_kind(kind);
        let packet = Self::read_body(kind, &mut r)?;
        r.finish(kind)?;
        Ok(packet)
    }

    /// Reads only the kind tag, without decoding the body.
    pub fn peek_kind(bytes: &[u8]) -> Result<Kind, ProtocolError> {
        read_kind(&mut WireReader::new(bytes))
    }
}

fn read_kind(r: &mut WireReader<'_>) -> Result<Kind, ProtocolError> {
    let tag = u16::read_from(r)?;
    Kind::from_tag(tag).ok_or(ProtocolError::InvalidPacketType(tag))
}
