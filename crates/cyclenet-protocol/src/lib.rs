//! Binary wire protocol for cyclenet.
//!
//! Every packet is a 2-byte little-endian kind tag followed by its fields in
//! declaration order. There is no length header; a packet must fill its
//! datagram exactly, and both a short and a long buffer are errors.
//!
//! ```text
//! Host                                     Peer
//!   │ ◄──── JoinRequest { user, pass } ──────┤
//!   ├────── EnterSession { pid, seed, room } ─►
//!   ├────── RealizeRoom { room } ────────────►
//!   ├────── RoomSnapshot / PlayerSnapshot ───►   (every tick, unreliable)
//!   │ ◄──── PlayerInput { tick, analog, .. } ┤   (every tick, unreliable)
//!   ├────── WeatherSync ─────────────────────►   (periodic resend)
//! ```

mod error;
mod kind;
mod outbox;
mod packet;
mod types;
pub mod wire;

pub use error::ProtocolError;
pub use kind::Kind;
pub use outbox::{MemoryOutbox, Outbox, Sent};
pub use packet::{
    EnterSession, EntityState, JoinRejected, JoinRequest, Packet, PlayerInput, PlayerLeft,
    PlayerProfile, PlayerSnapshot, RealizeRoom, Rgb, RoomSnapshot, WeatherSync,
};
pub use types::{
    BodyFlags, Channel, Direction, InputButtons, JoinRejectReason, PlayerId, RoomId, Vec2,
    WeatherFlags,
};
