//! # cyclenet
//!
//! Networking core for a host-authoritative multiplayer simulation split
//! into rooms.
//!
//! The host runs the simulation; peers view it. Each tick the host drains
//! its inbound queues, admits joins, applies input, decides which rooms
//! each peer must load, and streams state for the rooms a peer has loaded.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cyclenet::prelude::*;
//!
//! // Implement HostWorld (and RoomGraph) for your simulation, then:
//! // let server = HostServer::builder()
//! //     .bind("0.0.0.0:7777")
//! //     .connection_key("secret")
//! //     .build(my_world)
//! //     .await?;
//! // server.run().await
//! ```

mod error;
mod host;
mod outbox;
mod peer;
mod role;
mod server;

pub use error::CyclenetError;
pub use host::{BodySnapshot, HostSession, HostSessionConfig, HostWorld};
pub use outbox::{ChannelOutbox, Frame};
pub use peer::{PeerSession, PeerState, PeerWorld};
pub use role::{receive_frame, Received, Role, SyncSession};
pub use server::{HostConfig, HostServer, HostServerBuilder};

pub use cyclenet_inbound as inbound;
pub use cyclenet_protocol as protocol;
pub use cyclenet_room as room;
pub use cyclenet_session as session;
pub use cyclenet_transport as transport;

/// Everything a host or peer integration usually needs.
pub mod prelude {
    pub use crate::{
        receive_frame, BodySnapshot, ChannelOutbox, CyclenetError, HostConfig, HostServer,
        HostServerBuilder, HostSession, HostSessionConfig, HostWorld, PeerSession, PeerState,
        PeerWorld, Received, Role, SyncSession,
    };

    pub use cyclenet_inbound::{InboundRegistry, QueueConfig};
    pub use cyclenet_protocol::{
        BodyFlags, Channel, EnterSession, EntityState, InputButtons, JoinRejectReason,
        JoinRejected, JoinRequest, Kind, MemoryOutbox, Outbox, Packet, PlayerId, PlayerInput,
        PlayerLeft, PlayerProfile, PlayerSnapshot, ProtocolError, RealizeRoom, Rgb, RoomId,
        RoomSnapshot, Vec2, WeatherFlags, WeatherSync,
    };
    pub use cyclenet_room::{RoomError, RoomGraph, RoomSyncConfig, RoomVisibility};
    pub use cyclenet_session::{IdentityRecord, IdentityStore, SessionConfig, SessionError};
    pub use cyclenet_transport::{ConnectionId, ConnectionState, ConnectionTable, TransportError};
}
