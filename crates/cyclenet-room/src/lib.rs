//! Room realization for cyclenet.
//!
//! The world is split into rooms. A peer only simulates the rooms it has
//! loaded, so before the host streams a room's state to a connection, the
//! peer must be told to load it, and the host's own copy must be loaded too.
//! [`RoomSync`] tracks that per `(connection, room)` pair.
//!
//! # Key types
//!
//! - [`RoomSync`]: the per-connection state machine, driven once per tick
//! - [`RoomVisibility`]: `Abstract → Unsynced → Synced`
//! - [`RoomGraph`]: the world adapter it queries and activates through
//! - [`EvictionPolicy`]: which idle rooms to report for unloading
//! - [`RoomSyncConfig`]: loading cap and eviction settings

mod config;
mod error;
mod eviction;
mod graph;
mod sync;

pub use config::{RoomSyncConfig, RoomVisibility};
pub use error::RoomError;
pub use eviction::{EvictionPolicy, IdleFor, RetainAll};
pub use graph::RoomGraph;
pub use sync::{RoomSync, TickReport};
