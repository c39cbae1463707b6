//! Policies for spotting rooms nobody needs any more.
//!
//! These only *report*. Nothing in this crate walks a room back from
//! `Synced` to `Abstract`; the caller decides what to do with the list.

use cyclenet_protocol::RoomId;

/// Decides whether a room is idle enough to unload.
pub trait EvictionPolicy: Send + Sync + 'static {
    /// `last_visit` is the last tick a tracked player stood in `room`.
    fn should_evict(&self, room: &RoomId, last_visit: u64, now: u64) -> bool;
}

/// Never evicts.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetainAll;

impl EvictionPolicy for RetainAll {
    fn should_evict(&self, _room: &RoomId, _last_visit: u64, _now: u64) -> bool {
        false
    }
}

/// Evicts rooms that have gone `ticks` ticks without a visit.
#[derive(Debug, Clone, Copy)]
pub struct IdleFor {
    pub ticks: u64,
}

impl EvictionPolicy for IdleFor {
    fn should_evict(&self, _room: &RoomId, last_visit: u64, now: u64) -> bool {
        now.saturating_sub(last_visit) >= self.ticks
    }
}
