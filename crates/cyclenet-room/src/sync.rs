//! The room realization state machine.
//!
//! Every tick, for each tracked connection:
//!
//! 1. Work out the relevant set: the player's room plus its neighbors.
//! 2. For every relevant room still `Abstract`, activate it on the host,
//!    send `RealizeRoom` to the peer, and mark it `Unsynced` (subject to
//!    the per-connection loading cap).
//! 3. Promote `Unsynced` rooms whose host copy has loaded to `Synced`.
//!
//! A room the host already has loaded is therefore synced on the same tick
//! it is realized. One that is still loading waits for a later tick.

use std::collections::{BTreeMap, HashMap};

use cyclenet_protocol::{Outbox, Packet, RealizeRoom, RoomId};
use cyclenet_transport::ConnectionId;

use crate::{EvictionPolicy, IdleFor, RetainAll, RoomError, RoomGraph, RoomSyncConfig, RoomVisibility};

/// What changed during one [`RoomSync::tick`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Pairs that moved `Abstract → Unsynced` (a `RealizeRoom` was sent).
    pub realized: Vec<(ConnectionId, RoomId)>,
    /// Pairs that moved `Unsynced → Synced`.
    pub synced: Vec<(ConnectionId, RoomId)>,
    /// Relevant pairs left `Abstract` because of the loading cap.
    pub deferred: Vec<(ConnectionId, RoomId)>,
    /// Rooms dropped because the graph doesn't know them.
    pub desynced: Vec<(ConnectionId, RoomError)>,
}

impl TickReport {
    /// True if the tick changed nothing.
    pub fn is_empty(&self) -> bool {
        self.realized.is_empty()
            && self.synced.is_empty()
            && self.deferred.is_empty()
            && self.desynced.is_empty()
    }
}

/// Per-connection room visibility, plus last-visit stamps per room.
///
/// Owned by the tick loop; not thread-safe on its own.
pub struct RoomSync {
    config: RoomSyncConfig,
    // A missing entry means `Abstract`.
    pairs: BTreeMap<ConnectionId, BTreeMap<RoomId, RoomVisibility>>,
    last_visit: HashMap<RoomId, u64>,
    eviction: Box<dyn EvictionPolicy>,
}

impl RoomSync {
    /// Creates the machine. The eviction policy follows
    /// `config.evict_after_idle_ticks`.
    pub fn new(config: RoomSyncConfig) -> Self {
        let eviction: Box<dyn EvictionPolicy> = match config.evict_after_idle_ticks {
            Some(ticks) => Box::new(IdleFor { ticks }),
            None => Box::new(RetainAll),
        };
        Self {
            config,
            pairs: BTreeMap::new(),
            last_visit: HashMap::new(),
            eviction,
        }
    }

    /// Creates the machine with an explicit eviction policy.
    pub fn with_policy(config: RoomSyncConfig, policy: impl EvictionPolicy) -> Self {
        let mut sync = Self::new(config);
        sync.eviction = Box::new(policy);
        sync
    }

    /// The admission settings in use.
    pub fn config(&self) -> &RoomSyncConfig {
        &self.config
    }

    /// Runs one tick over every `(connection, current room)` pair.
    ///
    /// A connection whose player has no room yet only gets promotions.
    pub fn tick<G, O>(
        &mut self,
        now: u64,
        tracked: &[(ConnectionId, Option<RoomId>)],
        graph: &mut G,
        outbox: &mut O,
    ) -> TickReport
    where
        G: RoomGraph + ?Sized,
        O: Outbox + ?Sized,
    {
        let mut report = TickReport::default();

        for (conn, current) in tracked {
            let conn = *conn;
            if let Some(current) = current {
                self.realize_relevant(now, conn, current, graph, outbox, &mut report);
            }

            let rooms = self.pairs.entry(conn).or_default();
            for (room, vis) in rooms.iter_mut() {
                if *vis == RoomVisibility::Unsynced && graph.is_loaded(room) {
                    *vis = RoomVisibility::Synced;
                    tracing::debug!(%conn, %room, "room synced");
                    report.synced.push((conn, room.clone()));
                }
            }
        }

        report
    }

    /// Moves the `Abstract` rooms around `current` to `Unsynced`, up to the cap.
    fn realize_relevant<G, O>(
        &mut self,
        now: u64,
        conn: ConnectionId,
        current: &RoomId,
        graph: &mut G,
        outbox: &mut O,
        report: &mut TickReport,
    ) where
        G: RoomGraph + ?Sized,
        O: Outbox + ?Sized,
    {
        if !graph.contains(current) {
            tracing::warn!(%conn, room = %current, "player in unknown room, skipping");
            report.desynced.push((conn, RoomError::UnknownRoom(current.clone())));
            return;
        }
        self.last_visit.insert(current.clone(), now);

        let mut relevant = vec![current.clone()];
        for neighbor in graph.neighbors(current) {
            if !graph.contains(&neighbor) {
                tracing::warn!(%conn, room = %neighbor, "graph lists unknown neighbor, skipping");
                report.desynced.push((conn, RoomError::UnknownRoom(neighbor)));
            } else if !relevant.contains(&neighbor) {
                relevant.push(neighbor);
            }
        }

        let cap = self.config.max_unsynced_per_connection;
        let rooms = self.pairs.entry(conn).or_default();
        let mut loading = rooms
            .values()
            .filter(|v| **v == RoomVisibility::Unsynced)
            .count();
        for room in relevant {
            if rooms.contains_key(&room) {
                continue;
            }
            if loading >= cap {
                report.deferred.push((conn, room));
                continue;
            }
            graph.activate(&room);
            outbox.send(conn, &Packet::from(RealizeRoom { room: room.clone() }));
            tracing::debug!(%conn, %room, "room realized");
            rooms.insert(room.clone(), RoomVisibility::Unsynced);
            report.realized.push((conn, room));
            loading += 1;
        }
    }

    /// State of one pair. Unknown pairs are `Abstract`.
    pub fn visibility(&self, conn: ConnectionId, room: &RoomId) -> RoomVisibility {
        self.pairs
            .get(&conn)
            .and_then(|rooms| rooms.get(room))
            .copied()
            .unwrap_or_default()
    }

    /// Connections for which `room` is `Synced`, in id order.
    ///
    /// This is the relevance bound: room-scoped updates go to these
    /// connections and nobody else.
    pub fn relevant_connections(&self, room: &RoomId) -> Vec<ConnectionId> {
        self.pairs
            .iter()
            .filter(|(_, rooms)| rooms.get(room).is_some_and(|v| v.is_synced()))
            .map(|(conn, _)| *conn)
            .collect()
    }

    /// Rooms that are `Synced` for `conn`, in name order.
    pub fn synced_rooms(&self, conn: ConnectionId) -> Vec<RoomId> {
        self.pairs
            .get(&conn)
            .map(|rooms| {
                rooms
                    .iter()
                    .filter(|(_, v)| v.is_synced())
                    .map(|(room, _)| room.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Forgets every pair for `conn`. Returns `false` if there were none.
    pub fn remove_connection(&mut self, conn: ConnectionId) -> bool {
        let removed = self.pairs.remove(&conn).is_some();
        if removed {
            tracing::debug!(%conn, "room state discarded");
        }
        removed
    }

    /// Last tick a tracked player stood in `room`.
    pub fn last_visit(&self, room: &RoomId) -> Option<u64> {
        self.last_visit.get(room).copied()
    }

    /// Rooms the eviction policy would unload at `now`, in name order.
    ///
    /// Reporting only. Pairs stay `Synced`: walking a room back to
    /// `Abstract` on every peer is not implemented.
    pub fn eviction_candidates(&self, now: u64) -> Vec<RoomId> {
        let mut rooms: Vec<RoomId> = self
            .last_visit
            .iter()
            .filter(|(room, last)| self.eviction.should_evict(room, **last, now))
            .map(|(room, _)| room.clone())
            .collect();
        rooms.sort();
        rooms
    }

    /// Number of connections with any room state.
    pub fn connection_count(&self) -> usize {
        self.pairs.len()
    }
}

impl Default for RoomSync {
    fn default() -> Self {
        Self::new(RoomSyncConfig::default())
    }
}
