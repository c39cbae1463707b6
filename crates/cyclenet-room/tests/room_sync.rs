//! Integration tests for the room realization state machine, driven with a
//! mock world graph and a recording outbox.

use std::collections::{HashMap, HashSet};

use cyclenet_protocol::{MemoryOutbox, Packet, RealizeRoom, RoomId};
use cyclenet_room::{RoomGraph, RoomSync, RoomSyncConfig, RoomVisibility};
use cyclenet_transport::ConnectionId;

// =========================================================================
// Mock world: an explicit adjacency map with manually controlled loading.
// =========================================================================

#[derive(Default)]
struct MockWorld {
    adjacency: HashMap<RoomId, Vec<RoomId>>,
    loaded: HashSet<RoomId>,
    activations: HashMap<RoomId, usize>,
}

impl MockWorld {
    /// `edges` maps each room to its space-separated neighbor list.
    fn with_edges(edges: &[(&str, &str)]) -> Self {
        let mut world = Self::default();
        for (room, neighbors) in edges {
            world.adjacency.insert(
                RoomId::new(*room),
                neighbors.split_whitespace().map(RoomId::new).collect(),
            );
        }
        world
    }

    fn finish_loading(&mut self, room: &str) {
        self.loaded.insert(RoomId::new(room));
    }

    fn activation_count(&self, room: &str) -> usize {
        self.activations.get(&RoomId::new(room)).copied().unwrap_or(0)
    }
}

impl RoomGraph for MockWorld {
    fn neighbors(&self, room: &RoomId) -> Vec<RoomId> {
        self.adjacency.get(room).cloned().unwrap_or_default()
    }

    fn contains(&self, room: &RoomId) -> bool {
        self.adjacency.contains_key(room)
    }

    fn is_loaded(&self, room: &RoomId) -> bool {
        self.loaded.contains(room)
    }

    fn activate(&mut self, room: &RoomId) {
        *self.activations.entry(room.clone()).or_default() += 1;
    }
}

fn conn(n: u64) -> ConnectionId {
    ConnectionId::new(n)
}

fn room(name: &str) -> RoomId {
    RoomId::new(name)
}

fn realized_rooms(outbox: &MemoryOutbox, to: ConnectionId) -> Vec<RoomId> {
    outbox
        .to(to)
        .into_iter()
        .filter_map(|p| match p {
            Packet::RealizeRoom(RealizeRoom { room }) => Some(room.clone()),
            _ => None,
        })
        .collect()
}

/// R connected to R1 and R2; R1 also leads to the far room X.
fn star_world() -> MockWorld {
    MockWorld::with_edges(&[
        ("R", "R1 R2"),
        ("R1", "R X"),
        ("R2", "R"),
        ("X", "R1"),
    ])
}

// =========================================================================
// Realization scenario
// =========================================================================

#[test]
fn test_player_entering_room_realizes_it_and_neighbors_once() {
    let mut world = star_world();
    let mut sync = RoomSync::default();
    let mut outbox = MemoryOutbox::new();
    let peer = conn(1);
    let tracked = [(peer, Some(room("R")))];

    // Tick 0: R, R1, R2 become Unsynced, one activation each.
    sync.tick(0, &tracked, &mut world, &mut outbox);
    for name in ["R", "R1", "R2"] {
        assert_eq!(sync.visibility(peer, &room(name)), RoomVisibility::Unsynced, "{name}");
        assert_eq!(world.activation_count(name), 1, "{name}");
    }
    assert_eq!(sync.visibility(peer, &room("X")), RoomVisibility::Abstract);
    assert_eq!(realized_rooms(&outbox, peer), vec![room("R"), room("R1"), room("R2")]);

    // The host finishes loading R only.
    world.finish_loading("R");

    // Tick 1: R alone becomes Synced; nothing is re-activated or re-sent.
    let report = sync.tick(1, &tracked, &mut world, &mut outbox);
    assert_eq!(report.synced, vec![(peer, room("R"))]);
    assert_eq!(sync.visibility(peer, &room("R")), RoomVisibility::Synced);
    assert_eq!(sync.visibility(peer, &room("R1")), RoomVisibility::Unsynced);
    assert_eq!(sync.visibility(peer, &room("R2")), RoomVisibility::Unsynced);
    for name in ["R", "R1", "R2"] {
        assert_eq!(world.activation_count(name), 1, "{name}");
    }
    assert_eq!(outbox.len(), 3);
    assert_eq!(sync.synced_rooms(peer), vec![room("R")]);
}

#[test]
fn test_room_loaded_before_realize_syncs_on_first_tick() {
    let mut world = star_world();
    world.finish_loading("R");
    let mut sync = RoomSync::default();
    let mut outbox = MemoryOutbox::new();

    let report = sync.tick(0, &[(conn(1), Some(room("R")))], &mut world, &mut outbox);

    assert_eq!(report.synced, vec![(conn(1), room("R"))]);
    assert_eq!(sync.visibility(conn(1), &room("R")), RoomVisibility::Synced);
    assert_eq!(sync.visibility(conn(1), &room("R1")), RoomVisibility::Unsynced);
    assert_eq!(sync.relevant_connections(&room("R")), vec![conn(1)]);
}

// =========================================================================
// Relevance bound
// =========================================================================

#[test]
fn test_relevant_connections_only_synced_pairs() {
    let mut world = star_world();
    let mut sync = RoomSync::default();
    let mut outbox = MemoryOutbox::new();

    let in_r = conn(1); // will be Synced for R
    let in_x = conn(2); // never near R
    let late = conn(3); // reaches R after the host loaded it

    sync.tick(0, &[(in_r, Some(room("R"))), (in_x, Some(room("X")))], &mut world, &mut outbox);
    assert!(sync.relevant_connections(&room("R")).is_empty());

    world.finish_loading("R");
    world.finish_loading("X");
    sync.tick(
        1,
        &[(in_r, Some(room("R"))), (in_x, Some(room("X"))), (late, Some(room("R2")))],
        &mut world,
        &mut outbox,
    );

    assert_eq!(sync.visibility(in_r, &room("R")), RoomVisibility::Synced);
    assert_eq!(sync.visibility(in_x, &room("R")), RoomVisibility::Abstract);
    assert_eq!(sync.visibility(late, &room("R2")), RoomVisibility::Unsynced);
    assert_eq!(sync.relevant_connections(&room("R")), vec![in_r, late]);

    // X is Synced only for the connection standing in it.
    assert_eq!(sync.relevant_connections(&room("X")), vec![in_x]);
}

#[test]
fn test_disconnect_removes_connection_from_relevance() {
    let mut world = star_world();
    world.finish_loading("R");
    let mut sync = RoomSync::default();
    let mut outbox = MemoryOutbox::new();
    let tracked = [(conn(1), Some(room("R"))), (conn(2), Some(room("R")))];
    sync.tick(0, &tracked, &mut world, &mut outbox);
    sync.tick(1, &tracked, &mut world, &mut outbox);
    assert_eq!(sync.relevant_connections(&room("R")), vec![conn(1), conn(2)]);

    sync.remove_connection(conn(1));

    assert_eq!(sync.relevant_connections(&room("R")), vec![conn(2)]);
    assert_eq!(sync.connection_count(), 1);
}

#[test]
fn test_second_connection_reactivates_idempotently() {
    let mut world = star_world();
    let mut sync = RoomSync::new(RoomSyncConfig::default());
    let mut outbox = MemoryOutbox::new();

    sync.tick(0, &[(conn(1), Some(room("R2")))], &mut world, &mut outbox);
    sync.tick(1, &[(conn(1), Some(room("R2"))), (conn(2), Some(room("R2")))], &mut world, &mut outbox);

    // Each connection gets its own RealizeRoom; the graph sees one
    // activation per connection and treats repeats as no-ops.
    assert_eq!(realized_rooms(&outbox, conn(1)), vec![room("R2"), room("R")]);
    assert_eq!(realized_rooms(&outbox, conn(2)), vec![room("R2"), room("R")]);
    assert_eq!(world.activation_count("R2"), 2);
}
