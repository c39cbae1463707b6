//! The world's room graph, as seen by the sync machine.

use cyclenet_protocol::RoomId;

/// What [`RoomSync`](crate::RoomSync) needs to know about the world.
///
/// Implemented by the host's simulation adapter. The sync machine never
/// loads anything itself; it asks the graph to.
pub trait RoomGraph {
    /// Rooms directly connected to `room`, in a stable order.
    fn neighbors(&self, room: &RoomId) -> Vec<RoomId>;

    /// Whether `room` exists in this world.
    fn contains(&self, room: &RoomId) -> bool;

    /// Whether the host's own copy of `room` has finished loading.
    fn is_loaded(&self, room: &RoomId) -> bool;

    /// Starts loading `room` on the host. Must be idempotent: it is called
    /// once per connection that needs the room.
    fn activate(&mut self, room: &RoomId);
}
