//! One inbound queue per packet kind.

use cyclenet_protocol::{
    EnterSession, JoinRejected, JoinRequest, Kind, Packet, PlayerInput, PlayerLeft,
    PlayerProfile, PlayerSnapshot, ProtocolError, RealizeRoom, RoomSnapshot, WeatherSync,
};
use cyclenet_transport::ConnectionId;
use serde::{Deserialize, Serialize};

use crate::{Enqueued, InboundQueue, Overflow};

/// Queue sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Capacity of every FIFO queue.
    pub capacity: usize,
    /// Capacity of the latest-wins queues. Only the newest entry is ever
    /// read, so this only needs to absorb a burst between two ticks.
    pub latest_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            latest_capacity: 16,
        }
    }
}

/// The set of inbound queues for one endpoint.
///
/// Built once at startup and shared by `Arc` between the receive tasks
/// (which call [`enqueue_bytes`](Self::enqueue_bytes)) and the tick loop
/// (which reads the typed queues). Every kind has a queue on both roles;
/// the receive path filters by direction before enqueueing.
#[derive(Debug)]
pub struct InboundRegistry {
    join_requests: InboundQueue<JoinRequest>,
    inputs: InboundQueue<PlayerInput>,
    enter_session: InboundQueue<EnterSession>,
    join_rejected: InboundQueue<JoinRejected>,
    realize_room: InboundQueue<RealizeRoom>,
    weather: InboundQueue<WeatherSync>,
    player_snapshots: InboundQueue<PlayerSnapshot>,
    room_snapshots: InboundQueue<RoomSnapshot>,
    profiles: InboundQueue<PlayerProfile>,
    player_left: InboundQueue<PlayerLeft>,
}

impl InboundRegistry {
    /// Builds one queue per kind, sized from `config`.
    pub fn new(config: &QueueConfig) -> Self {
        let cap = config.capacity;
        Self {
            join_requests: fifo("join_requests", cap),
            inputs: fifo("inputs", cap),
            enter_session: fifo("enter_session", cap),
            join_rejected: fifo("join_rejected", cap),
            realize_room: fifo("realize_room", cap),
            weather: InboundQueue::new("weather", config.latest_capacity, Overflow::DropOldest),
            player_snapshots: fifo("player_snapshots", cap),
            room_snapshots: fifo("room_snapshots", cap),
            profiles: fifo("profiles", cap),
            player_left: fifo("player_left", cap),
        }
    }

    /// Routes a decoded packet to its kind's queue.
    pub fn enqueue_packet(&self, sender: ConnectionId, packet: Packet) -> Enqueued {
        match packet {
            Packet::JoinRequest(p) => self.join_requests.enqueue(sender, p),
            Packet::PlayerInput(p) => self.inputs.enqueue(sender, p),
            Packet::EnterSession(p) => self.enter_session.enqueue(sender, p),
            Packet::JoinRejected(p) => self.join_rejected.enqueue(sender, p),
            Packet::RealizeRoom(p) => self.realize_room.enqueue(sender, p),
            Packet::WeatherSync(p) => self.weather.enqueue(sender, p),
            Packet::PlayerSnapshot(p) => self.player_snapshots.enqueue(sender, p),
            Packet::RoomSnapshot(p) => self.room_snapshots.enqueue(sender, p),
            Packet::PlayerProfile(p) => self.profiles.enqueue(sender, p),
            Packet::PlayerLeft(p) => self.player_left.enqueue(sender, p),
        }
    }

    /// Decodes a raw datagram and enqueues it. Returns the decoded kind.
    ///
    /// # Errors
    /// Any [`ProtocolError`] from decoding. Nothing is enqueued then, and
    /// the caller is expected to log and carry on.
    pub fn enqueue_bytes(&self, sender: ConnectionId, bytes: &[u8]) -> Result<Kind, ProtocolError> {
        let packet = Packet::decode(bytes)?;
        let kind = packet.kind();
        self.enqueue_packet(sender, packet);
        Ok(kind)
    }

    /// Join requests, oldest first.
    pub fn join_requests(&self) -> &InboundQueue<JoinRequest> {
        &self.join_requests
    }

    /// Player inputs, oldest first.
    pub fn inputs(&self) -> &InboundQueue<PlayerInput> {
        &self.inputs
    }

    /// Join acceptances received from the host.
    pub fn enter_session(&self) -> &InboundQueue<EnterSession> {
        &self.enter_session
    }

    /// Join rejections received from the host.
    pub fn join_rejected(&self) -> &InboundQueue<JoinRejected> {
        &self.join_rejected
    }

    /// Rooms the host asked the peer to realize.
    pub fn realize_room(&self) -> &InboundQueue<RealizeRoom> {
        &self.realize_room
    }

    /// Latest-wins: read with [`InboundQueue::latest`].
    pub fn weather(&self) -> &InboundQueue<WeatherSync> {
        &self.weather
    }

    /// Per-player body snapshots.
    pub fn player_snapshots(&self) -> &InboundQueue<PlayerSnapshot> {
        &self.player_snapshots
    }

    /// Per-room entity snapshots.
    pub fn room_snapshots(&self) -> &InboundQueue<RoomSnapshot> {
        &self.room_snapshots
    }

    /// Player profiles announced by the host.
    pub fn profiles(&self) -> &InboundQueue<PlayerProfile> {
        &self.profiles
    }

    /// Players that left the session.
    pub fn player_left(&self) -> &InboundQueue<PlayerLeft> {
        &self.player_left
    }
}

fn fifo<T>(name: &'static str, capacity: usize) -> InboundQueue<T> {
    InboundQueue::new(name, capacity, Overflow::DropNewest)
}

impl Default for InboundRegistry {
    fn default() -> Self {
        Self::new(&QueueConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cyclenet_protocol::{InputButtons, PlayerId, RoomId, Vec2, WeatherFlags};

    fn conn(n: u64) -> ConnectionId {
        ConnectionId::new(n)
    }

    fn weather(cycle_tick: u32) -> Packet {
        WeatherSync {
            cycle_tick,
            cycle_length: 1000,
            rain_intensity: 0.0,
            flags: WeatherFlags::empty(),
        }
        .into()
    }

    // =========================================================================
    // Routing
    // =========================================================================

    #[test]
    fn test_enqueue_bytes_routes_to_kind_queue() {
        let registry = InboundRegistry::default();
        let bytes = Packet::from(RealizeRoom {
            room: RoomId::new("SU_A22"),
        })
        .encode()
        .unwrap();

        assert_eq!(registry.enqueue_bytes(conn(1), &bytes), Ok(Kind::RealizeRoom));
        assert_eq!(registry.realize_room().len(), 1);
        assert!(registry.join_requests().is_empty());
    }

    #[test]
    fn test_enqueue_bytes_malformed_enqueues_nothing() {
        let registry = InboundRegistry::default();
        let mut bytes = Packet::from(PlayerLeft {
            player_id: PlayerId(1),
        })
        .encode()
        .unwrap();
        bytes.push(0);

        assert!(matches!(
            registry.enqueue_bytes(conn(1), &bytes),
            Err(ProtocolError::PacketTooLarge { .. })
        ));
        assert!(registry.player_left().is_empty());
    }

    #[test]
    fn test_enqueue_packet_keeps_sender() {
        let registry = InboundRegistry::default();
        registry.enqueue_packet(
            conn(7),
            PlayerInput {
                tick: 1,
                analog: Vec2::ZERO,
                buttons: InputButtons::empty(),
            }
            .into(),
        );
        let (sender, input) = registry.inputs().dequeue().unwrap();
        assert_eq!(sender, conn(7));
        assert_eq!(input.tick, 1);
    }

    // =========================================================================
    // Per-kind policy
    // =========================================================================

    #[test]
    fn test_weather_overflow_keeps_newest() {
        let registry = InboundRegistry::new(&QueueConfig {
            capacity: 8,
            latest_capacity: 2,
        });
        for t in 1..=5 {
            assert_ne!(registry.enqueue_packet(conn(1), weather(t)), Enqueued::Rejected);
        }
        let (_, newest) = registry.weather().latest().unwrap();
        assert_eq!(newest.cycle_tick, 5);
    }

    #[test]
    fn test_fifo_kind_overflow_rejects_newest() {
        let registry = InboundRegistry::new(&QueueConfig {
            capacity: 1,
            latest_capacity: 1,
        });
        let left = |n| Packet::from(PlayerLeft { player_id: PlayerId(n) });
        assert_eq!(registry.enqueue_packet(conn(1), left(1)), Enqueued::Stored);
        assert_eq!(registry.enqueue_packet(conn(1), left(2)), Enqueued::Rejected);
        assert_eq!(registry.player_left().dequeue().unwrap().1.player_id, PlayerId(1));
    }

    // =========================================================================
    // QueueConfig
    // =========================================================================

    #[test]
    fn test_queue_config_defaults() {
        let config = QueueConfig::default();
        assert_eq!(config.capacity, 1024);
        assert_eq!(config.latest_capacity, 16);
    }

    #[test]
    fn test_queue_config_partial_json_fills_defaults() {
        let config: QueueConfig = serde_json::from_str(r#"{ "capacity": 64 }"#).unwrap();
        assert_eq!(config.capacity, 64);
        assert_eq!(config.latest_capacity, 16);
    }
}
