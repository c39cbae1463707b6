//! The peer-side tick driver.

use std::collections::BTreeSet;
use std::sync::Arc;

use cyclenet_inbound::InboundRegistry;
use cyclenet_protocol::{
    InputButtons, JoinRejectReason, JoinRequest, Outbox, PlayerId, PlayerInput, PlayerProfile,
    PlayerSnapshot, RoomId, RoomSnapshot, Vec2, WeatherSync,
};
use cyclenet_room::RoomError;
use cyclenet_transport::ConnectionId;

use crate::{Role, SyncSession};

/// The peer's local simulation, as seen by the sync layer.
pub trait PeerWorld {
    /// Whether this build of the world has a room with this id.
    fn contains(&self, room: &RoomId) -> bool;

    /// Starts loading a room. Called once per realized room.
    fn activate(&mut self, room: &RoomId);

    fn apply_weather(&mut self, weather: &WeatherSync);

    fn apply_player_snapshot(&mut self, snapshot: &PlayerSnapshot);

    fn apply_room_snapshot(&mut self, snapshot: &RoomSnapshot);

    fn player_joined(&mut self, profile: &PlayerProfile);

    fn player_left(&mut self, player: PlayerId);
}

/// Where the peer is in the join handshake.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PeerState {
    /// No join requested yet.
    #[default]
    Idle,
    /// `JoinRequest` sent, waiting for the host.
    Joining,
    Joined {
        player_id: PlayerId,
        seed: u32,
        start_room: RoomId,
    },
    Rejected {
        reason: JoinRejectReason,
        message: String,
    },
}

impl PeerState {
    /// True once the host has accepted the join.
    pub fn is_joined(&self) -> bool {
        matches!(self, PeerState::Joined { .. })
    }

    /// The id the host assigned, once joined.
    pub fn player_id(&self) -> Option<PlayerId> {
        match self {
            PeerState::Joined { player_id, .. } => Some(*player_id),
            _ => None,
        }
    }
}

/// The viewing side of a sync session. Talks to exactly one host.
pub struct PeerSession {
    host: ConnectionId,
    inbound: Arc<InboundRegistry>,
    state: PeerState,
    realized: BTreeSet<RoomId>,
}

impl PeerSession {
    /// `host` is the id the outbox uses for the connection to the host.
    pub fn new(host: ConnectionId, inbound: Arc<InboundRegistry>) -> Self {
        Self {
            host,
            inbound,
            state: PeerState::Idle,
            realized: BTreeSet::new(),
        }
    }

    /// The connection the host is reached on.
    pub fn host(&self) -> ConnectionId {
        self.host
    }

    /// The shared inbound queues.
    pub fn inbound(&self) -> &Arc<InboundRegistry> {
        &self.inbound
    }

    /// Where the join handshake stands.
    pub fn state(&self) -> &PeerState {
        &self.state
    }

    /// Rooms the host has asked this peer to load, in id order.
    pub fn realized_rooms(&self) -> impl Iterator<Item = &RoomId> {
        self.realized.iter()
    }

    /// Whether the host has asked for `room` to be realized.
    pub fn is_realized(&self, room: &RoomId) -> bool {
        self.realized.contains(room)
    }

    /// Sends a `JoinRequest` and moves to `Joining`.
    ///
    /// Ignored while a join is pending or already accepted; returns whether
    /// the request went out.
    pub fn request_join<O: Outbox + ?Sized>(
        &mut self,
        username: &str,
        password: &str,
        outbox: &mut O,
    ) -> bool {
        if matches!(self.state, PeerState::Joining | PeerState::Joined { .. }) {
            tracing::warn!(host = %self.host, state = ?self.state, "join already requested");
            return false;
        }
        let request = JoinRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        outbox.send(self.host, &request.into());
        self.state = PeerState::Joining;
        tracing::debug!(host = %self.host, name = username, "join requested");
        true
    }

    /// Sends one tick of input. Returns `false` (and sends nothing) unless
    /// joined.
    pub fn send_input<O: Outbox + ?Sized>(
        &self,
        tick: u32,
        analog: Vec2,
        buttons: InputButtons,
        outbox: &mut O,
    ) -> bool {
        if !self.state.is_joined() {
            return false;
        }
        outbox.send(self.host, &PlayerInput { tick, analog, buttons }.into());
        true
    }

    // -- tick steps -------------------------------------------------------

    fn handle_handshake(&mut self) {
        for (_, enter) in self.inbound.enter_session().drain() {
            if self.state != PeerState::Joining {
                tracing::warn!(state = ?self.state, "unexpected EnterSession dropped");
                continue;
            }
            tracing::info!(player_id = %enter.player_id, room = %enter.start_room, "entered session");
            self.state = PeerState::Joined {
                player_id: enter.player_id,
                seed: enter.seed,
                start_room: enter.start_room,
            };
        }
        for (_, rejected) in self.inbound.join_rejected().drain() {
            if self.state != PeerState::Joining {
                tracing::warn!(state = ?self.state, "unexpected JoinRejected dropped");
                continue;
            }
            tracing::warn!(reason = ?rejected.reason, message = %rejected.message, "join rejected");
            self.state = PeerState::Rejected {
                reason: rejected.reason,
                message: rejected.message,
            };
        }
    }

    fn handle_realize<W: PeerWorld + ?Sized>(&mut self, world: &mut W) {
        for (_, realize) in self.inbound.realize_room().drain() {
            let room = realize.room;
            if !world.contains(&room) {
                let e = RoomError::UnknownRoom(room);
                tracing::warn!(error = %e, "RealizeRoom dropped");
                continue;
            }
            if self.realized.insert(room.clone()) {
                tracing::debug!(%room, "realizing room");
                world.activate(&room);
            }
        }
    }

    fn handle_state<W: PeerWorld + ?Sized>(&mut self, world: &mut W) {
        if let Some((_, weather)) = self.inbound.weather().latest() {
            world.apply_weather(&weather);
        }
        for (_, snapshot) in self.inbound.player_snapshots().drain() {
            world.apply_player_snapshot(&snapshot);
        }
        for (_, snapshot) in self.inbound.room_snapshots().drain() {
            if !self.realized.contains(&snapshot.room) {
                tracing::warn!(room = %snapshot.room, "snapshot for unrealized room dropped");
                continue;
            }
            world.apply_room_snapshot(&snapshot);
        }
        for (_, profile) in self.inbound.profiles().drain() {
            world.player_joined(&profile);
        }
        for (_, left) in self.inbound.player_left().drain() {
            world.player_left(left.player_id);
        }
    }
}

impl<W: PeerWorld + ?Sized> SyncSession<W> for PeerSession {
    fn role(&self) -> Role {
        Role::Peer
    }

    fn tick<O: Outbox + ?Sized>(&mut self, _now: u64, world: &mut W, _outbox: &mut O) {
        self.handle_handshake();
        self.handle_realize(world);
        self.handle_state(world);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cyclenet_protocol::{
        EnterSession, JoinRejected, Kind, MemoryOutbox, Packet, PlayerLeft, RealizeRoom,
        WeatherFlags,
    };

    #[derive(Default)]
    struct Recorder {
        activated: Vec<RoomId>,
        weather: Vec<u32>,
        room_snapshots: Vec<RoomId>,
        joined: Vec<PlayerId>,
        left: Vec<PlayerId>,
    }

    impl PeerWorld for Recorder {
        fn contains(&self, room: &RoomId) -> bool {
            room.as_str().starts_with('R')
        }
        fn activate(&mut self, room: &RoomId) {
            self.activated.push(room.clone());
        }
        fn apply_weather(&mut self, weather: &WeatherSync) {
            self.weather.push(weather.cycle_tick);
        }
        fn apply_player_snapshot(&mut self, _snapshot: &PlayerSnapshot) {}
        fn apply_room_snapshot(&mut self, snapshot: &RoomSnapshot) {
            self.room_snapshots.push(snapshot.room.clone());
        }
        fn player_joined(&mut self, profile: &PlayerProfile) {
            self.joined.push(profile.player_id);
        }
        fn player_left(&mut self, player: PlayerId) {
            self.left.push(player);
        }
    }

    fn host() -> ConnectionId {
        ConnectionId::new(0)
    }

    fn peer() -> PeerSession {
        PeerSession::new(host(), Arc::new(InboundRegistry::default()))
    }

    fn deliver(peer: &PeerSession, packet: impl Into<Packet>) {
        peer.inbound().enqueue_packet(host(), packet.into());
    }

    fn weather(cycle_tick: u32) -> WeatherSync {
        WeatherSync {
            cycle_tick,
            cycle_length: 100,
            rain_intensity: 0.0,
            flags: WeatherFlags::empty(),
        }
    }

    fn tick(peer: &mut PeerSession, world: &mut Recorder) {
        peer.tick(0, world, &mut MemoryOutbox::new());
    }

    // =========================================================================
    // Handshake
    // =========================================================================

    #[test]
    fn test_request_join_sends_join_request_and_moves_to_joining() {
        let mut peer = peer();
        let mut outbox = MemoryOutbox::new();

        assert!(peer.request_join("alice", "pw", &mut outbox));

        assert_eq!(peer.state(), &PeerState::Joining);
        assert_eq!(outbox.to(host())[0].kind(), Kind::JoinRequest);
        assert!(!peer.request_join("alice", "pw", &mut outbox));
        assert_eq!(outbox.len(), 1);
    }

    #[test]
    fn test_tick_enter_session_moves_to_joined() {
        let mut peer = peer();
        let mut world = Recorder::default();
        peer.request_join("alice", "pw", &mut MemoryOutbox::new());
        deliver(
            &peer,
            EnterSession {
                player_id: PlayerId(4),
                seed: 7,
                start_room: RoomId::new("R1"),
            },
        );

        tick(&mut peer, &mut world);

        assert_eq!(peer.state().player_id(), Some(PlayerId(4)));
    }

    #[test]
    fn test_tick_join_rejected_moves_to_rejected_and_allows_retry() {
        let mut peer = peer();
        let mut world = Recorder::default();
        let mut outbox = MemoryOutbox::new();
        peer.request_join("alice", "pw", &mut outbox);
        deliver(
            &peer,
            JoinRejected {
                reason: JoinRejectReason::BadPassword,
                message: "nope".into(),
            },
        );

        tick(&mut peer, &mut world);

        assert!(matches!(
            peer.state(),
            PeerState::Rejected { reason: JoinRejectReason::BadPassword, .. }
        ));
        assert!(peer.request_join("alice", "pw2", &mut outbox));
    }

    #[test]
    fn test_tick_enter_session_while_idle_dropped() {
        let mut peer = peer();
        let mut world = Recorder::default();
        deliver(
            &peer,
            EnterSession {
                player_id: PlayerId(1),
                seed: 0,
                start_room: RoomId::new("R"),
            },
        );

        tick(&mut peer, &mut world);

        assert_eq!(peer.state(), &PeerState::Idle);
    }

    #[test]
    fn test_send_input_only_while_joined() {
        let mut peer = peer();
        let mut outbox = MemoryOutbox::new();
        assert!(!peer.send_input(1, Vec2::ZERO, InputButtons::JUMP, &mut outbox));

        peer.request_join("alice", "pw", &mut outbox);
        deliver(
            &peer,
            EnterSession {
                player_id: PlayerId(1),
                seed: 0,
                start_room: RoomId::new("R"),
            },
        );
        tick(&mut peer, &mut Recorder::default());
        outbox.take();

        assert!(peer.send_input(2, Vec2::new(1.0, 0.0), InputButtons::JUMP, &mut outbox));
        assert_eq!(outbox.to(host())[0].kind(), Kind::PlayerInput);
    }

    // =========================================================================
    // Realization and state
    // =========================================================================

    #[test]
    fn test_tick_realize_activates_known_rooms_once() {
        let mut peer = peer();
        let mut world = Recorder::default();
        deliver(&peer, RealizeRoom { room: RoomId::new("R1") });
        deliver(&peer, RealizeRoom { room: RoomId::new("R1") });
        deliver(&peer, RealizeRoom { room: RoomId::new("X") });

        tick(&mut peer, &mut world);

        assert_eq!(world.activated, vec![RoomId::new("R1")]);
        assert!(peer.is_realized(&RoomId::new("R1")));
        assert!(!peer.is_realized(&RoomId::new("X")));
    }

    #[test]
    fn test_tick_weather_applies_latest_only() {
        let mut peer = peer();
        let mut world = Recorder::default();
        deliver(&peer, weather(1));
        deliver(&peer, weather(2));
        deliver(&peer, weather(3));

        tick(&mut peer, &mut world);

        assert_eq!(world.weather, vec![3]);
    }

    #[test]
    fn test_tick_room_snapshot_for_unrealized_room_dropped() {
        let mut peer = peer();
        let mut world = Recorder::default();
        deliver(&peer, RealizeRoom { room: RoomId::new("R") });
        deliver(&peer, RoomSnapshot { room: RoomId::new("R"), entities: vec![] });
        deliver(&peer, RoomSnapshot { room: RoomId::new("R2"), entities: vec![] });

        tick(&mut peer, &mut world);

        assert_eq!(world.room_snapshots, vec![RoomId::new("R")]);
    }

    #[test]
    fn test_tick_leave_reaches_world() {
        let mut peer = peer();
        let mut world = Recorder::default();
        deliver(&peer, PlayerLeft { player_id: PlayerId(9) });

        tick(&mut peer, &mut world);

        assert_eq!(world.left, vec![PlayerId(9)]);
        assert!(world.joined.is_empty());
    }
}
