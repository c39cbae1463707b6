//! The host-side tick driver.
//!
//! Owns the identity store and the room state machine, and runs them
//! against the inbound queues once per tick:
//!
//! ```text
//! 1. disconnects   ConnectionTable ──→ leave, drop room state, PlayerLeft
//! 2. joins         JoinRequest ──→ EnterSession + profiles | JoinRejected
//! 3. inputs        PlayerInput ──→ live state, world.apply_input
//! 4. positions     world.player_body ──→ live room
//! 5. rooms         RoomSync::tick ──→ RealizeRoom
//! 6. room state    RoomSnapshot per synced (connection, room)
//! 7. bodies        PlayerSnapshot to connections synced for that room
//! 8. weather       WeatherSync to everyone, every N ticks
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use cyclenet_inbound::InboundRegistry;
use cyclenet_protocol::{
    BodyFlags, Channel, EnterSession, EntityState, JoinRejectReason, JoinRejected, Outbox,
    Packet, PlayerId, PlayerInput, PlayerLeft, PlayerSnapshot, RoomId, RoomSnapshot, Vec2,
    WeatherSync,
};
use cyclenet_room::{RoomGraph, RoomSync, RoomSyncConfig};
use cyclenet_session::{IdentityStore, SessionConfig, SessionError};
use cyclenet_transport::{ConnectionId, ConnectionState, ConnectionTable};
use serde::{Deserialize, Serialize};

use crate::{Role, SyncSession};

// ---------------------------------------------------------------------------
// World adapter
// ---------------------------------------------------------------------------

/// Where a player's body is, as reported by the host simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct BodySnapshot {
    pub room: RoomId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub flags: BodyFlags,
}

/// The host simulation, as seen by the sync layer.
///
/// Extends [`RoomGraph`] with what the tick driver reads and writes
/// beyond room loading.
pub trait HostWorld: RoomGraph {
    /// Room new players start in.
    fn start_room(&self) -> RoomId;

    /// World seed shared with peers at join.
    fn seed(&self) -> u32;

    /// The player's body, or `None` if it has not spawned yet.
    fn player_body(&self, player: PlayerId) -> Option<BodySnapshot>;

    /// Live entities in a loaded room.
    fn room_entities(&self, room: &RoomId) -> Vec<EntityState>;

    /// Current weather cycle state, if the world has weather.
    fn weather(&self) -> Option<WeatherSync>;

    /// Applies one accepted input to the player's body.
    fn apply_input(&mut self, player: PlayerId, input: &PlayerInput);
}

// ---------------------------------------------------------------------------
// HostSessionConfig
// ---------------------------------------------------------------------------

/// Configuration for [`HostSession`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSessionConfig {
    pub session: SessionConfig,
    pub rooms: RoomSyncConfig,
    /// Ticks between periodic `WeatherSync` resends. 0 disables the resend.
    pub weather_interval_ticks: u64,
}

impl Default for HostSessionConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            rooms: RoomSyncConfig::default(),
            weather_interval_ticks: 40,
        }
    }
}

// ---------------------------------------------------------------------------
// HostSession
// ---------------------------------------------------------------------------

/// The authoritative side of a sync session.
pub struct HostSession {
    inbound: Arc<InboundRegistry>,
    connections: Arc<ConnectionTable>,
    identities: IdentityStore,
    rooms: RoomSync,
    weather_interval_ticks: u64,
    cleaned_up: Vec<ConnectionId>,
}

impl HostSession {
    /// Creates a session reading from `inbound` and tracking `connections`.
    pub fn new(
        config: HostSessionConfig,
        inbound: Arc<InboundRegistry>,
        connections: Arc<ConnectionTable>,
    ) -> Self {
        Self {
            inbound,
            connections,
            identities: IdentityStore::new(config.session),
            rooms: RoomSync::new(config.rooms),
            weather_interval_ticks: config.weather_interval_ticks,
            cleaned_up: Vec::new(),
        }
    }

    /// Connections forgotten by ticks since the last call.
    ///
    /// Whoever owns per-connection resources outside the session (writer
    /// channels, sockets) releases exactly these.
    pub fn take_cleaned_up(&mut self) -> Vec<ConnectionId> {
        std::mem::take(&mut self.cleaned_up)
    }

    /// The shared inbound queues.
    pub fn inbound(&self) -> &Arc<InboundRegistry> {
        &self.inbound
    }

    /// The shared connection table.
    pub fn connections(&self) -> &Arc<ConnectionTable> {
        &self.connections
    }

    /// Every identity known to this host.
    pub fn identities(&self) -> &IdentityStore {
        &self.identities
    }

    /// Mutable access, e.g. to import identities at startup.
    pub fn identities_mut(&mut self) -> &mut IdentityStore {
        &mut self.identities
    }

    /// Per-connection room visibility.
    pub fn rooms(&self) -> &RoomSync {
        &self.rooms
    }

    /// Sends `packet` to one connection.
    pub fn send_to<O: Outbox + ?Sized>(
        &self,
        conn: ConnectionId,
        channel: Channel,
        packet: &Packet,
        outbox: &mut O,
    ) {
        outbox.send_to(conn, channel, packet);
    }

    /// Sends `packet` to every connection that has `room` synced.
    ///
    /// Returns how many connections it went to.
    pub fn broadcast_to_room<O: Outbox + ?Sized>(
        &self,
        room: &RoomId,
        channel: Channel,
        packet: &Packet,
        outbox: &mut O,
    ) -> usize {
        let targets = self.rooms.relevant_connections(room);
        for conn in &targets {
            outbox.send_to(*conn, channel, packet);
        }
        targets.len()
    }

    /// Sends `packet` to every joined connection except `except`.
    fn broadcast_joined<O: Outbox + ?Sized>(
        &self,
        except: Option<ConnectionId>,
        packet: &Packet,
        outbox: &mut O,
    ) {
        for conn in self.identities.active_connections() {
            if Some(conn) != except {
                outbox.send(conn, packet);
            }
        }
    }

    // -- tick steps -------------------------------------------------------

    fn handle_disconnects<O: Outbox + ?Sized>(&mut self, outbox: &mut O) {
        for conn in self.connections.disconnected() {
            if let Some(player_id) = self.identities.leave(conn) {
                self.broadcast_joined(None, &PlayerLeft { player_id }.into(), outbox);
            }
            self.rooms.remove_connection(conn);
            self.connections.forget(conn);
            self.cleaned_up.push(conn);
            tracing::debug!(%conn, "connection cleaned up");
        }
    }

    fn handle_joins<W, O>(&mut self, world: &W, outbox: &mut O)
    where
        W: HostWorld + ?Sized,
        O: Outbox + ?Sized,
    {
        while let Some((conn, request)) = self.inbound.join_requests().dequeue() {
            if self.connections.state(conn) != Some(ConnectionState::Connected) {
                tracing::debug!(%conn, "join request from closed connection ignored");
                continue;
            }

            let joined = self
                .identities
                .join(conn, &request.username, &request.password)
                .map(|identity| {
                    let start_room = identity.live.room.clone().unwrap_or_else(|| world.start_room());
                    (identity.player_id, start_room, identity.profile())
                });

            let (player_id, start_room, profile) = match joined {
                Ok(joined) => joined,
                Err(e) => {
                    tracing::warn!(%conn, name = %request.username, error = %e, "join rejected");
                    let rejected = JoinRejected {
                        reason: reject_reason(&e),
                        message: e.to_string(),
                    };
                    outbox.send(conn, &rejected.into());
                    continue;
                }
            };

            tracing::info!(%conn, %player_id, room = %start_room, "player entered session");
            let enter = EnterSession {
                player_id,
                seed: world.seed(),
                start_room,
            };
            outbox.send(conn, &enter.into());

            for (_, other) in self.identities.active() {
                outbox.send(conn, &other.profile().into());
            }
            self.broadcast_joined(Some(conn), &profile.into(), outbox);

            if let Some(weather) = world.weather() {
                outbox.send(conn, &weather.into());
            }
        }
    }

    fn handle_inputs<W: HostWorld + ?Sized>(&mut self, world: &mut W) {
        for (conn, input) in self.inbound.inputs().drain() {
            let Some(player_id) = self.identities.player_for(conn) else {
                tracing::warn!(%conn, "input from unjoined connection dropped");
                continue;
            };
            let accepted = match self.identities.live_mut(player_id) {
                Ok(live) => live.accept_input(&input),
                Err(e) => {
                    tracing::warn!(%conn, error = %e, "input for missing identity dropped");
                    continue;
                }
            };
            if accepted {
                world.apply_input(player_id, &input);
            } else {
                tracing::debug!(%conn, %player_id, tick = input.tick, "stale input ignored");
            }
        }
    }

    /// Refreshes live rooms and returns the tracked pairs for room sync.
    fn refresh_positions<W: HostWorld + ?Sized>(
        &mut self,
        world: &W,
    ) -> Vec<(ConnectionId, Option<RoomId>, Option<BodySnapshot>)> {
        let active: Vec<(ConnectionId, PlayerId)> = self
            .identities
            .active()
            .map(|(conn, identity)| (conn, identity.player_id))
            .collect();

        let mut tracked = Vec::with_capacity(active.len());
        for (conn, player_id) in active {
            let body = world.player_body(player_id);
            let Ok(live) = self.identities.live_mut(player_id) else {
                continue;
            };
            // No body yet: stay where the last session left off.
            let room = match &body {
                Some(body) => body.room.clone(),
                None => live.room.clone().unwrap_or_else(|| world.start_room()),
            };
            live.room = Some(room.clone());
            if let Some(body) = &body {
                live.alive = body.flags.contains(BodyFlags::ALIVE);
            }
            tracked.push((conn, Some(room), body));
        }
        tracked
    }

    fn send_room_snapshots<W, O>(&self, world: &W, outbox: &mut O)
    where
        W: HostWorld + ?Sized,
        O: Outbox + ?Sized,
    {
        let mut cache: HashMap<RoomId, Packet> = HashMap::new();
        for conn in self.identities.active_connections() {
            for room in self.rooms.synced_rooms(conn) {
                let packet = cache.entry(room).or_insert_with_key(|room| {
                    RoomSnapshot {
                        room: room.clone(),
                        entities: world.room_entities(room),
                    }
                    .into()
                });
                outbox.send(conn, packet);
            }
        }
    }

    fn send_player_snapshots<O: Outbox + ?Sized>(
        &self,
        tracked: &[(ConnectionId, Option<RoomId>, Option<BodySnapshot>)],
        outbox: &mut O,
    ) {
        for (conn, _, body) in tracked {
            let (Some(body), Some(player_id)) = (body, self.identities.player_for(*conn)) else {
                continue;
            };
            let snapshot = PlayerSnapshot {
                player_id,
                room: body.room.clone(),
                position: body.position,
                velocity: body.velocity,
                flags: body.flags,
            };
            self.broadcast_to_room(&body.room, Channel::Unreliable, &snapshot.into(), outbox);
        }
    }

    fn send_weather<W, O>(&self, now: u64, world: &W, outbox: &mut O)
    where
        W: HostWorld + ?Sized,
        O: Outbox + ?Sized,
    {
        if self.weather_interval_ticks == 0 || now % self.weather_interval_ticks != 0 {
            return;
        }
        if let Some(weather) = world.weather() {
            self.broadcast_joined(None, &weather.into(), outbox);
        }
    }
}

impl<W: HostWorld + ?Sized> SyncSession<W> for HostSession {
    fn role(&self) -> Role {
        Role::Host
    }

    fn tick<O: Outbox + ?Sized>(&mut self, now: u64, world: &mut W, outbox: &mut O) {
        self.handle_disconnects(outbox);
        self.handle_joins(world, outbox);
        self.handle_inputs(world);

        let tracked = self.refresh_positions(world);
        let pairs: Vec<(ConnectionId, Option<RoomId>)> = tracked
            .iter()
            .map(|(conn, room, _)| (*conn, room.clone()))
            .collect();
        let report = self.rooms.tick(now, &pairs, world, outbox);
        if !report.is_empty() {
            tracing::debug!(
                now,
                realized = report.realized.len(),
                synced = report.synced.len(),
                deferred = report.deferred.len(),
                "room sync"
            );
        }

        self.send_room_snapshots(world, outbox);
        self.send_player_snapshots(&tracked, outbox);
        self.send_weather(now, world, outbox);
    }
}

fn reject_reason(error: &SessionError) -> JoinRejectReason {
    match error {
        SessionError::AuthFailed(_) | SessionError::NotFound(_) => JoinRejectReason::BadPassword,
        SessionError::AlreadyConnected(_) => JoinRejectReason::AlreadyConnected,
        SessionError::InvalidName(_) => JoinRejectReason::InvalidName,
        SessionError::ConnectionAlreadyJoined(_) => JoinRejectReason::AlreadyJoined,
        SessionError::PidExhausted => JoinRejectReason::ServerFull,
    }
}
