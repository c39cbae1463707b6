//! A toy host: six rooms in a ring, players that walk clockwise when they
//! push right, and a rain cycle.
//!
//! ```text
//! cargo run -p host-demo -- [config.json]
//! RUST_LOG=cyclenet=debug cargo run -p host-demo
//! ```

use std::collections::HashMap;
use std::time::{Duration, Instant};

use cyclenet::prelude::*;

const ROOMS: u32 = 6;
const ROOM_WIDTH: f32 = 10.0;
const LOAD_TIME: Duration = Duration::from_millis(50);
const CYCLE_LENGTH: u32 = 4000;

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

struct Body {
    room: u32,
    position: Vec2,
    velocity: Vec2,
    grounded: bool,
}

struct RingWorld {
    started: Instant,
    activated: HashMap<RoomId, Instant>,
    bodies: HashMap<PlayerId, Body>,
}

impl RingWorld {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            activated: HashMap::new(),
            bodies: HashMap::new(),
        }
    }

    fn room_id(index: u32) -> RoomId {
        RoomId::new(format!("room-{}", index % ROOMS))
    }

    fn index(room: &RoomId) -> Option<u32> {
        let index: u32 = room.as_str().strip_prefix("room-")?.parse().ok()?;
        (index < ROOMS).then_some(index)
    }

    fn cycle_tick(&self) -> u32 {
        let ticks = self.started.elapsed().as_millis() / 25;
        u32::try_from(ticks % u128::from(CYCLE_LENGTH)).unwrap_or(0)
    }
}

impl RoomGraph for RingWorld {
    fn neighbors(&self, room: &RoomId) -> Vec<RoomId> {
        match Self::index(room) {
            Some(i) => vec![Self::room_id(i + ROOMS - 1), Self::room_id(i + 1)],
            None => vec![],
        }
    }

    fn contains(&self, room: &RoomId) -> bool {
        Self::index(room).is_some()
    }

    fn is_loaded(&self, room: &RoomId) -> bool {
        self.activated
            .get(room)
            .is_some_and(|at| at.elapsed() >= LOAD_TIME)
    }

    fn activate(&mut self, room: &RoomId) {
        self.activated.entry(room.clone()).or_insert_with(|| {
            tracing::debug!(%room, "loading room");
            Instant::now()
        });
    }
}

impl HostWorld for RingWorld {
    fn start_room(&self) -> RoomId {
        Self::room_id(0)
    }

    fn seed(&self) -> u32 {
        0x5EED
    }

    fn player_body(&self, player: PlayerId) -> Option<BodySnapshot> {
        let body = self.bodies.get(&player)?;
        let mut flags = BodyFlags::ALIVE;
        flags.set(BodyFlags::GROUNDED, body.grounded);
        Some(BodySnapshot {
            room: Self::room_id(body.room),
            position: body.position,
            velocity: body.velocity,
            flags,
        })
    }

    fn room_entities(&self, room: &RoomId) -> Vec<EntityState> {
        self.bodies
            .iter()
            .filter(|(_, body)| Some(body.room) == Self::index(room))
            .map(|(player, body)| EntityState {
                id: player.0,
                position: body.position,
                velocity: body.velocity,
            })
            .collect()
    }

    fn weather(&self) -> Option<WeatherSync> {
        let cycle_tick = self.cycle_tick();
        let raining = cycle_tick > CYCLE_LENGTH / 2;
        let mut flags = WeatherFlags::empty();
        flags.set(WeatherFlags::RAINING, raining);
        flags.set(WeatherFlags::PRECYCLE, cycle_tick > CYCLE_LENGTH * 9 / 10);
        Some(WeatherSync {
            cycle_tick,
            cycle_length: CYCLE_LENGTH,
            rain_intensity: if raining { 0.6 } else { 0.0 },
            flags,
        })
    }

    fn apply_input(&mut self, player: PlayerId, input: &PlayerInput) {
        let body = self.bodies.entry(player).or_insert(Body {
            room: 0,
            position: Vec2::new(ROOM_WIDTH / 2.0, 0.0),
            velocity: Vec2::ZERO,
            grounded: true,
        });
        body.velocity = input.analog;
        body.grounded = !input.buttons.contains(InputButtons::JUMP);
        body.position.x += input.analog.x;
        if body.position.x >= ROOM_WIDTH {
            body.position.x -= ROOM_WIDTH;
            body.room = (body.room + 1) % ROOMS;
            tracing::info!(%player, room = %Self::room_id(body.room), "player changed room");
        } else if body.position.x < 0.0 {
            body.position.x += ROOM_WIDTH;
            body.room = (body.room + ROOMS - 1) % ROOMS;
            tracing::info!(%player, room = %Self::room_id(body.room), "player changed room");
        }
    }
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

fn load_config() -> Result<HostConfig, Box<dyn std::error::Error>> {
    match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)?;
            Ok(HostConfig::from_json(&json)?)
        }
        None => Ok(HostConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;
    tracing::info!(addr = %config.bind_addr, "starting ring demo host");

    let server = HostServer::builder()
        .config(config)
        .build(RingWorld::new())
        .await?;

    server.run().await?;
    Ok(())
}
