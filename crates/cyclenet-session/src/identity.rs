//! Player identity records and their live state.

use cyclenet_protocol::{PlayerId, PlayerInput, PlayerProfile, RoomId};
use serde::{Deserialize, Serialize};

use crate::{CredentialHash, PlayerAttributes};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for the identity store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Longest accepted player name, in bytes.
    pub max_name_len: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { max_name_len: 32 }
    }
}

// ---------------------------------------------------------------------------
// LiveState
// ---------------------------------------------------------------------------

/// The part of an identity that changes while the player is connected.
///
/// Written only by the tick loop. On disconnect it is left exactly as it
/// was (frozen) and picks up again on rejoin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveState {
    /// Room the player's body is in, once known.
    pub room: Option<RoomId>,
    /// Most recently applied input.
    pub input: Option<PlayerInput>,
    pub alive: bool,
}

impl LiveState {
    /// Applies `input` unless it is older than the one already applied.
    ///
    /// Returns `true` if it was applied. Inputs carrying the same tick as
    /// the current one are applied (a peer may resend a tick).
    pub fn accept_input(&mut self, input: &PlayerInput) -> bool {
        if self.input.as_ref().is_some_and(|last| input.tick < last.tick) {
            return false;
        }
        self.input = Some(input.clone());
        true
    }

    /// Tick of the last applied input.
    pub fn last_input_tick(&self) -> Option<u32> {
        self.input.as_ref().map(|i| i.tick)
    }
}

// ---------------------------------------------------------------------------
// PlayerIdentity
// ---------------------------------------------------------------------------

/// A persistent player: created at first join, never removed.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerIdentity {
    pub player_id: PlayerId,
    pub username: String,
    pub credential: CredentialHash,
    /// Assigned once at creation and never regenerated.
    pub attributes: PlayerAttributes,
    pub live: LiveState,
}

impl PlayerIdentity {
    /// The profile packet peers use to render this player.
    pub fn profile(&self) -> PlayerProfile {
        PlayerProfile {
            player_id: self.player_id,
            username: self.username.clone(),
            body_color: self.attributes.body_color,
            eye_color: self.attributes.eye_color,
            body_scale: self.attributes.body_scale,
            run_speed: self.attributes.run_speed,
            jump_boost: self.attributes.jump_boost,
            lung_capacity: self.attributes.lung_capacity,
        }
    }
}

/// The durable part of an identity, for an external store to persist.
///
/// Live state is deliberately absent: it is rebuilt from the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub player_id: PlayerId,
    pub username: String,
    pub credential: CredentialHash,
    pub attributes: PlayerAttributes,
}

impl From<&PlayerIdentity> for IdentityRecord {
    fn from(identity: &PlayerIdentity) -> Self {
        Self {
            player_id: identity.player_id,
            username: identity.username.clone(),
            credential: identity.credential,
            attributes: identity.attributes.clone(),
        }
    }
}

impl From<IdentityRecord> for PlayerIdentity {
    fn from(record: IdentityRecord) -> Self {
        Self {
            player_id: record.player_id,
            username: record.username,
            credential: record.credential,
            attributes: record.attributes,
            live: LiveState::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cyclenet_protocol::{InputButtons, Vec2};

    fn input(tick: u32) -> PlayerInput {
        PlayerInput {
            tick,
            analog: Vec2::ZERO,
            buttons: InputButtons::empty(),
        }
    }

    #[test]
    fn test_accept_input_newer_tick_applies() {
        let mut live = LiveState::default();
        assert!(live.accept_input(&input(3)));
        assert!(live.accept_input(&input(4)));
        assert_eq!(live.last_input_tick(), Some(4));
    }

    #[test]
    fn test_accept_input_older_tick_ignored() {
        let mut live = LiveState::default();
        live.accept_input(&input(10));
        assert!(!live.accept_input(&input(9)));
        assert_eq!(live.last_input_tick(), Some(10));
    }

    #[test]
    fn test_accept_input_same_tick_applies() {
        let mut live = LiveState::default();
        live.accept_input(&input(5));
        assert!(live.accept_input(&input(5)));
    }

    #[test]
    fn test_session_config_default_name_len() {
        assert_eq!(SessionConfig::default().max_name_len, 32);
    }
}
