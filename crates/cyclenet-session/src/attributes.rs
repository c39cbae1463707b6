//! Per-player generated attributes.

use cyclenet_protocol::Rgb;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Cosmetic and gameplay attributes drawn once, at a player's first join.
///
/// Every value comes from the credential-seeded stream in a fixed order,
/// so the same credentials always generate the same player. Reordering
/// the draws below changes every existing player's attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerAttributes {
    pub body_color: Rgb,
    pub eye_color: Rgb,
    /// Multiplier on body size, `0.9..1.1`.
    pub body_scale: f32,
    /// Multiplier on run speed, `0.85..1.15`.
    pub run_speed: f32,
    /// Multiplier on jump impulse, `0.9..1.2`.
    pub jump_boost: f32,
    /// Multiplier on breath held underwater, `0.7..1.3`.
    pub lung_capacity: f32,
}

impl PlayerAttributes {
    /// Draws a full attribute set from `rng`.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let body_color = random_color(rng);
        let eye_color = random_color(rng);
        Self {
            body_color,
            eye_color,
            body_scale: rng.random_range(0.9..1.1),
            run_speed: rng.random_range(0.85..1.15),
            jump_boost: rng.random_range(0.9..1.2),
            lung_capacity: rng.random_range(0.7..1.3),
        }
    }
}

fn random_color<R: Rng + ?Sized>(rng: &mut R) -> Rgb {
    Rgb {
        r: rng.random(),
        g: rng.random(),
        b: rng.random(),
    }
}
