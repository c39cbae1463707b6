//! Room sync configuration and the per-pair visibility state machine.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoomSyncConfig
// ---------------------------------------------------------------------------

/// Configuration for [`RoomSync`](crate::RoomSync).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomSyncConfig {
    /// How many rooms one connection may have loading (`Unsynced`) at the
    /// same time. Relevant rooms over the limit wait for a later tick.
    pub max_unsynced_per_connection: usize,

    /// When set, rooms nobody has stood in for this many ticks are
    /// reported as eviction candidates. `None` keeps every room.
    pub evict_after_idle_ticks: Option<u64>,
}

impl Default for RoomSyncConfig {
    fn default() -> Self {
        Self {
            max_unsynced_per_connection: 8,
            evict_after_idle_ticks: None,
        }
    }
}

// ---------------------------------------------------------------------------
// RoomVisibility
// ---------------------------------------------------------------------------

/// How far along one room is for one connection.
///
/// Transitions only move forward:
///
/// ```text
/// Abstract → Unsynced → Synced
/// ```
///
/// - **Abstract**: the peer has not been asked to load the room.
/// - **Unsynced**: `RealizeRoom` was sent; the host's own copy may still
///   be loading.
/// - **Synced**: the host's copy is loaded. Updates for the room flow to
///   this connection.
///
/// Disconnecting discards every pair for the connection rather than
/// walking them back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RoomVisibility {
    #[default]
    Abstract,
    Unsynced,
    Synced,
}

impl RoomVisibility {
    /// The next state, or `None` from `Synced`.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Abstract => Some(Self::Unsynced),
            Self::Unsynced => Some(Self::Synced),
            Self::Synced => None,
        }
    }

    /// True only for the single forward step from `self`.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target)
    }

    /// Returns `true` if updates for the room should reach the connection.
    pub fn is_synced(self) -> bool {
        matches!(self, Self::Synced)
    }
}

impl std::fmt::Display for RoomVisibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Abstract => write!(f, "Abstract"),
            Self::Unsynced => write!(f, "Unsynced"),
            Self::Synced => write!(f, "Synced"),
        }
    }
}
