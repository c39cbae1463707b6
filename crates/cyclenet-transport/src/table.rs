//! Shared connection lifecycle table.
//!
//! Written by the receive side (accept, key check, close) and polled by the
//! tick loop. Disconnects are never pushed as callbacks: the tick loop sees
//! them on its next poll, so cleanup lags a physical disconnect by at most
//! one tick.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::ConnectionId;

/// Lifecycle state of one connection.
///
/// ```text
/// Connecting ──(key accepted)──→ Connected ──(closed)──→ Disconnected
///     └───────────────(closed / key rejected)──────────────↑
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepted by the transport, handshake not finished.
    Connecting,
    /// Handshake finished, packets flow.
    Connected,
    /// Closed. Waiting for the tick loop to clean up and forget it.
    Disconnected,
}

/// Thread-safe map of connection id to lifecycle state.
#[derive(Debug, Default)]
pub struct ConnectionTable {
    inner: Mutex<HashMap<ConnectionId, ConnectionState>>,
}

impl ConnectionTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, ConnectionState>> {
        // A panic elsewhere while holding the lock leaves the map intact;
        // there is no partially-applied update to worry about.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a freshly accepted connection as `Connecting`.
    pub fn register(&self, id: ConnectionId) {
        self.lock().insert(id, ConnectionState::Connecting);
        tracing::debug!(%id, "connection registered");
    }

    /// Moves a `Connecting` connection to `Connected`.
    ///
    /// Returns `false` if the connection is unknown or already past
    /// `Connecting`; states never move backwards.
    pub fn mark_connected(&self, id: ConnectionId) -> bool {
        let mut map = self.lock();
        match map.get_mut(&id) {
            Some(state @ ConnectionState::Connecting) => {
                *state = ConnectionState::Connected;
                true
            }
            _ => false,
        }
    }

    /// Marks a connection as `Disconnected`. Returns `false` if unknown.
    pub fn mark_disconnected(&self, id: ConnectionId) -> bool {
        match self.lock().get_mut(&id) {
            Some(state) => {
                *state = ConnectionState::Disconnected;
                true
            }
            None => false,
        }
    }

    /// Current state of a connection, if the table knows it.
    pub fn state(&self, id: ConnectionId) -> Option<ConnectionState> {
        self.lock().get(&id).copied()
    }

    /// All connections in the `Connected` state, in id order.
    pub fn connected(&self) -> Vec<ConnectionId> {
        self.in_state(ConnectionState::Connected)
    }

    /// All connections in the `Disconnected` state, in id order.
    pub fn disconnected(&self) -> Vec<ConnectionId> {
        self.in_state(ConnectionState::Disconnected)
    }

    fn in_state(&self, wanted: ConnectionState) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self
            .lock()
            .iter()
            .filter(|(_, state)| **state == wanted)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    /// Removes a connection from the table after cleanup.
    pub fn forget(&self, id: ConnectionId) -> Option<ConnectionState> {
        self.lock().remove(&id)
    }

    /// Number of tracked connections (any state).
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if no connections are tracked.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
