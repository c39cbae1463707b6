//! The identity store: credentials in, stable player ids out.
//!
//! ```text
//!              join(conn, name, pw)
//!   unknown name ──→ allocate PID, generate attributes ──┐
//!   known name ───→ check hash, check not in use ────────┼──→ conn ↔ PID
//!                                                        │
//!              leave(conn) ──→ conn ↔ PID removed, identity kept
//! ```
//!
//! Like the room state, the store is owned by the tick loop and is not
//! thread-safe on its own.

use std::collections::{BTreeMap, HashMap};

use cyclenet_protocol::PlayerId;
use cyclenet_transport::ConnectionId;

use crate::{
    credential_hash, IdentityRecord, LiveState, PlayerAttributes, PlayerIdentity, RandomStream,
    SessionConfig, SessionError, StdRandomStream,
};

/// All identities ever created, plus which connection each is on.
pub struct IdentityStore<R = StdRandomStream> {
    config: SessionConfig,
    random: R,
    identities: HashMap<PlayerId, PlayerIdentity>,
    by_name: HashMap<String, PlayerId>,
    // Ordered so that `active()` iterates in a stable order.
    conn_to_player: BTreeMap<ConnectionId, PlayerId>,
    player_to_conn: HashMap<PlayerId, ConnectionId>,
    next_pid: u32,
}

impl IdentityStore<StdRandomStream> {
    /// Creates an empty store seeded from the credential hash.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_random(config, StdRandomStream)
    }
}

impl Default for IdentityStore<StdRandomStream> {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl<R: RandomStream> IdentityStore<R> {
    /// Creates a store that draws attributes from `random`.
    pub fn with_random(config: SessionConfig, random: R) -> Self {
        Self {
            config,
            random,
            identities: HashMap::new(),
            by_name: HashMap::new(),
            conn_to_player: BTreeMap::new(),
            player_to_conn: HashMap::new(),
            next_pid: 1,
        }
    }

    /// Binds `conn` to the identity for `(name, password)`, creating it on
    /// first use.
    ///
    /// # Errors
    /// - [`SessionError::InvalidName`]: empty, or over `max_name_len` bytes
    /// - [`SessionError::ConnectionAlreadyJoined`]: `conn` already has a player
    /// - [`SessionError::AuthFailed`]: known name, wrong password
    /// - [`SessionError::AlreadyConnected`]: identity is live on another connection
    /// - [`SessionError::PidExhausted`]: new name, but no ids are left
    ///
    /// The store is unchanged on every error.
    pub fn join(
        &mut self,
        conn: ConnectionId,
        name: &str,
        password: &str,
    ) -> Result<&PlayerIdentity, SessionError> {
        if name.is_empty() || name.len() > self.config.max_name_len {
            return Err(SessionError::InvalidName(name.to_string()));
        }
        if self.conn_to_player.contains_key(&conn) {
            return Err(SessionError::ConnectionAlreadyJoined(conn));
        }

        let credential = credential_hash(name, password);
        let player_id = match self.by_name.get(name).copied() {
            Some(player_id) => {
                let identity = self
                    .identities
                    .get(&player_id)
                    .ok_or(SessionError::NotFound(player_id))?;
                if identity.credential != credential {
                    return Err(SessionError::AuthFailed(format!(
                        "wrong password for {name}"
                    )));
                }
                if self.player_to_conn.contains_key(&player_id) {
                    return Err(SessionError::AlreadyConnected(player_id));
                }
                tracing::info!(%conn, %player_id, name, "player rejoined");
                player_id
            }
            None => {
                let player_id = PlayerId(self.next_pid);
                self.next_pid = self
                    .next_pid
                    .checked_add(1)
                    .ok_or(SessionError::PidExhausted)?;

                let attributes = PlayerAttributes::generate(&mut self.random.seeded(&credential));
                self.identities.insert(
                    player_id,
                    PlayerIdentity {
                        player_id,
                        username: name.to_string(),
                        credential,
                        attributes,
                        live: LiveState::default(),
                    },
                );
                self.by_name.insert(name.to_string(), player_id);
                tracing::info!(%conn, %player_id, name, "identity created");
                player_id
            }
        };

        let identity = self
            .identities
            .get_mut(&player_id)
            .ok_or(SessionError::NotFound(player_id))?;
        identity.live.alive = true;

        self.conn_to_player.insert(conn, player_id);
        self.player_to_conn.insert(player_id, conn);
        Ok(identity)
    }

    /// Detaches whatever player is on `conn`. The identity and its frozen
    /// live state are kept for a later rejoin.
    pub fn leave(&mut self, conn: ConnectionId) -> Option<PlayerId> {
        let player_id = self.conn_to_player.remove(&conn)?;
        self.player_to_conn.remove(&player_id);
        tracing::info!(%conn, %player_id, "player left");
        Some(player_id)
    }

    /// The player attached to `conn`, if it has joined.
    pub fn player_for(&self, conn: ConnectionId) -> Option<PlayerId> {
        self.conn_to_player.get(&conn).copied()
    }

    /// The connection `player_id` is live on, if any.
    pub fn connection_for(&self, player_id: PlayerId) -> Option<ConnectionId> {
        self.player_to_conn.get(&player_id).copied()
    }

    /// Looks up an identity, connected or not.
    pub fn get(&self, player_id: PlayerId) -> Option<&PlayerIdentity> {
        self.identities.get(&player_id)
    }

    /// Mutable access for updating live fields.
    pub fn get_mut(&mut self, player_id: PlayerId) -> Option<&mut PlayerIdentity> {
        self.identities.get_mut(&player_id)
    }

    /// Like [`get_mut`](Self::get_mut) but with an error for unknown ids.
    pub fn live_mut(&mut self, player_id: PlayerId) -> Result<&mut LiveState, SessionError> {
        self.identities
            .get_mut(&player_id)
            .map(|identity| &mut identity.live)
            .ok_or(SessionError::NotFound(player_id))
    }

    /// Looks up an identity by its username.
    pub fn by_name(&self, name: &str) -> Option<&PlayerIdentity> {
        self.by_name.get(name).and_then(|pid| self.identities.get(pid))
    }

    /// Connected players, in connection id order.
    pub fn active(&self) -> impl Iterator<Item = (ConnectionId, &PlayerIdentity)> {
        self.conn_to_player
            .iter()
            .filter_map(|(conn, pid)| self.identities.get(pid).map(|identity| (*conn, identity)))
    }

    /// Connections that currently have a player, in id order.
    pub fn active_connections(&self) -> Vec<ConnectionId> {
        self.conn_to_player.keys().copied().collect()
    }

    /// Whether `player_id` is attached to a connection right now.
    pub fn is_active(&self, player_id: PlayerId) -> bool {
        self.player_to_conn.contains_key(&player_id)
    }

    /// Number of identities ever created (connected or not).
    pub fn len(&self) -> usize {
        self.identities.len()
    }

    /// True until the first identity is created or imported.
    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Snapshot of every identity's durable fields, ordered by id.
    pub fn export(&self) -> Vec<IdentityRecord> {
        let mut records: Vec<IdentityRecord> =
            self.identities.values().map(IdentityRecord::from).collect();
        records.sort_by_key(|r| r.player_id);
        records
    }

    /// Loads previously exported identities.
    ///
    /// A record whose id or name is already present is skipped, and so is
    /// one with id 0 or `u32::MAX`. Returns how many were added. Later
    /// allocations continue above the highest imported id.
    pub fn import(&mut self, records: impl IntoIterator<Item = IdentityRecord>) -> usize {
        let mut added = 0;
        for record in records {
            let player_id = record.player_id;
            if self.identities.contains_key(&player_id) || self.by_name.contains_key(&record.username)
            {
                tracing::warn!(%player_id, name = %record.username, "skipping duplicate identity record");
                continue;
            }
            let Some(after) = player_id.0.checked_add(1).filter(|_| player_id.0 != 0) else {
                tracing::warn!(%player_id, name = %record.username, "skipping identity record with reserved id");
                continue;
            };
            self.next_pid = self.next_pid.max(after);
            self.by_name.insert(record.username.clone(), player_id);
            self.identities.insert(player_id, record.into());
            added += 1;
        }
        if added > 0 {
            tracing::info!(added, "identities imported");
        }
        added
    }
}
