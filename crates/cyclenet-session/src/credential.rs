//! Credential hashing and the hash-seeded random stream.
//!
//! A player is identified by `(name, password)`. The store never keeps the
//! password, only a SHA-256 digest of both fields. The same digest seeds
//! the random stream that generates the player's attributes, so the same
//! credentials always produce the same player.

use std::fmt;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// SHA-256 digest of a `(name, password)` pair.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CredentialHash(pub [u8; 32]);

impl CredentialHash {
    /// The raw 32-byte digest.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

// Hex, so a digest can be grepped in logs. Never the raw password.
impl fmt::Display for CredentialHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|b| write!(f, "{b:02x}"))
    }
}

impl fmt::Debug for CredentialHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CredentialHash({self})")
    }
}

/// Hashes a credential pair.
///
/// Each field is prefixed with its byte length (`u32`, little-endian) so
/// that `("ab", "c")` and `("a", "bc")` hash differently.
pub fn credential_hash(name: &str, password: &str) -> CredentialHash {
    let mut hasher = Sha256::new();
    for field in [name, password] {
        let len = u32::try_from(field.len()).unwrap_or(u32::MAX);
        hasher.update(len.to_le_bytes());
        hasher.update(field.as_bytes());
    }
    CredentialHash(hasher.finalize().into())
}

/// Source of the deterministic random stream used to generate attributes.
///
/// The store asks for one stream per new identity. Implementations must
/// return the same sequence for the same hash.
pub trait RandomStream {
    fn seeded(&self, hash: &CredentialHash) -> impl RngCore;
}

/// The default stream: [`StdRng`] seeded with the digest bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdRandomStream;

impl RandomStream for StdRandomStream {
    fn seeded(&self, hash: &CredentialHash) -> impl RngCore {
        StdRng::from_seed(hash.0)
    }
}
