//! Player identity for cyclenet.
//!
//! A player is whoever knows a `(name, password)` pair. The first join
//! with a new name creates a persistent identity:
//!
//! 1. **PID**: the next free [`PlayerId`](cyclenet_protocol::PlayerId), starting at 1
//! 2. **Attributes**: drawn from a random stream seeded by the credential
//!    hash, so they are the same every time those credentials appear
//!
//! Later joins with the same credentials get the same identity back.
//! Disconnecting detaches the identity from the connection but never
//! deletes it.
//!
//! # How it fits in the stack
//!
//! ```text
//! Host tick loop (above)  ← join requests in, EnterSession / JoinRejected out
//!     ↕
//! Identity layer (this crate)  ← credentials, PIDs, attributes, live state
//!     ↕
//! Protocol / transport (below)  ← PlayerId, ConnectionId, packet shapes
//! ```

mod attributes;
mod credential;
mod error;
mod identity;
mod store;

pub use attributes::PlayerAttributes;
pub use credential::{credential_hash, CredentialHash, RandomStream, StdRandomStream};
pub use error::SessionError;
pub use identity::{IdentityRecord, LiveState, PlayerIdentity, SessionConfig};
pub use store::IdentityStore;
