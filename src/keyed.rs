//! Stable identity for cached items.
//!
//! The cache stores whole items rather than key/value pairs; every operation
//! (`add_or_update`, `remove`, `contains`) resolves the item's identity
//! through this trait.  The key must stay stable across value updates,
//! since replacing an item under the same key is what renews its TTL.
//!
//! # Example
//! ```
//! use lungo::Keyed;
//!
//! struct Session {
//!     token: String,
//!     user: u64,
//! }
//!
//! impl Keyed for Session {
//!     type Key = String;
//!
//!     fn key(&self) -> String {
//!         self.token.clone()
//!     }
//! }
//! ```

use std::hash::Hash;

/// Exposes the identity the cache maps an item under.
///
/// The bounds cover everything the cache needs from a key: map lookups
/// (`Hash + Eq`), a copy held by the entry's expiry timer (`Clone`), and
/// crossing into the timer driver thread (`Send + Sync + 'static`).
pub trait Keyed {
    type Key: Hash + Eq + Clone + Send + Sync + 'static;

    /// Returns the item's identity key.
    fn key(&self) -> Self::Key;
}
