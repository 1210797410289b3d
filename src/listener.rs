//! Change notifications: a callback invoked on every cache mutation.
//!
//! # Example
//! ```
//! use lungo::listener::{CacheEvent, RemovalCause};
//! use lungo::{CacheBuilder, Keyed, TimerMux};
//! use std::sync::{Arc, Mutex};
//! use std::time::Duration;
//!
//! struct Session { token: u64 }
//! impl Keyed for Session {
//!     type Key = u64;
//!     fn key(&self) -> u64 { self.token }
//! }
//!
//! let log: Arc<Mutex<Vec<RemovalCause>>> = Arc::new(Mutex::new(Vec::new()));
//! let log2 = Arc::clone(&log);
//!
//! let cache: lungo::TtlCache<Session> = CacheBuilder::new(Duration::from_millis(50))
//!     .listener(move |event: CacheEvent<Session>| {
//!         if let CacheEvent::Removed { cause, .. } = event {
//!             log2.lock().unwrap().push(cause);
//!         }
//!     })
//!     .build(Arc::new(TimerMux::new()));
//!
//! cache.add_or_update(Session { token: 1 });
//! cache.remove_key(&1); // emits Removed { cause: Explicit }
//! ```

use std::sync::Arc;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// The reason an entry was removed from the cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemovalCause {
    /// The entry's TTL elapsed without a renewing update.
    Expired,
    /// Removed via [`TtlCache::remove`] or [`TtlCache::remove_key`].
    ///
    /// [`TtlCache::remove`]: crate::TtlCache::remove
    /// [`TtlCache::remove_key`]: crate::TtlCache::remove_key
    Explicit,
}

/// A single cache mutation, as seen by a [`CacheListener`].
#[derive(Debug)]
pub enum CacheEvent<T> {
    /// A key was seen for the first time.
    Added { value: Arc<T> },
    /// An existing key's value was replaced (this renews the entry's TTL).
    Replaced { old: Arc<T>, new: Arc<T> },
    /// An entry left the cache.
    Removed { value: Arc<T>, cause: RemovalCause },
    /// The cache was cleared wholesale.  Per-entry `Removed` events are NOT
    /// emitted for the discarded entries.
    Reset,
}

impl<T> Clone for CacheEvent<T> {
    fn clone(&self) -> Self {
        match self {
            CacheEvent::Added { value } => CacheEvent::Added { value: Arc::clone(value) },
            CacheEvent::Replaced { old, new } => CacheEvent::Replaced {
                old: Arc::clone(old),
                new: Arc::clone(new),
            },
            CacheEvent::Removed { value, cause } => CacheEvent::Removed {
                value: Arc::clone(value),
                cause: *cause,
            },
            CacheEvent::Reset => CacheEvent::Reset,
        }
    }
}

// ---------------------------------------------------------------------------
// CacheListener trait
// ---------------------------------------------------------------------------

/// A callback invoked after each cache mutation.
///
/// Implementations must be `Send + Sync + 'static`: expiry events are
/// delivered on the timer driver thread, every other event on whichever
/// thread performed the mutation.
///
/// Events are dispatched after the cache's internal locks are released, so a
/// listener may call back into the cache (or the multiplexer) freely.
pub trait CacheListener<T>: Send + Sync + 'static {
    fn on_event(&self, event: CacheEvent<T>);
}

/// A [`CacheListener`] backed by a closure.
///
/// Created via [`CacheBuilder::listener`](crate::CacheBuilder::listener).
pub struct FnListener<F>(pub F);

impl<T, F> CacheListener<T> for FnListener<F>
where
    F: Fn(CacheEvent<T>) + Send + Sync + 'static,
{
    fn on_event(&self, event: CacheEvent<T>) {
        (self.0)(event)
    }
}
