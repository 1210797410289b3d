use std::sync::Arc;
use std::time::Duration;

use crate::cache::TtlCache;
use crate::keyed::Keyed;
use crate::listener::{CacheEvent, CacheListener, FnListener};
use crate::mux::TimerMux;

/// Builder for configuring and constructing a [`TtlCache`].
///
/// # Example
/// ```
/// use lungo::{CacheBuilder, Keyed, TimerMux};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// struct Lease { id: u64 }
/// impl Keyed for Lease {
///     type Key = u64;
///     fn key(&self) -> u64 { self.id }
/// }
///
/// let mux = Arc::new(TimerMux::new());
/// let cache: lungo::TtlCache<Lease> = CacheBuilder::new(Duration::from_secs(60))
///     .build(mux);
/// ```
pub struct CacheBuilder<T: Keyed> {
    timeout: Duration,
    listener: Option<Box<dyn CacheListener<T>>>,
}

impl<T> CacheBuilder<T>
where
    T: Keyed + Send + Sync + 'static,
{
    /// Starts a builder with the default TTL applied to inserted entries.
    pub fn new(timeout: Duration) -> Self {
        assert!(!timeout.is_zero(), "timeout must be greater than zero");
        CacheBuilder {
            timeout,
            listener: None,
        }
    }

    /// Register a change-listener closure.
    ///
    /// The closure is called once per mutation, after the cache's internal
    /// locks are released: on the mutating thread for `add_or_update` /
    /// `remove` / `clear`, and on the timer driver thread for expiry.
    pub fn listener<F>(mut self, f: F) -> Self
    where
        F: Fn(CacheEvent<T>) + Send + Sync + 'static,
    {
        self.listener = Some(Box::new(FnListener(f)));
        self
    }

    /// Register a change listener via the [`CacheListener`] trait.
    pub fn listener_impl<L: CacheListener<T>>(mut self, l: L) -> Self {
        self.listener = Some(Box::new(l));
        self
    }

    /// Builds the cache on top of `mux`, which will carry one one-shot
    /// registration per live entry.
    pub fn build(self, mux: Arc<TimerMux>) -> TtlCache<T> {
        TtlCache::new(mux, self.timeout, self.listener)
    }
}
