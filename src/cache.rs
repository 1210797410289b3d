use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use ahash::AHashMap;
use log::trace;
use parking_lot::RwLock;

use crate::builder::CacheBuilder;
use crate::keyed::Keyed;
use crate::listener::{CacheEvent, CacheListener, RemovalCause};
use crate::metrics::{Metrics, StatsCounter};
use crate::mux::{TimerId, TimerMux};

/// The multiplexer quantizes both its clock and arm delays to whole
/// milliseconds, so an expiry can fire up to two resolution steps ahead of
/// the entry's precise deadline.  A firing within this window counts as due;
/// anything earlier lost a race against a renewal and is stale.
const RESOLUTION_SLACK: Duration = Duration::from_millis(2);

// ---------------------------------------------------------------------------
// Cache entry
// ---------------------------------------------------------------------------

/// A single live entry.
///
/// `expires_at` is the source of truth for staleness: the one-shot timer
/// registered for this entry may fire after the entry was renewed or
/// removed, and such a firing must find either no entry or a deadline still
/// in the future, and do nothing.
struct CacheEntry<T> {
    value: Arc<T>,
    updated: Instant,
    expires_at: Instant,
    timer: TimerId,
}

// ---------------------------------------------------------------------------
// Cache interior
// ---------------------------------------------------------------------------

/// Shared interior of a [`TtlCache`].
struct Inner<T: Keyed> {
    /// Reads (`contains`, `get`, `values`) take the shared lock; every
    /// mutation takes the exclusive lock.
    map: RwLock<AHashMap<T::Key, CacheEntry<T>>>,
    mux: Arc<TimerMux>,
    /// Default TTL in nanoseconds.  Applies to timers armed after a change;
    /// existing entries keep their deadline.
    timeout_nanos: AtomicU64,
    /// `None` if the user didn't register one.
    listener: Option<Box<dyn CacheListener<T>>>,
    stats: StatsCounter,
}

impl<T> Inner<T>
where
    T: Keyed + Send + Sync + 'static,
{
    /// Timer-driven expiry.  Verifies the entry is actually due before
    /// removing it: a firing that lost the race against a renewal or an
    /// explicit removal backs off without touching the map or emitting
    /// anything.
    fn expire(&self, key: &T::Key) {
        let now = Instant::now();
        let removed = {
            let mut map = self.map.write();
            let due = map.get(key).map_or(false, |e| e.expires_at <= now + RESOLUTION_SLACK);
            if due {
                map.remove(key)
            } else {
                None
            }
        };
        if let Some(entry) = removed {
            self.stats.record_expiration();
            trace!("entry expired after {:?}", now - entry.updated);
            self.emit(CacheEvent::Removed {
                value: entry.value,
                cause: RemovalCause::Expired,
            });
        }
    }

    /// Dispatches `event` to the listener.  Callers must not hold the map
    /// lock: listeners are allowed to reenter the cache.
    fn emit(&self, event: CacheEvent<T>) {
        if let Some(listener) = &self.listener {
            listener.on_event(event);
        }
    }
}

// ---------------------------------------------------------------------------
// Cache handle
// ---------------------------------------------------------------------------

/// A keyed store whose entries expire on a sliding TTL.
///
/// Every entry owns a one-shot registration in a shared [`TimerMux`]; each
/// update of an existing key cancels the old registration and arms a fresh
/// one, so the TTL is measured from the most recent update, not from
/// insertion.  When a TTL elapses the entry removes itself and a
/// [`Removed`](crate::listener::CacheEvent::Removed) notification is
/// emitted.
///
/// # Example
/// ```
/// use lungo::{CacheBuilder, Keyed, TimerMux};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// #[derive(Debug)]
/// struct Route { prefix: String, gateway: u32 }
/// impl Keyed for Route {
///     type Key = String;
///     fn key(&self) -> String { self.prefix.clone() }
/// }
///
/// let mux = Arc::new(TimerMux::new());
/// let cache: lungo::TtlCache<Route> = CacheBuilder::new(Duration::from_secs(30)).build(mux);
///
/// cache.add_or_update(Route { prefix: "10.0.0.0/8".into(), gateway: 1 });
/// assert!(cache.contains_key(&"10.0.0.0/8".to_string()));
/// ```
pub struct TtlCache<T: Keyed> {
    inner: Arc<Inner<T>>,
}

impl<T: Keyed> Clone for TtlCache<T> {
    fn clone(&self) -> Self {
        TtlCache {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> TtlCache<T>
where
    T: Keyed + Send + Sync + 'static,
{
    pub(crate) fn new(
        mux: Arc<TimerMux>,
        timeout: Duration,
        listener: Option<Box<dyn CacheListener<T>>>,
    ) -> Self {
        TtlCache {
            inner: Arc::new(Inner {
                map: RwLock::new(AHashMap::new()),
                mux,
                timeout_nanos: AtomicU64::new(timeout.as_nanos() as u64),
                listener,
                stats: StatsCounter::new(),
            }),
        }
    }

    /// Returns a [`CacheBuilder`] for constructing a new cache.
    pub fn builder(timeout: Duration) -> CacheBuilder<T> {
        CacheBuilder::new(timeout)
    }

    // -----------------------------------------------------------------------
    // Default TTL
    // -----------------------------------------------------------------------

    /// The TTL applied to entries armed from now on.
    pub fn timeout(&self) -> Duration {
        Duration::from_nanos(self.inner.timeout_nanos.load(Ordering::Relaxed))
    }

    /// Changes the default TTL.  Entries already in the cache keep the
    /// deadline they were armed with.
    pub fn set_timeout(&self, timeout: Duration) {
        assert!(!timeout.is_zero(), "timeout must be greater than zero");
        self.inner
            .timeout_nanos
            .store(timeout.as_nanos() as u64, Ordering::Relaxed);
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Inserts `item`, or replaces the value stored under its key.
    ///
    /// Either way the entry's TTL starts over from now (sliding expiration).
    /// Emits [`Added`](CacheEvent::Added) for a new key,
    /// [`Replaced`](CacheEvent::Replaced) with both values otherwise.
    pub fn add_or_update(&self, item: T) {
        let key = item.key();
        let ttl = self.timeout();
        let now = Instant::now();
        let value = Arc::new(item);

        let mut map = self.inner.map.write();
        let event = match map.get_mut(&key) {
            Some(entry) => {
                // Renewal: cancel the old registration and arm a fresh
                // one-shot from now.  If the old timer is already mid-fire,
                // the future `expires_at` written here makes it stale.
                self.inner.mux.stop(entry.timer);
                let old = std::mem::replace(&mut entry.value, Arc::clone(&value));
                entry.updated = now;
                entry.expires_at = now + ttl;
                entry.timer = self.arm(key.clone(), ttl);
                self.inner.stats.record_replacement();
                CacheEvent::Replaced { old, new: value }
            }
            None => {
                let timer = self.arm(key.clone(), ttl);
                map.insert(
                    key,
                    CacheEntry {
                        value: Arc::clone(&value),
                        updated: now,
                        expires_at: now + ttl,
                        timer,
                    },
                );
                self.inner.stats.record_insertion();
                CacheEvent::Added { value }
            }
        };
        drop(map);
        self.inner.emit(event);
    }

    /// Removes the entry holding `item`'s key.  See
    /// [`remove_key`](TtlCache::remove_key).
    pub fn remove(&self, item: &T) -> bool {
        self.remove_key(&item.key())
    }

    /// Removes the entry for `key` and cancels its expiry timer.
    ///
    /// Returns whether an entry was present; calling again for the same key
    /// returns `false`.  Safe to call from a listener or any timer callback.
    pub fn remove_key(&self, key: &T::Key) -> bool {
        let removed = self.inner.map.write().remove(key);
        match removed {
            Some(entry) => {
                self.inner.mux.stop(entry.timer);
                self.inner.stats.record_removal();
                self.inner.emit(CacheEvent::Removed {
                    value: entry.value,
                    cause: RemovalCause::Explicit,
                });
                true
            }
            None => false,
        }
    }

    /// Removes every entry and emits a single [`CacheEvent::Reset`].
    ///
    /// Per-entry timer registrations are deliberately left armed: each
    /// orphaned registration fires once into a cache that no longer holds
    /// its entry and is absorbed by the staleness check, so a reset is O(1)
    /// in timer traffic and no spurious `Removed` events follow it.
    pub fn clear(&self) {
        let drained = {
            let mut map = self.inner.map.write();
            let n = map.len();
            map.clear();
            n
        };
        trace!("cache cleared, {drained} entries dropped");
        self.inner.emit(CacheEvent::Reset);
    }

    // -----------------------------------------------------------------------
    // Lookups (never touch timers)
    // -----------------------------------------------------------------------

    /// Returns `true` if an entry exists for `item`'s key.
    pub fn contains(&self, item: &T) -> bool {
        self.contains_key(&item.key())
    }

    /// Returns `true` if an entry exists for `key`.
    pub fn contains_key(&self, key: &T::Key) -> bool {
        self.inner.map.read().contains_key(key)
    }

    /// Returns the value stored under `key`, if any.
    ///
    /// Lookups do not renew the TTL; only [`add_or_update`](TtlCache::add_or_update) does.
    pub fn get(&self, key: &T::Key) -> Option<Arc<T>> {
        self.inner.map.read().get(key).map(|e| Arc::clone(&e.value))
    }

    /// When the entry for `key` was last inserted or replaced.
    pub fn last_updated(&self, key: &T::Key) -> Option<Instant> {
        self.inner.map.read().get(key).map(|e| e.updated)
    }

    /// A snapshot of all current values, in no particular order.
    pub fn values(&self) -> Vec<Arc<T>> {
        self.inner
            .map
            .read()
            .values()
            .map(|e| Arc::clone(&e.value))
            .collect()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.inner.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.map.read().is_empty()
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    pub fn stats(&self) -> Metrics {
        self.inner.stats.snapshot()
    }

    // -----------------------------------------------------------------------
    // Expiry plumbing
    // -----------------------------------------------------------------------

    /// Registers the one-shot expiry timer for `key`.
    ///
    /// The callback captures a weak handle and the key, nothing else: the
    /// entry is looked up fresh at fire time, so cache and timers never keep
    /// each other alive and a dropped cache silences its stragglers.
    fn arm(&self, key: T::Key, ttl: Duration) -> TimerId {
        let weak: Weak<Inner<T>> = Arc::downgrade(&self.inner);
        self.inner.mux.start(
            move || {
                if let Some(inner) = weak.upgrade() {
                    inner.expire(&key);
                }
            },
            Some(ttl),
            None,
        )
    }
}
