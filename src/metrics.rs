use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters updated on every cache mutation.
pub(crate) struct StatsCounter {
    insertions: AtomicU64,
    replacements: AtomicU64,
    expirations: AtomicU64,
    removals: AtomicU64,
}

impl StatsCounter {
    pub(crate) fn new() -> Self {
        StatsCounter {
            insertions: AtomicU64::new(0),
            replacements: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
            removals: AtomicU64::new(0),
        }
    }

    #[inline]
    pub(crate) fn record_insertion(&self) {
        self.insertions.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_replacement(&self) {
        self.replacements.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_removal(&self) {
        self.removals.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time snapshot of the statistics.
    pub(crate) fn snapshot(&self) -> Metrics {
        Metrics {
            insertions: self.insertions.load(Ordering::Relaxed),
            replacements: self.replacements.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            removals: self.removals.load(Ordering::Relaxed),
        }
    }
}

impl Default for StatsCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of cache statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metrics {
    /// Entries created for a previously unseen key.
    pub insertions: u64,
    /// Values replaced under an existing key (each one renewed a TTL).
    pub replacements: u64,
    /// Entries removed because their TTL elapsed.
    pub expirations: u64,
    /// Entries removed explicitly.
    pub removals: u64,
}

impl Metrics {
    /// Total entries that have left the cache, for any reason.
    pub fn departures(&self) -> u64 {
        self.expirations + self.removals
    }
}
