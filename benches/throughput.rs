//! Throughput benchmarks: Lungo vs Moka (both configured with a TTL).
//!
//! Each group benchmarks the same workload across both caches so criterion
//! can generate side-by-side HTML reports.  The TTL is set far beyond the
//! benchmark runtime: the point is to measure the bookkeeping cost of
//! arming/renewing expiry timers on the hot path, not expiry itself.
//!
//! Run with:
//!     cargo bench --bench throughput

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use lungo::{CacheBuilder, Keyed, TimerMux, TtlCache};
use moka::sync::Cache as MokaCache;
use std::sync::Arc;
use std::time::Duration;

/// Number of entries each cache is pre-filled with.
const CAP: u64 = 10_000;

/// Operations executed per criterion iteration (hot-loop size).
const OPS: u64 = 1_000;

/// TTL used everywhere; long enough that nothing expires mid-benchmark.
const TTL: Duration = Duration::from_secs(600);

#[derive(Debug)]
struct Entry {
    k: u64,
    v: u64,
}

impl Keyed for Entry {
    type Key = u64;

    fn key(&self) -> u64 {
        self.k
    }
}

fn lungo_cache() -> TtlCache<Entry> {
    CacheBuilder::new(TTL).build(Arc::new(TimerMux::new()))
}

fn moka_cache() -> MokaCache<u64, u64> {
    MokaCache::builder().max_capacity(CAP * 4).time_to_live(TTL).build()
}

// ---------------------------------------------------------------------------
// Group 1: get_hit
// ---------------------------------------------------------------------------
// All keys are present → pure read throughput; lookups never touch timers.

fn bench_get_hit(c: &mut Criterion) {
    let lungo = lungo_cache();
    for i in 0..CAP {
        lungo.add_or_update(Entry { k: i, v: i * 2 });
    }

    let moka = moka_cache();
    for i in 0..CAP {
        moka.insert(i, i * 2);
    }

    let mut group = c.benchmark_group("get_hit");
    group.throughput(Throughput::Elements(OPS));

    group.bench_function("lungo", |b| {
        b.iter(|| {
            for i in 0..OPS {
                black_box(lungo.get(black_box(&i)));
            }
        })
    });

    group.bench_function("moka", |b| {
        b.iter(|| {
            for i in 0..OPS {
                black_box(moka.get(black_box(&i)));
            }
        })
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Group 2: insert_fresh
// ---------------------------------------------------------------------------
// Always-new keys → every insert arms a fresh expiry timer.

fn bench_insert_fresh(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_fresh");
    group.throughput(Throughput::Elements(OPS));

    group.bench_function("lungo", |b| {
        let cache = lungo_cache();
        let mut key = 0u64;
        b.iter(|| {
            for _ in 0..OPS {
                cache.add_or_update(Entry { k: black_box(key), v: key });
                key = key.wrapping_add(1);
            }
        })
    });

    group.bench_function("moka", |b| {
        let cache = moka_cache();
        let mut key = 0u64;
        b.iter(|| {
            for _ in 0..OPS {
                cache.insert(black_box(key), black_box(key));
                key = key.wrapping_add(1);
            }
        })
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Group 3: renew_same_key
// ---------------------------------------------------------------------------
// Repeated updates of one hot key → stop + rearm of its timer each time,
// the sliding-expiration hot path.

fn bench_renew_same_key(c: &mut Criterion) {
    let mut group = c.benchmark_group("renew_same_key");
    group.throughput(Throughput::Elements(OPS));

    group.bench_function("lungo", |b| {
        let cache = lungo_cache();
        b.iter(|| {
            for i in 0..OPS {
                cache.add_or_update(Entry { k: 7, v: black_box(i) });
            }
        })
    });

    group.bench_function("moka", |b| {
        let cache = moka_cache();
        b.iter(|| {
            for i in 0..OPS {
                cache.insert(7, black_box(i));
            }
        })
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Group 4: timer_churn
// ---------------------------------------------------------------------------
// Raw multiplexer cost: start then immediately stop a far-future timer.

fn bench_timer_churn(c: &mut Criterion) {
    let mux = TimerMux::new();

    let mut group = c.benchmark_group("timer_churn");
    group.throughput(Throughput::Elements(OPS));

    group.bench_function("start_stop", |b| {
        b.iter(|| {
            for _ in 0..OPS {
                let id = mux.start(|| {}, Some(TTL), None);
                black_box(mux.stop(id));
            }
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_get_hit,
    bench_insert_fresh,
    bench_renew_same_key,
    bench_timer_churn,
);
criterion_main!(benches);
