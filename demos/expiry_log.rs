//! Event-stream walkthrough: inserts, a sliding renewal, an explicit remove,
//! and timer-driven expiry, with every change notification printed as it
//! happens.
//!
//! Run with:
//!     cargo run --example expiry_log

use lungo::listener::{CacheEvent, RemovalCause};
use lungo::{CacheBuilder, Keyed, TimerMux, TtlCache};
use std::sync::Arc;
use std::time::{Duration, Instant};

const TTL: Duration = Duration::from_millis(200);

#[derive(Debug)]
struct Token {
    name: &'static str,
    generation: u32,
}

impl Keyed for Token {
    type Key = &'static str;

    fn key(&self) -> &'static str {
        self.name
    }
}

fn main() {
    println!("lungo: TTL cache event log (TTL = {TTL:?})");
    println!();

    let started = Instant::now();
    let stamp = move || started.elapsed().as_millis();

    let mux = Arc::new(TimerMux::new());
    let cache: TtlCache<Token> = CacheBuilder::new(TTL)
        .listener(move |event: CacheEvent<Token>| {
            let t = stamp();
            match event {
                CacheEvent::Added { value } => {
                    println!("[{t:>4}ms] added     {} (gen {})", value.name, value.generation);
                }
                CacheEvent::Replaced { old, new } => {
                    println!(
                        "[{t:>4}ms] replaced  {} (gen {} -> {}), TTL renewed",
                        new.name, old.generation, new.generation
                    );
                }
                CacheEvent::Removed { value, cause } => {
                    let why = match cause {
                        RemovalCause::Expired => "TTL elapsed",
                        RemovalCause::Explicit => "removed by caller",
                    };
                    println!("[{t:>4}ms] removed   {} ({why})", value.name);
                }
                CacheEvent::Reset => {
                    println!("[{t:>4}ms] reset");
                }
            }
        })
        .build(mux);

    cache.add_or_update(Token { name: "alpha", generation: 1 });
    cache.add_or_update(Token { name: "beta", generation: 1 });
    cache.add_or_update(Token { name: "gamma", generation: 1 });

    // Renew "alpha" at ~120ms: it outlives its original 200ms deadline.
    std::thread::sleep(Duration::from_millis(120));
    cache.add_or_update(Token { name: "alpha", generation: 2 });

    // Drop "gamma" by hand before its TTL can.
    cache.remove_key(&"gamma");

    // Let "beta" (original schedule) and "alpha" (renewed schedule) expire.
    std::thread::sleep(Duration::from_millis(500));

    let stats = cache.stats();
    println!();
    println!("final state : {} entries", cache.len());
    println!(
        "stats       : {} inserted, {} replaced, {} expired, {} removed",
        stats.insertions, stats.replacements, stats.expirations, stats.removals
    );
}
