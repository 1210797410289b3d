//! # Lungo
//! A keyed TTL cache built on a single multiplexed timer thread.

mod builder;
mod cache;
mod metrics;
pub mod keyed;
pub mod listener;
pub mod mux;

pub use builder::CacheBuilder;
pub use cache::TtlCache;
pub use keyed::Keyed;
pub use metrics::Metrics;
pub use mux::{TimerId, TimerMux};
