//! Prefix-indexed command cache (C1 + C2): bounded, LRU-evicted,
//! TTL-expired, safe for many concurrent readers and writers.

mod entry;
mod prefix_cache;
mod seed;
mod sweeper;

pub use entry::CacheEntry;
pub use prefix_cache::{normalize, CacheConfig, CacheStats, PrefixCache};
pub use sweeper::Sweeper;
