//! Prefix cache engine — the heart of the system. A multi-valued,
//! bounded, LRU-evicted, TTL-expired prefix -> commands index.
//!
//! The per-bucket store is a `DashMap` rather than a single
//! `Mutex<LruCache<..>>` so that unrelated prefixes never contend on one
//! lock.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, trace};

use super::entry::CacheEntry;

/// Fixed per-bucket bookkeeping cost folded into `memory_estimate_bytes`
/// (the `VecDeque` header plus the map entry holding it), on top of the
/// summed `size_estimate` of each entry the bucket holds.
const BUCKET_OVERHEAD_BYTES: usize = 64;

/// Tunable constants, all overridable at construction.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_prefix_len: usize,
    pub max_buckets: usize,
    pub max_entries_per_bucket: usize,
    pub max_returned: usize,
    pub default_ttl: Duration,
    pub cleanup_interval: Duration,
    pub seeding: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_prefix_len: 50,
            max_buckets: 1000,
            max_entries_per_bucket: 5,
            max_returned: 5,
            default_ttl: Duration::from_secs(30 * 60),
            cleanup_interval: Duration::from_secs(5 * 60),
            seeding: false,
        }
    }
}

/// Aggregate statistics, returned by `stats()`.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub requests: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub entry_count: usize,
    pub memory_estimate_bytes: usize,
    pub uptime: Duration,
}

/// Lowercase and trim. Identical function is used on both the write path
/// (`put`) and the read path (`get`) so that `get("  GIT  ")` and
/// `get("git")` are guaranteed to agree.
pub fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

struct Bucket {
    entries: VecDeque<CacheEntry>,
}

impl Bucket {
    fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }
}

pub struct PrefixCache {
    config: CacheConfig,
    buckets: DashMap<String, Bucket>,
    last_access: DashMap<String, Instant>,
    requests: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    start_time: Instant,
}

impl PrefixCache {
    pub fn new(config: CacheConfig) -> Self {
        let cache = Self {
            config,
            buckets: DashMap::new(),
            last_access: DashMap::new(),
            requests: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            start_time: Instant::now(),
        };
        if cache.config.seeding {
            cache.seed();
        }
        cache
    }

    fn seed(&self) {
        for command in super::seed::DEFAULT_COMMANDS {
            self.put(command);
        }
    }

    /// Split a normalized string into its char-boundary-safe prefixes, up
    /// to `max_prefix_len` characters.
    fn prefixes_of(&self, normalized: &str) -> Vec<String> {
        let chars: Vec<char> = normalized.chars().collect();
        let max_len = chars.len().min(self.config.max_prefix_len);
        (1..=max_len)
            .map(|i| chars[..i].iter().collect::<String>())
            .collect()
    }

    /// `get(prefix) -> optional list of values`, newest-first, capped at
    /// `MAX_RETURNED`.
    pub fn get(&self, prefix: &str) -> Vec<String> {
        let key = normalize(prefix);
        if key.is_empty() {
            return Vec::new();
        }
        self.requests.fetch_add(1, Ordering::Relaxed);

        let now = Instant::now();
        let mut drop_bucket = false;
        let result = match self.buckets.get_mut(&key) {
            Some(mut bucket) => {
                while let Some(front) = bucket.entries.front() {
                    if front.is_expired(now) {
                        bucket.entries.pop_front();
                    } else {
                        break;
                    }
                }
                if bucket.entries.is_empty() {
                    drop_bucket = true;
                    None
                } else {
                    for entry in bucket.entries.iter_mut() {
                        entry.touch(now);
                    }
                    let values: Vec<String> = bucket
                        .entries
                        .iter()
                        .rev()
                        .take(self.config.max_returned)
                        .map(|e| e.value.clone())
                        .collect();
                    Some(values)
                }
            }
            None => None,
        };

        if drop_bucket {
            self.buckets.remove(&key);
            self.last_access.remove(&key);
        }

        match result {
            Some(values) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                self.last_access.insert(key, now);
                values
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Vec::new()
            }
        }
    }

    /// `put(command)` — upsert a full command into every prefix bucket it
    /// belongs to. No dedup on insert: the newest insertion always wins
    /// ordering, duplicates are pushed out by bucket overflow rather than
    /// collapsed at write time.
    pub fn put(&self, command: &str) {
        let normalized = normalize(command);
        if normalized.is_empty() {
            return;
        }

        let prefixes = self.prefixes_of(&normalized);
        let new_prefixes: usize = prefixes
            .iter()
            .filter(|p| !self.buckets.contains_key(p.as_str()))
            .count();

        if self.buckets.len() + new_prefixes >= self.config.max_buckets {
            self.evict_lru(new_prefixes);
        }

        let now = Instant::now();
        for prefix in prefixes {
            let mut bucket = self.buckets.entry(prefix.clone()).or_insert_with(Bucket::new);
            bucket
                .entries
                .push_back(CacheEntry::new(normalized.clone(), self.config.default_ttl));
            while bucket.entries.len() > self.config.max_entries_per_bucket {
                bucket.entries.pop_front();
            }
            self.last_access.insert(prefix, now);
        }

        // Safety net: the projected eviction above can undershoot when one
        // of this put's own prefixes was itself the eviction victim (it
        // gets recreated by `entry().or_insert_with` a few lines up). Trim
        // again so `bucket_count <= max_buckets` always holds.
        if self.buckets.len() > self.config.max_buckets {
            let excess = self.buckets.len() - self.config.max_buckets;
            self.evict_lru(excess);
        }
    }

    /// Global LRU eviction of whole buckets: remove the 20% (at least
    /// enough to make room for `needed` new buckets) with the oldest
    /// `last_access`, ties broken lexicographically.
    fn evict_lru(&self, needed: usize) {
        let mut candidates: Vec<(String, Instant)> = self
            .last_access
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        candidates.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        let twenty_percent = candidates.len() / 5;
        let to_evict = twenty_percent.max(needed).min(candidates.len());

        for (prefix, _) in candidates.into_iter().take(to_evict) {
            debug!(prefix = %prefix, "evicting bucket (global LRU)");
            self.buckets.remove(&prefix);
            self.last_access.remove(&prefix);
        }
    }

    pub fn remove(&self, prefix: &str) {
        let key = normalize(prefix);
        self.buckets.remove(&key);
        self.last_access.remove(&key);
    }

    pub fn clear(&self) {
        self.buckets.clear();
        self.last_access.clear();
        self.requests.store(0, Ordering::Relaxed);
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        let requests = self.requests.load(Ordering::Relaxed);
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let hit_rate = if requests > 0 {
            hits as f64 / requests as f64
        } else {
            0.0
        };
        let mut entry_count = 0usize;
        let mut memory_estimate_bytes = 0usize;
        for bucket in self.buckets.iter() {
            entry_count += bucket.entries.len();
            memory_estimate_bytes += BUCKET_OVERHEAD_BYTES;
            memory_estimate_bytes +=
                bucket.entries.iter().map(|e| e.size_estimate).sum::<usize>();
        }
        CacheStats {
            requests,
            hits,
            misses,
            hit_rate,
            entry_count,
            memory_estimate_bytes,
            uptime: self.start_time.elapsed(),
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Remove expired entries from the front of every bucket; drop buckets
    /// that become empty. Called by the background sweeper, but never
    /// holds more than one bucket's lock at a time (DashMap's shard lock is
    /// acquired and released per `get_mut` call).
    pub fn sweep_expired(&self) {
        let now = Instant::now();
        let mut emptied = Vec::new();
        for mut bucket in self.buckets.iter_mut() {
            while let Some(front) = bucket.entries.front() {
                if front.is_expired(now) {
                    bucket.entries.pop_front();
                } else {
                    break;
                }
            }
            if bucket.entries.is_empty() {
                emptied.push(bucket.key().clone());
            }
        }
        for key in emptied {
            trace!(prefix = %key, "sweeper dropping emptied bucket");
            self.buckets.remove(&key);
            self.last_access.remove(&key);
        }
    }
}
