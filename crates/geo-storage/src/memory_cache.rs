//! In-memory LRU cache backend.
//!
//! Process-local implementation of [`CacheStore`], used by tests and by
//! single-process deployments that have no Redis. Eviction is memory-based:
//! when the configured limit is exceeded, a batch of least-recently-used
//! entries is dropped. TTL enforcement is lazy (checked on read).

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::info;

use geo_common::GeoResult;

use crate::cache::{CacheStore, CacheUsage, KeyUsage, USAGE_TOP_N};

// Entry-count ceiling for the inner LruCache; eviction is driven by memory
// accounting, not this limit.
const LRU_CAPACITY: usize = 1_000_000;

/// In-memory LRU cache for serialized payloads.
pub struct MemoryCache {
    cache: Arc<RwLock<LruCache<String, CachedPayload>>>,
    max_bytes: u64,
    stats: Arc<MemoryCacheStats>,
}

struct CachedPayload {
    data: Bytes,
    inserted_at: Instant,
    ttl: Duration,
}

impl CachedPayload {
    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() > self.ttl
    }
}

/// Statistics for the in-memory cache.
///
/// All fields are atomic for lock-free reads from metrics endpoints.
#[derive(Default)]
pub struct MemoryCacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub expired: AtomicU64,
    pub evictions: AtomicU64,
    pub size_bytes: AtomicU64,
    pub entry_count: AtomicU64,
}

impl MemoryCache {
    /// Create a new cache with the given memory limit in megabytes.
    pub fn new(max_size_mb: usize) -> Self {
        let capacity = NonZeroUsize::new(LRU_CAPACITY).expect("Capacity must be > 0");

        Self {
            cache: Arc::new(RwLock::new(LruCache::new(capacity))),
            max_bytes: (max_size_mb as u64) * 1024 * 1024,
            stats: Arc::new(MemoryCacheStats::default()),
        }
    }

    /// Shared statistics handle.
    pub fn stats(&self) -> Arc<MemoryCacheStats> {
        self.stats.clone()
    }

    /// Evict LRU entries until ~5% of the memory limit is freed.
    fn evict_batch_locked(&self, cache: &mut LruCache<String, CachedPayload>) {
        let target_free = self.max_bytes / 20;
        let mut bytes_freed = 0u64;
        let mut entries_evicted = 0u64;

        while bytes_freed < target_free {
            if let Some((_, evicted)) = cache.pop_lru() {
                bytes_freed += evicted.data.len() as u64;
                entries_evicted += 1;
            } else {
                break;
            }
        }

        self.stats
            .size_bytes
            .fetch_sub(bytes_freed, Ordering::Relaxed);
        self.stats
            .entry_count
            .fetch_sub(entries_evicted, Ordering::Relaxed);
        self.stats
            .evictions
            .fetch_add(entries_evicted, Ordering::Relaxed);

        info!(
            entries_evicted = entries_evicted,
            bytes_freed = bytes_freed,
            "Memory cache batch eviction completed"
        );
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> GeoResult<Option<Bytes>> {
        let mut cache = self.cache.write().await;

        match cache.get(key) {
            Some(entry) if entry.is_expired() => {
                let size = entry.data.len() as u64;
                cache.pop(key);
                self.stats.expired.fetch_add(1, Ordering::Relaxed);
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                self.stats.size_bytes.fetch_sub(size, Ordering::Relaxed);
                self.stats.entry_count.fetch_sub(1, Ordering::Relaxed);
                Ok(None)
            }
            Some(entry) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(entry.data.clone()))
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, payload: Bytes, ttl: Duration) -> GeoResult<()> {
        let size = payload.len() as u64;
        let mut cache = self.cache.write().await;

        let current = self.stats.size_bytes.load(Ordering::Relaxed);
        if current + size > self.max_bytes {
            self.evict_batch_locked(&mut cache);
        }

        if let Some(existing) = cache.peek(key) {
            let existing_size = existing.data.len() as u64;
            self.stats
                .size_bytes
                .fetch_sub(existing_size, Ordering::Relaxed);
        } else {
            self.stats.entry_count.fetch_add(1, Ordering::Relaxed);
        }

        cache.put(
            key.to_string(),
            CachedPayload {
                data: payload,
                inserted_at: Instant::now(),
                ttl,
            },
        );
        self.stats.size_bytes.fetch_add(size, Ordering::Relaxed);

        Ok(())
    }

    async fn delete_matching(&self, pattern: &str) -> GeoResult<u64> {
        let mut cache = self.cache.write().await;

        let matching: Vec<String> = cache
            .iter()
            .filter(|(key, _)| glob_match(pattern, key))
            .map(|(key, _)| key.clone())
            .collect();

        let mut bytes_freed = 0u64;
        for key in &matching {
            if let Some(entry) = cache.pop(key) {
                bytes_freed += entry.data.len() as u64;
            }
        }

        let count = matching.len() as u64;
        self.stats
            .size_bytes
            .fetch_sub(bytes_freed, Ordering::Relaxed);
        self.stats.entry_count.fetch_sub(count, Ordering::Relaxed);

        Ok(count)
    }

    async fn usage(&self, pattern: &str) -> GeoResult<CacheUsage> {
        let cache = self.cache.read().await;

        let mut entries: Vec<KeyUsage> = cache
            .iter()
            .filter(|(key, entry)| glob_match(pattern, key) && !entry.is_expired())
            .map(|(key, entry)| KeyUsage {
                key: key.clone(),
                bytes: entry.data.len() as u64,
            })
            .collect();

        let key_count = entries.len() as u64;
        let total_bytes = entries.iter().map(|e| e.bytes).sum();
        entries.sort_by(|a, b| b.bytes.cmp(&a.bytes));
        entries.truncate(USAGE_TOP_N);

        Ok(CacheUsage {
            key_count,
            total_bytes,
            largest: entries,
            store_memory_bytes: Some(self.stats.size_bytes.load(Ordering::Relaxed)),
        })
    }
}

/// Glob matching with `*` (any run) and `?` (any single character).
///
/// Matches the pattern dialect Redis uses for SCAN/KEYS, so the in-memory
/// backend honors the same invalidation patterns as the Redis backend.
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();

    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((star_pi, star_ti)) = star {
            // Backtrack: let the last '*' consume one more character.
            pi = star_pi + 1;
            ti = star_ti + 1;
            star = Some((star_pi, star_ti + 1));
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}
