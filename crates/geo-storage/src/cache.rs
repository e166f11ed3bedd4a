//! Redis-based cache for serialized GeoJSON payloads.

use async_trait::async_trait;
use bytes::Bytes;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use std::time::Duration;

use geo_common::{GeoError, GeoResult};

/// Number of largest entries reported by a usage scan.
pub const USAGE_TOP_N: usize = 10;

/// Key/value store for cached GeoJSON payloads.
///
/// The store is a pure performance layer: callers must treat every error as
/// "compute without the cache", never as a request failure. Writes are whole-
/// payload overwrites; there are no partial updates.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a cached payload.
    async fn get(&self, key: &str) -> GeoResult<Option<Bytes>>;

    /// Store a payload with a time-to-live.
    async fn set(&self, key: &str, payload: Bytes, ttl: Duration) -> GeoResult<()>;

    /// Delete all keys matching a glob pattern. Returns the deleted count.
    async fn delete_matching(&self, pattern: &str) -> GeoResult<u64>;

    /// Report key counts and approximate per-key memory for a glob pattern.
    async fn usage(&self, pattern: &str) -> GeoResult<CacheUsage>;
}

/// Usage report for a key pattern.
#[derive(Debug, Clone)]
pub struct CacheUsage {
    /// Number of keys matching the pattern.
    pub key_count: u64,
    /// Sum of approximate memory across matched keys, in bytes.
    pub total_bytes: u64,
    /// Largest matched entries, sorted descending, at most [`USAGE_TOP_N`].
    pub largest: Vec<KeyUsage>,
    /// Total memory used by the backing store, if the backend reports it.
    pub store_memory_bytes: Option<u64>,
}

/// Approximate memory usage of a single cache entry.
#[derive(Debug, Clone)]
pub struct KeyUsage {
    pub key: String,
    pub bytes: u64,
}

/// True if a glob pattern would match the entire key space.
///
/// The operator-facing invalidation tools refuse such patterns without an
/// explicit force flag, to avoid accidental full-cache eviction.
pub fn is_unscoped_pattern(pattern: &str) -> bool {
    pattern.chars().all(|c| matches!(c, '*' | '?'))
}

/// Redis payload cache client.
pub struct RedisCache {
    conn: MultiplexedConnection,
}

impl RedisCache {
    /// Connect to Redis.
    pub async fn connect(redis_url: &str) -> GeoResult<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| GeoError::Cache(format!("Redis connection failed: {}", e)))?;

        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| GeoError::Cache(format!("Redis connection failed: {}", e)))?;

        Ok(Self { conn })
    }

    /// Collect all keys matching a pattern via SCAN.
    ///
    /// SCAN is used instead of KEYS so a large key space cannot block the
    /// server; the cursor loop terminates when Redis returns cursor 0.
    async fn scan_keys(&self, pattern: &str) -> GeoResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(1000)
                .query_async(&mut conn)
                .await
                .map_err(|e| GeoError::Cache(format!("Pattern scan failed: {}", e)))?;

            keys.extend(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        Ok(keys)
    }

    /// Total memory used by the Redis instance, from INFO memory.
    async fn used_memory(&self) -> GeoResult<Option<u64>> {
        let mut conn = self.conn.clone();
        let info: String = redis::cmd("INFO")
            .arg("memory")
            .query_async(&mut conn)
            .await
            .map_err(|e| GeoError::Cache(format!("Info failed: {}", e)))?;

        for line in info.lines() {
            if let Some(val) = line.strip_prefix("used_memory:") {
                return Ok(val.trim().parse().ok());
            }
        }

        Ok(None)
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> GeoResult<Option<Bytes>> {
        let mut conn = self.conn.clone();
        let result: Option<Vec<u8>> = conn
            .get(key)
            .await
            .map_err(|e| GeoError::Cache(format!("Cache get failed: {}", e)))?;

        Ok(result.map(Bytes::from))
    }

    async fn set(&self, key: &str, payload: Bytes, ttl: Duration) -> GeoResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(key, payload.as_ref(), ttl.as_secs())
            .await
            .map_err(|e| GeoError::Cache(format!("Cache set failed: {}", e)))?;

        Ok(())
    }

    async fn delete_matching(&self, pattern: &str) -> GeoResult<u64> {
        let keys = self.scan_keys(pattern).await?;
        if keys.is_empty() {
            return Ok(0);
        }

        let count = keys.len() as u64;
        let mut conn = self.conn.clone();
        for key in keys {
            let _: () = conn
                .del(&key)
                .await
                .map_err(|e| GeoError::Cache(format!("Delete failed: {}", e)))?;
        }

        Ok(count)
    }

    async fn usage(&self, pattern: &str) -> GeoResult<CacheUsage> {
        let keys = self.scan_keys(pattern).await?;
        let mut conn = self.conn.clone();

        let mut entries = Vec::with_capacity(keys.len());
        let mut total_bytes = 0u64;
        for key in keys {
            // MEMORY USAGE returns nil for keys that expired mid-scan.
            let size: Option<u64> = redis::cmd("MEMORY")
                .arg("USAGE")
                .arg(&key)
                .query_async(&mut conn)
                .await
                .map_err(|e| GeoError::Cache(format!("Memory usage failed: {}", e)))?;

            if let Some(bytes) = size {
                total_bytes += bytes;
                entries.push(KeyUsage { key, bytes });
            }
        }

        let key_count = entries.len() as u64;
        entries.sort_by(|a, b| b.bytes.cmp(&a.bytes));
        entries.truncate(USAGE_TOP_N);

        Ok(CacheUsage {
            key_count,
            total_bytes,
            largest: entries,
            store_memory_bytes: self.used_memory().await?,
        })
    }
}
