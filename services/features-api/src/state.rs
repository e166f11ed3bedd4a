//! Application state and shared resources.

use anyhow::Result;
use std::sync::Arc;

use geo_storage::{
    CacheStore, CacheWarmer, FeatureSource, PostgresFeatureSource, RedisCache, WarmQueue,
    WarmingConfig,
};

use crate::config::AppConfig;
use crate::throttle::RateLimiter;

/// Shared application state.
pub struct AppState {
    pub source: Arc<dyn FeatureSource>,
    pub cache: Arc<dyn CacheStore>,
    pub queue: Option<Arc<WarmQueue>>,
    pub throttle: RateLimiter,
    pub config: AppConfig,
}

impl AppState {
    /// Connect to PostGIS and Redis and build the production state.
    pub async fn new(config: AppConfig) -> Result<Self> {
        let source = Arc::new(PostgresFeatureSource::connect(&config.database_url).await?);
        let cache = Arc::new(RedisCache::connect(&config.redis_url).await?);
        let queue = Arc::new(WarmQueue::connect(&config.redis_url).await?);

        Ok(Self::with_parts(source, cache, Some(queue), config))
    }

    /// Assemble state from pre-built components.
    ///
    /// Used by tests to swap in the in-memory cache backend and stub feature
    /// sources.
    pub fn with_parts(
        source: Arc<dyn FeatureSource>,
        cache: Arc<dyn CacheStore>,
        queue: Option<Arc<WarmQueue>>,
        config: AppConfig,
    ) -> Self {
        let throttle = RateLimiter::new(config.anon_rate_limit, config.user_rate_limit);
        Self {
            source,
            cache,
            queue,
            throttle,
            config,
        }
    }

    /// Cache warmer wired to this state's source, cache, and configuration.
    ///
    /// The warmer shares the endpoint's key derivation and tolerance, so a
    /// warmed entry is exactly what the next live request looks up.
    pub fn warmer(&self) -> CacheWarmer {
        CacheWarmer::new(
            self.source.clone(),
            self.cache.clone(),
            WarmingConfig {
                ttl: self.config.cache_ttl,
                tolerance: self.config.simplify_tolerance,
            },
        )
    }
}
