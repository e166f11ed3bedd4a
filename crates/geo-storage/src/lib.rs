//! Storage abstractions for the geofeatures services.
//!
//! Provides unified interfaces for:
//! - Redis for cached GeoJSON payloads and the warm job queue
//! - PostgreSQL/PostGIS for feature queries with database-side simplification
//! - In-memory cache backend for tests and single-process deployments

pub mod cache;
pub mod features;
pub mod memory_cache;
pub mod queue;
pub mod warming;

pub use cache::{is_unscoped_pattern, CacheStore, CacheUsage, KeyUsage, RedisCache};
pub use features::{validate_filters, FeatureSource, PostgresFeatureSource};
pub use memory_cache::MemoryCache;
pub use queue::{WarmJob, WarmQueue};
pub use warming::{CacheWarmer, WarmOutcome, WarmReport, WarmingConfig};
