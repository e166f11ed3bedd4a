//! Cache warming for GeoJSON endpoints.
//!
//! Pre-populates the unfiltered "all features" cache entry per dataset so
//! the first user-facing request after a deploy or data import is already a
//! hit instead of a slow recomputation. The warmer derives keys through the
//! same shared builder the live endpoint uses; the two must never diverge.

use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use geo_common::{keys, Dataset, FilterSet, GeoResult};

use crate::cache::CacheStore;
use crate::features::FeatureSource;

/// Cache warming configuration.
#[derive(Clone, Debug)]
pub struct WarmingConfig {
    /// Time-to-live applied to warmed entries.
    pub ttl: Duration,
    /// Simplification tolerance, shared with the live endpoint.
    pub tolerance: f64,
}

/// Result of warming a single dataset.
#[derive(Debug, Clone, Serialize)]
pub struct WarmReport {
    pub dataset: Dataset,
    pub cache_key: String,
    pub duration_ms: u64,
    #[serde(flatten)]
    pub outcome: WarmOutcome,
}

/// Outcome of a single warm operation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum WarmOutcome {
    Success { features: usize, bytes: usize },
    Failed { error: String },
}

impl WarmReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, WarmOutcome::Success { .. })
    }
}

/// Cache warmer for GeoJSON payloads.
pub struct CacheWarmer {
    source: Arc<dyn FeatureSource>,
    cache: Arc<dyn CacheStore>,
    config: WarmingConfig,
}

impl CacheWarmer {
    /// Create a new cache warmer.
    pub fn new(
        source: Arc<dyn FeatureSource>,
        cache: Arc<dyn CacheStore>,
        config: WarmingConfig,
    ) -> Self {
        Self {
            source,
            cache,
            config,
        }
    }

    /// Warm the given datasets, continuing past individual failures.
    ///
    /// Each dataset yields its own report; one failing dataset never aborts
    /// the remaining work.
    pub async fn warm_datasets(&self, datasets: &[Dataset]) -> Vec<WarmReport> {
        let start = Instant::now();
        let mut reports = Vec::with_capacity(datasets.len());

        for &dataset in datasets {
            reports.push(self.warm_dataset(dataset).await);
        }

        let succeeded = reports.iter().filter(|r| r.is_success()).count();
        info!(
            datasets = datasets.len(),
            succeeded = succeeded,
            failed = datasets.len() - succeeded,
            duration_ms = start.elapsed().as_millis() as u64,
            "Cache warming complete"
        );

        reports
    }

    /// Warm the unfiltered cache entry for one dataset.
    ///
    /// Idempotent: warming twice overwrites the same key with a fresh TTL.
    pub async fn warm_dataset(&self, dataset: Dataset) -> WarmReport {
        let start = Instant::now();
        let cache_key =
            keys::geojson_cache_key(dataset, self.config.tolerance, &FilterSet::default());

        info!(dataset = %dataset, cache_key = %cache_key, "Warming GeoJSON cache");

        let outcome = match self.populate(dataset, &cache_key).await {
            Ok((features, bytes)) => {
                info!(
                    dataset = %dataset,
                    features = features,
                    bytes = bytes,
                    "GeoJSON cache warmed"
                );
                WarmOutcome::Success { features, bytes }
            }
            Err(e) => {
                warn!(dataset = %dataset, error = %e, "Failed to warm GeoJSON cache");
                WarmOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        WarmReport {
            dataset,
            cache_key,
            duration_ms: start.elapsed().as_millis() as u64,
            outcome,
        }
    }

    async fn populate(&self, dataset: Dataset, cache_key: &str) -> GeoResult<(usize, usize)> {
        let collection = self
            .source
            .feature_collection(dataset, &FilterSet::default(), self.config.tolerance)
            .await?;

        let payload = Bytes::from(serde_json::to_vec(&collection)?);
        let features = collection.feature_count();
        let bytes = payload.len();

        self.cache.set(cache_key, payload, self.config.ttl).await?;

        Ok((features, bytes))
    }
}
