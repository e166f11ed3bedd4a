//! End-to-end tests for the GeoJSON endpoints and cache administration.
//!
//! Runs the real router against the in-memory cache backend and a stub
//! feature source, so the full request path is exercised without external
//! services.

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use features_api::config::AppConfig;
use features_api::router;
use features_api::state::AppState;
use geo_common::{Dataset, Feature, FeatureCollection, FilterSet, GeoError, GeoResult, Geometry};
use geo_storage::{CacheStore, CacheUsage, FeatureSource, MemoryCache};

struct StubSource {
    calls: AtomicUsize,
}

impl StubSource {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl FeatureSource for StubSource {
    async fn feature_collection(
        &self,
        dataset: Dataset,
        filters: &FilterSet,
        _tolerance: f64,
    ) -> GeoResult<FeatureCollection> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let mut feature = Feature::new(Geometry::point(9.99, 53.55)).with_id(1);
        feature = feature.with_property("dataset", serde_json::json!(dataset.to_string()));
        if let Some(values) = filters.get("bezirk") {
            feature = feature.with_property("bezirk", serde_json::json!(values));
        }
        Ok(FeatureCollection::new().with_features(vec![feature]))
    }

    async fn summaries(
        &self,
        _dataset: Dataset,
        _filters: &FilterSet,
    ) -> GeoResult<serde_json::Value> {
        Ok(serde_json::json!({ "summaries": { "total_count": 1 } }))
    }
}

/// Cache backend whose every operation fails, simulating a store outage.
struct FailingCache;

#[async_trait]
impl CacheStore for FailingCache {
    async fn get(&self, _key: &str) -> GeoResult<Option<Bytes>> {
        Err(GeoError::Cache("connection refused".into()))
    }

    async fn set(&self, _key: &str, _payload: Bytes, _ttl: Duration) -> GeoResult<()> {
        Err(GeoError::Cache("connection refused".into()))
    }

    async fn delete_matching(&self, _pattern: &str) -> GeoResult<u64> {
        Err(GeoError::Cache("connection refused".into()))
    }

    async fn usage(&self, _pattern: &str) -> GeoResult<CacheUsage> {
        Err(GeoError::Cache("connection refused".into()))
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        anon_rate_limit: 1000,
        user_rate_limit: 1000,
        ..AppConfig::default()
    }
}

fn app_with(source: Arc<dyn FeatureSource>, cache: Arc<dyn CacheStore>) -> Router {
    let state = Arc::new(AppState::with_parts(source, cache, None, test_config()));
    router(state)
}

async fn get_response(app: &Router, uri: &str) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response")
}

async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
        )
        .await
        .expect("response")
}

fn header(response: &axum::response::Response, name: &str) -> String {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn body_bytes(response: axum::response::Response) -> Bytes {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body")
}

#[tokio::test]
async fn test_miss_then_hit_serves_identical_payload() {
    let source = Arc::new(StubSource::new());
    let app = app_with(source.clone(), Arc::new(MemoryCache::new(64)));

    let first = get_response(&app, "/trees/geojson").await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(header(&first, "X-Cache-Status"), "MISS");
    assert!(!header(&first, "X-Cache-Time").is_empty());
    let first_body = body_bytes(first).await;

    let second = get_response(&app, "/trees/geojson").await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(header(&second, "X-Cache-Status"), "HIT");
    let second_body = body_bytes(second).await;

    assert_eq!(first_body, second_body);
    // The hit was served from the cache, not recomputed.
    assert_eq!(source.calls.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn test_reordered_query_parameters_share_one_entry() {
    let source = Arc::new(StubSource::new());
    let app = app_with(source.clone(), Arc::new(MemoryCache::new(64)));

    let first = get_response(&app, "/trees/geojson?bezirk=Altona&bezirk=Harburg").await;
    assert_eq!(header(&first, "X-Cache-Status"), "MISS");

    let second = get_response(&app, "/trees/geojson?bezirk=Harburg&bezirk=Altona").await;
    assert_eq!(header(&second, "X-Cache-Status"), "HIT");

    assert_eq!(source.calls.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn test_excluded_parameters_do_not_split_entries() {
    let source = Arc::new(StubSource::new());
    let app = app_with(source.clone(), Arc::new(MemoryCache::new(64)));

    get_response(&app, "/trees/geojson").await;
    let paged = get_response(&app, "/trees/geojson?page=3&format=json").await;

    assert_eq!(header(&paged, "X-Cache-Status"), "HIT");
    assert_eq!(source.calls.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn test_store_outage_degrades_to_direct_computation() {
    let source = Arc::new(StubSource::new());
    let app = app_with(source.clone(), Arc::new(FailingCache));

    let response = get_response(&app, "/trees/geojson").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "X-Cache-Status"), "UNKNOWN");

    let body = body_bytes(response).await;
    let parsed: serde_json::Value = serde_json::from_slice(&body).expect("geojson");
    assert_eq!(parsed["type"], "FeatureCollection");
    assert_eq!(source.calls.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn test_unknown_dataset_is_not_found() {
    let app = app_with(Arc::new(StubSource::new()), Arc::new(MemoryCache::new(64)));

    let response = get_response(&app, "/rivers/geojson").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_bytes(response).await;
    let parsed: serde_json::Value = serde_json::from_slice(&body).expect("error body");
    assert!(parsed["detail"].as_str().expect("detail").contains("rivers"));
}

#[tokio::test]
async fn test_malformed_integer_filter_is_bad_request() {
    let source = Arc::new(StubSource::new());
    let app = app_with(source.clone(), Arc::new(MemoryCache::new(64)));

    let response = get_response(&app, "/trees/geojson?pflanzjahr=abc").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // The malformed request must not reach the source or the cache.
    assert_eq!(source.calls.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn test_anonymous_rate_limit_enforced() {
    let config = AppConfig {
        anon_rate_limit: 2,
        ..AppConfig::default()
    };
    let state = Arc::new(AppState::with_parts(
        Arc::new(StubSource::new()),
        Arc::new(MemoryCache::new(64)),
        None,
        config,
    ));
    let app = router(state);

    assert_eq!(
        get_response(&app, "/trees/geojson").await.status(),
        StatusCode::OK
    );
    assert_eq!(
        get_response(&app, "/trees/geojson").await.status(),
        StatusCode::OK
    );
    assert_eq!(
        get_response(&app, "/trees/geojson").await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
}

#[tokio::test]
async fn test_summaries_returns_labeled_counts() {
    let app = app_with(Arc::new(StubSource::new()), Arc::new(MemoryCache::new(64)));

    let response = get_response(&app, "/collections/summaries").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_bytes(response).await;
    let parsed: serde_json::Value = serde_json::from_slice(&body).expect("summaries");
    assert_eq!(parsed["summaries"]["total_count"], 1);
}

#[tokio::test]
async fn test_clear_endpoint_invalidates_matching_entries() {
    let source = Arc::new(StubSource::new());
    let app = app_with(source.clone(), Arc::new(MemoryCache::new(64)));

    get_response(&app, "/trees/geojson").await;
    assert_eq!(source.calls.load(Ordering::Relaxed), 1);

    let cleared = post_json(
        &app,
        "/api/cache/clear",
        serde_json::json!({ "pattern": "*geojson*" }),
    )
    .await;
    assert_eq!(cleared.status(), StatusCode::OK);
    let body = body_bytes(cleared).await;
    let parsed: serde_json::Value = serde_json::from_slice(&body).expect("clear result");
    assert_eq!(parsed["deleted"], 1);

    let after = get_response(&app, "/trees/geojson").await;
    assert_eq!(header(&after, "X-Cache-Status"), "MISS");
    assert_eq!(source.calls.load(Ordering::Relaxed), 2);
}

#[tokio::test]
async fn test_clear_refuses_unscoped_pattern_without_force() {
    let app = app_with(Arc::new(StubSource::new()), Arc::new(MemoryCache::new(64)));

    let refused = post_json(&app, "/api/cache/clear", serde_json::json!({ "pattern": "*" })).await;
    assert_eq!(refused.status(), StatusCode::BAD_REQUEST);

    let forced = post_json(
        &app,
        "/api/cache/clear",
        serde_json::json!({ "pattern": "*", "force": true }),
    )
    .await;
    assert_eq!(forced.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_warm_endpoint_makes_next_request_a_hit() {
    let source = Arc::new(StubSource::new());
    let app = app_with(source.clone(), Arc::new(MemoryCache::new(64)));

    let warmed = post_json(&app, "/api/cache/warm", serde_json::json!({})).await;
    assert_eq!(warmed.status(), StatusCode::OK);
    let body = body_bytes(warmed).await;
    let parsed: serde_json::Value = serde_json::from_slice(&body).expect("warm reports");
    assert_eq!(parsed["reports"].as_array().expect("reports").len(), 2);

    let trees = get_response(&app, "/trees/geojson").await;
    assert_eq!(header(&trees, "X-Cache-Status"), "HIT");
    let collections = get_response(&app, "/collections/geojson").await;
    assert_eq!(header(&collections, "X-Cache-Status"), "HIT");

    // Both hits came from the warm pass; no extra computation.
    assert_eq!(source.calls.load(Ordering::Relaxed), 2);
}

#[tokio::test]
async fn test_selective_warm_leaves_other_dataset_cold() {
    let source = Arc::new(StubSource::new());
    let app = app_with(source.clone(), Arc::new(MemoryCache::new(64)));

    let warmed = post_json(
        &app,
        "/api/cache/warm",
        serde_json::json!({ "datasets": ["collections"] }),
    )
    .await;
    assert_eq!(warmed.status(), StatusCode::OK);

    let collections = get_response(&app, "/collections/geojson").await;
    assert_eq!(header(&collections, "X-Cache-Status"), "HIT");
    let trees = get_response(&app, "/trees/geojson").await;
    assert_eq!(header(&trees, "X-Cache-Status"), "MISS");
}

#[tokio::test]
async fn test_async_warm_without_queue_is_unavailable() {
    let app = app_with(Arc::new(StubSource::new()), Arc::new(MemoryCache::new(64)));

    let response = post_json(
        &app,
        "/api/cache/warm",
        serde_json::json!({ "async": true }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_stats_reports_cached_entries() {
    let app = app_with(Arc::new(StubSource::new()), Arc::new(MemoryCache::new(64)));

    get_response(&app, "/trees/geojson").await;
    get_response(&app, "/collections/geojson").await;

    let response = get_response(&app, "/api/cache/stats").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_bytes(response).await;
    let parsed: serde_json::Value = serde_json::from_slice(&body).expect("stats");
    assert_eq!(parsed["key_count"], 2);
    assert!(parsed["total_bytes"].as_u64().expect("bytes") > 0);
    assert_eq!(parsed["largest"].as_array().expect("largest").len(), 2);
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = app_with(Arc::new(StubSource::new()), Arc::new(MemoryCache::new(64)));

    let response = get_response(&app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_bytes(response).await;
    let parsed: serde_json::Value = serde_json::from_slice(&body).expect("health");
    assert_eq!(parsed["status"], "ok");
}
