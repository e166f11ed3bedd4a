//! Cache-aware GeoJSON and summaries handlers.
//!
//! The geojson handler computes-or-serves-from-cache and reports the outcome
//! through `X-Cache-Status` and `X-Cache-Time` headers so an external
//! monitoring layer can alert on slow or high-miss-rate periods. The cache is
//! a pure performance layer: a store outage degrades to direct computation,
//! it never fails the request.

use axum::{
    body::Body,
    extract::{Extension, Path, Query},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use geo_common::{keys, Dataset, FilterSet, GeoError};
use geo_storage::validate_filters;

use crate::handlers::error_response;
use crate::state::AppState;
use crate::throttle::CallerClass;

/// Cache lookup outcome reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CacheStatus {
    Hit,
    Miss,
    /// The store was unreachable; the response was computed directly.
    Unknown,
}

impl CacheStatus {
    fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Unknown => "UNKNOWN",
        }
    }
}

/// GET /:dataset/geojson - Cached GeoJSON feature collection.
pub async fn geojson_handler(
    Path(dataset): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    Extension(state): Extension<Arc<AppState>>,
) -> Response {
    let started = Instant::now();

    let (class, client_key) = caller_identity(&headers);
    if !state.throttle.check(class, &client_key).await {
        counter!("geojson_throttled_total").increment(1);
        return error_response(&GeoError::Throttled);
    }

    let dataset: Dataset = match dataset.parse() {
        Ok(d) => d,
        Err(e) => return error_response(&e),
    };

    let filters = FilterSet::from_pairs(params);
    if let Err(e) = validate_filters(dataset, &filters) {
        return error_response(&e);
    }

    let tolerance = state.config.simplify_tolerance;
    let cache_key = keys::geojson_cache_key(dataset, tolerance, &filters);

    // Store errors fall through to direct computation.
    let mut store_available = true;
    match state.cache.get(&cache_key).await {
        Ok(Some(payload)) => {
            return finish(dataset, payload, CacheStatus::Hit, started);
        }
        Ok(None) => {}
        Err(e) => {
            warn!(cache_key = %cache_key, error = %e, "Cache store unavailable, computing directly");
            store_available = false;
        }
    }

    let collection = match state
        .source
        .feature_collection(dataset, &filters, tolerance)
        .await
    {
        Ok(c) => c,
        Err(e) => return error_response(&e),
    };

    let payload = match serde_json::to_vec(&collection) {
        Ok(bytes) => Bytes::from(bytes),
        Err(e) => return error_response(&GeoError::from(e)),
    };

    let status = if store_available {
        match state
            .cache
            .set(&cache_key, payload.clone(), state.config.cache_ttl)
            .await
        {
            Ok(()) => CacheStatus::Miss,
            Err(e) => {
                warn!(cache_key = %cache_key, error = %e, "Cache store write failed");
                CacheStatus::Unknown
            }
        }
    } else {
        CacheStatus::Unknown
    };

    finish(dataset, payload, status, started)
}

/// GET /:dataset/summaries - Labeled scalar summaries, never cached.
pub async fn summaries_handler(
    Path(dataset): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    Extension(state): Extension<Arc<AppState>>,
) -> Response {
    let dataset: Dataset = match dataset.parse() {
        Ok(d) => d,
        Err(e) => return error_response(&e),
    };

    let filters = FilterSet::from_pairs(params);
    if let Err(e) = validate_filters(dataset, &filters) {
        return error_response(&e);
    }

    match state.source.summaries(dataset, &filters).await {
        Ok(summaries) => Json(summaries).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Determine the caller class and identity for rate limiting.
///
/// Presence of an Authorization header selects the authenticated ceiling,
/// keyed by the credential; anonymous callers are keyed by client address.
///
/// The credential is not verified here, so any caller can claim the
/// authenticated ceiling by sending an arbitrary Authorization header.
/// Acceptable while the limiter only guards computation cost; once request
/// authentication lands, key the authenticated window by the verified
/// identity instead of the raw header. Anonymous callers without an
/// X-Forwarded-For header (no proxy in front) all share one window.
fn caller_identity(headers: &HeaderMap) -> (CallerClass, String) {
    if let Some(auth) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        return (CallerClass::Authenticated, auth.to_string());
    }

    let addr = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .unwrap_or("unknown")
        .trim()
        .to_string();

    (CallerClass::Anonymous, addr)
}

/// Emit the GeoJSON response with cache observability headers and metrics.
fn finish(dataset: Dataset, payload: Bytes, status: CacheStatus, started: Instant) -> Response {
    let elapsed = started.elapsed().as_secs_f64();

    counter!(
        "geojson_requests_total",
        "dataset" => dataset.to_string(),
        "cache" => status.as_str()
    )
    .increment(1);
    histogram!("geojson_request_duration_seconds", "dataset" => dataset.to_string())
        .record(elapsed);

    if elapsed > 1.0 {
        warn!(
            dataset = %dataset,
            cache = status.as_str(),
            duration = format!("{:.4}", elapsed),
            "Slow GeoJSON request"
        );
    } else {
        info!(
            dataset = %dataset,
            cache = status.as_str(),
            duration = format!("{:.4}", elapsed),
            "GeoJSON request served"
        );
    }

    match Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-Cache-Status", status.as_str())
        .header("X-Cache-Time", format!("{:.4}", elapsed))
        .body(Body::from(payload))
    {
        Ok(response) => response,
        Err(e) => error_response(&GeoError::Internal(format!("Response build failed: {}", e))),
    }
}
