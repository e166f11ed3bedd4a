//! Cache administration handlers.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};

use geo_common::Dataset;
use geo_storage::{is_unscoped_pattern, WarmJob};

use crate::handlers::error_response;
use crate::state::AppState;

/// GET /api/cache/stats - Key counts and memory usage for GeoJSON entries.
#[instrument(skip(state))]
pub async fn cache_stats_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    match state.cache.usage("*geojson*").await {
        Ok(usage) => Json(serde_json::json!({
            "key_count": usage.key_count,
            "total_bytes": usage.total_bytes,
            "store_memory_bytes": usage.store_memory_bytes,
            "largest": usage
                .largest
                .iter()
                .map(|e| serde_json::json!({ "key": e.key, "bytes": e.bytes }))
                .collect::<Vec<_>>(),
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ClearRequest {
    pub pattern: String,
    /// Required to clear a pattern that matches the entire key space.
    #[serde(default)]
    pub force: bool,
}

/// POST /api/cache/clear - Delete cache entries matching a glob pattern.
#[instrument(skip(state))]
pub async fn cache_clear_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<ClearRequest>,
) -> Response {
    if request.pattern.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "detail": "Pattern must not be empty" })),
        )
            .into_response();
    }

    if is_unscoped_pattern(&request.pattern) && !request.force {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "detail": "Pattern matches the entire key space; set force to confirm"
            })),
        )
            .into_response();
    }

    match state.cache.delete_matching(&request.pattern).await {
        Ok(deleted) => {
            info!(pattern = %request.pattern, deleted = deleted, "Cache entries cleared");
            Json(serde_json::json!({
                "pattern": request.pattern,
                "deleted": deleted,
            }))
            .into_response()
        }
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
pub struct WarmRequest {
    /// Datasets to warm; defaults to all.
    pub datasets: Option<Vec<Dataset>>,
    /// Dispatch via the background warm queue instead of running inline.
    #[serde(default, rename = "async")]
    pub run_async: bool,
}

/// POST /api/cache/warm - Warm dataset caches inline or via the job queue.
#[instrument(skip(state))]
pub async fn cache_warm_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<WarmRequest>,
) -> Response {
    let datasets = request.datasets.unwrap_or_else(|| Dataset::ALL.to_vec());

    if request.run_async {
        let Some(queue) = &state.queue else {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "detail": "Warm queue is not configured" })),
            )
                .into_response();
        };

        let job = WarmJob::new(datasets);
        return match queue.enqueue(&job).await {
            Ok(entry_id) => {
                info!(job_id = %job.id, entry_id = %entry_id, "Warm job queued");
                (
                    StatusCode::ACCEPTED,
                    Json(serde_json::json!({ "queued": job.id })),
                )
                    .into_response()
            }
            Err(e) => error_response(&e),
        };
    }

    let reports = state.warmer().warm_datasets(&datasets).await;
    Json(serde_json::json!({ "reports": reports })).into_response()
}
