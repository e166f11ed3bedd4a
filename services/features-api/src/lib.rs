//! GeoJSON features API service.
//!
//! HTTP server exposing cached GeoJSON feature collections and summaries
//! for the published geometry datasets, plus cache administration endpoints.

pub mod config;
pub mod handlers;
pub mod state;
pub mod throttle;
pub mod worker;

use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use state::AppState;

/// Build the application router.
///
/// Shared between `main` and the integration tests so both exercise the
/// exact same routing and handler wiring.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_handler))
        // Cache administration
        .route("/api/cache/stats", get(handlers::cache::cache_stats_handler))
        .route("/api/cache/clear", post(handlers::cache::cache_clear_handler))
        .route("/api/cache/warm", post(handlers::cache::cache_warm_handler))
        // Dataset endpoints
        .route("/:dataset/geojson", get(handlers::geojson::geojson_handler))
        .route(
            "/:dataset/summaries",
            get(handlers::geojson::summaries_handler),
        )
        .layer(Extension(state))
}
