//! HTTP handlers for the features API.

pub mod cache;
pub mod geojson;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use geo_common::GeoError;

/// GET /health - Liveness check.
pub async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "features-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Map a GeoError to its JSON error response.
pub fn error_response(err: &GeoError) -> Response {
    let status = StatusCode::from_u16(err.http_status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(serde_json::json!({ "detail": err.to_string() }))).into_response()
}
