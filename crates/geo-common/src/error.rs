//! Error types for the geofeatures services.

use thiserror::Error;

/// Result type alias using GeoError.
pub type GeoResult<T> = Result<T, GeoError>;

/// Primary error type for feature and cache operations.
#[derive(Debug, Error)]
pub enum GeoError {
    // === Request Errors ===
    #[error("Unknown dataset: {0}")]
    UnknownDataset(String),

    #[error("Invalid filter value for '{param}': {message}")]
    InvalidFilter { param: String, message: String },

    #[error("Too many requests")]
    Throttled,

    // === Data Errors ===
    #[error("Data source error: {0}")]
    DataSource(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // === Infrastructure Errors ===
    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GeoError {
    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            GeoError::UnknownDataset(_) => 404,
            GeoError::InvalidFilter { .. } => 400,
            GeoError::Throttled => 429,
            _ => 500,
        }
    }
}

impl From<serde_json::Error> for GeoError {
    fn from(err: serde_json::Error) -> Self {
        GeoError::Serialization(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(GeoError::UnknownDataset("x".into()).http_status_code(), 404);
        assert_eq!(
            GeoError::InvalidFilter {
                param: "id".into(),
                message: "not an integer".into()
            }
            .http_status_code(),
            400
        );
        assert_eq!(GeoError::Throttled.http_status_code(), 429);
        assert_eq!(GeoError::Cache("down".into()).http_status_code(), 500);
    }
}
