//! Shared types for the geofeatures services.
//!
//! Provides the error taxonomy, dataset identifiers, GeoJSON document types,
//! the filter parameter set, and cache key derivation. Key derivation lives
//! here because the HTTP endpoint and the cache warmer must compute identical
//! keys from one shared implementation.

pub mod dataset;
pub mod error;
pub mod geojson;
pub mod keys;
pub mod params;

pub use dataset::Dataset;
pub use error::{GeoError, GeoResult};
pub use geojson::{Feature, FeatureCollection, Geometry};
pub use params::FilterSet;
