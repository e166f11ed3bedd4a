//! Cache key derivation for GeoJSON payloads.
//!
//! The key builder is pure: it performs no I/O and touches neither the cache
//! store nor the database. Both the HTTP endpoint and the cache warmer derive
//! keys through [`geojson_cache_key`]; duplicating this logic elsewhere would
//! silently desynchronize warm and serve paths.

use sha1::{Digest, Sha1};

use crate::dataset::Dataset;
use crate::params::FilterSet;

/// Digest length in hex characters (64 bits of a SHA-1 digest).
const DIGEST_LEN: usize = 16;

/// Derive the cache key for a dataset's GeoJSON payload.
///
/// Key forms:
/// - `tree_geojson:all` for the unfiltered fast path, no hashing
/// - `tree_geojson:filter:<16 hex chars>` for a filtered request
///
/// For layers with database-side simplification, the configured tolerance is
/// folded into the namespace (e.g. `collection_geojson:published:s0.0001:all`)
/// so a tolerance change can never serve geometry cached under the old value.
pub fn geojson_cache_key(dataset: Dataset, tolerance: f64, filters: &FilterSet) -> String {
    let namespace = key_namespace(dataset, tolerance);
    if filters.is_empty() {
        format!("{}:all", namespace)
    } else {
        format!("{}:filter:{}", namespace, filter_digest(filters))
    }
}

/// Namespace prefix for a dataset, including the tolerance version tag for
/// simplified layers.
pub fn key_namespace(dataset: Dataset, tolerance: f64) -> String {
    if dataset.simplifies_geometry() {
        format!("{}:s{}", dataset.namespace(), tolerance)
    } else {
        dataset.namespace().to_string()
    }
}

/// Fixed-length digest of a non-empty filter set.
pub fn filter_digest(filters: &FilterSet) -> String {
    let canonical = filters.canonical_json();
    let digest = format!("{:x}", Sha1::digest(canonical.as_bytes()));
    digest[..DIGEST_LEN].to_string()
}
