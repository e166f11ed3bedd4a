//! Dataset identifiers for the cached GeoJSON layers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::GeoError;

/// A geometry dataset served through the cached GeoJSON endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    /// Roadside trees (point features).
    Trees,
    /// Waste collection systems with catchment borders (polygon features).
    Collections,
}

impl Dataset {
    /// All datasets, in warm order.
    pub const ALL: [Dataset; 2] = [Dataset::Trees, Dataset::Collections];

    /// Cache key namespace for this dataset.
    ///
    /// Collections are only served in the published scope, so the scope tag
    /// is part of the namespace rather than a filter parameter.
    pub fn namespace(&self) -> &'static str {
        match self {
            Dataset::Trees => "tree_geojson",
            Dataset::Collections => "collection_geojson:published",
        }
    }

    /// Whether geometry simplification applies to this layer.
    ///
    /// Only polygon layers are simplified; point layers pass through
    /// unchanged on both the request and warm paths.
    pub fn simplifies_geometry(&self) -> bool {
        matches!(self, Dataset::Collections)
    }

}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dataset::Trees => write!(f, "trees"),
            Dataset::Collections => write!(f, "collections"),
        }
    }
}

impl FromStr for Dataset {
    type Err = GeoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trees" => Ok(Dataset::Trees),
            "collections" => Ok(Dataset::Collections),
            other => Err(GeoError::UnknownDataset(other.to_string())),
        }
    }
}
