//! GeoJSON document types for feature responses.
//!
//! Feature payloads are serialized once on a cache miss and then served as
//! raw bytes, so these types only need to model the geometry shapes the
//! datasets actually produce (points for trees, polygons and multipolygons
//! for catchment borders).

use serde::{Deserialize, Serialize};

/// A GeoJSON FeatureCollection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureCollection {
    /// Type identifier (always "FeatureCollection").
    #[serde(rename = "type")]
    pub type_: String,

    /// Array of features.
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    /// Create a new empty FeatureCollection.
    pub fn new() -> Self {
        Self {
            type_: "FeatureCollection".to_string(),
            features: Vec::new(),
        }
    }

    /// Add multiple features to the collection.
    pub fn with_features(mut self, features: Vec<Feature>) -> Self {
        self.features.extend(features);
        self
    }

    /// Number of features in the collection.
    pub fn feature_count(&self) -> usize {
        self.features.len()
    }
}

impl Default for FeatureCollection {
    fn default() -> Self {
        Self::new()
    }
}

/// A GeoJSON Feature.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Feature {
    /// Type identifier (always "Feature").
    #[serde(rename = "type")]
    pub type_: String,

    /// Feature identifier (database primary key).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// The geometry of this feature.
    pub geometry: Geometry,

    /// Attribute properties.
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl Feature {
    /// Create a feature from a geometry with empty properties.
    pub fn new(geometry: Geometry) -> Self {
        Self {
            type_: "Feature".to_string(),
            id: None,
            geometry,
            properties: serde_json::Map::new(),
        }
    }

    /// Set the feature ID.
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    /// Set a property value.
    pub fn with_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// GeoJSON geometry types produced by the feature queries.
///
/// Deserializes directly from `ST_AsGeoJSON` output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Geometry {
    /// A point geometry.
    Point {
        /// Coordinates as [longitude, latitude].
        coordinates: [f64; 2],
    },

    /// A polygon geometry.
    Polygon {
        /// Array of linear rings (first is exterior, rest are holes).
        coordinates: Vec<Vec<[f64; 2]>>,
    },

    /// A multi-polygon geometry.
    MultiPolygon {
        /// Array of polygons.
        coordinates: Vec<Vec<Vec<[f64; 2]>>>,
    },
}

impl Geometry {
    /// Create a point geometry.
    pub fn point(lon: f64, lat: f64) -> Self {
        Geometry::Point {
            coordinates: [lon, lat],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_serialization() {
        let feature = Feature::new(Geometry::point(9.93, 53.55))
            .with_id(42)
            .with_property("gattung", "Tilia");

        let json = serde_json::to_string(&feature).unwrap();
        assert!(json.contains(r#""type":"Feature""#));
        assert!(json.contains(r#""type":"Point""#));
        assert!(json.contains(r#""id":42"#));
    }

    #[test]
    fn test_geometry_from_st_asgeojson_output() {
        let point: Geometry =
            serde_json::from_str(r#"{"type":"Point","coordinates":[9.93,53.55]}"#).unwrap();
        assert_eq!(point, Geometry::point(9.93, 53.55));

        let polygon: Geometry = serde_json::from_str(
            r#"{"type":"Polygon","coordinates":[[[0.0,0.0],[1.0,0.0],[1.0,1.0],[0.0,0.0]]]}"#,
        )
        .unwrap();
        assert!(matches!(polygon, Geometry::Polygon { .. }));

        let multi: Geometry = serde_json::from_str(
            r#"{"type":"MultiPolygon","coordinates":[[[[0.0,0.0],[1.0,0.0],[1.0,1.0],[0.0,0.0]]]]}"#,
        )
        .unwrap();
        assert!(matches!(multi, Geometry::MultiPolygon { .. }));
    }

    #[test]
    fn test_collection_serialization_is_deterministic() {
        let collection = FeatureCollection::new().with_features(vec![
            Feature::new(Geometry::point(1.0, 2.0)).with_id(1),
            Feature::new(Geometry::point(3.0, 4.0)).with_id(2),
        ]);

        let a = serde_json::to_vec(&collection).unwrap();
        let b = serde_json::to_vec(&collection).unwrap();
        assert_eq!(a, b);
        assert_eq!(collection.feature_count(), 2);
    }
}
