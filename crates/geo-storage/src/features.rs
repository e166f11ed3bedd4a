//! PostGIS-backed feature queries.
//!
//! Geometry simplification is delegated to the database as a computed
//! expression (`ST_SimplifyPreserveTopology`) so it stays a single auditable
//! step per row and cannot produce topologically invalid polygons. The cache
//! layer only decides *when* simplification is requested; this module applies
//! it uniformly to polygon layers on both the request and warm paths.

use async_trait::async_trait;
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, QueryBuilder, Row};

use geo_common::{
    Dataset, Feature, FeatureCollection, FilterSet, GeoError, GeoResult, Geometry,
};

/// Read-only source of GeoJSON feature collections and summaries.
#[async_trait]
pub trait FeatureSource: Send + Sync {
    /// Execute the filtered query and serialize matching rows as features.
    ///
    /// `tolerance` is the simplification tolerance in the geometry's native
    /// coordinate units; it is ignored for layers that do not simplify.
    async fn feature_collection(
        &self,
        dataset: Dataset,
        filters: &FilterSet,
        tolerance: f64,
    ) -> GeoResult<FeatureCollection>;

    /// Labeled scalar summaries for the filtered query (feature counts).
    async fn summaries(&self, dataset: Dataset, filters: &FilterSet)
        -> GeoResult<serde_json::Value>;
}

/// Filter fields that must parse as integers, per dataset.
fn integer_fields(dataset: Dataset) -> &'static [&'static str] {
    match dataset {
        Dataset::Trees => &["pflanzjahr"],
        Dataset::Collections => &["id"],
    }
}

/// Filter fields interpreted as text predicates, per dataset.
fn text_fields(dataset: Dataset) -> &'static [&'static str] {
    match dataset {
        Dataset::Trees => &["bezirk", "gattung"],
        Dataset::Collections => &["country", "collection_system", "waste_category"],
    }
}

/// Validate typed filter values before any cache or database access.
///
/// A malformed value is a client error; it must never reach the cache layer
/// or populate a cache entry.
pub fn validate_filters(dataset: Dataset, filters: &FilterSet) -> GeoResult<()> {
    for field in integer_fields(dataset) {
        if let Some(values) = filters.get(field) {
            for value in values {
                value.parse::<i64>().map_err(|_| GeoError::InvalidFilter {
                    param: (*field).to_string(),
                    message: format!("'{}' is not an integer", value),
                })?;
            }
        }
    }
    Ok(())
}

/// Parse the already-validated integer values of a filter field.
fn integer_values(filters: &FilterSet, field: &str) -> Option<Vec<i64>> {
    filters.get(field).map(|values| {
        values
            .iter()
            .filter_map(|v| v.parse::<i64>().ok())
            .collect()
    })
}

/// PostGIS feature source.
pub struct PostgresFeatureSource {
    pool: PgPool,
}

impl PostgresFeatureSource {
    /// Connect to PostgreSQL/PostGIS.
    pub async fn connect(database_url: &str) -> GeoResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| GeoError::DataSource(format!("Connection failed: {}", e)))?;

        Ok(Self { pool })
    }

    /// Append `AND <field> = ANY(...)` predicates for present filters.
    ///
    /// Unknown filter keys are ignored here; they still participate in cache
    /// key derivation, which only creates harmless extra key variants.
    fn push_predicates<'a>(
        qb: &mut QueryBuilder<'a, sqlx::Postgres>,
        dataset: Dataset,
        filters: &'a FilterSet,
    ) {
        for field in text_fields(dataset) {
            if let Some(values) = filters.get(field) {
                qb.push(format!(" AND {} = ANY(", field));
                qb.push_bind(values.to_vec());
                qb.push(")");
            }
        }
        for field in integer_fields(dataset) {
            if let Some(values) = integer_values(filters, field) {
                qb.push(format!(" AND {} = ANY(", field));
                qb.push_bind(values);
                qb.push(")");
            }
        }
    }

    async fn tree_features(&self, filters: &FilterSet) -> GeoResult<FeatureCollection> {
        let mut qb: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "SELECT id, gattung, bezirk, pflanzjahr, ST_AsGeoJSON(geom) AS geom \
             FROM roadside_trees WHERE geom IS NOT NULL",
        );
        Self::push_predicates(&mut qb, Dataset::Trees, filters);
        qb.push(" ORDER BY id");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| GeoError::DataSource(format!("Query failed: {}", e)))?;

        let mut features = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row
                .try_get("id")
                .map_err(|e| GeoError::DataSource(format!("Row decode failed: {}", e)))?;
            let geom_json: String = row
                .try_get("geom")
                .map_err(|e| GeoError::DataSource(format!("Row decode failed: {}", e)))?;
            let geometry: Geometry = serde_json::from_str(&geom_json)?;

            let gattung: Option<String> = row.try_get("gattung").ok();
            let bezirk: Option<String> = row.try_get("bezirk").ok();
            let pflanzjahr: Option<i32> = row.try_get("pflanzjahr").ok().flatten();

            features.push(
                Feature::new(geometry)
                    .with_id(id)
                    .with_property("gattung", json!(gattung))
                    .with_property("bezirk", json!(bezirk))
                    .with_property("pflanzjahr", json!(pflanzjahr)),
            );
        }

        Ok(FeatureCollection::new().with_features(features))
    }

    async fn collection_features(
        &self,
        filters: &FilterSet,
        tolerance: f64,
    ) -> GeoResult<FeatureCollection> {
        let mut qb: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "SELECT id, name, country, collection_system, waste_category, \
             ST_AsGeoJSON(ST_SimplifyPreserveTopology(catchment_geom, ",
        );
        qb.push_bind(tolerance);
        qb.push(
            ")) AS geom FROM waste_collections \
             WHERE publication_status = 'published' AND catchment_geom IS NOT NULL",
        );
        Self::push_predicates(&mut qb, Dataset::Collections, filters);
        qb.push(" ORDER BY id");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| GeoError::DataSource(format!("Query failed: {}", e)))?;

        let mut features = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row
                .try_get("id")
                .map_err(|e| GeoError::DataSource(format!("Row decode failed: {}", e)))?;
            let geom_json: String = row
                .try_get("geom")
                .map_err(|e| GeoError::DataSource(format!("Row decode failed: {}", e)))?;
            let geometry: Geometry = serde_json::from_str(&geom_json)?;

            let name: Option<String> = row.try_get("name").ok();
            let country: Option<String> = row.try_get("country").ok();
            let system: Option<String> = row.try_get("collection_system").ok();
            let category: Option<String> = row.try_get("waste_category").ok();

            features.push(
                Feature::new(geometry)
                    .with_id(id)
                    .with_property("name", json!(name))
                    .with_property("country", json!(country))
                    .with_property("collection_system", json!(system))
                    .with_property("waste_category", json!(category)),
            );
        }

        Ok(FeatureCollection::new().with_features(features))
    }

    async fn count_summaries(
        &self,
        dataset: Dataset,
        filters: &FilterSet,
    ) -> GeoResult<serde_json::Value> {
        let (base, distinct_label) = match dataset {
            Dataset::Trees => (
                "SELECT COUNT(*) AS total_count, COUNT(DISTINCT bezirk) AS distinct_count \
                 FROM roadside_trees WHERE geom IS NOT NULL",
                "districts",
            ),
            Dataset::Collections => (
                "SELECT COUNT(*) AS total_count, COUNT(DISTINCT country) AS distinct_count \
                 FROM waste_collections \
                 WHERE publication_status = 'published' AND catchment_geom IS NOT NULL",
                "countries",
            ),
        };

        let mut qb: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(base);
        Self::push_predicates(&mut qb, dataset, filters);

        let row = qb
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| GeoError::DataSource(format!("Query failed: {}", e)))?;

        let total: i64 = row
            .try_get("total_count")
            .map_err(|e| GeoError::DataSource(format!("Row decode failed: {}", e)))?;
        let distinct: i64 = row
            .try_get("distinct_count")
            .map_err(|e| GeoError::DataSource(format!("Row decode failed: {}", e)))?;

        let mut summaries = serde_json::Map::new();
        summaries.insert("total_count".to_string(), json!(total));
        summaries.insert(distinct_label.to_string(), json!(distinct));

        Ok(json!({ "summaries": summaries }))
    }
}

#[async_trait]
impl FeatureSource for PostgresFeatureSource {
    async fn feature_collection(
        &self,
        dataset: Dataset,
        filters: &FilterSet,
        tolerance: f64,
    ) -> GeoResult<FeatureCollection> {
        match dataset {
            Dataset::Trees => self.tree_features(filters).await,
            Dataset::Collections => self.collection_features(filters, tolerance).await,
        }
    }

    async fn summaries(
        &self,
        dataset: Dataset,
        filters: &FilterSet,
    ) -> GeoResult<serde_json::Value> {
        self.count_summaries(dataset, filters).await
    }
}
