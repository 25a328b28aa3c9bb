//! Thin pgvector client over a `sqlx` connection pool.
//!
//! Table layout:
//!
//! ```sql
//! CREATE TABLE "<name>" (
//!     id TEXT PRIMARY KEY,
//!     content TEXT,
//!     metadata JSONB,
//!     embedding vector(<dimensions>),
//!     "timestamp" TIMESTAMPTZ
//! )
//! ```

use chrono::Utc;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::FromRow;
use tracing::{debug, trace};
use vecstore_core::filter::validate_collection_name;
use vecstore_core::{DistanceStrategy, Metadata, MetadataFilter, StoreError, StoreResult, Vector};

use super::BACKEND;

fn pg_error(err: sqlx::Error) -> StoreError {
    StoreError::backend(BACKEND, err)
}

// ============================================================================
// Rows
// ============================================================================

/// A row as read back from a collection table.
#[derive(Debug, FromRow)]
pub struct PgRecord {
    pub id: String,
    pub content: Option<String>,
    pub metadata: Option<Json<Metadata>>,
    #[sqlx(default)]
    pub embedding: Option<pgvector::Vector>,
    #[sqlx(default)]
    pub distance: Option<f64>,
}

impl PgRecord {
    /// Convert into the canonical record. The distance is carried over when
    /// the query selected one.
    pub fn into_vector(self) -> Vector {
        let mut vector = Vector::with_id(self.id, self.content.unwrap_or_default())
            .with_metadata_map(self.metadata.map(|m| m.0).unwrap_or_default());
        vector.embedding = self.embedding.map(|e| e.to_vec());
        vector.distance = self.distance.map(|d| d as f32);
        vector
    }
}

// ============================================================================
// SQL text
// ============================================================================

fn operator(strategy: DistanceStrategy) -> &'static str {
    match strategy {
        DistanceStrategy::Cosine => "<=>",
        DistanceStrategy::Euclidean => "<->",
        DistanceStrategy::InnerProduct => "<#>",
    }
}

/// Higher-is-better expression matching `DistanceStrategy::relevance`.
fn relevance_expr(strategy: DistanceStrategy) -> &'static str {
    match strategy {
        DistanceStrategy::Cosine => "1 - (embedding <=> $1)",
        DistanceStrategy::Euclidean => "1 / (1 + (embedding <-> $1))",
        DistanceStrategy::InnerProduct => "-(embedding <#> $1)",
    }
}

pub(crate) fn create_table_sql(table: &str, dimensions: usize) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS \"{table}\" (\
         id TEXT PRIMARY KEY, \
         content TEXT, \
         metadata JSONB, \
         embedding vector({dimensions}), \
         \"timestamp\" TIMESTAMPTZ)"
    )
}

pub(crate) fn upsert_sql(table: &str) -> String {
    format!(
        "INSERT INTO \"{table}\" (id, content, metadata, embedding, \"timestamp\") \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (id) DO UPDATE SET \
         content = EXCLUDED.content, \
         metadata = EXCLUDED.metadata, \
         embedding = EXCLUDED.embedding, \
         \"timestamp\" = EXCLUDED.\"timestamp\""
    )
}

/// Nearest rows. Params: `$1` query vector, `$2` limit, and `$3` minimum
/// relevance when `with_threshold` is set.
pub(crate) fn search_sql(table: &str, strategy: DistanceStrategy, with_threshold: bool) -> String {
    let op = operator(strategy);
    let mut sql = format!(
        "SELECT id, content, metadata, (embedding {op} $1)::float8 AS distance \
         FROM \"{table}\" WHERE embedding IS NOT NULL"
    );
    if with_threshold {
        sql.push_str(&format!(" AND {} >= $3", relevance_expr(strategy)));
    }
    sql.push_str(&format!(" ORDER BY embedding {op} $1 LIMIT $2"));
    sql
}

pub(crate) fn select_by_metadata_sql(table: &str) -> String {
    format!("SELECT id, content, metadata FROM \"{table}\" WHERE metadata @> $1::jsonb")
}

// ============================================================================
// PgVectorClient
// ============================================================================

/// Shared handle for pgvector tables in one database.
///
/// Every method that takes a table name validates it before building SQL.
#[derive(Debug, Clone)]
pub struct PgVectorClient {
    pool: PgPool,
}

impl PgVectorClient {
    /// Connect a new pool.
    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        debug!("Connecting to PostgreSQL (max_connections={})", max_connections);
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(pg_error)?;
        Ok(Self { pool })
    }

    /// Use an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// `CREATE EXTENSION IF NOT EXISTS vector`.
    pub async fn create_extension(&self) -> StoreResult<()> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await
            .map_err(pg_error)?;
        Ok(())
    }

    /// Create a collection table if it doesn't exist.
    pub async fn create_table(&self, table: &str, dimensions: usize) -> StoreResult<()> {
        validate_collection_name(table)?;
        if dimensions == 0 {
            return Err(StoreError::invalid_argument("Dimensions must be at least 1"));
        }

        debug!("Ensuring table '{}' exists ({} dimensions)", table, dimensions);
        sqlx::query(&create_table_sql(table, dimensions))
            .execute(&self.pool)
            .await
            .map_err(pg_error)?;
        Ok(())
    }

    /// Insert or replace one row.
    pub async fn upsert(&self, table: &str, item: &Vector) -> StoreResult<()> {
        validate_collection_name(table)?;

        let embedding = item.embedding.clone().map(pgvector::Vector::from);

        sqlx::query(&upsert_sql(table))
            .bind(&item.id)
            .bind(&item.text)
            .bind(Json(&item.metadata))
            .bind(embedding)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(pg_error)?;
        Ok(())
    }

    /// Fetch one row by id.
    pub async fn get_record_by_id(
        &self,
        table: &str,
        id: &str,
        with_embeddings: bool,
    ) -> StoreResult<Option<PgRecord>> {
        validate_collection_name(table)?;

        let columns = if with_embeddings {
            "id, content, metadata, embedding"
        } else {
            "id, content, metadata"
        };
        let sql = format!("SELECT {columns} FROM \"{table}\" WHERE id = $1");

        sqlx::query_as::<_, PgRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(pg_error)
    }

    /// Delete every row whose id is in `ids`. Returns the number removed.
    pub async fn delete_batch(&self, table: &str, ids: &[String]) -> StoreResult<u64> {
        validate_collection_name(table)?;
        let sql = format!("DELETE FROM \"{table}\" WHERE id = ANY($1)");
        let result = sqlx::query(&sql)
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(pg_error)?;
        Ok(result.rows_affected())
    }

    /// Nearest rows with their distance, closest first.
    pub async fn get_with_distance(
        &self,
        table: &str,
        query: &[f32],
        limit: usize,
        strategy: DistanceStrategy,
        min_relevance: Option<f32>,
    ) -> StoreResult<Vec<PgRecord>> {
        validate_collection_name(table)?;

        let sql = search_sql(table, strategy, min_relevance.is_some());
        trace!("pgvector search: {}", sql);

        let mut query = sqlx::query_as::<_, PgRecord>(&sql)
            .bind(pgvector::Vector::from(query.to_vec()))
            .bind(i64::try_from(limit).unwrap_or(i64::MAX));
        if let Some(threshold) = min_relevance {
            query = query.bind(f64::from(threshold));
        }

        query.fetch_all(&self.pool).await.map_err(pg_error)
    }

    /// Rows whose metadata contains every pair in `filters`.
    pub async fn get_records_by_metadata(
        &self,
        table: &str,
        filters: &MetadataFilter,
    ) -> StoreResult<Vec<PgRecord>> {
        validate_collection_name(table)?;
        sqlx::query_as::<_, PgRecord>(&select_by_metadata_sql(table))
            .bind(Json(filters))
            .fetch_all(&self.pool)
            .await
            .map_err(pg_error)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_table_sql() {
        let sql = create_table_sql("docs", 384);
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"docs\""));
        assert!(sql.contains("metadata JSONB"));
        assert!(sql.contains("embedding vector(384)"));
        assert!(sql.contains("\"timestamp\" TIMESTAMPTZ"));
    }

    #[test]
    fn test_upsert_sql_updates_on_conflict() {
        let sql = upsert_sql("docs");
        assert!(sql.contains("ON CONFLICT (id) DO UPDATE SET"));
        assert!(sql.contains("embedding = EXCLUDED.embedding"));
    }

    #[test]
    fn test_search_sql_per_strategy() {
        let cosine = search_sql("docs", DistanceStrategy::Cosine, false);
        assert_eq!(
            cosine,
            "SELECT id, content, metadata, (embedding <=> $1)::float8 AS distance \
             FROM \"docs\" WHERE embedding IS NOT NULL \
             ORDER BY embedding <=> $1 LIMIT $2"
        );

        let l2 = search_sql("docs", DistanceStrategy::Euclidean, true);
        assert!(l2.contains("AND 1 / (1 + (embedding <-> $1)) >= $3"));
        assert!(l2.ends_with("ORDER BY embedding <-> $1 LIMIT $2"));

        let ip = search_sql("docs", DistanceStrategy::InnerProduct, true);
        assert!(ip.contains("AND -(embedding <#> $1) >= $3"));
    }

    #[test]
    fn test_metadata_sql_uses_containment() {
        assert!(select_by_metadata_sql("docs").ends_with("WHERE metadata @> $1::jsonb"));
    }

    #[tokio::test]
    async fn test_table_names_are_validated_before_any_query() {
        // Never connects: the pool is lazy and validation fails first.
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let client = PgVectorClient::from_pool(pool);
        let bad = "docs\"; DROP TABLE docs; --";
        let item = Vector::with_id("a", "t").with_embedding(vec![1.0]);
        let mut filters = MetadataFilter::new();
        filters.insert("k".to_string(), "v".into());

        assert!(client.upsert(bad, &item).await.unwrap_err().is_invalid_argument());
        assert!(client
            .get_record_by_id(bad, "a", false)
            .await
            .unwrap_err()
            .is_invalid_argument());
        assert!(client
            .delete_batch(bad, &["a".to_string()])
            .await
            .unwrap_err()
            .is_invalid_argument());
        assert!(client
            .get_with_distance(bad, &[1.0], 5, DistanceStrategy::Cosine, None)
            .await
            .unwrap_err()
            .is_invalid_argument());
        assert!(client
            .get_records_by_metadata(bad, &filters)
            .await
            .unwrap_err()
            .is_invalid_argument());
        assert!(client.create_table(bad, 3).await.unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_record_into_vector() {
        let mut metadata = Metadata::new();
        metadata.insert("page".to_string(), 3.into());

        let record = PgRecord {
            id: "a".to_string(),
            content: None,
            metadata: Some(Json(metadata.clone())),
            embedding: None,
            distance: Some(0.25),
        };

        let vector = record.into_vector();
        assert_eq!(vector.id, "a");
        assert_eq!(vector.text, "");
        assert_eq!(vector.metadata, metadata);
        assert!(vector.embedding.is_none());
        assert_eq!(vector.distance, Some(0.25));
    }
}
