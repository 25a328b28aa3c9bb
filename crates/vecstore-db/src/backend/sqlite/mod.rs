//! SQLite vector collection backend.
//!
//! One table per collection with three text columns: `id`, `vector` (the
//! embedding as a JSON array) and `document` (text and metadata as a JSON
//! object). Similarity search evaluates the registered `distance` function
//! on every row, so it is a linear scan with no index.

mod distance;
mod sql;

pub use distance::{register_distance_function, DISTANCE_FUNCTION};

use async_trait::async_trait;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};
use vecstore_core::collection::{require_embeddings, require_finite, require_ids, require_items};
use vecstore_core::filter::{validate_collection_name, validate_filters};
use vecstore_core::scoring::{meets_threshold, normalize_results, RawScore};
use vecstore_core::vector::collect_ids;
use vecstore_core::{
    CollectionInfo, Metadata, MetadataFilter, MetadataValue, StoreError, StoreResult, Vector,
    VectorCollection, VectorSearchRequest, VectorSearchResponse, VectorSearchSettings,
};

const BACKEND: &str = "sqlite";

fn sqlite_error(err: rusqlite::Error) -> StoreError {
    StoreError::backend(BACKEND, err)
}

// ============================================================================
// Row marshaling
// ============================================================================

/// Body stored in the `document` column.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredDocument {
    #[serde(default)]
    text: String,
    #[serde(default)]
    metadata: Metadata,
}

/// A row prepared for insertion, serialized before any I/O.
struct EncodedRow {
    id: String,
    vector: String,
    document: String,
}

impl EncodedRow {
    fn encode(item: &Vector, embedding: &[f32]) -> StoreResult<Self> {
        let document = StoredDocument {
            text: item.text.clone(),
            metadata: item.metadata.clone(),
        };
        Ok(Self {
            id: item.id.clone(),
            vector: serde_json::to_string(embedding)?,
            document: serde_json::to_string(&document)?,
        })
    }
}

/// A JSON `null` document decodes to an empty one.
fn decode_document(raw: &str) -> StoreResult<StoredDocument> {
    Ok(serde_json::from_str::<Option<StoredDocument>>(raw)?.unwrap_or_default())
}

fn decode_embedding(raw: &str) -> StoreResult<Option<Vec<f32>>> {
    Ok(serde_json::from_str::<Option<Vec<f32>>>(raw)?)
}

fn decode_row(id: String, vector: &str, document: &str) -> StoreResult<Vector> {
    let document = decode_document(document)?;
    Ok(Vector {
        id,
        text: document.text,
        metadata: document.metadata,
        embedding: decode_embedding(vector)?,
        distance: None,
    })
}

/// Bound parameter matching the predicate `sql::select_by_metadata` emits.
fn to_sql_value(value: &MetadataValue) -> rusqlite::types::Value {
    use rusqlite::types::Value;

    match value {
        MetadataValue::Bool(true) => Value::Text("true".to_string()),
        MetadataValue::Bool(false) => Value::Text("false".to_string()),
        MetadataValue::Integer(i) => Value::Integer(*i),
        MetadataValue::Float(f) => Value::Real(*f),
        MetadataValue::String(s) => Value::Text(s.clone()),
    }
}

// ============================================================================
// SqliteVectorCollection
// ============================================================================

/// Vector collection stored in a SQLite table.
///
/// The connection is not `Sync`, so it sits behind a mutex and every
/// operation runs on the blocking thread pool.
pub struct SqliteVectorCollection {
    info: CollectionInfo,
    connection: Arc<Mutex<Connection>>,
}

impl SqliteVectorCollection {
    /// Wrap an existing connection.
    ///
    /// Registers the `distance` function on it. The table must already exist
    /// unless [`create_table`](Self::create_table) is called.
    pub fn new(connection: Connection, info: CollectionInfo) -> StoreResult<Self> {
        validate_collection_name(&info.name)?;
        register_distance_function(&connection).map_err(sqlite_error)?;

        Ok(Self {
            info,
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Open a database file, or an in-memory database when `path` is `None`.
    pub fn open(
        info: CollectionInfo,
        path: Option<&Path>,
        create_if_missing: bool,
    ) -> StoreResult<Self> {
        validate_collection_name(&info.name)?;
        debug!("Opening SqliteVectorCollection '{}' at {:?}", info.name, path);

        let connection = match path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|e| StoreError::backend(BACKEND, e))?;
                }
                Connection::open(path)
            }
            None => Connection::open_in_memory(),
        }
        .map_err(sqlite_error)?;

        if create_if_missing {
            debug!("Ensuring table '{}' exists", info.name);
            connection
                .execute(&sql::create_table(&info.name), [])
                .map_err(sqlite_error)?;
        }

        Self::new(connection, info)
    }

    /// Create the collection table if it doesn't exist.
    pub async fn create_table(&self) -> StoreResult<()> {
        let statement = sql::create_table(&self.info.name);
        self.run(move |conn| {
            conn.execute(&statement, []).map_err(sqlite_error)?;
            Ok(())
        })
        .await
    }

    /// Run a closure against the connection on the blocking pool.
    async fn run<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
    {
        let connection = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || {
            let conn = connection
                .lock()
                .map_err(|e| StoreError::internal(format!("Failed to acquire connection lock: {}", e)))?;
            op(&conn)
        })
        .await
        .map_err(|e| StoreError::internal(format!("SQLite task failed: {}", e)))?
    }
}

#[async_trait]
impl VectorCollection for SqliteVectorCollection {
    fn info(&self) -> &CollectionInfo {
        &self.info
    }

    async fn add(&self, items: &[Vector]) -> StoreResult<Vec<String>> {
        require_items(items)?;
        require_embeddings(items)?;
        require_finite(items)?;

        let rows = items
            .iter()
            .filter_map(|item| item.embedding.as_deref().map(|e| EncodedRow::encode(item, e)))
            .collect::<StoreResult<Vec<_>>>()?;

        debug!("Inserting {} vectors into '{}'", rows.len(), self.info.name);

        let statement = sql::insert(&self.info.name);
        self.run(move |conn| {
            let mut stmt = conn.prepare_cached(&statement).map_err(sqlite_error)?;
            for row in &rows {
                stmt.execute(params![row.id, row.vector, row.document])
                    .map_err(sqlite_error)?;
            }
            Ok(())
        })
        .await?;

        Ok(collect_ids(items))
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Vector>> {
        let statement = sql::select_by_id(&self.info.name);
        let id = id.to_string();

        self.run(move |conn| {
            let row = conn
                .query_row(&statement, params![id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })
                .optional()
                .map_err(sqlite_error)?;

            row.map(|(vector, document)| decode_row(id, &vector, &document))
                .transpose()
        })
        .await
    }

    async fn delete(&self, ids: &[String]) -> StoreResult<bool> {
        require_ids(ids)?;
        debug!("Deleting {} vectors from '{}'", ids.len(), self.info.name);

        let statement = sql::delete(&self.info.name);
        let ids = ids.to_vec();
        self.run(move |conn| {
            let mut stmt = conn.prepare_cached(&statement).map_err(sqlite_error)?;
            for id in &ids {
                stmt.execute(params![id]).map_err(sqlite_error)?;
            }
            Ok(true)
        })
        .await
    }

    async fn is_empty(&self) -> StoreResult<bool> {
        let statement = sql::count(&self.info.name);
        self.run(move |conn| {
            let count: i64 = conn
                .query_row(&statement, [], |row| row.get(0))
                .map_err(sqlite_error)?;
            Ok(count == 0)
        })
        .await
    }

    async fn search(
        &self,
        request: &VectorSearchRequest,
        settings: &VectorSearchSettings,
    ) -> StoreResult<VectorSearchResponse> {
        settings.validate()?;
        let query = serde_json::to_string(request.query_embedding()?)?;
        let strategy = settings.distance_strategy;
        let limit = settings.number_of_results;
        let threshold = settings.score_threshold;

        trace!(
            "Searching '{}', limit={}, strategy={}",
            self.info.name,
            limit,
            strategy
        );

        let statement = sql::search(&self.info.name);
        let rows = self
            .run(move |conn| {
                let mut stmt = conn.prepare_cached(&statement).map_err(sqlite_error)?;
                let rows = stmt
                    .query_map(
                        params![query, strategy.as_str(), i64::try_from(limit).unwrap_or(i64::MAX)],
                        |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                row.get::<_, String>(1)?,
                                row.get::<_, f64>(2)?,
                            ))
                        },
                    )
                    .map_err(sqlite_error)?
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .map_err(sqlite_error)?;
                Ok(rows)
            })
            .await?;

        // Rows arrive in ascending distance and relevance falls with
        // distance, so filtering after LIMIT drops nothing a larger LIMIT
        // would have kept.
        let mut scored = Vec::with_capacity(rows.len());
        for (id, document, d) in rows {
            let d = d as f32;
            if !meets_threshold(strategy.relevance(d), threshold) {
                continue;
            }
            let document = decode_document(&document)?;
            let vector = Vector::with_id(id, document.text).with_metadata_map(document.metadata);
            scored.push((vector, RawScore::Distance(d)));
        }

        Ok(VectorSearchResponse::new(normalize_results(scored, limit)))
    }

    async fn search_by_metadata(&self, filters: &MetadataFilter) -> StoreResult<Vec<Vector>> {
        validate_filters(filters)?;

        let statement = sql::select_by_metadata(
            &self.info.name,
            filters.iter().map(|(key, value)| (key.as_str(), value)),
        );
        let values: Vec<rusqlite::types::Value> = filters.values().map(to_sql_value).collect();

        trace!(
            "Searching '{}' by {} metadata keys",
            self.info.name,
            values.len()
        );

        let rows = self
            .run(move |conn| {
                let mut stmt = conn.prepare(&statement).map_err(sqlite_error)?;
                let rows = stmt
                    .query_map(params_from_iter(values.iter()), |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    })
                    .map_err(sqlite_error)?
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .map_err(sqlite_error)?;
                Ok(rows)
            })
            .await?;

        rows.into_iter()
            .map(|(id, vector, document)| decode_row(id, &vector, &document))
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
