//! Vector collection backends.
//!
//! ## Available Backends
//!
//! - `sqlite`: embedded database, linear-scan search
//! - `postgres`: PostgreSQL with pgvector, server-side distance operators
//! - `mongodb`: MongoDB Atlas `$vectorSearch`

#[cfg(feature = "mongodb")]
mod mongo;

#[cfg(feature = "postgres")]
mod postgres;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "mongodb")]
pub use mongo::{
    metadata_filter, rank_search_results, search_pipeline, MongoVectorCollection,
    MongoVectorDocument,
};

#[cfg(feature = "postgres")]
pub use postgres::{PgRecord, PgVectorClient, PostgresVectorCollection};

#[cfg(feature = "sqlite")]
pub use sqlite::{register_distance_function, SqliteVectorCollection, DISTANCE_FUNCTION};

use std::sync::Arc;
use tracing::debug;
use vecstore_core::{BackendConfig, CollectionConfig, StoreError, StoreResult, VectorCollection};

/// Open the collection described by `config`.
///
/// Connects to the configured engine and, when the config asks for it,
/// creates the table. The collection id comes from the config or is
/// generated.
///
/// # Errors
///
/// Returns an error if:
/// - The config fails validation
/// - The backend's feature is not enabled (`Unsupported`)
/// - The engine cannot be reached or provisioned
pub async fn open_collection(config: &CollectionConfig) -> StoreResult<Arc<dyn VectorCollection>> {
    config.validate()?;
    debug!(
        "Opening collection '{}' on {}",
        config.name,
        config.backend.kind()
    );

    let info = config.info();

    match &config.backend {
        BackendConfig::Sqlite {
            path,
            create_if_missing,
        } => {
            #[cfg(feature = "sqlite")]
            {
                let path = path.clone();
                let create_if_missing = *create_if_missing;
                let collection = tokio::task::spawn_blocking(move || {
                    SqliteVectorCollection::open(info, path.as_deref(), create_if_missing)
                })
                .await
                .map_err(|e| StoreError::internal(format!("SQLite open task failed: {}", e)))??;
                Ok(Arc::new(collection))
            }

            #[cfg(not(feature = "sqlite"))]
            {
                let _ = (path, create_if_missing, info);
                Err(StoreError::unsupported("open_collection", "sqlite"))
            }
        }

        BackendConfig::Postgres {
            url,
            max_connections,
            dimensions,
            create_if_missing,
        } => {
            #[cfg(feature = "postgres")]
            {
                let client = PgVectorClient::connect(url, *max_connections).await?;
                if *create_if_missing {
                    let dimensions = dimensions.ok_or_else(|| {
                        StoreError::config("dimensions is required when createIfMissing is set")
                    })?;
                    client.create_extension().await?;
                    client.create_table(&info.name, dimensions).await?;
                }
                Ok(Arc::new(PostgresVectorCollection::new(client, info)?))
            }

            #[cfg(not(feature = "postgres"))]
            {
                let _ = (url, max_connections, dimensions, create_if_missing, info);
                Err(StoreError::unsupported("open_collection", "postgres"))
            }
        }

        BackendConfig::Mongodb {
            uri,
            database,
            index_name,
            candidate_multiplier,
        } => {
            #[cfg(feature = "mongodb")]
            {
                let collection =
                    MongoVectorCollection::connect(uri, database, info, index_name.clone())
                        .await?
                        .with_candidate_multiplier(*candidate_multiplier);
                Ok(Arc::new(collection))
            }

            #[cfg(not(feature = "mongodb"))]
            {
                let _ = (uri, database, index_name, candidate_multiplier, info);
                Err(StoreError::unsupported("open_collection", "mongodb"))
            }
        }
    }
}

/// Get a list of available backend names.
#[allow(clippy::vec_init_then_push)]
pub fn available_backends() -> Vec<&'static str> {
    let mut backends = Vec::new();

    #[cfg(feature = "sqlite")]
    backends.push("sqlite");

    #[cfg(feature = "postgres")]
    backends.push("postgres");

    #[cfg(feature = "mongodb")]
    backends.push("mongodb");

    backends
}

// ============================================================================
// Tests
// ============================================================================
