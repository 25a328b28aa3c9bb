//! Collection configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::collection::{CollectionInfo, DEFAULT_COLLECTION_NAME};
use crate::error::{StoreError, StoreResult};
use crate::filter::validate_collection_name;

// ============================================================================
// Constants
// ============================================================================

/// Candidate pool size for approximate search, as a multiple of the
/// requested result count.
pub const DEFAULT_CANDIDATE_MULTIPLIER: usize = 10;

/// Default size of the PostgreSQL connection pool.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Filename of the SQLite database under the default data directory.
pub const DEFAULT_DATABASE_FILENAME: &str = "vectors.db";

// ============================================================================
// BackendConfig
// ============================================================================

/// Engine a collection is bound to, and how to reach it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Embedded SQLite database file.
    #[serde(rename_all = "camelCase")]
    Sqlite {
        /// Database file. `None` opens an in-memory database.
        #[serde(default)]
        path: Option<PathBuf>,

        /// Create the collection table if it doesn't exist.
        #[serde(default = "default_true")]
        create_if_missing: bool,
    },

    /// PostgreSQL with the pgvector extension.
    #[serde(rename_all = "camelCase")]
    Postgres {
        /// Connection URL.
        url: String,

        /// Connection pool size.
        #[serde(default = "default_max_connections")]
        max_connections: u32,

        /// Embedding dimensions, needed only to create the table.
        #[serde(default)]
        dimensions: Option<usize>,

        /// Create the extension and table if they don't exist.
        #[serde(default)]
        create_if_missing: bool,
    },

    /// MongoDB with an Atlas vector search index.
    #[serde(rename_all = "camelCase")]
    Mongodb {
        /// Connection URI.
        uri: String,

        /// Database holding the collection.
        database: String,

        /// Name of the pre-created vector search index.
        index_name: String,

        /// Candidate pool multiplier for `$vectorSearch`.
        #[serde(default = "default_candidate_multiplier")]
        candidate_multiplier: usize,
    },
}

fn default_true() -> bool {
    true
}

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

fn default_candidate_multiplier() -> usize {
    DEFAULT_CANDIDATE_MULTIPLIER
}

impl BackendConfig {
    /// In-memory SQLite.
    pub fn sqlite_in_memory() -> Self {
        BackendConfig::Sqlite {
            path: None,
            create_if_missing: true,
        }
    }

    /// SQLite database file.
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        BackendConfig::Sqlite {
            path: Some(path.into()),
            create_if_missing: true,
        }
    }

    /// PostgreSQL at `url`.
    pub fn postgres(url: impl Into<String>) -> Self {
        BackendConfig::Postgres {
            url: url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            dimensions: None,
            create_if_missing: false,
        }
    }

    /// MongoDB at `uri`.
    pub fn mongodb(
        uri: impl Into<String>,
        database: impl Into<String>,
        index_name: impl Into<String>,
    ) -> Self {
        BackendConfig::Mongodb {
            uri: uri.into(),
            database: database.into(),
            index_name: index_name.into(),
            candidate_multiplier: DEFAULT_CANDIDATE_MULTIPLIER,
        }
    }

    /// Backend name, matching the cargo feature that provides it.
    pub fn kind(&self) -> &'static str {
        match self {
            BackendConfig::Sqlite { .. } => "sqlite",
            BackendConfig::Postgres { .. } => "postgres",
            BackendConfig::Mongodb { .. } => "mongodb",
        }
    }
}

// ============================================================================
// CollectionConfig
// ============================================================================

/// Configuration for opening a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionConfig {
    /// Collection name (table or collection in the engine).
    #[serde(default = "default_name")]
    pub name: String,

    /// Collection id. Generated when absent.
    #[serde(default)]
    pub id: Option<String>,

    /// Engine settings.
    pub backend: BackendConfig,
}

fn default_name() -> String {
    DEFAULT_COLLECTION_NAME.to_string()
}

impl CollectionConfig {
    /// Create a new config with required fields.
    pub fn new(name: impl Into<String>, backend: BackendConfig) -> Self {
        Self {
            name: name.into(),
            id: None,
            backend,
        }
    }

    /// Set the collection id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Check values that would otherwise fail deep inside a backend.
    pub fn validate(&self) -> StoreResult<()> {
        validate_collection_name(&self.name)?;

        match &self.backend {
            BackendConfig::Postgres {
                max_connections,
                dimensions,
                create_if_missing,
                ..
            } => {
                if *max_connections == 0 {
                    return Err(StoreError::config("maxConnections must be at least 1"));
                }
                if *create_if_missing && dimensions.unwrap_or(0) == 0 {
                    return Err(StoreError::config(
                        "dimensions is required when createIfMissing is set",
                    ));
                }
            }
            BackendConfig::Mongodb {
                index_name,
                candidate_multiplier,
                ..
            } => {
                if index_name.trim().is_empty() {
                    return Err(StoreError::config("indexName cannot be empty"));
                }
                if *candidate_multiplier == 0 {
                    return Err(StoreError::config("candidateMultiplier must be at least 1"));
                }
            }
            BackendConfig::Sqlite { .. } => {}
        }

        Ok(())
    }

    /// Identity for the collection this config opens.
    pub fn info(&self) -> CollectionInfo {
        match &self.id {
            Some(id) => CollectionInfo::with_id(&self.name, id),
            None => CollectionInfo::new(&self.name),
        }
    }
}

/// Per-user location for a SQLite database file.
///
/// Falls back to the working directory when the platform has no data dir.
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("vecstore"))
        .unwrap_or_else(|| PathBuf::from(".vecstore"))
        .join(DEFAULT_DATABASE_FILENAME)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = CollectionConfig::new("docs", BackendConfig::sqlite("/tmp/v.db")).with_id("c-1");

        assert_eq!(config.name, "docs");
        assert_eq!(config.backend.kind(), "sqlite");
        assert_eq!(config.info(), CollectionInfo::with_id("docs", "c-1"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_deserialization() {
        let json = r#"{
            "name": "docs",
            "backend": {
                "kind": "mongodb",
                "uri": "mongodb://localhost:27017",
                "database": "rag",
                "indexName": "vector_index"
            }
        }"#;

        let config: CollectionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            config.backend,
            BackendConfig::Mongodb {
                uri: "mongodb://localhost:27017".to_string(),
                database: "rag".to_string(),
                index_name: "vector_index".to_string(),
                candidate_multiplier: DEFAULT_CANDIDATE_MULTIPLIER,
            }
        );
        assert!(config.id.is_none());
    }

    #[test]
    fn test_sqlite_defaults() {
        let config: CollectionConfig =
            serde_json::from_str(r#"{"backend": {"kind": "sqlite"}}"#).unwrap();
        assert_eq!(config.name, DEFAULT_COLLECTION_NAME);
        assert_eq!(config.backend, BackendConfig::sqlite_in_memory());
    }

    #[test]
    fn test_postgres_serialization() {
        let config = CollectionConfig::new("docs", BackendConfig::postgres("postgres://localhost/db"));
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"kind\":\"postgres\""));
        assert!(json.contains("\"maxConnections\":5"));
        assert!(json.contains("\"createIfMissing\":false"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_name = CollectionConfig::new("my docs", BackendConfig::sqlite_in_memory());
        assert!(bad_name.validate().unwrap_err().is_invalid_argument());

        let missing_dims = CollectionConfig::new(
            "docs",
            BackendConfig::Postgres {
                url: "postgres://localhost/db".to_string(),
                max_connections: 5,
                dimensions: None,
                create_if_missing: true,
            },
        );
        assert!(missing_dims.validate().is_err());

        let no_index = CollectionConfig::new(
            "docs",
            BackendConfig::mongodb("mongodb://localhost", "rag", " "),
        );
        assert!(no_index.validate().is_err());
    }

    #[test]
    fn test_default_database_path() {
        let path = default_database_path();
        assert!(path.ends_with(DEFAULT_DATABASE_FILENAME));
    }
}
