//! # vecstore-db
//!
//! Storage adapters for `vecstore-core` collections.
//!
//! Each adapter implements [`VectorCollection`](vecstore_core::VectorCollection)
//! against one engine and translates the shared operations into that
//! engine's native queries. The engine crates stay out of `vecstore-core`,
//! so callers that only handle [`Vector`](vecstore_core::Vector)s don't pay
//! for them.
//!
//! ## Features
//!
//! - `sqlite` (default): embedded SQLite, JSON columns, linear-scan search
//! - `postgres` (default): PostgreSQL with the pgvector extension
//! - `mongodb` (default): MongoDB Atlas vector search
//!
//! ## Usage
//!
//! ```ignore
//! use vecstore_core::{BackendConfig, CollectionConfig, Vector};
//! use vecstore_db::open_collection;
//!
//! let config = CollectionConfig::new("docs", BackendConfig::sqlite("/tmp/docs.db"));
//! let collection = open_collection(&config).await?;
//!
//! collection
//!     .add(&[Vector::new("hello").with_embedding(vec![1.0, 0.0])])
//!     .await?;
//! ```

pub mod backend;

pub use backend::{available_backends, open_collection};

#[cfg(feature = "mongodb")]
pub use backend::MongoVectorCollection;

#[cfg(feature = "postgres")]
pub use backend::{PgVectorClient, PostgresVectorCollection};

#[cfg(feature = "sqlite")]
pub use backend::SqliteVectorCollection;
