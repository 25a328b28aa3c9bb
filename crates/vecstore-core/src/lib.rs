//! # vecstore-core
//!
//! Storage-agnostic model for embedding vectors with text and metadata.
//!
//! This crate holds everything a backend adapter and its callers share:
//!
//! - [`Vector`]: the canonical record
//! - [`VectorSearchRequest`], [`VectorSearchSettings`], [`VectorSearchResponse`]
//! - [`VectorCollection`]: the capability trait each backend implements
//! - [`StoreError`]: the error taxonomy
//! - filter validation and score normalization helpers
//!
//! It has no storage engine dependencies. The adapters live in `vecstore-db`.
//!
//! ## Usage
//!
//! ```ignore
//! use vecstore_core::{Vector, VectorSearchRequest, VectorSearchSettings};
//!
//! let ids = collection
//!     .add(&[Vector::new("hello").with_embedding(vec![1.0, 0.0])])
//!     .await?;
//!
//! let settings = VectorSearchSettings::new().with_number_of_results(3);
//! let response = collection
//!     .search(&VectorSearchRequest::new(vec![1.0, 0.0]), &settings)
//!     .await?;
//! ```

pub mod collection;
pub mod config;
pub mod error;
pub mod filter;
pub mod scoring;
pub mod search;
pub mod vector;

pub use collection::{CollectionInfo, VectorCollection, DEFAULT_COLLECTION_NAME};
pub use config::{default_database_path, BackendConfig, CollectionConfig};
pub use error::{StoreError, StoreResult};
pub use search::{
    DistanceStrategy, VectorSearchRequest, VectorSearchResponse, VectorSearchSettings,
    DEFAULT_NUMBER_OF_RESULTS,
};
pub use vector::{Metadata, MetadataFilter, MetadataValue, Vector};
