//! The vector collection contract.
//!
//! This module defines the capability trait every storage backend
//! implements, and the identity shared by all of them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::search::{VectorSearchRequest, VectorSearchResponse, VectorSearchSettings};
use crate::vector::{MetadataFilter, MetadataValue, Vector};

/// Collection name used when the caller does not pick one.
pub const DEFAULT_COLLECTION_NAME: &str = "vectors";

// ============================================================================
// CollectionInfo
// ============================================================================

/// Identity of a collection: a name the backend addresses it by, and an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub id: String,
}

impl CollectionInfo {
    /// Create an identity with a generated id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Create an identity with a known id.
    pub fn with_id(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}

impl Default for CollectionInfo {
    fn default() -> Self {
        Self::new(DEFAULT_COLLECTION_NAME)
    }
}

// ============================================================================
// VectorCollection Trait
// ============================================================================

/// A named set of vectors stored in one backend.
///
/// ## Implementation Notes
///
/// - Every call round-trips to the engine; implementations keep no cache.
/// - Input validation happens before any I/O and fails with
///   [`StoreError::InvalidArgument`].
/// - Engine errors are returned as [`StoreError::Backend`] with the native
///   error as source. Nothing is retried.
/// - Batch `add` and `delete` are not atomic.
/// - Dropping a returned future cancels the call at its next I/O boundary.
#[async_trait]
pub trait VectorCollection: Send + Sync {
    /// Identity of this collection.
    fn info(&self) -> &CollectionInfo;

    /// Collection name.
    fn name(&self) -> &str {
        &self.info().name
    }

    /// Collection id.
    fn id(&self) -> &str {
        &self.info().id
    }

    /// Store items and return their ids in input order.
    ///
    /// Whether a duplicate id replaces or fails depends on the backend.
    async fn add(&self, items: &[Vector]) -> StoreResult<Vec<String>>;

    /// Fetch one vector, or `None` if no entry has this id.
    async fn get(&self, id: &str) -> StoreResult<Option<Vector>>;

    /// Remove every entry whose id is listed.
    ///
    /// Returns whether the backend acknowledged the operation.
    async fn delete(&self, ids: &[String]) -> StoreResult<bool>;

    /// Whether the collection holds no entries. May use an estimate.
    async fn is_empty(&self) -> StoreResult<bool>;

    /// Nearest neighbors of the first request embedding, closest first.
    async fn search(
        &self,
        request: &VectorSearchRequest,
        settings: &VectorSearchSettings,
    ) -> StoreResult<VectorSearchResponse>;

    /// Entries whose metadata equals every filter pair.
    async fn search_by_metadata(&self, filters: &MetadataFilter) -> StoreResult<Vec<Vector>>;
}

/// Reject an empty batch of items.
pub fn require_items(items: &[Vector]) -> StoreResult<()> {
    if items.is_empty() {
        return Err(StoreError::invalid_argument("Items cannot be empty"));
    }
    Ok(())
}

/// Reject an empty list of ids.
pub fn require_ids(ids: &[String]) -> StoreResult<()> {
    if ids.is_empty() {
        return Err(StoreError::invalid_argument("Ids cannot be empty"));
    }
    Ok(())
}

/// Reject a batch where any item has no embedding.
pub fn require_embeddings(items: &[Vector]) -> StoreResult<()> {
    if let Some(item) = items.iter().find(|item| item.embedding.is_none()) {
        return Err(StoreError::invalid_argument(format!(
            "Embedding is required (item '{}')",
            item.id
        )));
    }
    Ok(())
}

/// Reject non-finite embedding components and float metadata values.
///
/// JSON has no encoding for NaN or infinity, so such values would be stored
/// as `null` and break every later read of the record.
pub fn require_finite(items: &[Vector]) -> StoreResult<()> {
    for item in items {
        let embedding = item.embedding.as_deref().unwrap_or_default();
        if embedding.iter().any(|x| !x.is_finite()) {
            return Err(StoreError::invalid_argument(format!(
                "Embedding contains a non-finite value (item '{}')",
                item.id
            )));
        }

        let bad_key = item.metadata.iter().find_map(|(key, value)| match value {
            MetadataValue::Float(f) if !f.is_finite() => Some(key),
            _ => None,
        });
        if let Some(key) = bad_key {
            return Err(StoreError::invalid_argument(format!(
                "Metadata value for key '{}' is not finite (item '{}')",
                key, item.id
            )));
        }
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{distance, normalize_results, RawScore};
    use crate::vector::collect_ids;
    use std::sync::Mutex;

    /// Minimal in-process collection used to exercise the provided methods.
    struct ScratchCollection {
        info: CollectionInfo,
        items: Mutex<Vec<Vector>>,
    }

    #[async_trait]
    impl VectorCollection for ScratchCollection {
        fn info(&self) -> &CollectionInfo {
            &self.info
        }

        async fn add(&self, items: &[Vector]) -> StoreResult<Vec<String>> {
            require_items(items)?;
            self.items.lock().unwrap().extend_from_slice(items);
            Ok(collect_ids(items))
        }

        async fn get(&self, id: &str) -> StoreResult<Option<Vector>> {
            Ok(self.items.lock().unwrap().iter().find(|v| v.id == id).cloned())
        }

        async fn delete(&self, ids: &[String]) -> StoreResult<bool> {
            require_ids(ids)?;
            self.items.lock().unwrap().retain(|v| !ids.contains(&v.id));
            Ok(true)
        }

        async fn is_empty(&self) -> StoreResult<bool> {
            Ok(self.items.lock().unwrap().is_empty())
        }

        async fn search(
            &self,
            request: &VectorSearchRequest,
            settings: &VectorSearchSettings,
        ) -> StoreResult<VectorSearchResponse> {
            let query = request.query_embedding()?;
            let scored = self
                .items
                .lock()
                .unwrap()
                .iter()
                .filter_map(|v| {
                    let embedding = v.embedding.as_ref()?;
                    let d = distance(settings.distance_strategy, query, embedding);
                    Some((v.clone(), RawScore::Distance(d)))
                })
                .collect();
            Ok(VectorSearchResponse::new(normalize_results(
                scored,
                settings.number_of_results,
            )))
        }

        async fn search_by_metadata(&self, filters: &MetadataFilter) -> StoreResult<Vec<Vector>> {
            crate::filter::validate_filters(filters)?;
            Ok(self
                .items
                .lock()
                .unwrap()
                .iter()
                .filter(|v| filters.iter().all(|(k, val)| v.metadata.get(k) == Some(val)))
                .cloned()
                .collect())
        }
    }

    fn scratch() -> ScratchCollection {
        ScratchCollection {
            info: CollectionInfo::with_id("docs", "c-1"),
            items: Mutex::new(Vec::new()),
        }
    }

    #[test]
    fn test_collection_info() {
        let info = CollectionInfo::default();
        assert_eq!(info.name, DEFAULT_COLLECTION_NAME);
        assert!(!info.id.is_empty());
        assert_ne!(CollectionInfo::new("a").id, CollectionInfo::new("a").id);
    }

    #[test]
    fn test_required_inputs() {
        assert!(require_items(&[]).unwrap_err().is_invalid_argument());
        assert!(require_ids(&[]).unwrap_err().is_invalid_argument());

        let items = vec![
            Vector::with_id("a", "").with_embedding(vec![1.0]),
            Vector::with_id("b", ""),
        ];
        let err = require_embeddings(&items).unwrap_err();
        assert!(err.to_string().contains("'b'"));
    }

    #[test]
    fn test_require_finite() {
        let ok = vec![
            Vector::with_id("a", "").with_embedding(vec![1.0, -2.5]).with_metadata("w", 0.5),
            Vector::with_id("b", ""),
        ];
        assert!(require_finite(&ok).is_ok());

        let nan = vec![Vector::with_id("nan", "").with_embedding(vec![f32::NAN, 0.0])];
        let err = require_finite(&nan).unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(err.to_string().contains("'nan'"));

        let inf = vec![Vector::with_id("inf", "").with_embedding(vec![f32::INFINITY])];
        assert!(require_finite(&inf).unwrap_err().is_invalid_argument());

        let meta = vec![Vector::with_id("m", "").with_metadata("score", f64::NAN)];
        let err = require_finite(&meta).unwrap_err();
        assert!(err.to_string().contains("'score'"));
    }

    #[tokio::test]
    async fn test_provided_identity_methods() {
        let collection = scratch();
        let dyn_collection: &dyn VectorCollection = &collection;
        assert_eq!(dyn_collection.name(), "docs");
        assert_eq!(dyn_collection.id(), "c-1");
    }

    #[tokio::test]
    async fn test_contract_scenario() {
        let collection = scratch();
        assert!(collection.is_empty().await.unwrap());

        let items = vec![
            Vector::with_id("x", "x").with_embedding(vec![1.0, 0.0]),
            Vector::with_id("y", "y").with_embedding(vec![0.0, 1.0]),
            Vector::with_id("z", "z").with_embedding(vec![0.9, 0.1]),
        ];
        collection.add(&items).await.unwrap();
        assert!(!collection.is_empty().await.unwrap());

        let settings = VectorSearchSettings::new().with_number_of_results(2);
        let response = collection
            .search(&VectorSearchRequest::new(vec![1.0, 0.0]), &settings)
            .await
            .unwrap();
        let ids: Vec<&str> = response.items.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "z"]);
    }
}
