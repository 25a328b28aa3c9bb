//! MongoDB Atlas vector search backend.
//!
//! Each vector is one document (`_id`, `text`, `metadata`, `embedding`).
//! Similarity search runs a `$vectorSearch` aggregation against a vector
//! search index that must already exist; its metric is fixed by the index
//! definition, so the requested `distance_strategy` is not used.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{self, doc, Bson, Document};
use mongodb::{Client, Collection, Database};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use vecstore_core::collection::{require_finite, require_ids, require_items};
use vecstore_core::config::DEFAULT_CANDIDATE_MULTIPLIER;
use vecstore_core::filter::validate_filters;
use vecstore_core::scoring::{meets_threshold, normalize_results, RawScore};
use vecstore_core::vector::collect_ids;
use vecstore_core::{
    CollectionInfo, Metadata, MetadataFilter, MetadataValue, StoreError, StoreResult, Vector,
    VectorCollection, VectorSearchRequest, VectorSearchResponse, VectorSearchSettings,
};

const BACKEND: &str = "mongodb";

/// Field holding the embedding array.
pub const EMBEDDING_PATH: &str = "embedding";

/// Field the search pipeline writes the native score into.
const SCORE_FIELD: &str = "score";

/// Upper bound Atlas accepts for `numCandidates`.
const MAX_NUM_CANDIDATES: usize = 10_000;

fn mongo_error(err: mongodb::error::Error) -> StoreError {
    StoreError::backend(BACKEND, err)
}

// ============================================================================
// Documents
// ============================================================================

/// Stored shape of a vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoVectorDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl From<&Vector> for MongoVectorDocument {
    fn from(vector: &Vector) -> Self {
        Self {
            id: vector.id.clone(),
            text: vector.text.clone(),
            metadata: vector.metadata.clone(),
            embedding: vector.embedding.clone(),
        }
    }
}

impl From<MongoVectorDocument> for Vector {
    fn from(document: MongoVectorDocument) -> Self {
        let mut vector = Vector::with_id(document.id, document.text)
            .with_metadata_map(document.metadata);
        vector.embedding = document.embedding;
        vector
    }
}

// ============================================================================
// Query construction
// ============================================================================

fn num_candidates(limit: usize, multiplier: usize) -> usize {
    limit
        .saturating_mul(multiplier)
        .min(MAX_NUM_CANDIDATES)
        .max(limit)
}

/// Aggregation pipeline for a `$vectorSearch` query.
///
/// The embedding is projected out and the native score is added as `score`.
pub fn search_pipeline(
    index_name: &str,
    query: &[f32],
    limit: usize,
    candidate_multiplier: usize,
) -> Vec<Document> {
    let query_vector: Vec<f64> = query.iter().map(|&x| f64::from(x)).collect();
    let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
    let candidates = i64::try_from(num_candidates(limit, candidate_multiplier)).unwrap_or(i64::MAX);

    vec![
        doc! {
            "$vectorSearch": {
                "index": index_name,
                "path": EMBEDDING_PATH,
                "queryVector": query_vector,
                "numCandidates": candidates,
                "limit": limit_i64,
            }
        },
        doc! {
            "$project": {
                "embedding": 0,
                "score": { "$meta": "vectorSearchScore" },
            }
        },
    ]
}

fn to_bson(value: &MetadataValue) -> Bson {
    match value {
        MetadataValue::Bool(b) => Bson::Boolean(*b),
        MetadataValue::Integer(i) => Bson::Int64(*i),
        MetadataValue::Float(f) => Bson::Double(*f),
        MetadataValue::String(s) => Bson::String(s.clone()),
    }
}

/// `$and` of `metadata.<key>` equality predicates. Keys must already be
/// validated.
pub fn metadata_filter(filters: &MetadataFilter) -> Document {
    let clauses: Vec<Bson> = filters
        .iter()
        .map(|(key, value)| {
            let mut clause = Document::new();
            clause.insert(format!("metadata.{}", key), to_bson(value));
            Bson::Document(clause)
        })
        .collect();

    doc! { "$and": clauses }
}

/// Validate a batch for insertion and convert it to documents.
///
/// The embedding is optional here; documents without one are stored without
/// the field and never match a vector search.
fn prepare_documents(items: &[Vector]) -> StoreResult<Vec<MongoVectorDocument>> {
    require_items(items)?;
    require_finite(items)?;
    Ok(items.iter().map(Into::into).collect())
}

/// Turn raw `$vectorSearch` output into results, closest first.
///
/// The threshold is compared against the native score (higher is closer)
/// before it is converted to a distance.
pub fn rank_search_results(
    raw: Vec<Document>,
    score_threshold: Option<f32>,
    limit: usize,
) -> StoreResult<Vec<Vector>> {
    let mut scored = Vec::with_capacity(raw.len());
    for mut document in raw {
        let score = document
            .get_f64(SCORE_FIELD)
            .map_err(|e| StoreError::internal(format!("Search result has no score: {}", e)))?
            as f32;
        document.remove(SCORE_FIELD);

        if !meets_threshold(score, score_threshold) {
            continue;
        }

        let stored: MongoVectorDocument =
            bson::from_document(document).map_err(|e| StoreError::backend(BACKEND, e))?;
        scored.push((Vector::from(stored), RawScore::Similarity(score)));
    }

    Ok(normalize_results(scored, limit))
}

// ============================================================================
// MongoVectorCollection
// ============================================================================

/// Vector collection stored in a MongoDB collection.
#[derive(Debug, Clone)]
pub struct MongoVectorCollection {
    info: CollectionInfo,
    collection: Collection<MongoVectorDocument>,
    index_name: String,
    candidate_multiplier: usize,
}

impl MongoVectorCollection {
    /// Bind to a collection named after `info` in `database`.
    pub fn new(database: &Database, info: CollectionInfo, index_name: impl Into<String>) -> Self {
        let collection = database.collection::<MongoVectorDocument>(&info.name);
        Self {
            info,
            collection,
            index_name: index_name.into(),
            candidate_multiplier: DEFAULT_CANDIDATE_MULTIPLIER,
        }
    }

    /// Connect a client and bind to the collection.
    pub async fn connect(
        uri: &str,
        database: &str,
        info: CollectionInfo,
        index_name: impl Into<String>,
    ) -> StoreResult<Self> {
        debug!("Connecting to MongoDB database '{}'", database);
        let client = Client::with_uri_str(uri).await.map_err(mongo_error)?;
        Ok(Self::new(&client.database(database), info, index_name))
    }

    pub fn with_candidate_multiplier(mut self, multiplier: usize) -> Self {
        self.candidate_multiplier = multiplier.max(1);
        self
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }
}

#[async_trait]
impl VectorCollection for MongoVectorCollection {
    fn info(&self) -> &CollectionInfo {
        &self.info
    }

    async fn add(&self, items: &[Vector]) -> StoreResult<Vec<String>> {
        let documents = prepare_documents(items)?;
        debug!("Inserting {} vectors into '{}'", documents.len(), self.info.name);

        self.collection
            .insert_many(&documents)
            .await
            .map_err(mongo_error)?;

        Ok(collect_ids(items))
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Vector>> {
        let document = self
            .collection
            .find_one(doc! { "_id": id })
            .await
            .map_err(mongo_error)?;
        Ok(document.map(Vector::from))
    }

    async fn delete(&self, ids: &[String]) -> StoreResult<bool> {
        require_ids(ids)?;

        let result = self
            .collection
            .delete_many(doc! { "_id": { "$in": ids.to_vec() } })
            .await
            .map_err(mongo_error)?;
        debug!(
            "Deleted {} of {} ids from '{}'",
            result.deleted_count,
            ids.len(),
            self.info.name
        );
        Ok(true)
    }

    async fn is_empty(&self) -> StoreResult<bool> {
        let count = self
            .collection
            .estimated_document_count()
            .await
            .map_err(mongo_error)?;
        Ok(count == 0)
    }

    async fn search(
        &self,
        request: &VectorSearchRequest,
        settings: &VectorSearchSettings,
    ) -> StoreResult<VectorSearchResponse> {
        settings.validate()?;
        let query = request.query_embedding()?;
        let limit = settings.number_of_results;

        trace!(
            "Searching '{}' on index '{}', limit={}",
            self.info.name,
            self.index_name,
            limit
        );

        let pipeline = search_pipeline(&self.index_name, query, limit, self.candidate_multiplier);
        let raw: Vec<Document> = self
            .collection
            .aggregate(pipeline)
            .await
            .map_err(mongo_error)?
            .try_collect()
            .await
            .map_err(mongo_error)?;

        Ok(VectorSearchResponse::new(rank_search_results(
            raw,
            settings.score_threshold,
            limit,
        )?))
    }

    async fn search_by_metadata(&self, filters: &MetadataFilter) -> StoreResult<Vec<Vector>> {
        validate_filters(filters)?;
        trace!(
            "Searching '{}' by {} metadata keys",
            self.info.name,
            filters.len()
        );

        let documents: Vec<MongoVectorDocument> = self
            .collection
            .find(metadata_filter(filters))
            .projection(doc! { "embedding": 0 })
            .await
            .map_err(mongo_error)?
            .try_collect()
            .await
            .map_err(mongo_error)?;

        Ok(documents.into_iter().map(Vector::from).collect())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_pipeline() {
        let pipeline = search_pipeline("vector_index", &[1.0, 0.5], 4, 10);
        assert_eq!(pipeline.len(), 2);

        let stage = pipeline[0].get_document("$vectorSearch").unwrap();
        assert_eq!(stage.get_str("index").unwrap(), "vector_index");
        assert_eq!(stage.get_str("path").unwrap(), "embedding");
        assert_eq!(stage.get_i64("limit").unwrap(), 4);
        assert_eq!(stage.get_i64("numCandidates").unwrap(), 40);
        assert_eq!(
            stage.get_array("queryVector").unwrap(),
            &vec![Bson::Double(1.0), Bson::Double(0.5)]
        );

        let project = pipeline[1].get_document("$project").unwrap();
        assert_eq!(project.get_i32("embedding").unwrap(), 0);
        assert_eq!(
            project.get_document("score").unwrap(),
            &doc! { "$meta": "vectorSearchScore" }
        );
    }

    #[test]
    fn test_num_candidates_is_capped() {
        assert_eq!(num_candidates(5, 10), 50);
        assert_eq!(num_candidates(5_000, 10), MAX_NUM_CANDIDATES);
        assert_eq!(num_candidates(20_000, 10), 20_000);
    }

    #[test]
    fn test_metadata_filter() {
        let mut filters = MetadataFilter::new();
        filters.insert("a".to_string(), 1.into());
        filters.insert("b".to_string(), "x".into());
        filters.insert("c".to_string(), true.into());

        assert_eq!(
            metadata_filter(&filters),
            doc! {
                "$and": [
                    { "metadata.a": 1_i64 },
                    { "metadata.b": "x" },
                    { "metadata.c": true },
                ]
            }
        );
    }

    #[test]
    fn test_document_conversion() {
        let vector = Vector::with_id("v1", "hello")
            .with_metadata("lang", "en")
            .with_embedding(vec![0.25, 0.5]);

        let document = MongoVectorDocument::from(&vector);
        let bson = bson::to_document(&document).unwrap();
        assert_eq!(bson.get_str("_id").unwrap(), "v1");
        assert_eq!(bson.get_str("text").unwrap(), "hello");

        let back: MongoVectorDocument = bson::from_document(bson).unwrap();
        assert_eq!(Vector::from(back), vector);
    }

    #[test]
    fn test_prepare_documents_allows_missing_embedding() {
        let items = vec![
            Vector::with_id("bare", "no embedding").with_metadata("lang", "en"),
            Vector::with_id("full", "with embedding").with_embedding(vec![1.0, 0.0]),
        ];

        let documents = prepare_documents(&items).unwrap();
        assert_eq!(documents.len(), 2);

        let bare = bson::to_document(&documents[0]).unwrap();
        assert!(!bare.contains_key("embedding"));
        let back: MongoVectorDocument = bson::from_document(bare).unwrap();
        assert_eq!(Vector::from(back), items[0]);
    }

    #[test]
    fn test_prepare_documents_rejects_bad_batches() {
        assert!(prepare_documents(&[]).unwrap_err().is_invalid_argument());

        let nan = vec![Vector::with_id("nan", "").with_embedding(vec![f32::NAN])];
        assert!(prepare_documents(&nan).unwrap_err().is_invalid_argument());
    }

    fn scored(id: &str, score: f64) -> Document {
        doc! { "_id": id, "text": format!("text {}", id), "metadata": {}, "score": score }
    }

    #[test]
    fn test_rank_search_results_orders_closest_first() {
        let raw = vec![scored("mid", 0.5), scored("best", 0.9), scored("worst", 0.1)];

        let ranked = rank_search_results(raw, None, 10).unwrap();
        let ids: Vec<&str> = ranked.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["best", "mid", "worst"]);

        assert!((ranked[0].distance.unwrap() - 0.1).abs() < 1e-6);
        assert!((ranked[2].distance.unwrap() - 0.9).abs() < 1e-6);
        assert_eq!(ranked[0].text, "text best");
        assert!(ranked[0].embedding.is_none());
    }

    #[test]
    fn test_rank_search_results_threshold_and_limit() {
        let raw = vec![scored("a", 0.95), scored("b", 0.4), scored("c", 0.8)];

        let ranked = rank_search_results(raw.clone(), Some(0.5), 10).unwrap();
        let ids: Vec<&str> = ranked.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);

        let limited = rank_search_results(raw, None, 1).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, "a");
    }

    #[test]
    fn test_rank_search_results_requires_score() {
        let raw = vec![doc! { "_id": "x", "text": "t" }];
        let err = rank_search_results(raw, None, 5).unwrap_err();
        assert!(matches!(err, StoreError::Internal { .. }));
    }

    #[test]
    fn test_document_without_embedding() {
        let back: MongoVectorDocument =
            bson::from_document(doc! { "_id": "v2", "text": "t", "metadata": {} }).unwrap();
        let vector = Vector::from(back);
        assert_eq!(vector.id, "v2");
        assert!(vector.embedding.is_none());
    }
}
