//! Search request and response envelopes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{StoreError, StoreResult};
use crate::vector::Vector;

/// Default number of results returned by a search.
pub const DEFAULT_NUMBER_OF_RESULTS: usize = 5;

// ============================================================================
// DistanceStrategy
// ============================================================================

/// Metric used to compare embeddings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceStrategy {
    /// Cosine distance, `1 - cos(a, b)` (default).
    #[default]
    Cosine,
    /// Euclidean (L2) distance.
    Euclidean,
    /// Negative inner product, so that lower is still closer.
    InnerProduct,
}

impl DistanceStrategy {
    /// Get the strategy name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceStrategy::Cosine => "cosine",
            DistanceStrategy::Euclidean => "euclidean",
            DistanceStrategy::InnerProduct => "inner_product",
        }
    }

    /// Map a dissimilarity under this strategy to a relevance where higher is
    /// better. Score thresholds are compared against this value.
    pub fn relevance(&self, distance: f32) -> f32 {
        match self {
            DistanceStrategy::Cosine => 1.0 - distance,
            DistanceStrategy::Euclidean => 1.0 / (1.0 + distance),
            DistanceStrategy::InnerProduct => -distance,
        }
    }
}

impl fmt::Display for DistanceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DistanceStrategy {
    type Err = StoreError;

    fn from_str(s: &str) -> StoreResult<Self> {
        match s {
            "cosine" => Ok(DistanceStrategy::Cosine),
            "euclidean" | "l2" => Ok(DistanceStrategy::Euclidean),
            "inner_product" | "dot" => Ok(DistanceStrategy::InnerProduct),
            other => Err(StoreError::invalid_argument(format!(
                "Unknown distance strategy '{}'",
                other
            ))),
        }
    }
}

// ============================================================================
// VectorSearchRequest
// ============================================================================

/// Query embeddings for a similarity search.
///
/// Only the first embedding is used by a single backend call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorSearchRequest {
    pub embeddings: Vec<Vec<f32>>,
}

impl VectorSearchRequest {
    /// Create a request for a single query embedding.
    pub fn new(embedding: Vec<f32>) -> Self {
        Self {
            embeddings: vec![embedding],
        }
    }

    /// Create a request from several query embeddings.
    pub fn from_embeddings(embeddings: Vec<Vec<f32>>) -> Self {
        Self { embeddings }
    }

    /// The embedding a backend searches with.
    ///
    /// Fails when the request has no embedding, or the first one is empty
    /// or holds a non-finite value.
    pub fn query_embedding(&self) -> StoreResult<&[f32]> {
        match self.embeddings.first() {
            Some(embedding) if embedding.is_empty() => Err(StoreError::invalid_argument(
                "Query embedding cannot be empty",
            )),
            Some(embedding) if embedding.iter().any(|x| !x.is_finite()) => Err(
                StoreError::invalid_argument("Query embedding contains a non-finite value"),
            ),
            Some(embedding) => Ok(embedding),
            None => Err(StoreError::invalid_argument(
                "Search request must contain at least one embedding",
            )),
        }
    }
}

impl From<Vec<f32>> for VectorSearchRequest {
    fn from(embedding: Vec<f32>) -> Self {
        Self::new(embedding)
    }
}

// ============================================================================
// VectorSearchSettings
// ============================================================================

/// Knobs for a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorSearchSettings {
    /// Maximum number of results.
    #[serde(default = "default_number_of_results")]
    pub number_of_results: usize,

    /// Minimum relevance; results below it are dropped where the backend
    /// supports thresholds.
    #[serde(default)]
    pub score_threshold: Option<f32>,

    /// Metric to compare embeddings with, where the backend lets the caller
    /// choose.
    #[serde(default)]
    pub distance_strategy: DistanceStrategy,
}

fn default_number_of_results() -> usize {
    DEFAULT_NUMBER_OF_RESULTS
}

impl Default for VectorSearchSettings {
    fn default() -> Self {
        Self {
            number_of_results: DEFAULT_NUMBER_OF_RESULTS,
            score_threshold: None,
            distance_strategy: DistanceStrategy::default(),
        }
    }
}

impl VectorSearchSettings {
    /// Create default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of results.
    pub fn with_number_of_results(mut self, number_of_results: usize) -> Self {
        self.number_of_results = number_of_results;
        self
    }

    /// Set the score threshold.
    pub fn with_score_threshold(mut self, score_threshold: f32) -> Self {
        self.score_threshold = Some(score_threshold);
        self
    }

    /// Set the distance strategy.
    pub fn with_distance_strategy(mut self, distance_strategy: DistanceStrategy) -> Self {
        self.distance_strategy = distance_strategy;
        self
    }

    /// Reject settings no backend can serve.
    pub fn validate(&self) -> StoreResult<()> {
        if self.number_of_results == 0 {
            return Err(StoreError::invalid_argument(
                "number_of_results must be greater than zero",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// VectorSearchResponse
// ============================================================================

/// Search results, closest match first, each with `distance` set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorSearchResponse {
    pub items: Vec<Vector>,
}

impl VectorSearchResponse {
    /// Wrap already ordered results.
    pub fn new(items: Vec<Vector>) -> Self {
        Self { items }
    }

    /// Number of results.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the search matched nothing.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
