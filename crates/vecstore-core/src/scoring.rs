//! Similarity functions and result normalization shared by all backends.
//!
//! Engines report closeness in two conventions: a raw distance where lower
//! is closer, or a similarity score where higher is closer. Adapters feed
//! what they got through [`RawScore`] and hand back results that always
//! carry a dissimilarity in `Vector::distance`, sorted closest first.

use std::cmp::Ordering;

use crate::search::DistanceStrategy;
use crate::vector::Vector;

// ============================================================================
// Similarity Functions
// ============================================================================

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Compute dot product between two vectors.
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Compute Euclidean (L2) distance between two vectors.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

/// Dissimilarity between two vectors under a strategy. Lower is closer.
pub fn distance(strategy: DistanceStrategy, a: &[f32], b: &[f32]) -> f32 {
    match strategy {
        DistanceStrategy::Cosine => 1.0 - cosine_similarity(a, b),
        DistanceStrategy::Euclidean => euclidean_distance(a, b),
        DistanceStrategy::InnerProduct => -dot_product(a, b),
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Closeness as reported by an engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawScore {
    /// Lower is closer.
    Distance(f32),
    /// Normalized similarity in `[0, 1]`, higher is closer.
    Similarity(f32),
}

impl RawScore {
    /// Convert to a dissimilarity.
    pub fn into_distance(self) -> f32 {
        match self {
            RawScore::Distance(d) => d,
            RawScore::Similarity(s) => 1.0 - s,
        }
    }
}

/// Sort results closest first. Results without a distance go last; NaN
/// sorts after every number.
pub fn sort_closest_first(items: &mut [Vector]) {
    items.sort_by(|a, b| match (a.distance, b.distance) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// Attach normalized distances, sort closest first and cut to `limit`.
pub fn normalize_results(scored: Vec<(Vector, RawScore)>, limit: usize) -> Vec<Vector> {
    let mut items: Vec<Vector> = scored
        .into_iter()
        .map(|(vector, score)| vector.with_distance(score.into_distance()))
        .collect();

    sort_closest_first(&mut items);
    items.truncate(limit);
    items
}

/// Whether a result passes a minimum relevance threshold.
pub fn meets_threshold(relevance: f32, threshold: Option<f32>) -> bool {
    threshold.map(|t| relevance >= t).unwrap_or(true)
}

// ============================================================================
// Tests
// ============================================================================
