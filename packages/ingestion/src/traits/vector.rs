//! Vector persistence contract and similarity helpers.

use async_trait::async_trait;

use crate::error::VectorResult;
use crate::types::vector::{
    CollectionSpec, DistanceMetric, EnsureOutcome, PayloadFilter, ScoredRecord, UpsertReport,
    VectorRecord,
};

/// Collection lifecycle, similarity search, and bulk upsert.
///
/// Adapters probe for a missing collection and provision it from the
/// first record's dimension rather than treating "not found" as control
/// flow; a mid-write miss is retried exactly once, a second failure is
/// surfaced.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection if absent. A present collection with a
    /// matching schema is a no-op; an incompatible schema fails with
    /// `VectorError::SchemaMismatch`.
    async fn ensure_collection(&self, spec: &CollectionSpec) -> VectorResult<EnsureOutcome>;

    /// Write records in chunks, auto-provisioning the collection on
    /// first use. Failed chunks are reported by index without rolling
    /// back earlier chunks.
    async fn upsert(&self, collection: &str, records: &[VectorRecord])
        -> VectorResult<UpsertReport>;

    /// The k nearest records by the collection's metric, ties broken by
    /// stable insertion order.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
        filter: Option<&PayloadFilter>,
    ) -> VectorResult<Vec<ScoredRecord>>;
}

/// Cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Dot-product similarity.
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Score a candidate against a query under a metric; larger is always
/// more similar (Euclid distances are negated).
pub fn score(metric: DistanceMetric, query: &[f32], candidate: &[f32]) -> f32 {
    match metric {
        DistanceMetric::Cosine => cosine_similarity(query, candidate),
        DistanceMetric::Dot => dot_product(query, candidate),
        DistanceMetric::Euclid => {
            let squared: f32 = query
                .iter()
                .zip(candidate.iter())
                .map(|(x, y)| (x - y) * (x - y))
                .sum();
            -squared.sqrt()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &c).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_euclid_score_orders_by_distance() {
        let query = vec![0.0, 0.0];
        let near = vec![0.1, 0.0];
        let far = vec![5.0, 5.0];
        assert!(
            score(DistanceMetric::Euclid, &query, &near)
                > score(DistanceMetric::Euclid, &query, &far)
        );
    }

    #[test]
    fn test_dot_score() {
        assert!((score(DistanceMetric::Dot, &[1.0, 2.0], &[3.0, 4.0]) - 11.0).abs() < 0.001);
    }
}
