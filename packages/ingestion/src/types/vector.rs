//! Vector records, collections, and search results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// An embedded chunk stored in the vector store.
///
/// The id aligns with the originating document id so the document and
/// vector stores stay joinable. Re-embedding supersedes the record, it
/// never merges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: Uuid,
    pub vector: Vec<f32>,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl VectorRecord {
    /// Create a record with an empty payload.
    pub fn new(id: Uuid, vector: Vec<f32>) -> Self {
        Self {
            id,
            vector,
            payload: Map::new(),
        }
    }

    /// Add a payload field.
    pub fn with_payload(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }
}

/// Distance metric a collection is configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    Cosine,
    Dot,
    Euclid,
}

impl DistanceMetric {
    /// Wire name used by the vector store.
    pub fn as_str(self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "Cosine",
            DistanceMetric::Dot => "Dot",
            DistanceMetric::Euclid => "Euclid",
        }
    }

    /// Parse a wire name, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "cosine" => Some(DistanceMetric::Cosine),
            "dot" => Some(DistanceMetric::Dot),
            "euclid" => Some(DistanceMetric::Euclid),
            _ => None,
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, schema-bound partition of the vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSpec {
    pub name: String,
    pub dimension: usize,
    pub metric: DistanceMetric,
}

impl CollectionSpec {
    pub fn new(name: impl Into<String>, dimension: usize, metric: DistanceMetric) -> Self {
        Self {
            name: name.into(),
            dimension,
            metric,
        }
    }

    /// Short schema description used in mismatch errors.
    pub fn describe(&self) -> String {
        format!("{}d/{}", self.dimension, self.metric)
    }
}

/// Outcome of an idempotent collection create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    Created,
    AlreadyPresent,
}

/// What a chunked upsert accomplished.
///
/// Failed chunks are reported by index; earlier successful chunks are not
/// rolled back (at-least-once semantics per chunk).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpsertReport {
    /// Records written
    pub upserted: usize,

    /// Chunks attempted
    pub chunks: usize,

    /// Indices of chunks that failed
    pub failed_chunks: Vec<usize>,

    /// Whether the collection was auto-provisioned during this call
    pub provisioned: bool,
}

impl UpsertReport {
    /// True when every chunk was written.
    pub fn is_complete(&self) -> bool {
        self.failed_chunks.is_empty()
    }
}

/// A search hit with its similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub id: Uuid,
    pub score: f32,
    pub payload: Map<String, Value>,
}

/// Conjunctive field-equality filter over record payloads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PayloadFilter {
    fields: Map<String, Value>,
}

impl PayloadFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a payload field to equal a value.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Check a payload against every required field.
    pub fn matches(&self, payload: &Map<String, Value>) -> bool {
        self.fields
            .iter()
            .all(|(key, value)| payload.get(key) == Some(value))
    }

    /// Required fields, for adapters translating to a wire format.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_filter_matches() {
        let record = VectorRecord::new(Uuid::new_v4(), vec![0.0])
            .with_payload("platform", "github")
            .with_payload("author", "Ada Lovelace");

        let filter = PayloadFilter::new().eq("platform", "github");
        assert!(filter.matches(&record.payload));

        let wrong = PayloadFilter::new().eq("platform", "medium");
        assert!(!wrong.matches(&record.payload));

        let both = PayloadFilter::new()
            .eq("platform", "github")
            .eq("author", "Ada Lovelace");
        assert!(both.matches(&record.payload));
    }

    #[test]
    fn test_metric_wire_names_round_trip() {
        for metric in [DistanceMetric::Cosine, DistanceMetric::Dot, DistanceMetric::Euclid] {
            assert_eq!(DistanceMetric::parse(metric.as_str()), Some(metric));
        }
        assert_eq!(DistanceMetric::parse("manhattan"), None);
    }

    #[test]
    fn test_describe() {
        let spec = CollectionSpec::new("articles", 384, DistanceMetric::Cosine);
        assert_eq!(spec.describe(), "384d/Cosine");
    }
}
