//! In-memory storage implementations for testing and development.
//!
//! Data is lost on restart; not suitable for production. The document
//! store counts writes so idempotency tests can assert that a dedup'd
//! extraction performed zero writes.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use tracing::{info, warn};

use crate::error::{StoreResult, VectorError, VectorResult};
use crate::traits::store::{DocumentFilter, DocumentRecord, DocumentStore, InsertOutcome};
use crate::traits::vector::{score, VectorStore};
use crate::types::vector::{
    CollectionSpec, DistanceMetric, EnsureOutcome, PayloadFilter, ScoredRecord, UpsertReport,
    VectorRecord,
};

/// In-memory document store.
///
/// Documents are held as serialized JSON per collection, in write order,
/// so filters behave exactly as they do against a schema-flexible
/// backend. The write lock spans the check and the insert of
/// `insert_unique`, making it the store-level uniqueness guard.
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<String, Vec<Value>>>,
    writes: AtomicUsize,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            writes: AtomicUsize::new(0),
        }
    }

    /// Number of write operations performed so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of documents in a collection.
    pub fn collection_len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .unwrap()
            .get(collection)
            .map_or(0, |docs| docs.len())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn save<D: DocumentRecord>(&self, doc: &D) -> StoreResult<()> {
        let value = serde_json::to_value(doc)?;
        let id = Value::String(doc.id().to_string());

        let mut collections = self.collections.write().unwrap();
        let docs = collections.entry(D::COLLECTION.to_string()).or_default();
        match docs.iter_mut().find(|existing| existing.get("id") == Some(&id)) {
            Some(existing) => *existing = value,
            None => docs.push(value),
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn find<D: DocumentRecord>(&self, filter: &DocumentFilter) -> StoreResult<Option<D>> {
        let collections = self.collections.read().unwrap();
        let Some(docs) = collections.get(D::COLLECTION) else {
            return Ok(None);
        };
        docs.iter()
            .find(|doc| filter.matches(doc))
            .map(|doc| serde_json::from_value(doc.clone()))
            .transpose()
            .map_err(Into::into)
    }

    async fn find_all<D: DocumentRecord>(&self, filter: &DocumentFilter) -> StoreResult<Vec<D>> {
        let collections = self.collections.read().unwrap();
        let Some(docs) = collections.get(D::COLLECTION) else {
            return Ok(Vec::new());
        };
        docs.iter()
            .filter(|doc| filter.matches(doc))
            .map(|doc| serde_json::from_value(doc.clone()).map_err(Into::into))
            .collect()
    }

    async fn insert_unique<D: DocumentRecord>(
        &self,
        unique: &DocumentFilter,
        doc: &D,
    ) -> StoreResult<InsertOutcome<D>> {
        let value = serde_json::to_value(doc)?;

        // Check and insert under one write lock: two workers racing on
        // the same key converge on a single document.
        let mut collections = self.collections.write().unwrap();
        let docs = collections.entry(D::COLLECTION.to_string()).or_default();
        if let Some(existing) = docs.iter().find(|candidate| unique.matches(candidate)) {
            let existing: D = serde_json::from_value(existing.clone())?;
            return Ok(InsertOutcome::Existing(existing));
        }

        docs.push(value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(InsertOutcome::Inserted(doc.clone()))
    }
}

struct MemoryCollection {
    spec: CollectionSpec,
    records: Vec<VectorRecord>,
}

/// In-memory vector store.
///
/// Records are kept in insertion order per collection; a stable sort at
/// search time therefore breaks score ties by insertion order.
pub struct MemoryVectorStore {
    collections: RwLock<HashMap<String, MemoryCollection>>,
    metric: DistanceMetric,
    chunk_size: usize,
    fail_chunks: RwLock<HashSet<usize>>,
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            metric: DistanceMetric::Cosine,
            chunk_size: 64,
            fail_chunks: RwLock::new(HashSet::new()),
        }
    }

    /// Set the metric used when auto-provisioning.
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Set the bulk-write chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Make the given chunk indices fail during upsert (test knob, in the
    /// spirit of the crawler mocks' `fail_url`).
    pub fn with_chunk_failures(self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.fail_chunks.write().unwrap().extend(indices);
        self
    }

    /// Number of records in a collection.
    pub fn record_count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .unwrap()
            .get(collection)
            .map_or(0, |entry| entry.records.len())
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn ensure_collection(&self, spec: &CollectionSpec) -> VectorResult<EnsureOutcome> {
        let mut collections = self.collections.write().unwrap();
        match collections.get(&spec.name) {
            Some(existing)
                if existing.spec.dimension == spec.dimension
                    && existing.spec.metric == spec.metric =>
            {
                Ok(EnsureOutcome::AlreadyPresent)
            }
            Some(existing) => Err(VectorError::SchemaMismatch {
                collection: spec.name.clone(),
                existing: existing.spec.describe(),
                requested: spec.describe(),
            }),
            None => {
                collections.insert(
                    spec.name.clone(),
                    MemoryCollection {
                        spec: spec.clone(),
                        records: Vec::new(),
                    },
                );
                info!(collection = %spec.name, schema = %spec.describe(), "vector collection created");
                Ok(EnsureOutcome::Created)
            }
        }
    }

    async fn upsert(
        &self,
        collection: &str,
        records: &[VectorRecord],
    ) -> VectorResult<UpsertReport> {
        if records.is_empty() {
            return Ok(UpsertReport::default());
        }

        let mut report = UpsertReport::default();

        // Probe before writing: a missing collection is provisioned from
        // the first record's dimension instead of surfacing an error.
        {
            let mut collections = self.collections.write().unwrap();
            if !collections.contains_key(collection) {
                let spec = CollectionSpec::new(collection, records[0].vector.len(), self.metric);
                info!(collection, schema = %spec.describe(), "vector collection auto-provisioned");
                collections.insert(
                    collection.to_string(),
                    MemoryCollection {
                        spec,
                        records: Vec::new(),
                    },
                );
                report.provisioned = true;
            }
        }

        for (index, chunk) in records.chunks(self.chunk_size).enumerate() {
            report.chunks += 1;

            if self.fail_chunks.read().unwrap().contains(&index) {
                warn!(collection, chunk = index, "chunk upsert failed");
                report.failed_chunks.push(index);
                continue;
            }

            let mut collections = self.collections.write().unwrap();
            let entry = collections
                .get_mut(collection)
                .ok_or_else(|| VectorError::CollectionNotFound {
                    collection: collection.to_string(),
                })?;

            for record in chunk {
                // Re-embedding supersedes; it never merges.
                match entry.records.iter_mut().find(|r| r.id == record.id) {
                    Some(existing) => *existing = record.clone(),
                    None => entry.records.push(record.clone()),
                }
                report.upserted += 1;
            }
        }

        Ok(report)
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
        filter: Option<&PayloadFilter>,
    ) -> VectorResult<Vec<ScoredRecord>> {
        let collections = self.collections.read().unwrap();
        let entry = collections
            .get(collection)
            .ok_or_else(|| VectorError::CollectionNotFound {
                collection: collection.to_string(),
            })?;

        let mut scored: Vec<ScoredRecord> = entry
            .records
            .iter()
            .filter(|record| filter.map_or(true, |f| f.matches(&record.payload)))
            .map(|record| ScoredRecord {
                id: record.id,
                score: score(entry.spec.metric, vector, &record.vector),
                payload: record.payload.clone(),
            })
            .collect();

        // Stable sort keeps insertion order for tied scores.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::document::UserDocument;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_save_is_upsert_by_id() {
        let store = MemoryDocumentStore::new();
        let mut user = UserDocument::new("Ada", "Lovelace");

        store.save(&user).await.unwrap();
        user.last_name = "King".to_string();
        store.save(&user).await.unwrap();

        assert_eq!(store.collection_len("users"), 1);
        let found: UserDocument = store
            .find(&DocumentFilter::by_id(user.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.last_name, "King");
    }

    #[tokio::test]
    async fn test_find_reflects_prior_writes() {
        let store = MemoryDocumentStore::new();
        let user = UserDocument::new("Ada", "Lovelace");
        store.save(&user).await.unwrap();

        let found: Option<UserDocument> = store
            .find(&DocumentFilter::new().eq("first_name", "Ada"))
            .await
            .unwrap();
        assert_eq!(found.unwrap().id, user.id);

        let missing: Option<UserDocument> = store
            .find(&DocumentFilter::new().eq("first_name", "Grace"))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_get_or_create_user_is_idempotent() {
        let store = MemoryDocumentStore::new();

        let first = store.get_or_create_user("Ada", "Lovelace").await.unwrap();
        let second = store.get_or_create_user("Ada", "Lovelace").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.collection_len("users"), 1);
    }

    #[tokio::test]
    async fn test_concurrent_get_or_create_converges() {
        let store = std::sync::Arc::new(MemoryDocumentStore::new());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.get_or_create_user("Ada", "Lovelace").await.unwrap()
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(store.collection_len("users"), 1);
    }

    #[tokio::test]
    async fn test_insert_many() {
        let store = MemoryDocumentStore::new();
        let users = vec![
            UserDocument::new("Ada", "Lovelace"),
            UserDocument::new("Grace", "Hopper"),
        ];
        let written = store.insert_many(&users).await.unwrap();
        assert_eq!(written, 2);
        assert_eq!(store.collection_len("users"), 2);
    }

    fn record(vector: Vec<f32>) -> VectorRecord {
        VectorRecord::new(Uuid::new_v4(), vector)
    }

    #[tokio::test]
    async fn test_ensure_collection_idempotent() {
        let store = MemoryVectorStore::new();
        let spec = CollectionSpec::new("articles", 3, DistanceMetric::Cosine);

        assert_eq!(
            store.ensure_collection(&spec).await.unwrap(),
            EnsureOutcome::Created
        );
        assert_eq!(
            store.ensure_collection(&spec).await.unwrap(),
            EnsureOutcome::AlreadyPresent
        );
    }

    #[tokio::test]
    async fn test_ensure_collection_schema_mismatch() {
        let store = MemoryVectorStore::new();
        let spec = CollectionSpec::new("articles", 3, DistanceMetric::Cosine);
        store.ensure_collection(&spec).await.unwrap();

        let wrong_dim = CollectionSpec::new("articles", 5, DistanceMetric::Cosine);
        let err = store.ensure_collection(&wrong_dim).await.unwrap_err();
        assert!(matches!(err, VectorError::SchemaMismatch { .. }));

        let wrong_metric = CollectionSpec::new("articles", 3, DistanceMetric::Dot);
        assert!(store.ensure_collection(&wrong_metric).await.is_err());
    }

    #[tokio::test]
    async fn test_upsert_auto_provisions_missing_collection() {
        let store = MemoryVectorStore::new();
        let records = vec![record(vec![1.0, 0.0, 0.0])];

        let report = store.upsert("posts", &records).await.unwrap();
        assert!(report.provisioned);
        assert_eq!(report.upserted, 1);

        // The provisioned collection matches the inferred schema.
        let spec = CollectionSpec::new("posts", 3, DistanceMetric::Cosine);
        assert_eq!(
            store.ensure_collection(&spec).await.unwrap(),
            EnsureOutcome::AlreadyPresent
        );
    }

    #[tokio::test]
    async fn test_upsert_supersedes_by_id() {
        let store = MemoryVectorStore::new();
        let id = Uuid::new_v4();

        store
            .upsert("posts", &[VectorRecord::new(id, vec![1.0, 0.0])])
            .await
            .unwrap();
        store
            .upsert("posts", &[VectorRecord::new(id, vec![0.0, 1.0])])
            .await
            .unwrap();

        assert_eq!(store.record_count("posts"), 1);
        let hits = store.search("posts", &[0.0, 1.0], 1, None).await.unwrap();
        assert!(hits[0].score > 0.99);
    }

    #[tokio::test]
    async fn test_upsert_empty_is_noop() {
        let store = MemoryVectorStore::new();
        let report = store.upsert("posts", &[]).await.unwrap();
        assert_eq!(report.upserted, 0);
        assert_eq!(report.chunks, 0);
        assert!(!report.provisioned);
    }

    #[tokio::test]
    async fn test_failed_chunks_reported_without_rollback() {
        let store = MemoryVectorStore::new()
            .with_chunk_size(2)
            .with_chunk_failures([1]);

        let records: Vec<VectorRecord> = (0..6).map(|_| record(vec![1.0, 0.0])).collect();
        let report = store.upsert("posts", &records).await.unwrap();

        assert_eq!(report.chunks, 3);
        assert_eq!(report.failed_chunks, vec![1]);
        assert!(!report.is_complete());
        // Chunks 0 and 2 landed; chunk 1 did not.
        assert_eq!(report.upserted, 4);
        assert_eq!(store.record_count("posts"), 4);
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let store = MemoryVectorStore::new();
        let near = record(vec![1.0, 0.0]);
        let far = record(vec![0.0, 1.0]);
        store
            .upsert("posts", &[far.clone(), near.clone()])
            .await
            .unwrap();

        let hits = store.search("posts", &[1.0, 0.0], 2, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, near.id);
        assert_eq!(hits[1].id, far.id);
    }

    #[tokio::test]
    async fn test_search_breaks_ties_by_insertion_order() {
        let store = MemoryVectorStore::new();
        let first = record(vec![1.0, 0.0]);
        let second = record(vec![1.0, 0.0]);
        store
            .upsert("posts", &[first.clone(), second.clone()])
            .await
            .unwrap();

        let hits = store.search("posts", &[1.0, 0.0], 2, None).await.unwrap();
        assert_eq!(hits[0].id, first.id);
        assert_eq!(hits[1].id, second.id);
    }

    #[tokio::test]
    async fn test_search_applies_payload_filter() {
        let store = MemoryVectorStore::new();
        let github = record(vec![1.0, 0.0]).with_payload("platform", "github");
        let medium = record(vec![1.0, 0.0]).with_payload("platform", "medium");
        store
            .upsert("posts", &[github.clone(), medium])
            .await
            .unwrap();

        let filter = PayloadFilter::new().eq("platform", "github");
        let hits = store
            .search("posts", &[1.0, 0.0], 10, Some(&filter))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, github.id);
    }

    #[tokio::test]
    async fn test_search_missing_collection_is_typed() {
        let store = MemoryVectorStore::new();
        let err = store.search("ghost", &[1.0], 1, None).await.unwrap_err();
        assert!(matches!(err, VectorError::CollectionNotFound { .. }));
    }
}
