//! Document persistence contract.
//!
//! The store is schema-flexible: records serialize to JSON and filters
//! match on the serialized form, so adapters never need per-type schemas.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::types::document::UserDocument;

/// A persistable record with a stable identity and a home collection.
pub trait DocumentRecord: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Collection this record type lives in.
    const COLLECTION: &'static str;

    /// Stable identifier, assigned at construction.
    fn id(&self) -> Uuid;
}

/// Conjunctive field-equality filter over serialized documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentFilter {
    fields: Map<String, Value>,
}

impl DocumentFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a field to equal a value.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Filter by the `link` field, the dedup key for crawled content.
    pub fn by_link(link: &str) -> Self {
        Self::new().eq("link", link)
    }

    /// Filter by document id.
    pub fn by_id(id: Uuid) -> Self {
        Self::new().eq("id", id.to_string())
    }

    /// Check a serialized document against every required field.
    pub fn matches(&self, document: &Value) -> bool {
        self.fields
            .iter()
            .all(|(key, value)| document.get(key) == Some(value))
    }

    /// Required fields as a JSON object, for containment queries.
    pub fn as_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Result of a check-and-insert.
#[derive(Debug, Clone)]
pub enum InsertOutcome<D> {
    /// The document was written
    Inserted(D),

    /// A document already matched the uniqueness filter; nothing written
    Existing(D),
}

impl<D> InsertOutcome<D> {
    /// The surviving document, whichever way the race went.
    pub fn into_inner(self) -> D {
        match self {
            InsertOutcome::Inserted(doc) | InsertOutcome::Existing(doc) => doc,
        }
    }

    pub fn was_inserted(&self) -> bool {
        matches!(self, InsertOutcome::Inserted(_))
    }
}

/// Generic CRUD over schema-flexible documents.
///
/// `find` reflects all previously committed writes against the same store
/// (read-your-writes); `insert_unique` is the store-level guard that
/// closes the dedup check-then-insert race.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Upsert keyed by (collection, id).
    async fn save<D: DocumentRecord>(&self, doc: &D) -> StoreResult<()>;

    /// First document matching the filter.
    async fn find<D: DocumentRecord>(&self, filter: &DocumentFilter) -> StoreResult<Option<D>>;

    /// All documents matching the filter, in write order.
    async fn find_all<D: DocumentRecord>(&self, filter: &DocumentFilter) -> StoreResult<Vec<D>>;

    /// Insert a batch; returns the number written.
    async fn insert_many<D: DocumentRecord>(&self, docs: &[D]) -> StoreResult<usize> {
        for doc in docs {
            self.save(doc).await?;
        }
        Ok(docs.len())
    }

    /// Insert `doc` unless a document already matches `unique`.
    ///
    /// The check and the insert happen under the store's uniqueness
    /// guard, so two workers racing on the same key converge on one
    /// document.
    async fn insert_unique<D: DocumentRecord>(
        &self,
        unique: &DocumentFilter,
        doc: &D,
    ) -> StoreResult<InsertOutcome<D>>;

    /// Idempotent user lookup by name.
    async fn get_or_create_user(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> StoreResult<UserDocument> {
        let filter = DocumentFilter::new()
            .eq("first_name", first_name)
            .eq("last_name", last_name);
        let candidate = UserDocument::new(first_name, last_name);
        Ok(self.insert_unique(&filter, &candidate).await?.into_inner())
    }
}
