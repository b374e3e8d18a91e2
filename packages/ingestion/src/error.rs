//! Typed errors for the ingestion library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling. Each layer has its own
//! enum; `IngestError` is what surfaces at the dispatch boundary.

use thiserror::Error;

/// Errors surfaced at the per-link dispatch boundary.
#[derive(Debug, Error)]
pub enum IngestError {
    /// No capability registered for the link's host
    #[error("no capability registered for host: {host}")]
    UnroutableLink { host: String },

    /// An extraction job failed
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    /// Document store operation failed
    #[error("document store error: {0}")]
    Store(#[from] StoreError),

    /// Vector store operation failed
    #[error("vector store error: {0}")]
    Vector(#[from] VectorError),
}

/// Errors that can occur inside a single extraction job.
///
/// Budget exhaustion during a repository walk is deliberately *not* here:
/// hitting the total-content cap is a soft stop, and the truncated
/// document is still persisted.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Link could not be interpreted for this capability
    #[error("invalid link: {link}")]
    InvalidLink { link: String },

    /// Repository clone failed (network or subprocess)
    #[error("clone failed for {link}: {message}")]
    Clone { link: String, message: String },

    /// Browser automation failed
    #[error("browser error: {0}")]
    Browser(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Filesystem error in the temporary workspace
    #[error("workspace I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// External call exceeded its deadline
    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    /// Persisting the extracted document failed
    #[error("persist failed: {0}")]
    Store(#[from] StoreError),
}

/// Errors from the document store adapters.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Could not reach or authenticate against the store
    #[error("connection error: {0}")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A query or write failed
    #[error("query error: {0}")]
    Query(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Document could not be (de)serialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from the vector store adapters.
#[derive(Debug, Error)]
pub enum VectorError {
    /// Collection missing; the upsert path recovers from this exactly once
    /// by auto-provisioning before surfacing it
    #[error("collection not found: {collection}")]
    CollectionNotFound { collection: String },

    /// Existing collection is incompatible with the requested schema.
    /// Fatal, never retried: it indicates a configuration error between
    /// the embedding dimension and the collection.
    #[error("schema mismatch for {collection}: have {existing}, want {requested}")]
    SchemaMismatch {
        collection: String,
        existing: String,
        requested: String,
    },

    /// HTTP transport failure
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The store rejected a request
    #[error("vector store error: {message}")]
    Backend { message: String },
}

/// Result type alias for dispatch-boundary operations.
pub type Result<T> = std::result::Result<T, IngestError>;

/// Result type alias for extraction operations.
pub type ExtractResult<T> = std::result::Result<T, ExtractError>;

/// Result type alias for document store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for vector store operations.
pub type VectorResult<T> = std::result::Result<T, VectorError>;
