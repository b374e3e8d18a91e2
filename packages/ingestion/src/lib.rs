//! Author-Content Ingestion Library
//!
//! Ingests content from heterogeneous online sources (version-control
//! repositories, articles, social posts) on behalf of a tracked author,
//! normalizes it into structured documents, and persists it into two
//! complementary stores: a schema-flexible document store for raw
//! content and a vector store for embedded chunks.
//!
//! # Design
//!
//! - A [`Dispatcher`] routes a link's host to a registered extraction
//!   capability; registration happens once at startup, lookups are
//!   read-only and concurrent.
//! - Capabilities implement the single-operation [`Extractor`] contract.
//!   Sources needing rendered pages drive a scoped `BrowserSession`;
//!   repository links are cloned into isolated workspaces and walked
//!   under strict byte budgets with dedup against prior runs.
//! - Stores are traits with in-memory implementations for tests and
//!   production adapters (Postgres JSONB, Qdrant REST). Vector
//!   collections are provisioned lazily on first write.
//!
//! # Usage
//!
//! ```rust,ignore
//! use ingestion::{crawl_links, Dispatcher, MemoryDocumentStore, RepositoryConfig, RepositoryExtractor};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryDocumentStore::new());
//! let dispatcher = Dispatcher::builder()
//!     .register_host("github.com", {
//!         let store = store.clone();
//!         move || Box::new(RepositoryExtractor::new(store.clone(), RepositoryConfig::new()))
//!     })
//!     .build();
//!
//! let user = store.get_or_create_user("Ada", "Lovelace").await?;
//! let report = crawl_links(&dispatcher, &links, &user, None).await;
//! ```
//!
//! # Modules
//!
//! - [`dispatcher`] - Host-based capability routing
//! - [`extractors`] - Capability implementations (repository, article, post)
//! - [`traits`] - Core contracts (extractor, document store, vector store)
//! - [`stores`] - Storage implementations
//! - [`pipeline`] - The per-link dispatch boundary
//! - [`types`] - Domain data types and configuration
//! - [`testing`] - Mock implementations for tests

pub mod credentials;
pub mod dispatcher;
pub mod error;
pub mod extractors;
pub mod pipeline;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use credentials::SecretString;
pub use error::{ExtractError, IngestError, StoreError, VectorError};

pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use traits::{
    extractor::{ExtractContext, Extractor},
    store::{DocumentFilter, DocumentRecord, DocumentStore, InsertOutcome},
    vector::{cosine_similarity, VectorStore},
};
pub use types::{
    config::{BrowserConfig, EmbeddingSettings, RepositoryConfig, VectorStoreConfig},
    document::{
        ArticleDocument, ContentCategory, PostDocument, RepositoryDocument, UserDocument, UserRef,
    },
    vector::{
        CollectionSpec, DistanceMetric, EnsureOutcome, PayloadFilter, ScoredRecord, UpsertReport,
        VectorRecord,
    },
};

// Re-export capabilities
pub use extractors::{
    article::ArticleExtractor,
    browser::{provision, BrowserEngine, BrowserSession, EngineProvider, WebDriverEngine},
    post::PostExtractor,
    repository::{GitCloneSource, RepositoryExtractor, RepositorySource, WalkOutcome},
};

// Re-export stores
pub use stores::{MemoryDocumentStore, MemoryVectorStore, QdrantVectorStore};

#[cfg(feature = "postgres")]
pub use stores::PostgresDocumentStore;

// Re-export the dispatch boundary
pub use pipeline::{crawl_links, CrawlReport, DomainTally};
