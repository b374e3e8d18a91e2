//! Storage implementations.
//!
//! - [`memory`] - In-memory document and vector stores
//! - [`qdrant`] - Qdrant vector store over REST
//! - [`postgres`] - Postgres JSONB document store (feature `postgres`)

pub mod memory;
pub mod qdrant;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::{MemoryDocumentStore, MemoryVectorStore};
pub use qdrant::QdrantVectorStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresDocumentStore;
