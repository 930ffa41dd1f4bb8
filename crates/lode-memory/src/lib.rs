//! Document ingestion, chunking and embedding-backed retrieval.

pub mod document;
pub mod error;
pub mod in_memory_store;
pub mod index;
pub mod vector_store;

pub use error::IndexError;
pub use in_memory_store::InMemoryVectorStore;
pub use index::{DEFAULT_TOP_K, IndexMeta, VectorIndex};
pub use vector_store::{VectorStore, VectorStoreError};
