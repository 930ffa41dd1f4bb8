#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("no valid documents to index")]
    EmptyInput,

    #[error("index has not been built or loaded")]
    NotBuilt,

    #[error("embedding dimension mismatch: index has {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("index was built with embedding model {expected}, provider uses {actual}")]
    EmbedderMismatch { expected: String, actual: String },

    #[error("index is corrupted: {0}")]
    Corrupted(String),

    #[error("embedding failed: {0}")]
    Embedding(#[from] lode_llm::LlmError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] crate::vector_store::VectorStoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
