//! Embedding-backed chunk index with on-disk persistence.
//!
//! A saved index is a directory holding the store's own encoding (`index.json`)
//! and a metadata sidecar (`index.meta.json`) that records which embedder
//! produced the vectors plus a BLAKE3 checksum of the store bytes.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use lode_llm::LlmProvider;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{Chunk, DocumentMetadata};
use crate::error::IndexError;
use crate::in_memory_store::InMemoryVectorStore;
use crate::vector_store::{VectorPoint, VectorStore};

/// Default number of chunks returned by [`VectorIndex::retrieve`].
pub const DEFAULT_TOP_K: usize = 4;

const FORMAT_VERSION: u32 = 1;
const STORE_FILE: &str = "index.json";
const META_FILE: &str = "index.meta.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub format_version: u32,
    pub provider: String,
    pub embedding_model: Option<String>,
    pub dimensions: usize,
    pub chunk_count: usize,
    /// BLAKE3 hex digest of the serialized store.
    pub checksum: String,
}

pub struct VectorIndex<P, S = InMemoryVectorStore> {
    provider: Arc<P>,
    state: Option<(S, IndexMeta)>,
}

impl<P, S> std::fmt::Debug for VectorIndex<P, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("meta", &self.state.as_ref().map(|(_, meta)| meta))
            .finish_non_exhaustive()
    }
}

impl<P: LlmProvider, S: VectorStore + Default> VectorIndex<P, S> {
    #[must_use]
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            provider,
            state: None,
        }
    }

    #[must_use]
    pub fn is_built(&self) -> bool {
        self.state.is_some()
    }

    /// Number of indexed chunks, zero before build or load.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.as_ref().map_or(0, |(store, _)| store.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn meta(&self) -> Option<&IndexMeta> {
        self.state.as_ref().map(|(_, meta)| meta)
    }

    /// Embed `chunks` and replace the current index with them.
    ///
    /// Chunks with empty or whitespace-only content are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::EmptyInput`] if no chunk has content, or an embedding
    /// or store error. On error the previous index is left untouched.
    pub async fn build(&mut self, chunks: &[Chunk]) -> Result<(), IndexError> {
        let valid: Vec<&Chunk> = chunks
            .iter()
            .filter(|c| !c.content.trim().is_empty())
            .collect();
        if valid.is_empty() {
            return Err(IndexError::EmptyInput);
        }
        if valid.len() < chunks.len() {
            tracing::debug!(
                skipped = chunks.len() - valid.len(),
                "skipping blank chunks"
            );
        }

        let mut points = Vec::with_capacity(valid.len());
        let mut dimensions = None;
        for (position, chunk) in valid.into_iter().enumerate() {
            let vector = self.provider.embed(&chunk.content).await?;
            match dimensions {
                None => dimensions = Some(vector.len()),
                Some(expected) if expected != vector.len() => {
                    return Err(IndexError::DimensionMismatch {
                        expected,
                        actual: vector.len(),
                    });
                }
                Some(_) => {}
            }
            points.push(VectorPoint {
                id: point_id(position, chunk),
                vector,
                payload: chunk_payload(chunk),
            });
        }

        let store = S::default();
        store.upsert(points).await?;

        let meta = IndexMeta {
            format_version: FORMAT_VERSION,
            provider: self.provider.name().to_owned(),
            embedding_model: self.provider.embedding_model().map(str::to_owned),
            dimensions: dimensions.unwrap_or_default(),
            chunk_count: store.len(),
            checksum: String::new(),
        };
        tracing::info!(
            chunks = meta.chunk_count,
            dimensions = meta.dimensions,
            "index built"
        );
        self.state = Some((store, meta));
        Ok(())
    }

    /// The `k` chunks most similar to `query`, nearest first.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::NotBuilt`] before [`Self::build`] or [`Self::load`],
    /// [`IndexError::DimensionMismatch`] if the query embedding has a different
    /// length than the indexed vectors, or an embedding error.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Chunk>, IndexError> {
        let (store, meta) = self.state.as_ref().ok_or(IndexError::NotBuilt)?;

        let vector = self.provider.embed(query).await?;
        if vector.len() != meta.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: meta.dimensions,
                actual: vector.len(),
            });
        }

        let hits = store.search(vector, k).await?;
        tracing::debug!(query, k, hits = hits.len(), "retrieved chunks");
        hits.iter().map(|hit| chunk_from_payload(&hit.payload)).collect()
    }

    /// Persist the index into `dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::NotBuilt`] if there is nothing to save, or an IO or
    /// serialization error.
    pub async fn save(&self, dir: &Path) -> Result<(), IndexError> {
        let (store, meta) = self.state.as_ref().ok_or(IndexError::NotBuilt)?;

        let bytes = store.serialize()?;
        let meta = IndexMeta {
            checksum: blake3::hash(&bytes).to_hex().to_string(),
            chunk_count: store.len(),
            ..meta.clone()
        };

        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(dir.join(STORE_FILE), &bytes).await?;
        tokio::fs::write(dir.join(META_FILE), serde_json::to_vec_pretty(&meta)?).await?;

        tracing::info!(path = %dir.display(), chunks = meta.chunk_count, "index saved");
        Ok(())
    }

    /// Replace the current index with the one saved in `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Corrupted`] if the files fail validation,
    /// [`IndexError::EmbedderMismatch`] if the index was built with a different
    /// embedding model than this index's provider uses, or an IO error.
    pub async fn load(&mut self, dir: &Path) -> Result<(), IndexError> {
        let meta_bytes = tokio::fs::read(dir.join(META_FILE)).await?;
        let meta: IndexMeta = serde_json::from_slice(&meta_bytes)
            .map_err(|e| IndexError::Corrupted(format!("invalid {META_FILE}: {e}")))?;

        if meta.format_version != FORMAT_VERSION {
            return Err(IndexError::Corrupted(format!(
                "unsupported format version {}",
                meta.format_version
            )));
        }

        let bytes = tokio::fs::read(dir.join(STORE_FILE)).await?;
        let checksum = blake3::hash(&bytes).to_hex().to_string();
        if checksum != meta.checksum {
            return Err(IndexError::Corrupted("checksum mismatch".into()));
        }

        let current = self.provider.embedding_model();
        if meta.embedding_model.as_deref() != current {
            return Err(IndexError::EmbedderMismatch {
                expected: meta.embedding_model.unwrap_or_else(|| "<none>".into()),
                actual: current.unwrap_or("<none>").to_owned(),
            });
        }

        let store = S::deserialize(&bytes)
            .map_err(|e| IndexError::Corrupted(format!("invalid {STORE_FILE}: {e}")))?;
        if store.len() != meta.chunk_count {
            return Err(IndexError::Corrupted(format!(
                "expected {} chunks, found {}",
                meta.chunk_count,
                store.len()
            )));
        }

        tracing::info!(path = %dir.display(), chunks = meta.chunk_count, "index loaded");
        self.state = Some((store, meta));
        Ok(())
    }
}

/// Ids are unique within one build: `position` is the chunk's place in the build input,
/// since `chunk_index` restarts for every document.
fn point_id(position: usize, chunk: &Chunk) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(position as u64).to_le_bytes());
    hasher.update(chunk.metadata.source.as_bytes());
    hasher.update(&[0]);
    hasher.update(&chunk.metadata.page.unwrap_or_default().to_le_bytes());
    hasher.update(&(chunk.chunk_index as u64).to_le_bytes());
    hasher.update(&[0]);
    hasher.update(chunk.content.as_bytes());
    hasher.finalize().to_hex().to_string()
}

fn chunk_payload(chunk: &Chunk) -> HashMap<String, Value> {
    let meta = &chunk.metadata;
    let mut payload = HashMap::new();
    payload.insert("content".into(), Value::from(chunk.content.as_str()));
    payload.insert("source".into(), Value::from(meta.source.as_str()));
    payload.insert("content_type".into(), Value::from(meta.content_type.as_str()));
    payload.insert("chunk_index".into(), Value::from(chunk.chunk_index));
    if let Some(title) = &meta.title {
        payload.insert("title".into(), Value::from(title.as_str()));
    }
    if let Some(page) = meta.page {
        payload.insert("page".into(), Value::from(page));
    }
    payload
}

fn chunk_from_payload(payload: &HashMap<String, Value>) -> Result<Chunk, IndexError> {
    let text = |key: &str| payload.get(key).and_then(Value::as_str).map(str::to_owned);
    let required = |key: &str| {
        text(key).ok_or_else(|| IndexError::Corrupted(format!("point payload missing {key}")))
    };

    let page = payload
        .get("page")
        .and_then(Value::as_u64)
        .and_then(|p| u32::try_from(p).ok());
    let chunk_index = payload
        .get("chunk_index")
        .and_then(Value::as_u64)
        .and_then(|i| usize::try_from(i).ok())
        .unwrap_or_default();

    Ok(Chunk {
        content: required("content")?,
        metadata: DocumentMetadata {
            source: required("source")?,
            title: text("title"),
            page,
            content_type: text("content_type").unwrap_or_else(|| "text/plain".into()),
        },
        chunk_index,
    })
}
