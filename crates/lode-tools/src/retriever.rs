use std::fmt::Write;
use std::sync::Arc;

use lode_llm::LlmProvider;
use lode_memory::document::Chunk;
use lode_memory::{InMemoryVectorStore, VectorIndex, VectorStore};

use crate::config::RetrieverConfig;
use crate::executor::{ToolCall, ToolError, ToolExecutor, ToolOutput, deserialize_params};
use crate::registry::{QueryParams, ToolDef};

pub const TOOL_ID: &str = "retriever";

const NO_DOCUMENTS: &str = "No documents found.";

/// Searches the ingested corpus through a shared [`VectorIndex`].
pub struct RetrieverExecutor<P, S = InMemoryVectorStore> {
    index: Arc<VectorIndex<P, S>>,
    top_k: usize,
}

impl<P, S> std::fmt::Debug for RetrieverExecutor<P, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrieverExecutor")
            .field("top_k", &self.top_k)
            .finish_non_exhaustive()
    }
}

impl<P, S> RetrieverExecutor<P, S> {
    #[must_use]
    pub fn new(index: Arc<VectorIndex<P, S>>, config: &RetrieverConfig) -> Self {
        Self {
            index,
            top_k: config.top_k,
        }
    }
}

impl<P, S> ToolExecutor for RetrieverExecutor<P, S>
where
    P: LlmProvider,
    S: VectorStore + Default,
{
    fn tool_definitions(&self) -> Vec<ToolDef> {
        vec![ToolDef {
            id: TOOL_ID,
            description: "Search in user-provided corpus.",
            schema: schemars::schema_for!(QueryParams),
        }]
    }

    async fn execute_tool_call(&self, call: &ToolCall) -> Result<Option<ToolOutput>, ToolError> {
        if call.tool_id != TOOL_ID {
            return Ok(None);
        }
        let params: QueryParams = deserialize_params(&call.params)?;
        let chunks = self.index.retrieve(&params.query, self.top_k).await?;
        tracing::debug!(query = %params.query, hits = chunks.len(), "retriever tool");

        Ok(Some(ToolOutput {
            tool_name: TOOL_ID.to_owned(),
            summary: format_documents(&chunks),
        }))
    }
}

/// Numbered `[i] title` blocks separated by blank lines. The title falls back to
/// the source, then to `doc_i`.
#[must_use]
pub fn format_documents(chunks: &[Chunk]) -> String {
    if chunks.is_empty() {
        return NO_DOCUMENTS.to_owned();
    }

    let mut out = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        let n = i + 1;
        let meta = &chunk.metadata;
        let title = meta
            .title
            .as_deref()
            .filter(|t| !t.is_empty())
            .or(Some(meta.source.as_str()).filter(|s| !s.is_empty()))
            .map_or_else(|| format!("doc_{n}"), str::to_owned);
        if i > 0 {
            out.push_str("\n\n");
        }
        let _ = write!(out, "[{n}] {title}\n{}", chunk.content);
    }
    out
}
