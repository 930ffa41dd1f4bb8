//! Two-step question pipeline: retrieve supporting chunks, then let the agent answer.

use std::sync::Arc;

use lode_llm::LlmProvider;
use lode_memory::document::Chunk;
use lode_memory::{DEFAULT_TOP_K, IndexError, InMemoryVectorStore, VectorIndex, VectorStore};
use lode_tools::ToolExecutor;

use crate::agent::AnswerAgent;

/// Result of one [`RagWorkflow::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RagState {
    pub question: String,
    pub retrieved_docs: Vec<Chunk>,
    pub answer: Option<String>,
}

impl RagState {
    #[must_use]
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            retrieved_docs: Vec::new(),
            answer: None,
        }
    }
}

pub struct RagWorkflow<P, T, S = InMemoryVectorStore> {
    index: Arc<VectorIndex<P, S>>,
    agent: AnswerAgent<P, T>,
    top_k: usize,
}

impl<P, T, S> RagWorkflow<P, T, S>
where
    P: LlmProvider,
    T: ToolExecutor,
    S: VectorStore + Default,
{
    #[must_use]
    pub fn new(index: Arc<VectorIndex<P, S>>, agent: AnswerAgent<P, T>) -> Self {
        Self {
            index,
            agent,
            top_k: DEFAULT_TOP_K,
        }
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// # Errors
    ///
    /// Returns an error if the index is not built or the query cannot be embedded.
    pub async fn retrieve_docs(&self, state: RagState) -> Result<RagState, IndexError> {
        let docs = self.index.retrieve(&state.question, self.top_k).await?;
        tracing::debug!(hits = docs.len(), "retrieve_docs");
        Ok(RagState {
            question: state.question,
            retrieved_docs: docs,
            answer: None,
        })
    }

    pub async fn generate_answer(&self, state: RagState) -> RagState {
        let answer = self.agent.answer(&state.question).await;
        RagState {
            answer: Some(answer),
            ..state
        }
    }

    /// Run both steps in order.
    ///
    /// # Errors
    ///
    /// Propagates retrieval failures; answer generation itself never fails.
    pub async fn run(&self, question: &str) -> Result<RagState, IndexError> {
        let state = self.retrieve_docs(RagState::new(question)).await?;
        Ok(self.generate_answer(state).await)
    }
}
