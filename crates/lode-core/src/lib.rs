//! Answer agent, two-step RAG workflow and runtime configuration.

pub mod agent;
pub mod config;
pub mod workflow;

pub use agent::{AgentBuilder, AgentError, AnswerAgent, DEFAULT_SYSTEM_PROMPT, FALLBACK_ANSWER};
pub use config::Config;
pub use workflow::{RagState, RagWorkflow};
