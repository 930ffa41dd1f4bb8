//! Tools the answer agent can call: corpus retrieval and Wikipedia lookup.

pub mod composite;
pub mod config;
pub mod executor;
pub mod registry;
pub mod retriever;
pub mod wikipedia;

pub use composite::CompositeExecutor;
pub use config::{RetrieverConfig, ToolsConfig, WikipediaConfig};
pub use executor::{ToolCall, ToolError, ToolExecutor, ToolOutput};
pub use registry::ToolDef;
pub use retriever::RetrieverExecutor;
pub use wikipedia::WikipediaExecutor;
