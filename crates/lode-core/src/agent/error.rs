#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Llm(#[from] lode_llm::LlmError),

    #[error(transparent)]
    Tool(#[from] lode_tools::ToolError),

    #[error("tool loop did not finish within {0} iterations")]
    MaxIterations(usize),

    #[error("model returned an empty answer")]
    EmptyAnswer,
}
