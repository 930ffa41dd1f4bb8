//! Tool-calling answer agent.
//!
//! The agent sends the question to the model together with the tool catalogue and
//! keeps executing requested tools until the model replies with plain text.

mod error;

use std::sync::Arc;

use lode_llm::LlmProvider;
use lode_llm::provider::{ChatResponse, Message, MessagePart, Role, ToolDefinition, ToolUseRequest};
use lode_tools::{ToolCall, ToolDef, ToolError, ToolExecutor};

pub use error::AgentError;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful RAG agent.\n\
- Prefer the 'retriever' tool for document-based questions.\n\
- Use 'wikipedia' for external general knowledge.\n\
- Return only the final answer.";

/// Answer returned whenever the agent cannot produce one.
pub const FALLBACK_ANSWER: &str = "Could not generate answer.";

pub const DEFAULT_MAX_TOOL_ITERATIONS: usize = 10;

pub struct AgentBuilder<P, T> {
    provider: Arc<P>,
    tools: T,
    system_prompt: String,
    max_tool_iterations: usize,
}

impl<P: LlmProvider, T: ToolExecutor> AgentBuilder<P, T> {
    #[must_use]
    pub fn new(provider: Arc<P>, tools: T) -> Self {
        Self {
            provider,
            tools,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_owned(),
            max_tool_iterations: DEFAULT_MAX_TOOL_ITERATIONS,
        }
    }

    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Upper bound on model round trips that end in tool calls. Zero is treated as one.
    #[must_use]
    pub fn max_tool_iterations(mut self, max: usize) -> Self {
        self.max_tool_iterations = max.max(1);
        self
    }

    #[must_use]
    pub fn build(self) -> AnswerAgent<P, T> {
        let tool_defs = self
            .tools
            .tool_definitions()
            .iter()
            .map(tool_def_to_definition)
            .collect();
        AnswerAgent {
            provider: self.provider,
            tools: self.tools,
            tool_defs,
            system_prompt: self.system_prompt,
            max_tool_iterations: self.max_tool_iterations,
        }
    }
}

/// Immutable agent handle. Each [`AnswerAgent::answer`] call starts a fresh conversation.
pub struct AnswerAgent<P, T> {
    provider: Arc<P>,
    tools: T,
    tool_defs: Vec<ToolDefinition>,
    system_prompt: String,
    max_tool_iterations: usize,
}

impl<P, T> std::fmt::Debug for AnswerAgent<P, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerAgent")
            .field(
                "tools",
                &self.tool_defs.iter().map(|d| &d.name).collect::<Vec<_>>(),
            )
            .field("max_tool_iterations", &self.max_tool_iterations)
            .finish_non_exhaustive()
    }
}

impl<P: LlmProvider, T: ToolExecutor> AnswerAgent<P, T> {
    #[must_use]
    pub fn tool_definitions(&self) -> &[ToolDefinition] {
        &self.tool_defs
    }

    /// Answer `question`, falling back to [`FALLBACK_ANSWER`] on any failure.
    pub async fn answer(&self, question: &str) -> String {
        match self.try_answer(question).await {
            Ok(answer) => answer,
            Err(AgentError::EmptyAnswer) => {
                tracing::warn!("model returned an empty answer");
                FALLBACK_ANSWER.to_owned()
            }
            Err(e) => {
                tracing::error!("answer generation failed: {e}");
                FALLBACK_ANSWER.to_owned()
            }
        }
    }

    /// Run the tool loop and return the model's final text.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider or a tool fails, the model names an unknown
    /// tool, the loop exceeds the iteration limit, or the final text is empty.
    pub async fn try_answer(&self, question: &str) -> Result<String, AgentError> {
        let mut messages = vec![
            Message::from_legacy(Role::System, self.system_prompt.as_str()),
            Message::from_legacy(Role::User, question),
        ];

        for iteration in 0..self.max_tool_iterations {
            tracing::debug!(
                iteration,
                provider = self.provider.name(),
                tool_count = self.tool_defs.len(),
                "chat_with_tools"
            );
            let response = self
                .provider
                .chat_with_tools(&messages, &self.tool_defs)
                .await?;

            match response {
                ChatResponse::Text(text) => {
                    let answer = text.trim();
                    if answer.is_empty() {
                        return Err(AgentError::EmptyAnswer);
                    }
                    return Ok(answer.to_owned());
                }
                ChatResponse::ToolUse { text, tool_calls } => {
                    messages.push(assistant_tool_message(text.as_deref(), &tool_calls));
                    let results = self.run_tools(&tool_calls).await?;
                    messages.push(Message::from_parts(Role::User, results));
                }
            }
        }

        Err(AgentError::MaxIterations(self.max_tool_iterations))
    }

    async fn run_tools(&self, tool_calls: &[ToolUseRequest]) -> Result<Vec<MessagePart>, AgentError> {
        let mut parts = Vec::with_capacity(tool_calls.len());
        for tc in tool_calls {
            let call = ToolCall {
                tool_id: tc.name.clone(),
                params: match &tc.input {
                    serde_json::Value::Object(map) => {
                        map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
                    }
                    _ => std::collections::HashMap::new(),
                },
            };
            let output = self
                .tools
                .execute_tool_call(&call)
                .await?
                .ok_or_else(|| ToolError::UnknownTool {
                    name: tc.name.clone(),
                })?;
            tracing::debug!(tool = %output.tool_name, chars = output.summary.len(), "tool finished");
            parts.push(MessagePart::ToolResult {
                tool_use_id: tc.id.clone(),
                content: output.summary,
                is_error: false,
            });
        }
        Ok(parts)
    }
}

fn assistant_tool_message(text: Option<&str>, tool_calls: &[ToolUseRequest]) -> Message {
    let mut parts = Vec::with_capacity(tool_calls.len() + 1);
    if let Some(t) = text
        && !t.is_empty()
    {
        parts.push(MessagePart::Text { text: t.to_owned() });
    }
    for tc in tool_calls {
        parts.push(MessagePart::ToolUse {
            id: tc.id.clone(),
            name: tc.name.clone(),
            input: tc.input.clone(),
        });
    }
    Message::from_parts(Role::Assistant, parts)
}

fn tool_def_to_definition(def: &ToolDef) -> ToolDefinition {
    let mut params = serde_json::to_value(&def.schema).unwrap_or_default();
    if let serde_json::Value::Object(ref mut map) = params {
        map.remove("$schema");
        map.remove("title");
    }
    ToolDefinition {
        name: def.id.to_owned(),
        description: def.description.to_owned(),
        parameters: params,
    }
}

#[cfg(test)]
mod tests {
    use lode_llm::mock::MockProvider;
    use lode_tools::ToolOutput;
    use lode_tools::registry::QueryParams;

    use super::*;

    #[derive(Debug)]
    struct Corpus;

    impl ToolExecutor for Corpus {
        fn tool_definitions(&self) -> Vec<ToolDef> {
            vec![ToolDef {
                id: "retriever",
                description: "Search in user-provided corpus.",
                schema: schemars::schema_for!(QueryParams),
            }]
        }

        async fn execute_tool_call(
            &self,
            call: &ToolCall,
        ) -> Result<Option<ToolOutput>, ToolError> {
            if call.tool_id != "retriever" {
                return Ok(None);
            }
            let query = call.params.get("query").and_then(|v| v.as_str()).unwrap_or("");
            Ok(Some(ToolOutput {
                tool_name: "retriever".into(),
                summary: format!("[1] notes\nfacts about {query}"),
            }))
        }
    }

    #[derive(Debug)]
    struct Broken;

    impl ToolExecutor for Broken {
        fn tool_definitions(&self) -> Vec<ToolDef> {
            Corpus.tool_definitions()
        }

        async fn execute_tool_call(
            &self,
            _call: &ToolCall,
        ) -> Result<Option<ToolOutput>, ToolError> {
            Err(ToolError::HttpStatus { status: 500 })
        }
    }

    fn tool_use(id: &str, name: &str, query: &str) -> ChatResponse {
        ChatResponse::ToolUse {
            text: None,
            tool_calls: vec![ToolUseRequest {
                id: id.into(),
                name: name.into(),
                input: serde_json::json!({"query": query}),
            }],
        }
    }

    #[tokio::test]
    async fn plain_text_answer() {
        let provider = Arc::new(MockProvider::with_text_responses(vec!["Paris".into()]));
        let agent = AgentBuilder::new(provider, Corpus).build();
        assert_eq!(agent.answer("Capital of France?").await, "Paris");
    }

    #[tokio::test]
    async fn tool_round_trip_feeds_result_back() {
        let provider = Arc::new(MockProvider::with_responses(vec![
            tool_use("call_1", "retriever", "rust"),
            ChatResponse::Text("Rust is a systems language.".into()),
        ]));
        let agent = AgentBuilder::new(provider.clone(), Corpus).build();

        let answer = agent.answer("What is Rust?").await;
        assert_eq!(answer, "Rust is a systems language.");

        let recorded = provider.recorded_messages();
        assert_eq!(recorded.len(), 2);
        let second = &recorded[1];
        assert_eq!(second.len(), 4);
        assert_eq!(second[0].role, Role::System);
        assert_eq!(second[0].content, DEFAULT_SYSTEM_PROMPT);
        assert!(matches!(
            &second[2].parts[0],
            MessagePart::ToolUse { id, name, .. } if id == "call_1" && name == "retriever"
        ));
        assert!(matches!(
            &second[3].parts[0],
            MessagePart::ToolResult { tool_use_id, content, is_error: false }
                if tool_use_id == "call_1" && content == "[1] notes\nfacts about rust"
        ));
    }

    #[tokio::test]
    async fn tool_failure_gives_fallback() {
        let provider = Arc::new(MockProvider::with_responses(vec![tool_use(
            "call_1",
            "retriever",
            "rust",
        )]));
        let agent = AgentBuilder::new(provider, Broken).build();
        assert_eq!(agent.answer("What is Rust?").await, FALLBACK_ANSWER);
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let provider = Arc::new(MockProvider::with_responses(vec![tool_use(
            "call_1",
            "calculator",
            "2+2",
        )]));
        let agent = AgentBuilder::new(provider, Corpus).build();
        let err = agent.try_answer("2+2?").await.unwrap_err();
        assert!(matches!(
            err,
            AgentError::Tool(ToolError::UnknownTool { ref name }) if name == "calculator"
        ));
    }

    #[tokio::test]
    async fn empty_text_gives_fallback() {
        let provider = Arc::new(MockProvider::with_text_responses(vec!["   ".into()]));
        let agent = AgentBuilder::new(provider, Corpus).build();
        assert_eq!(agent.answer("anything").await, FALLBACK_ANSWER);
    }

    #[tokio::test]
    async fn provider_failure_gives_fallback() {
        let agent = AgentBuilder::new(Arc::new(MockProvider::failing()), Corpus).build();
        assert_eq!(agent.answer("anything").await, FALLBACK_ANSWER);
    }

    #[tokio::test]
    async fn iteration_limit_stops_runaway_loop() {
        let responses = (0..5)
            .map(|i| tool_use(&format!("call_{i}"), "retriever", "again"))
            .collect();
        let provider = Arc::new(MockProvider::with_responses(responses));
        let agent = AgentBuilder::new(provider.clone(), Corpus)
            .max_tool_iterations(2)
            .build();

        let err = agent.try_answer("loop").await.unwrap_err();
        assert!(matches!(err, AgentError::MaxIterations(2)));
        assert_eq!(provider.recorded_messages().len(), 2);
        assert_eq!(agent.answer("loop").await, FALLBACK_ANSWER);
    }

    #[tokio::test]
    async fn custom_system_prompt_is_sent() {
        let provider = Arc::new(MockProvider::with_text_responses(vec!["ok".into()]));
        let agent = AgentBuilder::new(provider.clone(), Corpus)
            .system_prompt("Answer tersely.")
            .build();
        agent.answer("hi").await;
        assert_eq!(provider.recorded_messages()[0][0].content, "Answer tersely.");
    }

    #[test]
    fn tool_definition_strips_schema_noise() {
        let provider = Arc::new(MockProvider::default());
        let agent = AgentBuilder::new(provider, Corpus).build();
        let defs = agent.tool_definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "retriever");
        let obj = defs[0].parameters.as_object().unwrap();
        assert!(!obj.contains_key("$schema"));
        assert!(!obj.contains_key("title"));
        assert!(obj.contains_key("properties"));
    }
}
