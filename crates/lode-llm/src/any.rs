use crate::compatible::CompatibleProvider;
#[cfg(feature = "mock")]
use crate::mock::MockProvider;
use crate::openai::OpenAiProvider;
use crate::provider::{ChatResponse, LlmProvider, Message, ToolDefinition};

/// Generates a match over all `AnyProvider` variants, binding the inner provider
/// and evaluating the given expression for each arm.
macro_rules! delegate_provider {
    ($self:expr, |$p:ident| $expr:expr) => {
        match $self {
            AnyProvider::OpenAi($p) => $expr,
            AnyProvider::Compatible($p) => $expr,
            #[cfg(feature = "mock")]
            AnyProvider::Mock($p) => $expr,
        }
    };
}

/// Provider chosen at runtime from configuration.
#[derive(Debug, Clone)]
pub enum AnyProvider {
    OpenAi(OpenAiProvider),
    Compatible(CompatibleProvider),
    #[cfg(feature = "mock")]
    Mock(MockProvider),
}

impl LlmProvider for AnyProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, crate::LlmError> {
        delegate_provider!(self, |p| p.chat(messages).await)
    }

    fn supports_tool_use(&self) -> bool {
        delegate_provider!(self, |p| p.supports_tool_use())
    }

    async fn chat_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse, crate::LlmError> {
        delegate_provider!(self, |p| p.chat_with_tools(messages, tools).await)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, crate::LlmError> {
        delegate_provider!(self, |p| p.embed(text).await)
    }

    fn supports_embeddings(&self) -> bool {
        delegate_provider!(self, |p| p.supports_embeddings())
    }

    fn embedding_model(&self) -> Option<&str> {
        delegate_provider!(self, |p| p.embedding_model())
    }

    fn name(&self) -> &str {
        delegate_provider!(self, |p| p.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_openai_name() {
        let p = AnyProvider::OpenAi(OpenAiProvider::new(
            None,
            "http://localhost".into(),
            "gpt-4o-mini".into(),
            100,
            Some("text-embedding-3-small".into()),
        ));
        assert_eq!(p.name(), "openai");
        assert!(p.supports_tool_use());
        assert_eq!(p.embedding_model(), Some("text-embedding-3-small"));
    }

    #[test]
    fn any_compatible_name() {
        let p = AnyProvider::Compatible(CompatibleProvider::new(
            "ollama".into(),
            None,
            "http://localhost:11434/v1".into(),
            "llama3.2".into(),
            100,
            None,
        ));
        assert_eq!(p.name(), "ollama");
        assert!(!p.supports_embeddings());
    }

    #[cfg(feature = "mock")]
    #[tokio::test]
    async fn any_mock_delegates_chat() {
        let p = AnyProvider::Mock(MockProvider::with_text_responses(vec!["hi".into()]));
        assert_eq!(p.name(), "mock");
        assert_eq!(p.chat(&[]).await.unwrap(), "hi");
    }
}
