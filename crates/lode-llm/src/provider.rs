use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Structured piece of a message. Tool calls and their results travel as parts so
/// providers can map them onto their native wire format.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessagePart {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

impl Message {
    #[must_use]
    pub fn from_legacy(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            parts: vec![],
        }
    }

    /// Build a message from parts; `content` is the concatenation of its text parts.
    #[must_use]
    pub fn from_parts(role: Role, parts: Vec<MessagePart>) -> Self {
        let content = parts
            .iter()
            .filter_map(|p| match p {
                MessagePart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");
        Self {
            role,
            content,
            parts,
        }
    }

    #[must_use]
    pub fn has_tool_parts(&self) -> bool {
        self.parts.iter().any(|p| {
            matches!(
                p,
                MessagePart::ToolUse { .. } | MessagePart::ToolResult { .. }
            )
        })
    }
}

/// Tool advertised to the model: name, description and JSON schema of its input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Tool invocation requested by the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolUseRequest {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ChatResponse {
    /// Final assistant text.
    Text(String),
    /// The model wants tools executed before it can answer.
    ToolUse {
        text: Option<String>,
        tool_calls: Vec<ToolUseRequest>,
    },
}

pub trait LlmProvider: Send + Sync {
    /// Send messages to the LLM and return the assistant response.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails to communicate or the response is invalid.
    fn chat(&self, messages: &[Message]) -> impl Future<Output = Result<String, LlmError>> + Send;

    /// Send messages together with tool definitions.
    ///
    /// Providers without native tool support fall back to plain [`LlmProvider::chat`].
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails to communicate or the response is invalid.
    fn chat_with_tools(
        &self,
        messages: &[Message],
        _tools: &[ToolDefinition],
    ) -> impl Future<Output = Result<ChatResponse, LlmError>> + Send {
        async move { self.chat(messages).await.map(ChatResponse::Text) }
    }

    fn supports_tool_use(&self) -> bool {
        false
    }

    /// Embed `text` into a fixed-length vector.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider does not support embeddings or the request fails.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, LlmError>> + Send;

    fn supports_embeddings(&self) -> bool;

    /// Identifier of the embedding model. Persisted next to vector indexes so a
    /// mismatched embedder can be detected on load.
    fn embedding_model(&self) -> Option<&str> {
        None
    }

    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_parts_joins_text_only() {
        let msg = Message::from_parts(
            Role::Assistant,
            vec![
                MessagePart::Text {
                    text: "looking ".into(),
                },
                MessagePart::ToolUse {
                    id: "call_1".into(),
                    name: "retriever".into(),
                    input: serde_json::json!({"query": "rust"}),
                },
                MessagePart::Text { text: "up".into() },
            ],
        );
        assert_eq!(msg.content, "looking up");
        assert!(msg.has_tool_parts());
    }

    #[test]
    fn legacy_message_has_no_tool_parts() {
        let msg = Message::from_legacy(Role::User, "hi");
        assert!(!msg.has_tool_parts());
        assert!(msg.parts.is_empty());
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }

    struct TextOnly;

    impl LlmProvider for TextOnly {
        async fn chat(&self, _messages: &[Message]) -> Result<String, LlmError> {
            Ok("plain".into())
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, LlmError> {
            Err(LlmError::EmbedUnsupported {
                provider: "text-only".into(),
            })
        }

        fn supports_embeddings(&self) -> bool {
            false
        }

        fn name(&self) -> &str {
            "text-only"
        }
    }

    #[tokio::test]
    async fn chat_with_tools_defaults_to_text() {
        let resp = TextOnly.chat_with_tools(&[], &[]).await.unwrap();
        assert_eq!(resp, ChatResponse::Text("plain".into()));
        assert!(!TextOnly.supports_tool_use());
        assert!(TextOnly.embedding_model().is_none());
    }

    mod proptest_message {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn from_parts_content_is_text_concatenation(texts in prop::collection::vec(".{0,20}", 0..6)) {
                let parts: Vec<MessagePart> = texts
                    .iter()
                    .map(|t| MessagePart::Text { text: t.clone() })
                    .collect();
                let msg = Message::from_parts(Role::User, parts);
                prop_assert_eq!(&msg.content, &texts.concat());
                prop_assert!(!msg.has_tool_parts());
            }
        }
    }
}
