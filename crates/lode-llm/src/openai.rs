use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{
    ChatResponse, LlmProvider, Message, MessagePart, Role, ToolDefinition, ToolUseRequest,
};

pub struct OpenAiProvider {
    client: reqwest::Client,
    provider_name: String,
    api_key: Option<String>,
    base_url: String,
    model: String,
    max_tokens: u32,
    embedding_model: Option<String>,
}

impl fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("client", &"<reqwest::Client>")
            .field("provider_name", &self.provider_name)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("embedding_model", &self.embedding_model)
            .finish()
    }
}

impl Clone for OpenAiProvider {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            provider_name: self.provider_name.clone(),
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            embedding_model: self.embedding_model.clone(),
        }
    }
}

impl OpenAiProvider {
    #[must_use]
    pub fn new(
        api_key: Option<String>,
        mut base_url: String,
        model: String,
        max_tokens: u32,
        embedding_model: Option<String>,
    ) -> Self {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: crate::http::default_client(),
            provider_name: "openai".into(),
            api_key,
            base_url,
            model,
            max_tokens,
            embedding_model,
        }
    }

    /// Name reported by [`LlmProvider::name`] and in errors.
    #[must_use]
    pub fn with_provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = name.into();
        self
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let req = self
            .client
            .post(format!("{}/{path}", self.base_url))
            .header("Content-Type", "application/json");
        match self.api_key {
            Some(ref key) => req.header("Authorization", format!("Bearer {key}")),
            None => req,
        }
    }

    async fn send_json<B: Serialize>(&self, path: &str, body: &B) -> Result<String, LlmError> {
        let response = self.post(path).json(body).send().await?;
        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }

        if !status.is_success() {
            tracing::error!(provider = %self.provider_name, "API error {status}: {text}");
            return Err(LlmError::Status {
                provider: self.provider_name.clone(),
                status: status.as_u16(),
            });
        }

        Ok(text)
    }
}

impl LlmProvider for OpenAiProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        let api_messages = convert_messages_structured(messages);
        let body = ChatRequest {
            model: &self.model,
            messages: &api_messages,
            max_tokens: self.max_tokens,
        };
        let text = self.send_json("chat/completions", &body).await?;
        let resp: ToolChatResponse = serde_json::from_str(&text)?;

        resp.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(LlmError::EmptyResponse {
                provider: self.provider_name.clone(),
            })
    }

    fn supports_tool_use(&self) -> bool {
        true
    }

    async fn chat_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse, LlmError> {
        let api_messages = convert_messages_structured(messages);

        let api_tools: Vec<OpenAiTool> = tools
            .iter()
            .map(|t| OpenAiTool {
                r#type: "function",
                function: OpenAiFunction {
                    name: &t.name,
                    description: &t.description,
                    parameters: &t.parameters,
                },
            })
            .collect();

        let body = ToolChatRequest {
            model: &self.model,
            messages: &api_messages,
            max_tokens: self.max_tokens,
            tools: &api_tools,
        };

        let text = self.send_json("chat/completions", &body).await?;
        let resp: ToolChatResponse = serde_json::from_str(&text)?;

        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse {
                provider: self.provider_name.clone(),
            })?;

        if let Some(tool_calls) = choice.message.tool_calls
            && !tool_calls.is_empty()
        {
            let text = if choice.message.content.is_empty() {
                None
            } else {
                Some(choice.message.content)
            };
            let calls = tool_calls
                .into_iter()
                .map(|tc| {
                    let input = serde_json::from_str(&tc.function.arguments)
                        .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));
                    ToolUseRequest {
                        id: tc.id,
                        name: tc.function.name,
                        input,
                    }
                })
                .collect();
            return Ok(ChatResponse::ToolUse {
                text,
                tool_calls: calls,
            });
        }

        Ok(ChatResponse::Text(choice.message.content))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let model = self
            .embedding_model
            .as_deref()
            .ok_or(LlmError::EmbedUnsupported {
                provider: self.provider_name.clone(),
            })?;

        let body = EmbeddingRequest { input: text, model };
        let text = self.send_json("embeddings", &body).await?;
        let resp: EmbeddingResponse = serde_json::from_str(&text)?;

        resp.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or(LlmError::EmptyResponse {
                provider: self.provider_name.clone(),
            })
    }

    fn supports_embeddings(&self) -> bool {
        self.embedding_model.is_some()
    }

    fn embedding_model(&self) -> Option<&str> {
        self.embedding_model.as_deref()
    }

    fn name(&self) -> &str {
        &self.provider_name
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [StructuredApiMessage],
    max_tokens: u32,
}

#[derive(Serialize)]
struct OpenAiTool<'a> {
    r#type: &'a str,
    function: OpenAiFunction<'a>,
}

#[derive(Serialize)]
struct OpenAiFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Serialize)]
struct ToolChatRequest<'a> {
    model: &'a str,
    messages: &'a [StructuredApiMessage],
    max_tokens: u32,
    tools: &'a [OpenAiTool<'a>],
}

#[derive(Serialize, Debug)]
struct StructuredApiMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAiToolCallOut>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Serialize, Debug)]
struct OpenAiToolCallOut {
    id: String,
    r#type: String,
    function: OpenAiFunctionCall,
}

#[derive(Serialize, Debug)]
struct OpenAiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct ToolChatResponse {
    choices: Vec<ToolChatChoice>,
}

#[derive(Deserialize)]
struct ToolChatChoice {
    message: ToolChatMessage,
}

#[derive(Deserialize)]
struct ToolChatMessage {
    #[serde(default, deserialize_with = "null_as_empty")]
    content: String,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
struct OpenAiToolCall {
    id: String,
    function: OpenAiToolCallFunction,
}

#[derive(Deserialize)]
struct OpenAiToolCallFunction {
    name: String,
    arguments: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

fn convert_messages_structured(messages: &[Message]) -> Vec<StructuredApiMessage> {
    let mut result = Vec::new();

    for msg in messages {
        if !msg.has_tool_parts() {
            result.push(StructuredApiMessage {
                role: role_str(msg.role).to_owned(),
                content: msg.content.clone(),
                tool_calls: None,
                tool_call_id: None,
            });
            continue;
        }

        // tool use parts map onto `tool_calls`
        if msg.role == Role::Assistant {
            let tool_calls: Vec<OpenAiToolCallOut> = msg
                .parts
                .iter()
                .filter_map(|p| match p {
                    MessagePart::ToolUse { id, name, input } => Some(OpenAiToolCallOut {
                        id: id.clone(),
                        r#type: "function".to_owned(),
                        function: OpenAiFunctionCall {
                            name: name.clone(),
                            arguments: serde_json::to_string(input).unwrap_or_default(),
                        },
                    }),
                    _ => None,
                })
                .collect();

            result.push(StructuredApiMessage {
                role: "assistant".to_owned(),
                content: msg.content.clone(),
                tool_calls: Some(tool_calls),
                tool_call_id: None,
            });
            continue;
        }

        // each tool result becomes its own `tool` message
        for part in &msg.parts {
            match part {
                MessagePart::ToolResult {
                    tool_use_id,
                    content,
                    ..
                } => {
                    result.push(StructuredApiMessage {
                        role: "tool".to_owned(),
                        content: content.clone(),
                        tool_calls: None,
                        tool_call_id: Some(tool_use_id.clone()),
                    });
                }
                MessagePart::Text { text } if !text.is_empty() => {
                    result.push(StructuredApiMessage {
                        role: "user".to_owned(),
                        content: text.clone(),
                        tool_calls: None,
                        tool_call_id: None,
                    });
                }
                _ => {}
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn provider_for(server: &MockServer) -> OpenAiProvider {
        OpenAiProvider::new(
            Some("sk-test".into()),
            format!("{}/v1/", server.uri()),
            "gpt-test".into(),
            256,
            Some("embed-test".into()),
        )
    }

    #[test]
    fn base_url_trailing_slashes_trimmed() {
        let p = OpenAiProvider::new(None, "http://host/v1//".into(), "m".into(), 1, None);
        assert_eq!(p.base_url, "http://host/v1");
    }

    #[test]
    fn debug_redacts_api_key() {
        let p = OpenAiProvider::new(Some("secret".into()), "http://h".into(), "m".into(), 1, None);
        let dbg = format!("{p:?}");
        assert!(!dbg.contains("secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn convert_plain_messages() {
        let converted = convert_messages_structured(&[
            Message::from_legacy(Role::System, "sys"),
            Message::from_legacy(Role::User, "hi"),
        ]);
        assert_eq!(converted.len(), 2);
        assert_eq!(converted[0].role, "system");
        assert_eq!(converted[1].content, "hi");
        assert!(converted[1].tool_calls.is_none());
    }

    #[test]
    fn convert_messages_with_tool_parts() {
        let messages = vec![
            Message::from_parts(
                Role::Assistant,
                vec![MessagePart::ToolUse {
                    id: "call_1".into(),
                    name: "retriever".into(),
                    input: serde_json::json!({"query": "rust"}),
                }],
            ),
            Message::from_parts(
                Role::User,
                vec![MessagePart::ToolResult {
                    tool_use_id: "call_1".into(),
                    content: "[1] A\nbody".into(),
                    is_error: false,
                }],
            ),
        ];
        let converted = convert_messages_structured(&messages);
        assert_eq!(converted.len(), 2);
        let calls = converted[0].tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "retriever");
        assert_eq!(calls[0].function.arguments, r#"{"query":"rust"}"#);
        assert_eq!(converted[1].role, "tool");
        assert_eq!(converted[1].tool_call_id.as_deref(), Some("call_1"));
    }

    #[tokio::test]
    async fn chat_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "hello"}}]
            })))
            .mount(&server)
            .await;

        let p = provider_for(&server);
        let out = p
            .chat(&[Message::from_legacy(Role::User, "hi")])
            .await
            .unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn chat_with_tools_parses_tool_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": {"name": "wikipedia", "arguments": "{\"query\":\"Ada Lovelace\"}"}
                    }]
                }}]
            })))
            .mount(&server)
            .await;

        let p = provider_for(&server);
        let resp = p
            .chat_with_tools(&[Message::from_legacy(Role::User, "who?")], &[])
            .await
            .unwrap();
        let ChatResponse::ToolUse { text, tool_calls } = resp else {
            panic!("expected tool use");
        };
        assert!(text.is_none());
        assert_eq!(tool_calls.len(), 1);
        assert_eq!(tool_calls[0].id, "call_9");
        assert_eq!(tool_calls[0].input["query"], "Ada Lovelace");
    }

    #[tokio::test]
    async fn chat_with_tools_plain_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "42"}}]
            })))
            .mount(&server)
            .await;

        let resp = provider_for(&server)
            .chat_with_tools(&[Message::from_legacy(Role::User, "q")], &[])
            .await
            .unwrap();
        assert_eq!(resp, ChatResponse::Text("42".into()));
    }

    #[tokio::test]
    async fn rate_limit_maps_to_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .chat(&[Message::from_legacy(Role::User, "q")])
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::RateLimited));
    }

    #[tokio::test]
    async fn server_error_maps_to_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .chat(&[Message::from_legacy(Role::User, "q")])
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn embed_returns_vector() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"embedding": [0.1, 0.2, 0.3]}]
            })))
            .mount(&server)
            .await;

        let v = provider_for(&server).embed("text").await.unwrap();
        assert_eq!(v, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn embed_without_model_returns_error() {
        let p = OpenAiProvider::new(None, "http://127.0.0.1:1".into(), "m".into(), 1, None);
        assert!(!p.supports_embeddings());
        let result = p.embed("test").await;
        assert!(matches!(result, Err(LlmError::EmbedUnsupported { .. })));
    }

    #[tokio::test]
    async fn embed_empty_data_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})),
            )
            .mount(&server)
            .await;

        let result = provider_for(&server).embed("text").await;
        assert!(matches!(result, Err(LlmError::EmptyResponse { .. })));
    }
}
