use std::collections::HashMap;
use std::fmt;
use std::future::Future;

use crate::registry::ToolDef;

/// Structured tool invocation from LLM.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub tool_id: String,
    pub params: HashMap<String, serde_json::Value>,
}

/// Structured result from tool execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub tool_name: String,
    pub summary: String,
}

impl fmt::Display for ToolOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary)
    }
}

/// Errors that can occur during tool execution.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("invalid tool parameters: {message}")]
    InvalidParams { message: String },

    #[error("retrieval failed: {0}")]
    Retrieval(#[from] lode_memory::IndexError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("lookup service returned HTTP {status}")]
    HttpStatus { status: u16 },
}

/// Deserialize tool call params from a `HashMap<String, Value>` into a typed struct.
///
/// # Errors
///
/// Returns `ToolError::InvalidParams` when deserialization fails.
pub fn deserialize_params<T: serde::de::DeserializeOwned, S: std::hash::BuildHasher>(
    params: &HashMap<String, serde_json::Value, S>,
) -> Result<T, ToolError> {
    let obj =
        serde_json::Value::Object(params.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
    serde_json::from_value(obj).map_err(|e| ToolError::InvalidParams {
        message: e.to_string(),
    })
}

/// Backend that can run one or more named tools.
pub trait ToolExecutor: Send + Sync {
    /// Return tool definitions this executor can handle.
    fn tool_definitions(&self) -> Vec<ToolDef>;

    /// Execute a structured tool call. Returns `None` if `tool_id` is not handled.
    fn execute_tool_call(
        &self,
        call: &ToolCall,
    ) -> impl Future<Output = Result<Option<ToolOutput>, ToolError>> + Send;
}

/// A disabled executor handles nothing.
impl<T: ToolExecutor> ToolExecutor for Option<T> {
    fn tool_definitions(&self) -> Vec<ToolDef> {
        self.as_ref().map(T::tool_definitions).unwrap_or_default()
    }

    async fn execute_tool_call(&self, call: &ToolCall) -> Result<Option<ToolOutput>, ToolError> {
        match self {
            Some(inner) => inner.execute_tool_call(call).await,
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_output_display() {
        let output = ToolOutput {
            tool_name: "retriever".to_owned(),
            summary: "[1] A\nbody".to_owned(),
        };
        assert_eq!(output.to_string(), "[1] A\nbody");
    }

    #[test]
    fn tool_error_unknown_tool_display() {
        let err = ToolError::UnknownTool {
            name: "calculator".to_owned(),
        };
        assert_eq!(err.to_string(), "unknown tool: calculator");
    }

    #[test]
    fn tool_error_invalid_params_display() {
        let err = ToolError::InvalidParams {
            message: "missing field `query`".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "invalid tool parameters: missing field `query`"
        );
    }

    #[test]
    fn tool_error_retrieval_wraps_index_error() {
        let err = ToolError::from(lode_memory::IndexError::NotBuilt);
        assert_eq!(
            err.to_string(),
            "retrieval failed: index has not been built or loaded"
        );
    }

    #[test]
    fn deserialize_params_valid() {
        #[derive(Debug, serde::Deserialize, PartialEq)]
        struct P {
            query: String,
            count: u32,
        }
        let mut map = HashMap::new();
        map.insert("query".to_owned(), serde_json::json!("rust"));
        map.insert("count".to_owned(), serde_json::json!(42));
        let p: P = deserialize_params(&map).unwrap();
        assert_eq!(
            p,
            P {
                query: "rust".to_owned(),
                count: 42
            }
        );
    }

    #[test]
    fn deserialize_params_missing_required_field() {
        #[derive(Debug, serde::Deserialize)]
        struct P {
            #[allow(dead_code)]
            query: String,
        }
        let map: HashMap<String, serde_json::Value> = HashMap::new();
        let err = deserialize_params::<P, _>(&map).unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams { .. }));
    }

    #[test]
    fn deserialize_params_wrong_type() {
        #[derive(Debug, serde::Deserialize)]
        struct P {
            #[allow(dead_code)]
            query: String,
        }
        let mut map = HashMap::new();
        map.insert("query".to_owned(), serde_json::json!(17));
        let err = deserialize_params::<P, _>(&map).unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams { .. }));
    }

    #[derive(Debug)]
    struct EchoExecutor;

    impl ToolExecutor for EchoExecutor {
        fn tool_definitions(&self) -> Vec<ToolDef> {
            vec![ToolDef {
                id: "echo",
                description: "Echo the query",
                schema: schemars::schema_for!(crate::registry::QueryParams),
            }]
        }

        async fn execute_tool_call(
            &self,
            call: &ToolCall,
        ) -> Result<Option<ToolOutput>, ToolError> {
            Ok(Some(ToolOutput {
                tool_name: call.tool_id.clone(),
                summary: "echoed".to_owned(),
            }))
        }
    }

    #[tokio::test]
    async fn disabled_executor_handles_nothing() {
        let disabled: Option<EchoExecutor> = None;
        assert!(disabled.tool_definitions().is_empty());
        let call = ToolCall {
            tool_id: "echo".to_owned(),
            params: HashMap::new(),
        };
        assert!(disabled.execute_tool_call(&call).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn enabled_executor_delegates() {
        let enabled = Some(EchoExecutor);
        assert_eq!(enabled.tool_definitions().len(), 1);
        let call = ToolCall {
            tool_id: "echo".to_owned(),
            params: HashMap::new(),
        };
        let out = enabled.execute_tool_call(&call).await.unwrap().unwrap();
        assert_eq!(out.summary, "echoed");
    }
}
