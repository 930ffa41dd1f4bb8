use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::config::WikipediaConfig;
use crate::executor::{ToolCall, ToolError, ToolExecutor, ToolOutput, deserialize_params};
use crate::registry::{QueryParams, ToolDef};

pub const TOOL_ID: &str = "wikipedia";

const NO_RESULTS: &str = "No good Wikipedia Search Result was found";

/// Looks up general knowledge through the `MediaWiki` search API.
#[derive(Debug, Clone)]
pub struct WikipediaExecutor {
    client: reqwest::Client,
    endpoint: String,
    top_k_results: usize,
    max_chars: usize,
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    query: Option<ApiQuery>,
}

#[derive(Deserialize)]
struct ApiQuery {
    #[serde(default)]
    pages: Vec<ApiPage>,
}

#[derive(Deserialize)]
struct ApiPage {
    title: String,
    #[serde(default)]
    index: u32,
    #[serde(default)]
    extract: String,
}

impl WikipediaExecutor {
    #[must_use]
    pub fn new(config: &WikipediaConfig) -> Self {
        Self {
            client: lode_llm::http::client_with_timeout(Duration::from_secs(config.timeout)),
            endpoint: config.endpoint(),
            top_k_results: config.top_k_results,
            max_chars: config.max_chars,
        }
    }

    /// Search and summarize up to `top_k_results` pages for `query`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the API answers with a non-success status.
    pub async fn search(&self, query: &str) -> Result<String, ToolError> {
        let limit = self.top_k_results.to_string();
        let url = Url::parse_with_params(
            &format!("{}/w/api.php", self.endpoint),
            &[
                ("action", "query"),
                ("format", "json"),
                ("formatversion", "2"),
                ("generator", "search"),
                ("gsrsearch", query),
                ("gsrlimit", limit.as_str()),
                ("prop", "extracts"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("exlimit", limit.as_str()),
                ("redirects", "1"),
            ],
        )
        .map_err(|e| ToolError::InvalidParams {
            message: format!("invalid Wikipedia endpoint: {e}"),
        })?;

        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ToolError::HttpStatus {
                status: status.as_u16(),
            });
        }
        let body: ApiResponse = resp.json().await?;

        let mut pages = body.query.map(|q| q.pages).unwrap_or_default();
        pages.sort_by_key(|p| p.index);
        pages.truncate(self.top_k_results);

        let summaries: Vec<String> = pages
            .into_iter()
            .filter(|p| !p.extract.trim().is_empty())
            .map(|p| format!("Page: {}\nSummary: {}", p.title, p.extract.trim()))
            .collect();
        tracing::debug!(query, results = summaries.len(), "wikipedia lookup");

        if summaries.is_empty() {
            return Ok(NO_RESULTS.to_owned());
        }
        Ok(truncate_chars(&summaries.join("\n\n"), self.max_chars))
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_owned(),
        None => text.to_owned(),
    }
}

impl ToolExecutor for WikipediaExecutor {
    fn tool_definitions(&self) -> Vec<ToolDef> {
        vec![ToolDef {
            id: TOOL_ID,
            description: "Search Wikipedia for general world knowledge.",
            schema: schemars::schema_for!(QueryParams),
        }]
    }

    async fn execute_tool_call(&self, call: &ToolCall) -> Result<Option<ToolOutput>, ToolError> {
        if call.tool_id != TOOL_ID {
            return Ok(None);
        }
        let params: QueryParams = deserialize_params(&call.params)?;
        let summary = self.search(&params.query).await?;
        Ok(Some(ToolOutput {
            tool_name: TOOL_ID.to_owned(),
            summary,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn executor_for(server: &MockServer) -> WikipediaExecutor {
        WikipediaExecutor::new(&WikipediaConfig {
            base_url: Some(server.uri()),
            ..WikipediaConfig::default()
        })
    }

    fn call(query: &str) -> ToolCall {
        ToolCall {
            tool_id: TOOL_ID.to_owned(),
            params: HashMap::from([("query".to_owned(), serde_json::json!(query))]),
        }
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[tokio::test]
    async fn formats_pages_in_search_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .and(query_param("gsrsearch", "Ada Lovelace"))
            .and(query_param("gsrlimit", "3"))
            .and(query_param("generator", "search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "batchcomplete": true,
                "query": {"pages": [
                    {"pageid": 2, "title": "Analytical Engine", "index": 2,
                     "extract": "A proposed mechanical computer."},
                    {"pageid": 1, "title": "Ada Lovelace", "index": 1,
                     "extract": "English mathematician.\n"}
                ]}
            })))
            .mount(&server)
            .await;

        let out = executor_for(&server)
            .execute_tool_call(&call("Ada Lovelace"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            out.summary,
            "Page: Ada Lovelace\nSummary: English mathematician.\n\n\
             Page: Analytical Engine\nSummary: A proposed mechanical computer."
        );
    }

    #[tokio::test]
    async fn no_results_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"batchcomplete": true})),
            )
            .mount(&server)
            .await;

        let out = executor_for(&server).search("qwxzzy").await.unwrap();
        assert_eq!(out, "No good Wikipedia Search Result was found");
    }

    #[tokio::test]
    async fn output_truncated_to_max_chars() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": {"pages": [
                    {"title": "Long", "index": 1, "extract": "x".repeat(10_000)}
                ]}
            })))
            .mount(&server)
            .await;

        let out = executor_for(&server).search("long").await.unwrap();
        assert_eq!(out.chars().count(), 4000);
        assert!(out.starts_with("Page: Long\nSummary: xxx"));
    }

    #[tokio::test]
    async fn server_error_is_http_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = executor_for(&server).search("anything").await;
        assert!(matches!(result, Err(ToolError::HttpStatus { status: 503 })));
    }

    #[tokio::test]
    async fn ignores_other_tools() {
        let server = MockServer::start().await;
        let call = ToolCall {
            tool_id: "retriever".to_owned(),
            params: HashMap::new(),
        };
        let result = executor_for(&server).execute_tool_call(&call).await.unwrap();
        assert!(result.is_none());
    }

    mod proptest_truncate {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn never_exceeds_limit_and_is_prefix(text in "\\PC{0,200}", max in 0usize..250) {
                let out = truncate_chars(&text, max);
                prop_assert!(out.chars().count() <= max);
                prop_assert!(text.starts_with(&out));
            }
        }
    }
}
