use serde::Deserialize;

fn default_true() -> bool {
    true
}

fn default_retriever_top_k() -> usize {
    8
}

fn default_lang() -> String {
    "en".into()
}

fn default_top_k_results() -> usize {
    3
}

fn default_max_chars() -> usize {
    4000
}

fn default_timeout() -> u64 {
    15
}

/// Top-level configuration for the agent's tools.
#[derive(Debug, Default, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub retriever: RetrieverConfig,
    #[serde(default)]
    pub wikipedia: WikipediaConfig,
}

/// Corpus retriever tool configuration.
#[derive(Debug, Deserialize)]
pub struct RetrieverConfig {
    /// Chunks returned per call.
    #[serde(default = "default_retriever_top_k")]
    pub top_k: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            top_k: default_retriever_top_k(),
        }
    }
}

/// Wikipedia lookup tool configuration.
#[derive(Debug, Deserialize)]
pub struct WikipediaConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_lang")]
    pub lang: String,
    /// Overrides the `https://{lang}.wikipedia.org` endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_top_k_results")]
    pub top_k_results: usize,
    /// Upper bound on the characters returned to the model.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for WikipediaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lang: default_lang(),
            base_url: None,
            top_k_results: default_top_k_results(),
            max_chars: default_max_chars(),
            timeout: default_timeout(),
        }
    }
}

impl WikipediaConfig {
    #[must_use]
    pub fn endpoint(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_owned(),
            None => format!("https://{}.wikipedia.org", self.lang),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ToolsConfig::default();
        assert_eq!(config.retriever.top_k, 8);
        assert!(config.wikipedia.enabled);
        assert_eq!(config.wikipedia.top_k_results, 3);
        assert_eq!(config.wikipedia.max_chars, 4000);
        assert_eq!(config.wikipedia.timeout, 15);
        assert_eq!(config.wikipedia.endpoint(), "https://en.wikipedia.org");
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            [retriever]
            top_k = 5

            [wikipedia]
            enabled = false
            lang = "de"
        "#;
        let config: ToolsConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.retriever.top_k, 5);
        assert!(!config.wikipedia.enabled);
        assert_eq!(config.wikipedia.endpoint(), "https://de.wikipedia.org");
        assert_eq!(config.wikipedia.top_k_results, 3);
    }

    #[test]
    fn base_url_override_trims_slash() {
        let config = WikipediaConfig {
            base_url: Some("http://127.0.0.1:9000/".into()),
            ..WikipediaConfig::default()
        };
        assert_eq!(config.endpoint(), "http://127.0.0.1:9000");
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config: ToolsConfig = toml::from_str("").unwrap();
        assert_eq!(config.retriever.top_k, 8);
        assert_eq!(config.wikipedia.lang, "en");
    }
}
