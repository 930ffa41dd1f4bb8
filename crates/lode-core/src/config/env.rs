use super::{Config, Secret};

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("LODE_LLM_PROVIDER") {
            if let Ok(kind) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.llm.provider = kind;
            } else {
                tracing::warn!("ignoring invalid LODE_LLM_PROVIDER value: {v}");
            }
        }
        if let Ok(v) = std::env::var("LODE_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("LODE_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("LODE_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Ok(v) = std::env::var("LODE_INDEX_PATH") {
            self.index.path = v.into();
        }
        if let Ok(v) = std::env::var("LODE_CHUNK_SIZE") {
            match v.parse::<usize>() {
                Ok(size) => self.ingest.chunk_size = size,
                Err(_) => tracing::warn!("ignoring invalid LODE_CHUNK_SIZE value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("LODE_CHUNK_OVERLAP") {
            match v.parse::<usize>() {
                Ok(overlap) => self.ingest.chunk_overlap = overlap,
                Err(_) => tracing::warn!("ignoring invalid LODE_CHUNK_OVERLAP value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("LODE_AGENT_MAX_TOOL_ITERATIONS") {
            match v.parse::<usize>() {
                Ok(max) => self.agent.max_tool_iterations = max,
                Err(_) => {
                    tracing::warn!("ignoring invalid LODE_AGENT_MAX_TOOL_ITERATIONS value: {v}");
                }
            }
        }
        if let Ok(v) = std::env::var("LODE_WIKIPEDIA_ENABLED") {
            match v.parse::<bool>() {
                Ok(enabled) => self.tools.wikipedia.enabled = enabled,
                Err(_) => tracing::warn!("ignoring invalid LODE_WIKIPEDIA_ENABLED value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("LODE_OPENAI_API_KEY")
            && !v.is_empty()
        {
            self.secrets.openai_api_key = Some(Secret::new(v));
        }
    }
}
