/// Tool advertised to the model, with the JSON schema of its parameters.
#[derive(Debug, Clone)]
pub struct ToolDef {
    pub id: &'static str,
    pub description: &'static str,
    pub schema: schemars::Schema,
}

/// Schema for tools taking a single free-text query.
#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct QueryParams {
    /// Search query
    pub query: String,
}
