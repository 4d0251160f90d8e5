//! Web Search Tool

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use agent_core::{
    tool::ParameterSchema,
    AgentError, Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema,
};

use crate::search::SearchBackend;

pub const TOOL_NAME: &str = "google_search";

/// `google_search(query)` backed by a [`SearchBackend`]
pub struct WebSearchTool {
    backend: Arc<dyn SearchBackend>,
}

impl WebSearchTool {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: TOOL_NAME.into(),
            description: "Search the web with Google Search. Returns result text including source URLs.".into(),
            parameters: vec![ParameterSchema::required("query", "string", "Search query")],
            category: Some("search".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let query = call
            .str_arg("query")
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| AgentError::ToolValidation("query must be a non-empty string".into()))?;

        tracing::debug!(query, backend = self.backend.name(), "Web search");
        let results = self.backend.search(query).await?;

        Ok(ToolResult::success(TOOL_NAME, results.clone())
            .with_data(json!({ "search_results": results })))
    }
}
