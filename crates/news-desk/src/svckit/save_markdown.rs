//! Markdown Report Persistence
//!
//! Writes the coordinator's report to local disk. Write failures are not
//! caught here; they surface as tool errors.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::json;

use agent_core::{
    tool::ParameterSchema,
    AgentError, Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema,
};

pub const TOOL_NAME: &str = "save_news_to_markdown";

/// `save_news_to_markdown(filename, content)`
pub struct SaveMarkdownTool {
    dir: PathBuf,
}

impl Default for SaveMarkdownTool {
    fn default() -> Self {
        Self::new()
    }
}

impl SaveMarkdownTool {
    /// Save relative to the process working directory
    pub fn new() -> Self {
        Self::in_dir(".")
    }

    /// Save relative to `dir`
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn target(&self, filename: &str) -> PathBuf {
        let name = if filename.ends_with(".md") {
            filename.to_string()
        } else {
            format!("{filename}.md")
        };
        self.dir.join(name)
    }
}

#[async_trait]
impl Tool for SaveMarkdownTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: TOOL_NAME.into(),
            description: "Save a Markdown report to a local file. `.md` is appended when missing.".into(),
            parameters: vec![
                ParameterSchema::required("filename", "string", "File name, e.g. ai_research_report.md"),
                ParameterSchema::required("content", "string", "Markdown content to write"),
            ],
            category: Some("storage".into()),
            has_side_effects: true,
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let filename = call
            .str_arg("filename")
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .ok_or_else(|| AgentError::ToolValidation("filename must be a non-empty string".into()))?;
        let content = call
            .str_arg("content")
            .ok_or_else(|| AgentError::ToolValidation("content must be a string".into()))?;

        let path = self.target(filename);
        tokio::fs::write(&path, content).await?;
        let absolute = tokio::fs::canonicalize(&path).await?;

        let message = format!("Saved to {}", absolute.display());
        tracing::info!(path = %absolute.display(), bytes = content.len(), "Report saved");

        Ok(ToolResult::success(TOOL_NAME, message.clone())
            .with_data(json!({ "status": "success", "message": message })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::ToolArgs;

    fn call(filename: &str, content: &str) -> ToolCall {
        let mut args = ToolArgs::new();
        args.insert("filename".into(), json!(filename));
        args.insert("content".into(), json!(content));
        ToolCall::new(TOOL_NAME, args)
    }

    #[tokio::test]
    async fn test_appends_extension_and_reports_absolute_path() {
        let dir = tempfile::tempdir().unwrap();
        let tool = SaveMarkdownTool::in_dir(dir.path());

        let response = tool
            .execute(&call("ai_report", "# Report\n"))
            .await
            .unwrap()
            .into_response();

        let expected = dir.path().join("ai_report.md").canonicalize().unwrap();
        assert_eq!(response["status"], "success");
        assert_eq!(response["message"], format!("Saved to {}", expected.display()));
        assert_eq!(std::fs::read_to_string(expected).unwrap(), "# Report\n");
    }

    #[tokio::test]
    async fn test_keeps_existing_extension() {
        let dir = tempfile::tempdir().unwrap();
        let tool = SaveMarkdownTool::in_dir(dir.path());

        tool.execute(&call("ai_research_report.md", "x")).await.unwrap();
        assert!(dir.path().join("ai_research_report.md").exists());
        assert!(!dir.path().join("ai_research_report.md.md").exists());
    }

    #[tokio::test]
    async fn test_io_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let tool = SaveMarkdownTool::in_dir(dir.path().join("missing"));

        let err = tool.execute(&call("report", "x")).await.unwrap_err();
        assert!(matches!(err, AgentError::Io(_)));
    }

    #[tokio::test]
    async fn test_empty_filename_rejected() {
        let tool = SaveMarkdownTool::new();
        let err = tool.execute(&call("  ", "x")).await.unwrap_err();
        assert!(matches!(err, AgentError::ToolValidation(_)));
    }
}
