//! Web Search Backends
//!
//! The `google_search` tool delegates to a [`SearchBackend`]. In production
//! that is a Gemini request with Google Search grounding; offline runs and
//! tests use canned text.

use std::sync::Arc;

use agent_runtime::{GeminiProvider, GroundedAnswer};
use async_trait::async_trait;

use crate::error::{NewsDeskError, Result};

/// Search backend trait (Strategy pattern)
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Free-text results for a query, URLs included inline
    async fn search(&self, query: &str) -> Result<String>;

    /// Backend name
    fn name(&self) -> &str;
}

/// Search through Gemini's Google Search grounding
pub struct GroundedSearch {
    provider: Arc<GeminiProvider>,
}

impl GroundedSearch {
    pub fn new(provider: Arc<GeminiProvider>) -> Self {
        Self { provider }
    }
}

/// Answer text followed by one `Sources:` line per grounding source.
///
/// The source lines are what the process-log callback scans for URLs.
pub fn render_grounded(answer: &GroundedAnswer) -> String {
    let mut out = answer.text.trim().to_string();

    if !answer.sources.is_empty() {
        out.push_str("\n\nSources:\n");
        for source in &answer.sources {
            match &source.title {
                Some(title) => out.push_str(&format!("- {title}: {}\n", source.uri)),
                None => out.push_str(&format!("- {}\n", source.uri)),
            }
        }
    }

    out
}

#[async_trait]
impl SearchBackend for GroundedSearch {
    async fn search(&self, query: &str) -> Result<String> {
        let answer = self
            .provider
            .grounded_search(query)
            .await
            .map_err(|e| NewsDeskError::Search(e.to_string()))?;

        tracing::debug!(query, sources = answer.sources.len(), "Grounded search finished");
        Ok(render_grounded(&answer))
    }

    fn name(&self) -> &str {
        "GoogleSearchGrounding"
    }
}

/// Backend returning the same text for every query
#[derive(Clone, Debug)]
pub struct StaticSearch {
    results: String,
}

impl StaticSearch {
    pub fn new(results: impl Into<String>) -> Self {
        Self {
            results: results.into(),
        }
    }
}

impl Default for StaticSearch {
    fn default() -> Self {
        Self::new(
            "1. Nvidia unveils next-generation AI accelerator (NVDA) \
             https://www.reuters.com/technology/nvidia-accelerator\n\
             2. Microsoft expands Copilot across Office (MSFT) \
             https://www.bloomberg.com/news/microsoft-copilot\n\
             3. Alphabet ships a new Gemini model (GOOGL) \
             https://techcrunch.com/alphabet-gemini\n\
             4. Meta open-sources a larger Llama release (META) \
             https://www.reuters.com/technology/meta-llama\n\
             5. Amazon invests further in AI chips (AMZN) \
             https://www.cnbc.com/amazon-ai-chips",
        )
    }
}

#[async_trait]
impl SearchBackend for StaticSearch {
    async fn search(&self, _query: &str) -> Result<String> {
        Ok(self.results.clone())
    }

    fn name(&self) -> &str {
        "StaticSearch"
    }
}
