//! Gemini LLM Provider
//!
//! Implementation of `LlmProvider` over the Gemini REST API, plus a
//! search-grounded query helper used by the news tools.

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::Message,
    provider::{
        Completion, GenerationOptions, LlmProvider, ModelInfo, ProviderInfo,
    },
};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::wire::{self, ApiErrorEnvelope, Content, GenerateContentResponse, ToolDeclaration};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_LIVE_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";
pub const DEFAULT_SEARCH_MODEL: &str = "gemini-2.0-flash";

/// Gemini provider configuration
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    /// API key; requests fail with an auth error when absent
    pub api_key: Option<String>,

    /// REST base URL, up to and including the API version
    pub base_url: String,

    /// Live API WebSocket endpoint
    pub live_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Model used for grounded search queries
    pub search_model: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.into(),
            live_url: DEFAULT_LIVE_URL.into(),
            timeout_secs: 120,
            search_model: DEFAULT_SEARCH_MODEL.into(),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl GeminiConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: non_empty_var("GOOGLE_API_KEY").or_else(|| non_empty_var("GEMINI_API_KEY")),
            base_url: non_empty_var("GEMINI_BASE_URL").unwrap_or(defaults.base_url),
            live_url: non_empty_var("GEMINI_LIVE_URL").unwrap_or(defaults.live_url),
            timeout_secs: non_empty_var("GEMINI_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_secs),
            search_model: non_empty_var("GEMINI_SEARCH_MODEL").unwrap_or(defaults.search_model),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub(crate) fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| AgentError::Auth("GOOGLE_API_KEY is not set".into()))
    }
}

/// A web page backing a grounded answer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingSource {
    pub uri: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// Answer to a search-grounded query
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GroundedAnswer {
    pub text: String,
    pub sources: Vec<GroundingSource>,
    pub queries: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelList {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelEntry {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    input_token_limit: Option<u32>,
}

/// Gemini LLM provider
pub struct GeminiProvider {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiProvider {
    /// Create from configuration
    pub fn from_config(config: GeminiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(GeminiConfig::from_env())
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let base = self.config.base_url.trim_end_matches('/');
        Url::parse(&format!("{base}/{path}"))
            .map_err(|e| AgentError::Config(format!("Invalid Gemini base URL: {e}")))
    }

    fn model_endpoint(&self, model: &str, method: &str) -> Result<Url> {
        let model = model.trim_start_matches("models/");
        self.endpoint(&format!("models/{model}:{method}"))
    }

    async fn post<B: Serialize + ?Sized>(&self, url: Url, body: &B) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", self.config.api_key()?)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        check_status(response).await
    }

    /// Ask a question with Google Search grounding enabled
    pub async fn grounded_search(&self, query: &str) -> Result<GroundedAnswer> {
        let request = wire::GenerateContentRequest {
            contents: vec![Content::text(Some("user"), query)],
            system_instruction: None,
            tools: vec![ToolDeclaration {
                google_search: Some(serde_json::json!({})),
                ..Default::default()
            }],
            generation_config: wire::GenerationConfig {
                temperature: 0.2,
                top_p: 0.95,
                max_output_tokens: 2048,
                ..Default::default()
            },
        };

        let url = self.model_endpoint(&self.config.search_model, "generateContent")?;
        tracing::debug!(query, model = %self.config.search_model, "Grounded search");

        let response: GenerateContentResponse = self
            .post(url, &request)
            .await?
            .json()
            .await
            .map_err(|e| AgentError::Parse(e.to_string()))?;

        Ok(grounded_answer(&response))
    }
}

fn grounded_answer(response: &GenerateContentResponse) -> GroundedAnswer {
    let Some(candidate) = response.candidates.first() else {
        return GroundedAnswer::default();
    };

    let text = candidate
        .content
        .as_ref()
        .map(wire::content_text)
        .unwrap_or_default();

    let (sources, queries) = candidate
        .grounding_metadata
        .as_ref()
        .map(|meta| {
            let sources: Vec<GroundingSource> = meta
                .grounding_chunks
                .iter()
                .filter_map(|chunk| chunk.web.as_ref())
                .filter_map(|web| {
                    Some(GroundingSource {
                        uri: web.uri.clone()?,
                        title: web.title.clone(),
                    })
                })
                .collect();
            (sources, meta.web_search_queries.clone())
        })
        .unwrap_or_default();

    GroundedAnswer { text, sources, queries }
}

fn transport_error(e: reqwest::Error) -> AgentError {
    if e.is_timeout() || e.is_connect() {
        AgentError::ProviderUnavailable(e.to_string())
    } else {
        AgentError::Provider(e.to_string())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
        .map(|env| env.error.message)
        .unwrap_or(body);

    Err(map_status(status, message))
}

fn map_status(status: StatusCode, message: String) -> AgentError {
    match status.as_u16() {
        401 | 403 => AgentError::Auth(message),
        429 => AgentError::RateLimited(message),
        500..=599 => AgentError::ProviderUnavailable(format!("{status}: {message}")),
        _ => AgentError::Provider(format!("{status}: {message}")),
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn info(&self) -> Result<ProviderInfo> {
        let models = self.list_models().await.unwrap_or_default();

        Ok(ProviderInfo {
            name: "Gemini".into(),
            version: Some("v1beta".into()),
            models,
            supports_tools: true,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        if self.config.api_key.is_none() {
            tracing::warn!("Gemini health check skipped: no API key configured");
            return Ok(false);
        }
        match self.list_models().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("Gemini health check failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn complete(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let request = wire::build_request(messages, options);
        let url = self.model_endpoint(&options.model, "generateContent")?;

        let response: GenerateContentResponse = self
            .post(url, &request)
            .await?
            .json()
            .await
            .map_err(|e| AgentError::Parse(e.to_string()))?;

        let completion = wire::to_completion(&response, &options.model);
        tracing::debug!(
            model = %options.model,
            tool_calls = completion.tool_calls.len(),
            finish = ?completion.finish_reason,
            "Gemini completion"
        );
        Ok(completion)
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self.endpoint("models")?;
        let response = self
            .client
            .get(url)
            .header("x-goog-api-key", self.config.api_key()?)
            .send()
            .await
            .map_err(transport_error)?;

        let list: ModelList = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| AgentError::Parse(e.to_string()))?;

        Ok(list
            .models
            .into_iter()
            .map(|m| {
                let id = m.name.trim_start_matches("models/").to_string();
                ModelInfo {
                    name: m.display_name.unwrap_or_else(|| id.clone()),
                    id,
                    context_length: m.input_token_limit,
                    supports_vision: true,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::provider::FinishReason;
    use httpmock::{Method::GET, Method::POST, MockServer};
    use serde_json::json;

    fn provider(server: &MockServer) -> GeminiProvider {
        let config = GeminiConfig::default()
            .with_api_key("test-key")
            .with_base_url(server.base_url());
        GeminiProvider::from_config(config).unwrap()
    }

    fn options() -> GenerationOptions {
        GenerationOptions {
            model: "gemini-2.0-flash".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = GeminiConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert!(config.api_key.is_none());
        assert!(matches!(config.api_key(), Err(AgentError::Auth(_))));
    }

    #[tokio::test]
    async fn test_complete_text() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/models/gemini-2.0-flash:generateContent")
                .header("x-goog-api-key", "test-key");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "candidates": [{
                        "content": {"role": "model", "parts": [{"text": "Hello"}]},
                        "finishReason": "STOP"
                    }]
                }));
        });

        let completion = provider(&server)
            .complete(&[Message::user("Hi")], &options())
            .await
            .unwrap();

        mock.assert();
        assert_eq!(completion.content, "Hello");
        assert_eq!(completion.finish_reason, Some(FinishReason::Stop));
    }

    #[tokio::test]
    async fn test_complete_maps_error_statuses() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/models/gemini-2.0-flash:generateContent");
            then.status(429)
                .json_body(json!({"error": {"code": 429, "message": "quota", "status": "RESOURCE_EXHAUSTED"}}));
        });

        let err = provider(&server)
            .complete(&[Message::user("Hi")], &options())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::RateLimited(ref m) if m == "quota"));
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_request() {
        let server = MockServer::start();
        let config = GeminiConfig::default().with_base_url(server.base_url());
        let provider = GeminiProvider::from_config(config).unwrap();

        let err = provider.complete(&[Message::user("Hi")], &options()).await.unwrap_err();
        assert!(matches!(err, AgentError::Auth(_)));
        assert!(!provider.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn test_grounded_search_collects_sources() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/models/gemini-2.0-flash:generateContent");
            then.status(200).json_body(json!({
                "candidates": [{
                    "content": {"parts": [{"text": "Two headlines."}]},
                    "groundingMetadata": {
                        "webSearchQueries": ["latest AI news"],
                        "groundingChunks": [
                            {"web": {"uri": "https://www.reuters.com/tech/ai", "title": "reuters.com"}},
                            {"web": {"title": "no uri"}}
                        ]
                    }
                }]
            }));
        });

        let answer = provider(&server).grounded_search("latest AI news").await.unwrap();

        mock.assert();
        assert_eq!(answer.text, "Two headlines.");
        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.sources[0].uri, "https://www.reuters.com/tech/ai");
        assert_eq!(answer.queries, vec!["latest AI news"]);
    }

    #[tokio::test]
    async fn test_list_models() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/models");
            then.status(200).json_body(json!({
                "models": [{"name": "models/gemini-2.0-flash", "displayName": "Gemini 2.0 Flash", "inputTokenLimit": 1048576}]
            }));
        });

        let models = provider(&server).list_models().await.unwrap();
        assert_eq!(models[0].id, "gemini-2.0-flash");
        assert_eq!(models[0].context_length, Some(1_048_576));
    }
}
