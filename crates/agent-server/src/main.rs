//! News Desk HTTP Server
//!
//! Axum-based server exposing the six lesson agents over REST, plus a
//! WebSocket endpoint that drives them through the Gemini Live API.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{routing::{get, post}, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{live::LiveConnector, LlmProvider};
use agent_runtime::{GeminiLiveConnector, GeminiProvider};
use news_desk::LessonKit;

use crate::handlers::{
    chat_handler, get_report, get_session, health_check, list_agents, live_handler,
};
use crate::state::{AppState, Settings};

/// Build the router over shared state
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & info
        .route("/health", get(health_check))
        .route("/api/agents", get(list_agents))

        // Agent API
        .route("/api/chat", post(chat_handler))
        .route("/api/sessions/{id}", get(get_session))
        .route("/api/sessions/{id}/report", get(get_report))
        .route("/api/live/{agent}", get(live_handler))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment first so RUST_LOG from .env applies
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
    let settings = Settings::from_env();

    // Initialize LLM provider
    let gemini = Arc::new(GeminiProvider::from_env()?);

    match gemini.health_check().await {
        Ok(true) => {
            tracing::info!("✓ Connected to Gemini");
            if let Ok(models) = gemini.list_models().await {
                tracing::info!("  {} models available", models.len());
            }
        }
        Ok(false) | Err(_) => {
            tracing::warn!("⚠ Gemini not reachable - agents will fail");
            tracing::warn!("  Set GOOGLE_API_KEY in .env");
        }
    }

    // Tool backends
    let kit = if settings.offline {
        tracing::warn!("⚠ NEWS_DESK_OFFLINE set - using canned search results and static quotes");
        LessonKit::offline()
    } else {
        LessonKit::gemini(gemini.clone())?
    }
    .with_reports_dir(settings.reports_dir.clone());

    let live: Arc<dyn LiveConnector> = Arc::new(GeminiLiveConnector::from_env());
    let provider: Arc<dyn LlmProvider> = gemini;

    let state = AppState::new(provider, &kit, Some(live), settings.clone())?;

    tracing::info!("Registered {} agents:", state.lessons.len());
    for (name, runners) in state.lessons.iter() {
        tracing::info!("  • {} ({})", name, runners.chat.agent().model());
    }

    // Start server
    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 news desk server running on http://{}", settings.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                    - Health check");
    tracing::info!("  GET  /api/agents                - List lesson agents");
    tracing::info!("  POST /api/chat                  - Run one agent turn");
    tracing::info!("  GET  /api/sessions/{{id}}         - Session state and process log");
    tracing::info!("  GET  /api/sessions/{{id}}/report  - Structured report as Markdown");
    tracing::info!("  GET  /api/live/{{agent}}          - WebSocket live streaming");
    tracing::info!("");

    axum::serve(listener, app(state)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::provider::Completion;
    use agent_core::testing::ScriptedProvider;
    use agent_core::{ToolArgs, ToolCall};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn state(script: Vec<Completion>) -> AppState {
        let dir = std::env::temp_dir();
        let kit = LessonKit::offline().with_reports_dir(dir);
        AppState::new(
            Arc::new(ScriptedProvider::new(script)),
            &kit,
            None,
            Settings::default(),
        )
        .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_chat(body: Value) -> Request<Body> {
        Request::post("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_list_agents_substitutes_chat_model() {
        let response = app(state(Vec::new()))
            .oneshot(Request::get("/api/agents").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let agents = body_json(response).await;
        assert_eq!(agents.as_array().unwrap().len(), 6);
        assert_eq!(agents[0]["name"], "ai_news_agent_l1");
        assert_eq!(agents[0]["model"], "gemini-2.0-flash-live-001");
        assert_eq!(agents[0]["chat_model"], "gemini-2.0-flash");
    }

    #[tokio::test]
    async fn test_chat_runs_guarded_lesson_and_exposes_log() {
        let mut args = ToolArgs::new();
        args.insert("query".into(), json!("AI chips"));
        let state = state(vec![
            Completion::tool_calls("m", vec![ToolCall::new("google_search", args).with_id("c1")]),
            Completion::text("m", "Done. Sources logged."),
        ]);
        let app = app(state);

        let response = app
            .clone()
            .oneshot(post_chat(json!({"agent": "ai_news_callbacks_l4", "message": "Go"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let chat = body_json(response).await;
        assert_eq!(chat["message"], "Done. Sources logged.");
        assert_eq!(chat["model"], "gemini-2.0-flash");
        assert!(chat["process_log"][0].as_str().unwrap().starts_with("Action: Sourced news from:"));

        let id = chat["session_id"].as_str().unwrap();
        let response = app
            .oneshot(Request::get(format!("/api/sessions/{id}")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let session = body_json(response).await;
        assert_eq!(session["app_name"], "ai_news_callbacks_l4");
        assert_eq!(session["message_count"], 5);
    }

    #[tokio::test]
    async fn test_chat_unknown_agent_and_session() {
        let app = app(state(Vec::new()));

        let response = app
            .clone()
            .oneshot(post_chat(json!({"agent": "nope", "message": "hi"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["code"], "UNKNOWN_AGENT");

        let response = app
            .oneshot(post_chat(json!({
                "agent": "ai_news_agent_l1",
                "message": "hi",
                "session_id": "missing"
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["code"], "SESSION_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_structured_report_as_markdown() {
        let report = json!({
            "title": "AI Weekly",
            "items": (1..=3).map(|n| json!({
                "headline": format!("Headline number {n}"),
                "company": "Nvidia",
                "ticker": "NVDA",
                "market_data": "$189.20 (+1.25%)",
                "summary": "Summary.",
                "sources": ["https://www.reuters.com/x"]
            })).collect::<Vec<_>>()
        });
        let app = app(state(vec![Completion::text("m", report.to_string())]));

        let response = app
            .clone()
            .oneshot(post_chat(json!({"agent": "ai_news_structured_l5", "message": "Report"})))
            .await
            .unwrap();
        let chat = body_json(response).await;
        assert_eq!(chat["output"]["title"], "AI Weekly");
        assert_eq!(chat["model"], "gemini-2.0-flash");

        let id = chat["session_id"].as_str().unwrap();
        let response = app
            .oneshot(Request::get(format!("/api/sessions/{id}/report")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let markdown = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(markdown.starts_with("# AI Weekly\n"));
    }

    #[tokio::test]
    async fn test_provider_failure_maps_to_bad_gateway() {
        // Empty script: the provider errors on the first request
        let response = app(state(Vec::new()))
            .oneshot(post_chat(json!({"agent": "ai_news_agent_l1", "message": "hi"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
