//! HTTP/WebSocket Handlers

use axum::{
    extract::{ws::{Message, WebSocket}, Path, Query, State, WebSocketUpgrade},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use agent_core::{
    live::SessionResumptionConfig, AgentError, LiveRequestQueue, Modality, RunConfig, SessionId,
    SessionState,
};
use news_desk::{
    catalog, guardrails::PROCESS_LOG_KEY, lessons::FINAL_REPORT_KEY, render_markdown,
    ResearchReport,
};

use crate::state::AppState;

const DEFAULT_USER: &str = "web-user";

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub gemini_connected: bool,
    pub offline: bool,
    pub live_enabled: bool,
    pub agents: usize,
}

#[derive(Serialize)]
pub struct AgentSummary {
    pub lesson: u8,
    pub name: &'static str,
    pub description: &'static str,
    pub model: &'static str,
    /// Model actually used by `/api/chat`
    pub chat_model: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub agent: String,
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub agent: String,
    pub message: String,
    pub session_id: String,
    pub model: String,
    pub process_log: Vec<String>,
    /// Value stored under the agent's output key, if it has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: String,
    pub app_name: String,
    pub user_id: String,
    pub title: String,
    pub message_count: usize,
    pub state: SessionState,
    pub process_log: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct LiveParams {
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Frame a live WebSocket client sends; plain text frames work too
#[derive(Debug, Deserialize)]
struct LiveClientMessage {
    text: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

fn agent_error(e: &AgentError) -> ApiError {
    let (status, code) = match e {
        AgentError::RateLimited(_) => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
        AgentError::Auth(_) | AgentError::Provider(_) | AgentError::ProviderUnavailable(_) => {
            (StatusCode::BAD_GATEWAY, "PROVIDER_ERROR")
        }
        AgentError::SchemaValidation { .. } => (StatusCode::BAD_GATEWAY, "INVALID_OUTPUT"),
        AgentError::Session(_) => (StatusCode::NOT_FOUND, "SESSION_NOT_FOUND"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "AGENT_ERROR"),
    };
    api_error(status, code, e.user_message())
}

fn unknown_agent(name: &str) -> ApiError {
    api_error(StatusCode::NOT_FOUND, "UNKNOWN_AGENT", format!("No agent named '{name}'"))
}

fn session_not_found(id: &str) -> ApiError {
    api_error(StatusCode::NOT_FOUND, "SESSION_NOT_FOUND", format!("Session not found: {id}"))
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let gemini_connected = state.provider.health_check().await.unwrap_or(false);

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        gemini_connected,
        offline: state.settings.offline,
        live_enabled: state.live_enabled,
        agents: state.lessons.len(),
    })
}

/// List the lesson agents
pub async fn list_agents(State(state): State<AppState>) -> Json<Vec<AgentSummary>> {
    let agents = catalog()
        .into_iter()
        .map(|info| {
            let chat_model = state
                .lesson(info.name)
                .map_or_else(|| info.model.to_string(), |r| r.chat.agent().model().to_string());
            AgentSummary {
                lesson: info.lesson,
                name: info.name,
                description: info.description,
                model: info.model,
                chat_model,
            }
        })
        .collect();

    Json(agents)
}

/// Run one turn of a lesson agent
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let runners = state.lesson(&payload.agent).ok_or_else(|| unknown_agent(&payload.agent))?;
    let runner = &runners.chat;

    let session_id = match payload.session_id.as_deref() {
        Some(id) => {
            let id = SessionId::from_string(id);
            runner
                .get_session(&id)
                .map_err(|e| agent_error(&e))?
                .ok_or_else(|| session_not_found(id.as_str()))?;
            id
        }
        None => {
            let user = payload.user_id.as_deref().unwrap_or(DEFAULT_USER);
            runner.create_session(user).map_err(|e| agent_error(&e))?.id
        }
    };

    tracing::info!(agent = %payload.agent, session = %session_id, "Chat turn");

    let message = runner.run(&session_id, payload.message).await.map_err(|e| {
        tracing::error!(agent = %payload.agent, error = %e, "Agent error");
        agent_error(&e)
    })?;

    let session = runner
        .get_session(&session_id)
        .map_err(|e| agent_error(&e))?
        .ok_or_else(|| session_not_found(session_id.as_str()))?;

    let output = runner
        .agent()
        .config()
        .output_key
        .as_deref()
        .and_then(|key| session.state.get(key).cloned());

    Ok(Json(ChatResponse {
        agent: payload.agent,
        message,
        session_id: session_id.to_string(),
        model: runner.agent().model().to_string(),
        process_log: session.state.get_string_list(PROCESS_LOG_KEY),
        output,
    }))
}

/// Session state and process log
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state
        .find_session(&SessionId::from_string(&id))
        .map_err(|e| agent_error(&e))?
        .ok_or_else(|| session_not_found(&id))?;

    Ok(Json(SessionResponse {
        id: session.id.to_string(),
        app_name: session.app_name.clone(),
        user_id: session.user_id.clone(),
        title: session.title(),
        message_count: session.message_count(),
        process_log: session.state.get_string_list(PROCESS_LOG_KEY),
        created_at: session.created_at.to_rfc3339(),
        updated_at: session.updated_at.to_rfc3339(),
        state: session.state,
    }))
}

/// Structured report of a session, rendered as Markdown
pub async fn get_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let session = state
        .find_session(&SessionId::from_string(&id))
        .map_err(|e| agent_error(&e))?
        .ok_or_else(|| session_not_found(&id))?;

    let report: ResearchReport = session.state.get_as(FINAL_REPORT_KEY).ok_or_else(|| {
        api_error(
            StatusCode::NOT_FOUND,
            "REPORT_NOT_FOUND",
            format!("Session {id} has no structured report"),
        )
    })?;

    Ok((
        [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
        render_markdown(&report),
    )
        .into_response())
}

/// Live streaming over WebSocket
pub async fn live_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(agent): Path<String>,
    Query(params): Query<LiveParams>,
) -> Result<Response, ApiError> {
    if state.lesson(&agent).is_none() {
        return Err(unknown_agent(&agent));
    }
    if !state.live_enabled {
        return Err(api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "LIVE_DISABLED",
            "Live streaming is not configured",
        ));
    }

    let user = params.user_id.unwrap_or_else(|| DEFAULT_USER.into());
    Ok(ws.on_upgrade(move |socket| handle_live(socket, state, agent, user)))
}

async fn send_json(sender: &mut futures::stream::SplitSink<WebSocket, Message>, value: Value) -> bool {
    sender.send(Message::Text(value.to_string().into())).await.is_ok()
}

async fn handle_live(socket: WebSocket, state: AppState, agent: String, user: String) {
    let (mut sender, mut receiver) = socket.split();

    let Some(runners) = state.lesson(&agent) else {
        return;
    };
    let runner = &runners.live;

    let session = match runner.create_session(user) {
        Ok(session) => session,
        Err(e) => {
            send_json(&mut sender, json!({"type": "error", "error": e.user_message()})).await;
            return;
        }
    };

    let run_config = RunConfig {
        response_modalities: vec![Modality::Text],
        session_resumption: Some(SessionResumptionConfig::default()),
    };
    let (queue, requests) = LiveRequestQueue::channel();

    let mut events = match runner.run_live(&session, requests, run_config).await {
        Ok(events) => events,
        Err(e) => {
            tracing::error!(agent = %agent, error = %e, "Live session failed to open");
            send_json(&mut sender, json!({"type": "error", "error": e.user_message()})).await;
            return;
        }
    };

    send_json(&mut sender, json!({"type": "session", "session_id": session.id.to_string()})).await;

    loop {
        tokio::select! {
            msg = receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let text = serde_json::from_str::<LiveClientMessage>(text.as_str())
                        .map_or_else(|_| text.to_string(), |m| m.text);
                    if queue.send_text(text).is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    queue.close();
                    break;
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "WebSocket error");
                    queue.close();
                    break;
                }
                Some(Ok(_)) => {}
            },
            event = events.next() => match event {
                Some(Ok(event)) => {
                    let mut frame = json!({"type": "event"});
                    if let (Some(obj), Ok(Value::Object(fields))) =
                        (frame.as_object_mut(), serde_json::to_value(&event))
                    {
                        obj.extend(fields);
                    }
                    if !send_json(&mut sender, frame).await {
                        queue.close();
                        break;
                    }
                }
                Some(Err(e)) => {
                    send_json(&mut sender, json!({"type": "error", "error": e.user_message()})).await;
                    break;
                }
                None => break,
            },
        }
    }

    tracing::debug!(agent = %agent, session = %session.id, "Live WebSocket closed");
}
