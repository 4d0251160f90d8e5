//! Gemini Live API connector
//!
//! Opens a `BidiGenerateContent` WebSocket, sends the setup frame and pumps
//! frames in both directions on two spawned tasks.

use agent_core::{
    error::{AgentError, Result},
    live::{LiveConnector, LiveOutbound, LiveServerEvent, LiveSession, LiveSetup},
};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{protocol::frame::coding::CloseCode, Message as WsMessage},
};
use url::Url;

use crate::gemini::GeminiConfig;
use crate::wire::{self, Content, FunctionCall};

/// Live connector for the Gemini Live API
#[derive(Clone, Debug)]
pub struct GeminiLiveConnector {
    config: GeminiConfig,
}

impl GeminiLiveConnector {
    pub fn new(config: GeminiConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(GeminiConfig::from_env())
    }

    fn endpoint(&self) -> Result<Url> {
        let mut url = Url::parse(&self.config.live_url)
            .map_err(|e| AgentError::Config(format!("Invalid Gemini live URL: {e}")))?;
        url.query_pairs_mut().append_pair("key", self.config.api_key()?);
        Ok(url)
    }
}

fn live_error(e: impl std::fmt::Display) -> AgentError {
    AgentError::Live(e.to_string())
}

/// The initial `setup` frame
pub fn setup_message(setup: &LiveSetup) -> Result<Value> {
    let mut body = json!({
        "model": format!("models/{}", setup.model.trim_start_matches("models/")),
        "generationConfig": {
            "responseModalities": setup.run_config.response_modalities,
        },
    });

    if !setup.system_instruction.is_empty() {
        body["systemInstruction"] = serde_json::to_value(Content::text(None, setup.system_instruction.clone()))?;
    }
    if !setup.tools.is_empty() {
        body["tools"] = json!([{ "functionDeclarations": wire::function_declarations(&setup.tools) }]);
    }
    if let Some(resumption) = &setup.run_config.session_resumption {
        body["sessionResumption"] = serde_json::to_value(resumption)?;
    }

    Ok(json!({ "setup": body }))
}

/// Encode an outbound frame; `None` means close the socket
pub fn encode_outbound(frame: &LiveOutbound) -> Option<Value> {
    match frame {
        LiveOutbound::Content(message) => Some(json!({
            "clientContent": {
                "turns": [wire::to_content(message)],
                "turnComplete": true,
            }
        })),
        LiveOutbound::ToolResponses(responses) => Some(json!({
            "toolResponse": { "functionResponses": responses }
        })),
        LiveOutbound::Close => None,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerMessage {
    #[serde(default)]
    setup_complete: Option<Value>,
    #[serde(default)]
    server_content: Option<ServerContent>,
    #[serde(default)]
    tool_call: Option<ToolCallMessage>,
    #[serde(default)]
    session_resumption_update: Option<ResumptionUpdate>,
    #[serde(default)]
    go_away: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerContent {
    #[serde(default)]
    model_turn: Option<Content>,
    #[serde(default)]
    turn_complete: bool,
    #[serde(default)]
    interrupted: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolCallMessage {
    #[serde(default)]
    function_calls: Vec<FunctionCall>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResumptionUpdate {
    #[serde(default)]
    new_handle: Option<String>,
    #[serde(default)]
    resumable: bool,
}

/// Decode one server frame into events, in the order the caller should see them
pub fn parse_server_message(text: &str) -> Result<Vec<LiveServerEvent>> {
    let message: ServerMessage = serde_json::from_str(text)?;
    let mut events = Vec::new();

    if message.setup_complete.is_some() {
        events.push(LiveServerEvent::SetupComplete);
    }

    if let Some(content) = message.server_content {
        let text = content.model_turn.as_ref().map(wire::content_text).unwrap_or_default();
        if !text.is_empty() {
            events.push(LiveServerEvent::Text(text));
        }
        if content.interrupted {
            events.push(LiveServerEvent::Interrupted);
        }
        if content.turn_complete {
            events.push(LiveServerEvent::TurnComplete);
        }
    }

    if let Some(call) = message.tool_call {
        let calls: Vec<_> = call.function_calls.iter().map(wire::function_call_to_tool_call).collect();
        if !calls.is_empty() {
            events.push(LiveServerEvent::ToolCalls(calls));
        }
    }

    if let Some(update) = message.session_resumption_update {
        if let Some(handle) = update.new_handle {
            events.push(LiveServerEvent::Resumption {
                handle,
                resumable: update.resumable,
            });
        }
    }

    if message.go_away.is_some() {
        events.push(LiveServerEvent::GoAway);
    }

    Ok(events)
}

#[async_trait]
impl LiveConnector for GeminiLiveConnector {
    async fn connect(&self, setup: LiveSetup) -> Result<LiveSession> {
        let url = self.endpoint()?;
        let setup_frame = setup_message(&setup)?;

        let (socket, _) = connect_async(url.as_str())
            .await
            .map_err(|e| AgentError::ProviderUnavailable(format!("Live API connect failed: {e}")))?;
        let (mut sink, mut stream) = socket.split();

        sink.send(WsMessage::Text(setup_frame.to_string().into()))
            .await
            .map_err(live_error)?;
        tracing::info!(model = %setup.model, "Live API session opened");

        let (out_tx, mut out_rx) = mpsc::channel::<LiveOutbound>(32);
        let (in_tx, in_rx) = mpsc::channel(64);

        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                let Some(body) = encode_outbound(&frame) else {
                    let _ = sink.send(WsMessage::Close(None)).await;
                    break;
                };
                if let Err(e) = sink.send(WsMessage::Text(body.to_string().into())).await {
                    tracing::warn!(error = %e, "Live API send failed");
                    break;
                }
            }
        });

        tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                let text = match message {
                    Ok(WsMessage::Text(text)) => text.as_str().to_string(),
                    Ok(WsMessage::Binary(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
                    Ok(WsMessage::Close(frame)) => {
                        if let Some(frame) = frame.filter(|f| f.code != CloseCode::Normal) {
                            let reason = format!(
                                "closed by server ({}): {}",
                                u16::from(frame.code),
                                frame.reason.as_str()
                            );
                            let _ = in_tx.send(Err(AgentError::Live(reason))).await;
                        }
                        break;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        let _ = in_tx.send(Err(live_error(e))).await;
                        break;
                    }
                };

                match parse_server_message(&text) {
                    Ok(events) => {
                        for event in events {
                            if in_tx.send(Ok(event)).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "Unreadable Live API frame"),
                }
            }
            tracing::debug!("Live API stream ended");
        });

        Ok(LiveSession {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}
