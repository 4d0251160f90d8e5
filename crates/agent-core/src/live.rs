//! Live Streaming
//!
//! Types for bidirectional live sessions: the caller pushes requests into a
//! [`LiveRequestQueue`] and reads [`LiveEvent`]s until the model signals
//! `turn_complete` or `interrupted`.
//!
//! ```text
//!   caller ──send_content──▶ LiveRequestQueue ──▶ runner task ──▶ LiveConnector
//!   caller ◀──LiveEvent─────  event stream    ◀── runner task ◀──  server events
//! ```

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::{AgentError, Result};
use crate::message::{Message, Role};
use crate::tool::{ToolCall, ToolSchema};

/// Request pushed by the caller into a live session
#[derive(Clone, Debug)]
pub enum LiveRequest {
    /// A content turn (normally a user message)
    Content(Message),
    /// End the session
    Close,
}

/// Sending half of a live session's request queue
#[derive(Clone, Debug)]
pub struct LiveRequestQueue {
    tx: mpsc::UnboundedSender<LiveRequest>,
}

/// Receiving half, handed to the runner
pub type LiveRequestReceiver = mpsc::UnboundedReceiver<LiveRequest>;

impl LiveRequestQueue {
    /// Create a queue and the receiver the runner consumes
    pub fn channel() -> (Self, LiveRequestReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Push a content turn
    pub fn send_content(&self, content: Message) -> Result<()> {
        self.tx
            .send(LiveRequest::Content(content))
            .map_err(|_| AgentError::Live("live session already closed".into()))
    }

    /// Push a user text turn
    pub fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.send_content(Message::user(text))
    }

    /// Ask the runner to close the session. Closing twice is a no-op.
    pub fn close(&self) {
        let _ = self.tx.send(LiveRequest::Close);
    }
}

/// Output modality requested from the model
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    Text,
    Audio,
}

/// Session resumption settings
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionResumptionConfig {
    /// Handle from a previous session to resume, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
}

/// Live run configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunConfig {
    pub response_modalities: Vec<Modality>,
    #[serde(default)]
    pub session_resumption: Option<SessionResumptionConfig>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            response_modalities: vec![Modality::Text],
            session_resumption: None,
        }
    }
}

/// What a connector needs to open a live session
#[derive(Clone, Debug)]
pub struct LiveSetup {
    pub model: String,
    pub system_instruction: String,
    pub tools: Vec<ToolSchema>,
    pub run_config: RunConfig,
}

/// Response to a function call received over a live connection
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub response: Value,
}

/// Frame sent to the live backend
#[derive(Clone, Debug)]
pub enum LiveOutbound {
    Content(Message),
    ToolResponses(Vec<FunctionResponse>),
    Close,
}

/// Event received from the live backend
#[derive(Clone, Debug, PartialEq)]
pub enum LiveServerEvent {
    SetupComplete,
    /// Incremental text from the model
    Text(String),
    /// Function calls the client must answer
    ToolCalls(Vec<ToolCall>),
    TurnComplete,
    Interrupted,
    /// New resumption handle
    Resumption { handle: String, resumable: bool },
    /// Server is about to drop the connection
    GoAway,
}

/// Connection produced by a [`LiveConnector`]
pub struct LiveSession {
    pub outbound: mpsc::Sender<LiveOutbound>,
    pub inbound: mpsc::Receiver<Result<LiveServerEvent>>,
}

/// Opens live sessions against a backend
#[async_trait]
pub trait LiveConnector: Send + Sync {
    async fn connect(&self, setup: LiveSetup) -> Result<LiveSession>;
}

/// Event delivered to the live caller
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LiveEvent {
    /// Agent (or "user") that produced the event
    pub author: String,

    /// Content carried by the event, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Message>,

    /// Whether `content` is a fragment of a longer turn
    #[serde(default)]
    pub partial: bool,

    #[serde(default)]
    pub turn_complete: bool,

    #[serde(default)]
    pub interrupted: bool,

    /// Resumption handle announced by the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resumption_handle: Option<String>,
}

impl LiveEvent {
    /// Partial text from the model
    pub fn text_part(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            content: Some(Message::assistant(text)),
            partial: true,
            ..Default::default()
        }
    }

    pub fn turn_complete(author: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            turn_complete: true,
            ..Default::default()
        }
    }

    pub fn interrupted(author: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            interrupted: true,
            ..Default::default()
        }
    }

    /// Text of the first content part, when the event carries model text
    pub fn text(&self) -> Option<&str> {
        self.content
            .as_ref()
            .filter(|m| m.role == Role::Assistant && !m.content.is_empty())
            .map(|m| m.content.as_str())
    }

    /// Whether the caller should stop reading
    pub fn is_final(&self) -> bool {
        self.turn_complete || self.interrupted
    }
}

/// Stream of live events returned by the runner
pub type LiveEventStream = Pin<Box<dyn Stream<Item = Result<LiveEvent>> + Send>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_delivers_in_order() {
        let (queue, mut rx) = LiveRequestQueue::channel();
        queue.send_text("first").unwrap();
        queue.close();

        match rx.try_recv().unwrap() {
            LiveRequest::Content(m) => assert_eq!(m.content, "first"),
            other => panic!("unexpected request: {other:?}"),
        }
        assert!(matches!(rx.try_recv().unwrap(), LiveRequest::Close));
    }

    #[test]
    fn test_send_after_receiver_dropped_fails() {
        let (queue, rx) = LiveRequestQueue::channel();
        drop(rx);
        assert!(matches!(queue.send_text("x"), Err(AgentError::Live(_))));
        queue.close();
    }

    #[test]
    fn test_event_text_and_finality() {
        let part = LiveEvent::text_part("agent", "Hello");
        assert_eq!(part.text(), Some("Hello"));
        assert!(!part.is_final());

        let done = LiveEvent::turn_complete("agent");
        assert!(done.text().is_none());
        assert!(done.is_final());
        assert!(LiveEvent::interrupted("agent").is_final());
    }

    #[test]
    fn test_modality_wire_names() {
        assert_eq!(serde_json::to_string(&Modality::Text).unwrap(), "\"TEXT\"");
        assert_eq!(RunConfig::default().response_modalities, vec![Modality::Text]);
    }
}
