//! In-Memory Runner
//!
//! Owns one agent plus a session store and drives it either turn-by-turn
//! (`run`) or over a live connection (`run_live`).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;

use crate::error::{AgentError, Result};
use crate::live::{
    FunctionResponse, LiveConnector, LiveEvent, LiveEventStream, LiveOutbound, LiveRequest,
    LiveRequestReceiver, LiveServerEvent, LiveSetup, RunConfig,
};
use crate::message::Message;
use crate::reasoning::Agent;
use crate::session::{MemorySessionStore, Session, SessionId, SessionStore};

/// Session state key holding the latest live resumption handle
pub const RESUMPTION_HANDLE_KEY: &str = "live_resumption_handle";

/// Runner with an in-memory session store
pub struct InMemoryRunner {
    app_name: String,
    agent: Arc<Agent>,
    sessions: Arc<MemorySessionStore>,
    live: Option<Arc<dyn LiveConnector>>,
    /// One lock per session; a turn holds it from load to save
    turns: Mutex<HashMap<SessionId, Arc<Mutex<()>>>>,
}

impl InMemoryRunner {
    pub fn new(app_name: impl Into<String>, agent: Agent) -> Self {
        Self {
            app_name: app_name.into(),
            agent: Arc::new(agent),
            sessions: Arc::new(MemorySessionStore::new()),
            live: None,
            turns: Mutex::new(HashMap::new()),
        }
    }

    /// Enable `run_live` through `connector`
    pub fn with_live_connector(mut self, connector: Arc<dyn LiveConnector>) -> Self {
        self.live = Some(connector);
        self
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn agent(&self) -> &Arc<Agent> {
        &self.agent
    }

    pub fn sessions(&self) -> &Arc<MemorySessionStore> {
        &self.sessions
    }

    /// Create and store a fresh session for `user_id`
    pub fn create_session(&self, user_id: impl Into<String>) -> Result<Session> {
        let session = Session::new(self.app_name.clone(), user_id);
        self.sessions.save(&session)?;
        tracing::debug!(app = %self.app_name, session = %session.id, "Session created");
        Ok(session)
    }

    pub fn get_session(&self, id: &SessionId) -> Result<Option<Session>> {
        self.sessions.load(id)
    }

    /// Run one user turn and persist the session, even when the turn fails.
    ///
    /// Turns on the same session run one at a time.
    pub async fn run(&self, session_id: &SessionId, text: impl Into<String>) -> Result<String> {
        let turn = self
            .turns
            .lock()
            .await
            .entry(session_id.clone())
            .or_default()
            .clone();
        let _guard = turn.lock().await;

        let mut session = self
            .sessions
            .load(session_id)?
            .ok_or_else(|| AgentError::Session(format!("Session not found: {}", session_id)))?;

        session.conversation.push(Message::user(text));
        let result = self.agent.run(&mut session).await;

        session.touch();
        self.sessions.save(&session)?;

        result
    }

    /// Open a live session.
    ///
    /// Requests pushed into the queue are forwarded to the backend; server
    /// events come back as [`LiveEvent`]s. Tool calls are answered through
    /// the agent's callback pipeline without surfacing to the caller. The
    /// stream ends once the queue is closed and the backend hangs up.
    pub async fn run_live(
        &self,
        session: &Session,
        requests: LiveRequestReceiver,
        config: RunConfig,
    ) -> Result<LiveEventStream> {
        let connector = self.live.clone().ok_or_else(|| {
            AgentError::Config(format!("Runner '{}' has no live connector", self.app_name))
        })?;

        let setup = LiveSetup {
            model: self.agent.model().to_string(),
            system_instruction: self.agent.system_prompt(),
            tools: self.agent.tools().schemas(),
            run_config: config,
        };

        let live = connector.connect(setup).await?;
        let (tx, rx) = mpsc::channel(64);

        let pump = LivePump {
            agent: self.agent.clone(),
            sessions: self.sessions.clone(),
            session: session.clone(),
            outbound: live.outbound,
            tx,
            turn_text: String::new(),
        };
        tokio::spawn(pump.run(requests, live.inbound));

        tracing::info!(app = %self.app_name, session = %session.id, "Live session opened");
        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

/// Single consumer loop bridging the request queue, the backend and the caller
struct LivePump {
    agent: Arc<Agent>,
    sessions: Arc<MemorySessionStore>,
    session: Session,
    outbound: mpsc::Sender<LiveOutbound>,
    tx: mpsc::Sender<Result<LiveEvent>>,
    turn_text: String,
}

impl LivePump {
    async fn run(
        mut self,
        mut requests: LiveRequestReceiver,
        mut inbound: mpsc::Receiver<Result<LiveServerEvent>>,
    ) {
        let mut requests_open = true;

        loop {
            tokio::select! {
                request = requests.recv(), if requests_open => match request {
                    Some(LiveRequest::Content(message)) => {
                        self.session.conversation.push(message.clone());
                        if self.outbound.send(LiveOutbound::Content(message)).await.is_err() {
                            break;
                        }
                    }
                    Some(LiveRequest::Close) | None => {
                        requests_open = false;
                        let _ = self.outbound.send(LiveOutbound::Close).await;
                    }
                },
                event = inbound.recv() => match event {
                    None => break,
                    Some(Err(e)) => {
                        let _ = self.tx.send(Err(e)).await;
                        break;
                    }
                    Some(Ok(event)) => {
                        if !self.handle(event).await {
                            break;
                        }
                    }
                },
            }
        }

        self.session.touch();
        if let Err(e) = self.sessions.save(&self.session) {
            tracing::warn!(session = %self.session.id, error = %e, "Failed to persist live session");
        }
        tracing::info!(session = %self.session.id, "Live session closed");
    }

    /// Returns false once either side has gone away
    async fn handle(&mut self, event: LiveServerEvent) -> bool {
        let author = self.agent.name().to_string();

        match event {
            LiveServerEvent::SetupComplete => {
                tracing::debug!(agent = %author, "Live setup complete");
                true
            }
            LiveServerEvent::Text(text) => {
                self.turn_text.push_str(&text);
                self.emit(LiveEvent::text_part(author, text)).await
            }
            LiveServerEvent::ToolCalls(calls) => {
                let mut responses = Vec::with_capacity(calls.len());
                for call in calls {
                    let response = self.agent.dispatch_tool(&call, &mut self.session.state).await;
                    responses.push(FunctionResponse {
                        id: call.id,
                        name: call.name,
                        response,
                    });
                }
                self.outbound
                    .send(LiveOutbound::ToolResponses(responses))
                    .await
                    .is_ok()
            }
            LiveServerEvent::TurnComplete => {
                if !self.turn_text.is_empty() {
                    let text = std::mem::take(&mut self.turn_text);
                    self.session.conversation.push(Message::assistant(text));
                }
                self.emit(LiveEvent::turn_complete(author)).await
            }
            LiveServerEvent::Interrupted => {
                self.turn_text.clear();
                self.emit(LiveEvent::interrupted(author)).await
            }
            LiveServerEvent::Resumption { handle, resumable } => {
                if !resumable {
                    return true;
                }
                self.session.state.set(RESUMPTION_HANDLE_KEY, handle.clone());
                self.emit(LiveEvent {
                    author,
                    resumption_handle: Some(handle),
                    ..Default::default()
                })
                .await
            }
            LiveServerEvent::GoAway => {
                tracing::warn!(agent = %author, "Live backend announced disconnect");
                true
            }
        }
    }

    async fn emit(&self, event: LiveEvent) -> bool {
        self.tx.send(Ok(event)).await.is_ok()
    }
}
