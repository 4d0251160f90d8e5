//! Scripted test doubles for providers and live backends.
//!
//! Both replay canned responses in order and record what they were sent, so
//! tests in this crate and in downstream crates can drive an agent offline.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::error::{AgentError, Result};
use crate::live::{LiveConnector, LiveOutbound, LiveServerEvent, LiveSession, LiveSetup};
use crate::message::Message;
use crate::provider::{Completion, GenerationOptions, LlmProvider, ModelInfo, ProviderInfo};

/// One request seen by a [`ScriptedProvider`]
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub options: GenerationOptions,
}

/// Provider that answers with a fixed script of completions
#[derive(Default)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Completion>>,
    requests: Mutex<Vec<RecordedRequest>>,
    latency: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Completion>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            latency: None,
        }
    }

    /// Delay every answer, so concurrent callers interleave
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queue another completion
    pub async fn push(&self, completion: Completion) {
        self.script.lock().await.push_back(completion);
    }

    /// Every request received so far
    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().await.clone()
    }

    async fn next(&self, messages: &[Message], options: &GenerationOptions) -> Result<Completion> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.requests.lock().await.push(RecordedRequest {
            messages: messages.to_vec(),
            options: options.clone(),
        });
        self.script
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| AgentError::Provider("script exhausted".into()))
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn info(&self) -> Result<ProviderInfo> {
        Ok(ProviderInfo {
            name: "Scripted".into(),
            version: None,
            models: Vec::new(),
            supports_tools: true,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    async fn complete(&self, messages: &[Message], options: &GenerationOptions) -> Result<Completion> {
        self.next(messages, options).await
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(Vec::new())
    }
}

/// Live backend that answers each outbound frame with the next batch of
/// scripted events.
///
/// `SetupComplete` is sent on connect. A `Close` frame ends the session.
#[derive(Default)]
pub struct ScriptedLiveConnector {
    batches: Mutex<VecDeque<Vec<LiveServerEvent>>>,
    sent: Arc<Mutex<Vec<LiveOutbound>>>,
    setups: Mutex<Vec<LiveSetup>>,
}

impl ScriptedLiveConnector {
    pub fn new(batches: Vec<Vec<LiveServerEvent>>) -> Self {
        Self {
            batches: Mutex::new(batches.into()),
            ..Default::default()
        }
    }

    /// Frames received from the runner, in order
    pub async fn sent(&self) -> Vec<LiveOutbound> {
        self.sent.lock().await.clone()
    }

    /// Setups received on connect
    pub async fn setups(&self) -> Vec<LiveSetup> {
        self.setups.lock().await.clone()
    }
}

#[async_trait]
impl LiveConnector for ScriptedLiveConnector {
    async fn connect(&self, setup: LiveSetup) -> Result<LiveSession> {
        self.setups.lock().await.push(setup);

        let mut batches: VecDeque<_> = std::mem::take(&mut *self.batches.lock().await);
        let sent = self.sent.clone();
        let (out_tx, mut out_rx) = mpsc::channel::<LiveOutbound>(16);
        let (in_tx, in_rx) = mpsc::channel(16);

        tokio::spawn(async move {
            if in_tx.send(Ok(LiveServerEvent::SetupComplete)).await.is_err() {
                return;
            }
            while let Some(frame) = out_rx.recv().await {
                let closing = matches!(frame, LiveOutbound::Close);
                sent.lock().await.push(frame);
                if closing {
                    break;
                }
                let Some(batch) = batches.pop_front() else { continue };
                for event in batch {
                    if in_tx.send(Ok(event)).await.is_err() {
                        return;
                    }
                }
            }
        });

        Ok(LiveSession {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}
