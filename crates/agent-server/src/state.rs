//! Application State

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use agent_core::live::LiveConnector;
use agent_core::{Agent, AgentConfig, InMemoryRunner, LlmProvider, Session, SessionId};
use news_desk::{is_live_model, LessonKit};

/// Model substituted for live-only models on the REST chat endpoint
pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.0-flash";

/// Server settings, read from the environment
#[derive(Clone, Debug)]
pub struct Settings {
    /// Listen address (`BIND_ADDR`)
    pub bind_addr: String,

    /// Canned search and static quotes instead of live backends (`NEWS_DESK_OFFLINE`)
    pub offline: bool,

    /// REST model for lessons configured with a live-only model (`GEMINI_MODEL`)
    pub chat_model: String,

    /// Where the coordinator saves its report (`REPORTS_DIR`)
    pub reports_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".into(),
            offline: false,
            chat_model: DEFAULT_CHAT_MODEL.into(),
            reports_dir: PathBuf::from("."),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        Self {
            bind_addr: var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            offline: var("NEWS_DESK_OFFLINE")
                .is_some_and(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes")),
            chat_model: var("GEMINI_MODEL").unwrap_or(defaults.chat_model),
            reports_dir: var("REPORTS_DIR").map_or(defaults.reports_dir, PathBuf::from),
        }
    }
}

/// Runners for one lesson: REST chat and live streaming
pub struct LessonRunners {
    pub chat: InMemoryRunner,
    pub live: InMemoryRunner,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// LLM provider (Gemini)
    pub provider: Arc<dyn LlmProvider>,

    /// Lesson runners keyed by agent name
    pub lessons: Arc<BTreeMap<String, LessonRunners>>,

    pub settings: Arc<Settings>,

    /// Whether a live connector is configured
    pub live_enabled: bool,
}

impl AppState {
    /// Build one chat runner and one live runner per lesson
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        kit: &LessonKit,
        live: Option<Arc<dyn LiveConnector>>,
        settings: Settings,
    ) -> agent_core::Result<Self> {
        let mut lessons = BTreeMap::new();

        for config in kit.all() {
            let name = config.name.clone();

            let mut chat_config: AgentConfig = config.clone();
            if is_live_model(chat_config.model()) {
                tracing::debug!(
                    agent = %name,
                    model = %chat_config.model(),
                    chat_model = %settings.chat_model,
                    "Live-only model replaced for REST chat"
                );
                chat_config.generation.model = settings.chat_model.clone();
            }

            let chat = InMemoryRunner::new(name.clone(), Agent::new(provider.clone(), chat_config)?);
            let mut live_runner = InMemoryRunner::new(name.clone(), Agent::new(provider.clone(), config)?);
            if let Some(connector) = &live {
                live_runner = live_runner.with_live_connector(connector.clone());
            }

            lessons.insert(name, LessonRunners { chat, live: live_runner });
        }

        Ok(Self {
            provider,
            lessons: Arc::new(lessons),
            settings: Arc::new(settings),
            live_enabled: live.is_some(),
        })
    }

    pub fn lesson(&self, name: &str) -> Option<&LessonRunners> {
        self.lessons.get(name)
    }

    /// Find a session in any lesson's chat or live store
    pub fn find_session(&self, id: &SessionId) -> agent_core::Result<Option<Session>> {
        for runners in self.lessons.values() {
            for runner in [&runners.chat, &runners.live] {
                if let Some(session) = runner.get_session(id)? {
                    return Ok(Some(session));
                }
            }
        }
        Ok(None)
    }
}
