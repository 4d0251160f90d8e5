//! # agent-runtime
//!
//! Runtime providers for the news desk agents.
//!
//! ## Providers
//!
//! - **Gemini** (default): `generateContent` REST API with native function
//!   calling, search grounding and response schemas
//! - **Gemini Live** (`live` feature): `BidiGenerateContent` WebSocket
//!   connector for streaming sessions
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::GeminiProvider;
//!
//! let provider = GeminiProvider::from_env()?;
//! let agent = Agent::new(
//!     Arc::new(provider),
//!     AgentConfig::new("ai_news_agent", "gemini-2.0-flash").instruction("Be concise."),
//! )?;
//! ```

pub mod gemini;
#[cfg(feature = "live")]
pub mod gemini_live;
pub mod wire;

pub use gemini::{GeminiConfig, GeminiProvider, GroundedAnswer, GroundingSource};
#[cfg(feature = "live")]
pub use gemini_live::GeminiLiveConnector;

// Re-export core types for convenience
pub use agent_core::{
    Agent, AgentError, LlmProvider, Message, Result, Role, Session, Tool, ToolRegistry,
};
