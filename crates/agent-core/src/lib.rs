//! # agent-core
//!
//! Core agent logic with provider-agnostic LLM abstraction, tool callbacks
//! and live streaming.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          InMemoryRunner                           │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐   │
//! │  │   Session   │  │    Agent    │  │  LiveConnector (opt.)   │   │
//! │  │    Store    │──│  Reasoning  │──│                         │   │
//! │  └─────────────┘  └──────┬──────┘  └─────────────────────────┘   │
//! │                 ┌────────┴─────────┐                              │
//! │        before/after callbacks   LlmProvider                       │
//! │                 │                                                 │
//! │           Tool Registry                                           │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait enables swapping between Gemini, scripted test
//! doubles or any other backend without changing agent logic.

pub mod callback;
pub mod error;
pub mod live;
pub mod message;
pub mod provider;
pub mod reasoning;
pub mod runner;
pub mod schema;
pub mod session;
pub mod testing;
pub mod tool;

pub use callback::{AfterToolCallback, BeforeToolCallback, ToolContext};
pub use error::{AgentError, Result};
pub use live::{LiveEvent, LiveRequestQueue, Modality, RunConfig};
pub use message::{Message, Role};
pub use provider::LlmProvider;
pub use reasoning::{Agent, AgentConfig};
pub use runner::InMemoryRunner;
pub use schema::{OutputSchema, TypedSchema, Validate};
pub use session::{Session, SessionId, SessionState};
pub use tool::{Tool, ToolArgs, ToolCall, ToolResult, ToolRegistry, ToolSchema};
