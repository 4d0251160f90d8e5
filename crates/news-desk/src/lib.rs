//! # news-desk
//!
//! Six tutorial agents that research AI news, each adding one capability on
//! top of the previous lesson.
//!
//! ## Lessons
//!
//! - **Search**: Google Search grounded answers with cited sources
//! - **Financial context**: price and daily change for every ticker mentioned
//! - **Coordinator**: silent research that ends in a saved Markdown report
//! - **Callbacks**: a domain guardrail before search and a process log after it
//! - **Structured output**: a validated JSON research report in session state
//! - **Live**: the base agent driven over a streaming connection
//!
//! ## Example: lesson 4 process log
//!
//! ```text
//! google_search("AI chips site:reddit.com")
//!   → {"error": "blocked_source", "reason": "Searches targeting reddit.com ..."}
//!
//! google_search("AI chips")
//!   → {"search_results": "...", "process_log": [
//!        "Action: Sourced news from: www.ft.com, www.reuters.com.",
//!        "Action: Sourced news from: apnews.com."          ← older
//!      ]}
//! ```

pub mod error;
pub mod guardrails;
pub mod lessons;
pub mod market;
pub mod model;
pub mod report;
pub mod search;
pub mod svckit;

pub use error::{NewsDeskError, Result};
pub use lessons::{catalog, is_live_model, LessonInfo, LessonKit};
pub use model::{MarketQuote, NewsItem, ResearchReport};
pub use report::{render_markdown, report_schema};

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::{FinancialContextTool, SaveMarkdownTool, WebSearchTool};
}
