//! Service Kit - Agent Tools
//!
//! Domain-specific tools that implement `agent_core::Tool` for the news desk.

mod financial_context;
mod save_markdown;
mod web_search;

pub use financial_context::FinancialContextTool;
pub use save_markdown::SaveMarkdownTool;
pub use web_search::WebSearchTool;
