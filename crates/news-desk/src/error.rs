//! Error Types for the News Desk

use agent_core::AgentError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, NewsDeskError>;

#[derive(Error, Debug)]
pub enum NewsDeskError {
    #[error("Quote unavailable for {0}")]
    QuoteUnavailable(String),

    #[error("Yahoo Finance error: {0}")]
    Yahoo(#[from] yfinance_rs::YfError),

    #[error("Search failed: {0}")]
    Search(String),

    #[error("Unknown lesson agent: {0}")]
    UnknownAgent(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Agent(#[from] AgentError),
}

impl From<NewsDeskError> for AgentError {
    fn from(err: NewsDeskError) -> Self {
        match err {
            NewsDeskError::Agent(e) => e,
            NewsDeskError::Io(e) => AgentError::Io(e),
            NewsDeskError::Config(msg) => AgentError::Config(msg),
            NewsDeskError::UnknownAgent(name) => AgentError::Config(format!("Unknown lesson agent: {name}")),
            other => AgentError::ToolExecution(other.to_string()),
        }
    }
}
