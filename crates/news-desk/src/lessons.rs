//! Lesson Agents
//!
//! One constructor per lesson. Each returns the declarative [`AgentConfig`];
//! running it is the runner's job.
//!
//! | Lesson | Agent                    | Tools                         | Extras                 |
//! |--------|--------------------------|-------------------------------|------------------------|
//! | 1      | `ai_news_agent_l1`       | search                        |                        |
//! | 2      | `ai_news_agent_l2`       | search, financial context     |                        |
//! | 3      | `ai_news_coordinator_l3` | search, financial, save file  |                        |
//! | 4      | `ai_news_callbacks_l4`   | search                        | guardrail callbacks    |
//! | 5      | `ai_news_structured_l5`  | none                          | output schema and key  |
//! | 6      | `ai_news_agent_l6`       | search                        | driven over live API   |

use std::path::PathBuf;
use std::sync::Arc;

use agent_core::AgentConfig;
use agent_runtime::GeminiProvider;
use serde::Serialize;

use crate::error::{NewsDeskError, Result};
use crate::guardrails::{filter_news_sources, inject_process_log};
use crate::market::{MarketDataClient, MockMarketData, YahooMarketData};
use crate::report::report_schema;
use crate::search::{GroundedSearch, SearchBackend, StaticSearch};
use crate::svckit::{FinancialContextTool, SaveMarkdownTool, WebSearchTool};

/// Model used by every lesson except the structured one
pub const LIVE_MODEL: &str = "gemini-2.0-flash-live-001";

/// Model used by the structured-output lesson
pub const STRUCTURED_MODEL: &str = "gemini-2.0-flash";

/// File the lesson 3 coordinator saves its report to
pub const REPORT_FILENAME: &str = "ai_research_report.md";

/// Session state key receiving the lesson 5 report
pub const FINAL_REPORT_KEY: &str = "final_report_json";

pub const LESSON1_NAME: &str = "ai_news_agent_l1";
pub const LESSON2_NAME: &str = "ai_news_agent_l2";
pub const LESSON3_NAME: &str = "ai_news_coordinator_l3";
pub const LESSON4_NAME: &str = "ai_news_callbacks_l4";
pub const LESSON5_NAME: &str = "ai_news_structured_l5";
pub const LESSON6_NAME: &str = "ai_news_agent_l6";

const LESSON1_INSTRUCTION: &str = "You are an AI news assistant. Use Google Search to find recent information, \
keep answers clear and cite sources where appropriate.";

const LESSON2_INSTRUCTION: &str = "Ask how many news stories the person wants. Use google_search for headlines and then \
get_financial_context to enrich each story with price and daily change. Keep answers concise and cite sources.";

const LESSON3_INSTRUCTION: &str = "Reply only twice: 1) a confirmation that you are starting. 2) a final confirmation after \
saving the report. In between, use google_search (5 news stories), extract tickers, call get_financial_context and \
format everything as Markdown. Save it with save_news_to_markdown('ai_research_report.md', content). \
Do not show intermediate results.";

const LESSON4_INSTRUCTION: &str = "Produce a report of 5 AI news stories and explain the sources in process_log. \
Do not show intermediate content; confirm at the start and at the end.";

const LESSON5_INSTRUCTION: &str = "Return ONLY valid JSON that follows the schema. Do not include any extra text.";

const LESSON6_INSTRUCTION: &str = "Answer questions about AI and use google_search for recent information.";

/// Listing entry for one lesson agent
#[derive(Clone, Debug, Serialize)]
pub struct LessonInfo {
    pub lesson: u8,
    pub name: &'static str,
    pub description: &'static str,
    pub model: &'static str,
}

/// Every lesson, in order
pub fn catalog() -> Vec<LessonInfo> {
    vec![
        LessonInfo {
            lesson: 1,
            name: LESSON1_NAME,
            description: "AI news assistant with web search",
            model: LIVE_MODEL,
        },
        LessonInfo {
            lesson: 2,
            name: LESSON2_NAME,
            description: "Agent combining web search and financial context",
            model: LIVE_MODEL,
        },
        LessonInfo {
            lesson: 3,
            name: LESSON3_NAME,
            description: "Coordinator that researches silently and writes a Markdown report",
            model: LIVE_MODEL,
        },
        LessonInfo {
            lesson: 4,
            name: LESSON4_NAME,
            description: "Agent with callback guardrails (domain filter and process log)",
            model: LIVE_MODEL,
        },
        LessonInfo {
            lesson: 5,
            name: LESSON5_NAME,
            description: "Agent that returns valid JSON matching the report schema",
            model: STRUCTURED_MODEL,
        },
        LessonInfo {
            lesson: 6,
            name: LESSON6_NAME,
            description: "Base assistant for the live streaming demo",
            model: LIVE_MODEL,
        },
    ]
}

/// Live-API-only models cannot serve `generateContent` requests
pub fn is_live_model(model: &str) -> bool {
    model.contains("-live")
}

fn description(name: &str) -> &'static str {
    catalog()
        .into_iter()
        .find(|info| info.name == name)
        .map(|info| info.description)
        .unwrap_or_default()
}

/// Backends shared by the lesson tools
#[derive(Clone)]
pub struct LessonKit {
    search: Arc<dyn SearchBackend>,
    market: Arc<dyn MarketDataClient>,
    reports_dir: PathBuf,
}

impl LessonKit {
    pub fn new(search: Arc<dyn SearchBackend>, market: Arc<dyn MarketDataClient>) -> Self {
        Self {
            search,
            market,
            reports_dir: PathBuf::from("."),
        }
    }

    /// Grounded Gemini search plus Yahoo Finance quotes
    pub fn gemini(provider: Arc<GeminiProvider>) -> Result<Self> {
        Ok(Self::new(
            Arc::new(GroundedSearch::new(provider)),
            Arc::new(YahooMarketData::from_env()?),
        ))
    }

    /// Canned search results and static quotes, no network
    pub fn offline() -> Self {
        Self::new(Arc::new(StaticSearch::default()), Arc::new(MockMarketData::new()))
    }

    /// Directory the lesson 3 report is saved in
    pub fn with_reports_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.reports_dir = dir.into();
        self
    }

    pub fn reports_dir(&self) -> &PathBuf {
        &self.reports_dir
    }

    fn web_search(&self) -> WebSearchTool {
        WebSearchTool::new(self.search.clone())
    }

    fn financial_context(&self) -> FinancialContextTool {
        FinancialContextTool::new(self.market.clone())
    }

    /// Lesson 1: search-augmented Q&A
    pub fn lesson1(&self) -> AgentConfig {
        AgentConfig::new(LESSON1_NAME, LIVE_MODEL)
            .description(description(LESSON1_NAME))
            .instruction(LESSON1_INSTRUCTION)
            .tool(self.web_search())
    }

    /// Lesson 2: adds the financial context tool
    pub fn lesson2(&self) -> AgentConfig {
        AgentConfig::new(LESSON2_NAME, LIVE_MODEL)
            .description(description(LESSON2_NAME))
            .instruction(LESSON2_INSTRUCTION)
            .tool(self.web_search())
            .tool(self.financial_context())
    }

    /// Lesson 3: silent coordinator that saves a Markdown report
    pub fn lesson3(&self) -> AgentConfig {
        AgentConfig::new(LESSON3_NAME, LIVE_MODEL)
            .description(description(LESSON3_NAME))
            .instruction(LESSON3_INSTRUCTION)
            .tool(self.web_search())
            .tool(self.financial_context())
            .tool(SaveMarkdownTool::in_dir(self.reports_dir.clone()))
    }

    /// Lesson 4: search guarded by before/after callbacks
    pub fn lesson4(&self) -> AgentConfig {
        AgentConfig::new(LESSON4_NAME, LIVE_MODEL)
            .description(description(LESSON4_NAME))
            .instruction(LESSON4_INSTRUCTION)
            .tool(self.web_search())
            .before_tool_callback(filter_news_sources)
            .after_tool_callback(inject_process_log)
    }

    /// Lesson 5: structured report, no tools
    pub fn lesson5(&self) -> AgentConfig {
        AgentConfig::new(LESSON5_NAME, STRUCTURED_MODEL)
            .description(description(LESSON5_NAME))
            .instruction(LESSON5_INSTRUCTION)
            .output_schema(report_schema())
            .output_key(FINAL_REPORT_KEY)
    }

    /// Lesson 6: base agent for the live streaming driver
    pub fn lesson6(&self) -> AgentConfig {
        AgentConfig::new(LESSON6_NAME, LIVE_MODEL)
            .description(description(LESSON6_NAME))
            .instruction(LESSON6_INSTRUCTION)
            .tool(self.web_search())
    }

    /// Resolve an agent by name
    pub fn by_name(&self, name: &str) -> Result<AgentConfig> {
        match name {
            LESSON1_NAME => Ok(self.lesson1()),
            LESSON2_NAME => Ok(self.lesson2()),
            LESSON3_NAME => Ok(self.lesson3()),
            LESSON4_NAME => Ok(self.lesson4()),
            LESSON5_NAME => Ok(self.lesson5()),
            LESSON6_NAME => Ok(self.lesson6()),
            other => Err(NewsDeskError::UnknownAgent(other.to_string())),
        }
    }

    /// Every lesson's configuration, in lesson order
    pub fn all(&self) -> Vec<AgentConfig> {
        vec![
            self.lesson1(),
            self.lesson2(),
            self.lesson3(),
            self.lesson4(),
            self.lesson5(),
            self.lesson6(),
        ]
    }
}
