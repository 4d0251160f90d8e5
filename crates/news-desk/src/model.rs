//! Domain Models
//!
//! The structured research report (lesson 5) and the market quote behind the
//! financial context tool. Prices use `rust_decimal`, never f64.

use agent_core::Validate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use url::Url;

/// Minimum headline length, in characters
pub const MIN_HEADLINE_CHARS: usize = 8;

/// Inclusive bounds on the number of items in a report
pub const MIN_REPORT_ITEMS: usize = 3;
pub const MAX_REPORT_ITEMS: usize = 10;

/// Latest quote for one ticker
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketQuote {
    /// Ticker symbol as quoted by the provider
    pub symbol: String,

    /// Current price, when the provider reports one
    pub current_price: Option<Decimal>,

    /// Regular-market price, the fallback for `current_price`
    pub regular_market_price: Option<Decimal>,

    /// Daily change in percent units (`1.25` means +1.25 %)
    pub change_percent: Option<Decimal>,
}

impl MarketQuote {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            current_price: None,
            regular_market_price: None,
            change_percent: None,
        }
    }

    pub fn with_current_price(mut self, price: Decimal) -> Self {
        self.current_price = Some(price);
        self
    }

    pub fn with_regular_market_price(mut self, price: Decimal) -> Self {
        self.regular_market_price = Some(price);
        self
    }

    pub fn with_change_percent(mut self, change: Decimal) -> Self {
        self.change_percent = Some(change);
        self
    }

    /// Current price, else regular-market price
    pub fn price(&self) -> Option<Decimal> {
        self.current_price.or(self.regular_market_price)
    }
}

/// One news story in a research report
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub headline: String,
    pub company: String,
    #[serde(default)]
    pub ticker: Option<String>,
    pub market_data: String,
    pub summary: String,
    /// Absolute http(s) URLs backing the story
    pub sources: Vec<String>,
}

/// Structured output of the lesson 5 agent
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResearchReport {
    pub title: String,
    pub items: Vec<NewsItem>,
    /// Most recent entry first
    #[serde(default)]
    pub process_log: Vec<String>,
}

fn is_http_url(raw: &str) -> bool {
    Url::parse(raw)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .unwrap_or(false)
}

impl Validate for NewsItem {
    fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut violations = Vec::new();

        if self.headline.chars().count() < MIN_HEADLINE_CHARS {
            violations.push(format!(
                "headline must be at least {MIN_HEADLINE_CHARS} characters"
            ));
        }
        if self.sources.is_empty() {
            violations.push("sources must contain at least one URL".into());
        }
        for source in self.sources.iter().filter(|s| !is_http_url(s)) {
            violations.push(format!("source is not an absolute http(s) URL: {source}"));
        }

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }
}

impl Validate for ResearchReport {
    fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut violations = Vec::new();

        let count = self.items.len();
        if !(MIN_REPORT_ITEMS..=MAX_REPORT_ITEMS).contains(&count) {
            violations.push(format!(
                "items must contain between {MIN_REPORT_ITEMS} and {MAX_REPORT_ITEMS} entries, got {count}"
            ));
        }

        for (idx, item) in self.items.iter().enumerate() {
            if let Err(item_violations) = item.validate() {
                violations.extend(item_violations.into_iter().map(|v| format!("items[{idx}]: {v}")));
            }
        }

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }
}
