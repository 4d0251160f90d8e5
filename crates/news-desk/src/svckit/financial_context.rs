//! Financial Context Tool
//!
//! Looks up the latest price and daily change for a list of tickers.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use agent_core::{
    tool::ParameterSchema,
    AgentError, Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema,
};

use crate::market::{financial_context, MarketDataClient};

pub const TOOL_NAME: &str = "get_financial_context";

/// Tool mapping ticker symbols to formatted quote strings
pub struct FinancialContextTool {
    market: Arc<dyn MarketDataClient>,
}

impl FinancialContextTool {
    pub fn new(market: Arc<dyn MarketDataClient>) -> Self {
        Self { market }
    }
}

/// Accepts `["NVDA", "MSFT"]` or `"NVDA, MSFT"`.
///
/// List entries are kept exactly as sent, so result keys match the request
/// and a blank entry gets its own sentinel. A comma string only loses the
/// whitespace and empty pieces around its separators.
fn tickers(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
        ),
        Value::String(s) => Some(
            s.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        _ => None,
    }
}

#[async_trait]
impl Tool for FinancialContextTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: TOOL_NAME.into(),
            description: "Get the current stock price and daily percent change for a list of ticker symbols. \
                Returns one display string per ticker."
                .into(),
            parameters: vec![ParameterSchema::required_array(
                "tickers",
                "string",
                "Ticker symbols, e.g. [\"NVDA\", \"MSFT\"]",
            )],
            category: Some("market_data".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let symbols = call
            .arguments
            .get("tickers")
            .and_then(tickers)
            .ok_or_else(|| {
                AgentError::ToolValidation("tickers must be a list of ticker symbols".into())
            })?;

        tracing::debug!(tickers = ?symbols, provider = self.market.name(), "Fetching financial context");
        let context = financial_context(self.market.as_ref(), &symbols).await;

        let summary = context
            .iter()
            .map(|(ticker, line)| format!("{ticker}: {line}"))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(ToolResult::success(TOOL_NAME, summary).with_data(serde_json::to_value(&context)?))
    }
}
