//! Market Data
//!
//! Price lookups behind the `get_financial_context` tool.
//!
//! Every ticker yields exactly one string: a formatted quote such as
//! `$189.20 (+1.25%)`, or one of two sentinels. A failed lookup never fails
//! the whole request.

mod mock;
mod yahoo;

pub use mock::MockMarketData;
pub use yahoo::{YahooConfig, YahooMarketData};

use std::collections::BTreeMap;

use async_trait::async_trait;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::Result;
use crate::model::MarketQuote;

/// Price or change percent missing from an otherwise successful lookup
pub const PRICE_UNAVAILABLE: &str = "Price data not available.";

/// The lookup itself failed
pub const LOOKUP_FAILED: &str = "Invalid Ticker or Data Error";

/// Market data client trait (Strategy pattern)
#[async_trait]
pub trait MarketDataClient: Send + Sync {
    /// Latest quote for a symbol
    async fn quote(&self, symbol: &str) -> Result<MarketQuote>;

    /// Provider name
    fn name(&self) -> &str;
}

fn two_places(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// `$<price> (<signed change>%)`, or [`PRICE_UNAVAILABLE`]
pub fn format_quote(quote: &MarketQuote) -> String {
    let (Some(price), Some(change)) = (quote.price(), quote.change_percent) else {
        return PRICE_UNAVAILABLE.to_string();
    };

    // Sign comes from the unrounded value, so -0.004 prints as -0.00
    let sign = if change.is_sign_negative() && !change.is_zero() { '-' } else { '+' };
    format!("${} ({sign}{}%)", two_places(price), two_places(change.abs()))
}

/// Look up each ticker in order. Duplicates collapse into one entry.
pub async fn financial_context(
    client: &dyn MarketDataClient,
    tickers: &[String],
) -> BTreeMap<String, String> {
    let mut context = BTreeMap::new();

    for ticker in tickers {
        let entry = match client.quote(ticker).await {
            Ok(quote) => format_quote(&quote),
            Err(e) => {
                tracing::warn!(ticker = %ticker, provider = client.name(), error = %e, "Quote lookup failed");
                LOOKUP_FAILED.to_string()
            }
        };
        context.insert(ticker.clone(), entry);
    }

    context
}
