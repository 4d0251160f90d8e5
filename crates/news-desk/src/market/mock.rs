//! Mock Market Data
//!
//! For tests and offline demos. Returns realistic static quotes.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal_macros::dec;

use super::MarketDataClient;
use crate::error::{NewsDeskError, Result};
use crate::model::MarketQuote;

/// Market data client with a static quote table
#[derive(Clone, Debug)]
pub struct MockMarketData {
    quotes: HashMap<String, MarketQuote>,
}

impl Default for MockMarketData {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMarketData {
    pub fn new() -> Self {
        let table = [
            MarketQuote::new("NVDA").with_current_price(dec!(189.20)).with_change_percent(dec!(1.25)),
            MarketQuote::new("MSFT").with_current_price(dec!(512.57)).with_change_percent(dec!(0.42)),
            MarketQuote::new("GOOGL").with_current_price(dec!(251.03)).with_change_percent(dec!(-0.87)),
            MarketQuote::new("META").with_current_price(dec!(734.38)).with_change_percent(dec!(2.10)),
            MarketQuote::new("AMZN").with_current_price(dec!(227.74)).with_change_percent(dec!(-1.05)),
            MarketQuote::new("AAPL").with_current_price(dec!(254.43)).with_change_percent(dec!(0.31)),
            MarketQuote::new("TSLA").with_current_price(dec!(429.83)).with_change_percent(dec!(3.64)),
            MarketQuote::new("AMD").with_current_price(dec!(216.42)).with_change_percent(dec!(-2.48)),
            // Regular-market price only
            MarketQuote::new("TSM").with_regular_market_price(dec!(301.15)).with_change_percent(dec!(0.95)),
            // No change percent: exercises the "not available" path
            MarketQuote::new("ARM").with_current_price(dec!(152.10)),
        ];

        Self {
            quotes: table.into_iter().map(|q| (q.symbol.clone(), q)).collect(),
        }
    }

    /// Empty table; every lookup fails
    pub fn empty() -> Self {
        Self { quotes: HashMap::new() }
    }

    /// Add or replace a quote
    pub fn with_quote(mut self, quote: MarketQuote) -> Self {
        self.quotes.insert(quote.symbol.to_uppercase(), quote);
        self
    }
}

#[async_trait]
impl MarketDataClient for MockMarketData {
    async fn quote(&self, symbol: &str) -> Result<MarketQuote> {
        self.quotes
            .get(&symbol.trim().to_uppercase())
            .cloned()
            .ok_or_else(|| NewsDeskError::QuoteUnavailable(symbol.to_string()))
    }

    fn name(&self) -> &str {
        "MockMarketData"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        let market = MockMarketData::new();
        let quote = market.quote("nvda").await.unwrap();
        assert_eq!(quote.symbol, "NVDA");
        assert_eq!(quote.price(), Some(dec!(189.20)));
    }

    #[tokio::test]
    async fn test_unknown_symbol() {
        let market = MockMarketData::new();
        assert!(matches!(
            market.quote("NOTREAL").await,
            Err(NewsDeskError::QuoteUnavailable(_))
        ));
        assert!(MockMarketData::empty().quote("NVDA").await.is_err());
    }

    #[tokio::test]
    async fn test_with_quote_overrides() {
        let market = MockMarketData::new()
            .with_quote(MarketQuote::new("NVDA").with_current_price(dec!(1)));
        assert_eq!(market.quote("NVDA").await.unwrap().change_percent, None);
    }
}
