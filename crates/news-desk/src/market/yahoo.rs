//! Yahoo Finance quotes through `yfinance-rs`.
//!
//! The client handles Yahoo's cookie and crumb handshake: an unauthenticated
//! v7 request answered with 401/403 is retried once with fresh credentials.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use url::Url;
use yfinance_rs::core::conversions::money_to_f64;
use yfinance_rs::{Ticker, YfClient};

use super::MarketDataClient;
use crate::error::{NewsDeskError, Result};
use crate::model::MarketQuote;

/// Yahoo client configuration
#[derive(Clone, Debug)]
pub struct YahooConfig {
    /// Override for the v7 quote endpoint
    pub quote_url: Option<String>,

    /// Override for the cookie bootstrap URL
    pub cookie_url: Option<String>,

    /// Override for the crumb URL
    pub crumb_url: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Retry transient failures inside the client
    pub retry: bool,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            quote_url: None,
            cookie_url: None,
            crumb_url: None,
            timeout_secs: 10,
            retry: true,
        }
    }
}

impl YahooConfig {
    pub fn from_env() -> Self {
        Self {
            quote_url: std::env::var("YAHOO_QUOTE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            ..Default::default()
        }
    }
}

fn to_decimal(value: f64) -> Option<Decimal> {
    Decimal::try_from(value).ok()
}

/// Daily change in percent units, relative to the previous close
pub(crate) fn change_percent(price: Option<Decimal>, previous_close: Option<Decimal>) -> Option<Decimal> {
    let (price, previous) = (price?, previous_close?);
    if previous.is_zero() {
        return None;
    }
    Some((price - previous) / previous * Decimal::ONE_HUNDRED)
}

/// Market data from Yahoo Finance
pub struct YahooMarketData {
    client: YfClient,
}

impl YahooMarketData {
    pub fn new(config: YahooConfig) -> Result<Self> {
        let mut builder = YfClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .retry_enabled(config.retry);

        if let Some(url) = &config.quote_url {
            builder = builder.base_quote_v7(Url::parse(url)?);
        }
        if let Some(url) = &config.cookie_url {
            builder = builder.cookie_url(Url::parse(url)?);
        }
        if let Some(url) = &config.crumb_url {
            builder = builder.crumb_url(Url::parse(url)?);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(YahooConfig::from_env())
    }
}

#[async_trait]
impl MarketDataClient for YahooMarketData {
    async fn quote(&self, symbol: &str) -> Result<MarketQuote> {
        let requested = symbol.trim();
        if requested.is_empty() {
            return Err(NewsDeskError::QuoteUnavailable(symbol.to_string()));
        }

        let quote = Ticker::new(&self.client, requested).quote().await?;

        let price = quote.price.as_ref().map(money_to_f64).and_then(to_decimal);
        let previous_close = quote
            .previous_close
            .as_ref()
            .map(money_to_f64)
            .and_then(to_decimal);

        tracing::debug!(symbol = requested, "Quote fetched");
        Ok(MarketQuote {
            symbol: requested.to_string(),
            current_price: None,
            regular_market_price: price,
            change_percent: change_percent(price, previous_close),
        })
    }

    fn name(&self) -> &str {
        "YahooFinance"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{financial_context, format_quote, LOOKUP_FAILED, PRICE_UNAVAILABLE};
    use httpmock::{Method::GET, MockServer};
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn config(server: &MockServer) -> YahooConfig {
        YahooConfig {
            quote_url: Some(format!("{}/v7/finance/quote", server.base_url())),
            cookie_url: Some(format!("{}/consent", server.base_url())),
            crumb_url: Some(format!("{}/v1/test/getcrumb", server.base_url())),
            retry: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_change_percent() {
        assert_eq!(change_percent(Some(dec!(110)), Some(dec!(100))), Some(dec!(10)));
        assert_eq!(change_percent(Some(dec!(90)), Some(dec!(100))), Some(dec!(-10)));
        assert_eq!(change_percent(Some(dec!(1)), Some(dec!(0))), None);
        assert_eq!(change_percent(None, Some(dec!(1))), None);
        assert_eq!(change_percent(Some(dec!(1)), None), None);
    }

    #[tokio::test]
    async fn test_quote_from_v7_payload() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/v7/finance/quote")
                .query_param("symbols", "AAPL");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "quoteResponse": {
                        "result": [{
                            "symbol": "AAPL",
                            "regularMarketPrice": 190.25,
                            "regularMarketPreviousClose": 189.50,
                            "currency": "USD",
                            "fullExchangeName": "NasdaqGS",
                            "marketState": "REGULAR"
                        }],
                        "error": null
                    }
                }));
        });

        let yahoo = YahooMarketData::new(config(&server)).unwrap();
        let quote = yahoo.quote("AAPL").await.unwrap();

        mock.assert();
        assert_eq!(quote.price(), Some(dec!(190.25)));
        assert_eq!(format_quote(&quote), "$190.25 (+0.40%)");
    }

    #[tokio::test]
    async fn test_unauthorized_retries_with_crumb() {
        let server = MockServer::start();

        // Matches only once the crumb is attached; defined before the 401 fallback
        let ok = server.mock(|when, then| {
            when.method(GET)
                .path("/v7/finance/quote")
                .query_param("symbols", "NVDA")
                .query_param("crumb", "crumb-value");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "quoteResponse": {
                        "result": [{
                            "symbol": "NVDA",
                            "regularMarketPrice": 110.0,
                            "regularMarketPreviousClose": 100.0,
                            "currency": "USD"
                        }],
                        "error": null
                    }
                }));
        });
        let first = server.mock(|when, then| {
            when.method(GET).path("/v7/finance/quote");
            then.status(401).body("Invalid Crumb");
        });
        let cookie = server.mock(|when, then| {
            when.method(GET).path("/consent");
            then.status(200).header(
                "set-cookie",
                "A=B; Max-Age=315360000; Domain=.yahoo.com; Path=/; Secure; SameSite=None",
            );
        });
        let crumb = server.mock(|when, then| {
            when.method(GET).path("/v1/test/getcrumb");
            then.status(200).body("crumb-value");
        });

        let yahoo = YahooMarketData::new(config(&server)).unwrap();
        let context = financial_context(&yahoo, &["NVDA".to_string()]).await;

        first.assert();
        cookie.assert();
        crumb.assert();
        ok.assert();
        assert_eq!(context["NVDA"], "$110.00 (+10.00%)");
    }

    #[tokio::test]
    async fn test_financial_context_sentinels_over_http() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v7/finance/quote").query_param("symbols", "MSFT");
            then.status(200).json_body(json!({
                "quoteResponse": {"result": [{"symbol": "MSFT", "regularMarketPrice": 512.5}]}
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/v7/finance/quote").query_param("symbols", "ZZZZ");
            then.status(200)
                .json_body(json!({"quoteResponse": {"result": [], "error": null}}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/v7/finance/quote").query_param("symbols", "BROKEN");
            then.status(500);
        });

        let yahoo = YahooMarketData::new(config(&server)).unwrap();
        let tickers = vec!["MSFT".to_string(), "ZZZZ".to_string(), "BROKEN".to_string(), " ".to_string()];
        let context = financial_context(&yahoo, &tickers).await;

        assert_eq!(context["MSFT"], PRICE_UNAVAILABLE);
        assert_eq!(context["ZZZZ"], LOOKUP_FAILED);
        assert_eq!(context["BROKEN"], LOOKUP_FAILED);
        assert_eq!(context[" "], LOOKUP_FAILED);
    }

    #[test]
    fn test_invalid_override_url() {
        let config = YahooConfig {
            quote_url: Some("not a url".into()),
            ..Default::default()
        };
        assert!(matches!(YahooMarketData::new(config), Err(NewsDeskError::Url(_))));
    }
}
