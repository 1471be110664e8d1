//! Yahoo Finance chart/search API client.

use crate::core::currency::Currency;
use crate::core::error::{EngineError, Result};
use crate::core::market::{MarketDataProvider, SymbolMatch, SymbolQuote};
use async_trait::async_trait;
use futures::future::join_all;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = "foliotrack/0.1";

pub struct YahooProvider {
    base_url: String,
    client: reqwest::Client,
}

impl YahooProvider {
    pub fn new(base_url: &str, timeout_secs: Option<u64>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(
                timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            ))
            .build()
            .map_err(|e| EngineError::ProviderUnavailable(e.to_string()))?;
        Ok(YahooProvider {
            base_url: base_url.to_string(),
            client,
        })
    }

    /// Single-attempt quote fetch for one symbol. Any failure maps to
    /// `ProviderUnavailable`; the caller decides whether that is fatal.
    #[instrument(name = "YahooQuoteFetch", skip(self), fields(symbol = %symbol))]
    async fn fetch_quote(&self, symbol: &str) -> Result<SymbolQuote> {
        let url = format!(
            "{}/v8/finance/chart/{}?interval=1d&range=1d",
            self.base_url, symbol
        );
        debug!("Requesting quote data from {}", url);

        let meta = self.fetch_chart_meta(&url, symbol).await?;
        Ok(SymbolQuote {
            name: meta.short_name,
            long_name: meta.long_name,
            price: meta.regular_market_price,
            asset_type: meta.instrument_type,
            currency: meta.currency,
            timezone_full: meta.exchange_timezone_name,
            timezone_short: meta.timezone,
        })
    }

    async fn fetch_chart_meta(&self, url: &str, what: &str) -> Result<ChartMeta> {
        let response = self.client.get(url).send().await.map_err(|e| {
            EngineError::ProviderUnavailable(format!("request error for {what}: {e}"))
        })?;

        if !response.status().is_success() {
            return Err(EngineError::ProviderUnavailable(format!(
                "HTTP {} for {what}",
                response.status()
            )));
        }

        let data = response.json::<ChartResponse>().await.map_err(|e| {
            EngineError::ProviderUnavailable(format!("malformed response for {what}: {e}"))
        })?;

        data.chart
            .result
            .into_iter()
            .next()
            .map(|item| item.meta)
            .ok_or_else(|| EngineError::ProviderUnavailable(format!("no chart data for {what}")))
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    result: Vec<ChartItem>,
}

#[derive(Debug, Deserialize)]
struct ChartItem {
    meta: ChartMeta,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(alias = "regularMarketPrice")]
    regular_market_price: Option<Decimal>,
    currency: Option<String>,
    #[serde(alias = "shortName")]
    short_name: Option<String>,
    #[serde(alias = "longName")]
    long_name: Option<String>,
    #[serde(alias = "instrumentType")]
    instrument_type: Option<String>,
    #[serde(alias = "exchangeTimezoneName")]
    exchange_timezone_name: Option<String>,
    timezone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    quotes: Vec<SearchQuote>,
}

#[derive(Debug, Deserialize)]
struct SearchQuote {
    symbol: Option<String>,
    #[serde(alias = "shortname")]
    short_name: Option<String>,
    #[serde(alias = "longname")]
    long_name: Option<String>,
    exchange: Option<String>,
    #[serde(alias = "quoteType")]
    quote_type: Option<String>,
}

#[async_trait]
impl MarketDataProvider for YahooProvider {
    async fn get_prices(&self, symbols: &[String]) -> Result<HashMap<String, SymbolQuote>> {
        let fetches = symbols.iter().map(|symbol| async move {
            (symbol.clone(), self.fetch_quote(symbol).await)
        });

        let mut quotes = HashMap::new();
        for (symbol, result) in join_all(fetches).await {
            match result {
                Ok(quote) => {
                    quotes.insert(symbol, quote);
                }
                // Absent from the map means "no data" for that symbol.
                Err(e) => debug!(symbol = %symbol, "Quote fetch failed: {e}"),
            }
        }
        Ok(quotes)
    }

    async fn get_exchange_rate(&self, from: Currency, to: Currency) -> Result<Decimal> {
        let pair = format!("{from}{to}=X");
        let url = format!("{}/v8/finance/chart/{pair}", self.base_url);
        debug!("Requesting exchange rate from {}", url);

        let meta = self.fetch_chart_meta(&url, &pair).await?;
        meta.regular_market_price
            .ok_or_else(|| EngineError::ProviderUnavailable(format!("no rate data for {pair}")))
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SymbolMatch>> {
        let url = format!("{}/v1/finance/search", self.base_url);
        debug!("Requesting symbol search from {}", url);

        let count = limit.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("quotesCount", count.as_str()), ("newsCount", "0")])
            .send()
            .await
            .map_err(|e| {
            EngineError::ProviderUnavailable(format!("request error for search: {e}"))
        })?;

        if !response.status().is_success() {
            return Err(EngineError::ProviderUnavailable(format!(
                "HTTP {} for search",
                response.status()
            )));
        }

        let data = response.json::<SearchResponse>().await.map_err(|e| {
            EngineError::ProviderUnavailable(format!("malformed search response: {e}"))
        })?;

        Ok(data
            .quotes
            .into_iter()
            .filter_map(|q| {
                let symbol = q.symbol?;
                let name = q.long_name.or(q.short_name).unwrap_or_else(|| symbol.clone());
                Some(SymbolMatch {
                    symbol,
                    name,
                    exchange: q.exchange,
                    asset_type: q.quote_type,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_chart(server: &MockServer, symbol: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/v8/finance/chart/{symbol}")))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    fn provider(server: &MockServer) -> YahooProvider {
        YahooProvider::new(&server.uri(), Some(5)).unwrap()
    }

    #[tokio::test]
    async fn test_successful_quote_fetch() {
        let mock_response = r#"{
            "chart": {
                "result": [{
                    "meta": {
                        "regularMarketPrice": 150.65,
                        "currency": "USD",
                        "shortName": "Apple",
                        "longName": "Apple Inc.",
                        "instrumentType": "EQUITY",
                        "exchangeTimezoneName": "America/New_York",
                        "timezone": "EST"
                    }
                }]
            }
        }"#;

        let server = MockServer::start().await;
        mount_chart(&server, "AAPL", mock_response).await;

        let quotes = provider(&server)
            .get_prices(&["AAPL".to_string()])
            .await
            .unwrap();
        let quote = quotes.get("AAPL").unwrap();
        assert_eq!(quote.price, Some(dec!(150.65)));
        assert_eq!(quote.currency.as_deref(), Some("USD"));
        assert_eq!(quote.long_name.as_deref(), Some("Apple Inc."));
        assert_eq!(quote.asset_type.as_deref(), Some("EQUITY"));
        assert_eq!(quote.timezone_full.as_deref(), Some("America/New_York"));
        assert_eq!(quote.timezone_short.as_deref(), Some("EST"));
    }

    #[tokio::test]
    async fn test_failed_symbol_absent_from_batch() {
        let mock_response = r#"{
            "chart": {
                "result": [{
                    "meta": { "regularMarketPrice": 10.0, "currency": "USD" }
                }]
            }
        }"#;

        let server = MockServer::start().await;
        mount_chart(&server, "GOOD", mock_response).await;
        mount_chart(&server, "EMPTY", r#"{"chart": {"result": []}}"#).await;

        let quotes = provider(&server)
            .get_prices(&["GOOD".to_string(), "EMPTY".to_string()])
            .await
            .unwrap();
        assert!(quotes.contains_key("GOOD"));
        assert!(!quotes.contains_key("EMPTY"));
    }

    #[tokio::test]
    async fn test_quote_without_market_price() {
        let mock_response = r#"{
            "chart": {
                "result": [{
                    "meta": { "currency": "USD", "shortName": "Halted Corp" }
                }]
            }
        }"#;

        let server = MockServer::start().await;
        mount_chart(&server, "HALT", mock_response).await;

        let quotes = provider(&server)
            .get_prices(&["HALT".to_string()])
            .await
            .unwrap();
        let quote = quotes.get("HALT").unwrap();
        assert_eq!(quote.price, None);
        assert_eq!(quote.name.as_deref(), Some("Halted Corp"));
    }

    #[tokio::test]
    async fn test_successful_rate_fetch() {
        let mock_response = r#"{
            "chart": {
                "result": [{
                    "meta": { "regularMarketPrice": 1.2345, "currency": "EUR" }
                }]
            }
        }"#;

        let server = MockServer::start().await;
        mount_chart(&server, "USDEUR=X", mock_response).await;

        let rate = provider(&server)
            .get_exchange_rate(Currency::Usd, Currency::Eur)
            .await
            .unwrap();
        assert_eq!(rate, dec!(1.2345));
    }

    #[tokio::test]
    async fn test_rate_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/USDEUR=X"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = provider(&server)
            .get_exchange_rate(Currency::Usd, Currency::Eur)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ProviderUnavailable(_)));
        assert!(err.to_string().contains("HTTP 500"));
    }

    #[tokio::test]
    async fn test_rate_malformed_response() {
        let server = MockServer::start().await;
        mount_chart(&server, "USDEUR=X", r#"{"chart": {"results": []}}"#).await;

        let err = provider(&server)
            .get_exchange_rate(Currency::Usd, Currency::Eur)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no chart data"));
    }

    #[tokio::test]
    async fn test_symbol_search() {
        let mock_response = r#"{
            "quotes": [
                {
                    "symbol": "AAPL",
                    "shortname": "Apple",
                    "longname": "Apple Inc.",
                    "exchange": "NMS",
                    "quoteType": "EQUITY"
                },
                { "shortname": "No symbol, dropped" }
            ]
        }"#;

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/finance/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .mount(&server)
            .await;

        let matches = provider(&server).search("apple", 10).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].symbol, "AAPL");
        assert_eq!(matches[0].name, "Apple Inc.");
        assert_eq!(matches[0].asset_type.as_deref(), Some("EQUITY"));
    }
}
