//! Market data abstractions

use crate::core::currency::Currency;
use crate::core::error::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Quote data for one symbol. Every field is optional: providers routinely
/// return partial data, and downstream code applies explicit defaulting
/// rules instead of guarding against missing keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolQuote {
    pub name: Option<String>,
    pub long_name: Option<String>,
    pub price: Option<Decimal>,
    pub asset_type: Option<String>,
    pub currency: Option<String>,
    pub timezone_full: Option<String>,
    pub timezone_short: Option<String>,
}

/// A symbol search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolMatch {
    pub symbol: String,
    pub name: String,
    pub exchange: Option<String>,
    pub asset_type: Option<String>,
}

/// External source of prices, exchange rates and symbol search.
///
/// Every call is a blocking network operation with a timeout; callers make
/// a single attempt per logical operation and decide fail-soft vs fail-hard
/// themselves.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Batched quote lookup. Partial results are allowed: a symbol absent
    /// from the returned map means "no data" for that symbol.
    async fn get_prices(&self, symbols: &[String]) -> Result<HashMap<String, SymbolQuote>>;

    /// Spot rate expressed as "1 unit of `from` = rate units of `to`".
    async fn get_exchange_rate(&self, from: Currency, to: Currency) -> Result<Decimal>;

    /// Best-effort text search; an empty list on no match.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SymbolMatch>>;
}
