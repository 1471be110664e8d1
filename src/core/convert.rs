//! Currency conversion with a time-bounded rate cache

use crate::core::cache::MemoryCache;
use crate::core::currency::Currency;
use crate::core::error::{EngineError, Result};
use crate::core::market::MarketDataProvider;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_RATE_TTL: Duration = Duration::from_secs(3600);

/// Converts monetary amounts between supported currencies.
///
/// Spot rates come from the market data provider and are cached per
/// `(from, to)` pair for a bounded window, shared across all callers in the
/// process. A cache miss triggers a single provider call.
pub struct CurrencyConverter {
    provider: Arc<dyn MarketDataProvider>,
    rates: MemoryCache<(Currency, Currency), Decimal>,
    ttl: Duration,
}

impl CurrencyConverter {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self::with_ttl(provider, DEFAULT_RATE_TTL)
    }

    pub fn with_ttl(provider: Arc<dyn MarketDataProvider>, ttl: Duration) -> Self {
        CurrencyConverter {
            provider,
            rates: MemoryCache::new(),
            ttl,
        }
    }

    /// Converts `amount` from one currency to another.
    ///
    /// The identity conversion returns `amount` unchanged with no rate
    /// lookup, so it is always exact. A failed rate lookup means the value
    /// is unknown; callers must exclude it from sums rather than treat it
    /// as zero.
    pub async fn convert(&self, amount: Decimal, from: Currency, to: Currency) -> Result<Decimal> {
        if from == to {
            return Ok(amount);
        }
        let rate = self.rate(from, to).await?;
        Ok(amount * rate)
    }

    /// Spot rate for a pair, served from the cache within its TTL.
    pub async fn rate(&self, from: Currency, to: Currency) -> Result<Decimal> {
        if let Some(rate) = self.rates.get(&(from, to)).await {
            return Ok(rate);
        }

        let rate = match self.provider.get_exchange_rate(from, to).await {
            Ok(rate) => rate,
            Err(e) => {
                debug!("Rate lookup failed for {from} -> {to}: {e}");
                return Err(EngineError::ConversionUnavailable { from, to });
            }
        };

        debug!("Fetched rate {from} -> {to}: {rate}");
        self.rates.put((from, to), rate, Some(self.ttl)).await;
        Ok(rate)
    }

    pub async fn clear_cache(&self) {
        self.rates.clear().await;
    }
}
