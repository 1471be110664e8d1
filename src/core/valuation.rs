//! Portfolio valuation: per-holding values, allocation ratios and
//! aggregated totals across currencies.

use crate::core::cache::MemoryCache;
use crate::core::convert::CurrencyConverter;
use crate::core::currency::Currency;
use crate::core::error::{EngineError, Result};
use crate::core::model::Holding;
use crate::store::PortfolioStore;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Totals are memoized just long enough to absorb a burst of repeated
/// calls within one request cycle; intentionally much shorter-lived than
/// the exchange-rate cache.
pub const DEFAULT_TOTAL_TTL: Duration = Duration::from_secs(5);

/// The calculated value of one holding, in the portfolio's display
/// currency. A populated `error` means the holding was excluded from the
/// portfolio total (missing price, unknown currency or failed conversion).
#[derive(Debug, Clone)]
pub struct HoldingValuation {
    pub holding_id: String,
    pub symbol: String,
    pub name: String,
    pub position: Decimal,
    pub price: Option<Decimal>,
    /// Value in the asset's native currency.
    pub market_value: Option<Decimal>,
    pub currency: Option<Currency>,
    /// Value in the portfolio's display currency.
    pub converted_value: Option<Decimal>,
    /// Share of the portfolio total, 0 to 100.
    pub ratio: Decimal,
    /// The allocation the user is aiming for, when one is set.
    pub target_ratio: Option<Decimal>,
    pub error: Option<String>,
}

/// A consistent view of one portfolio: every ratio in the batch was
/// computed against the same total.
#[derive(Debug, Clone)]
pub struct PortfolioSnapshot {
    pub portfolio_id: String,
    pub name: String,
    pub currency: Currency,
    pub total_value: Decimal,
    pub holdings: Vec<HoldingValuation>,
}

impl PortfolioSnapshot {
    /// True when any holding was excluded from the total, so the total is
    /// a lower bound rather than the full picture.
    pub fn has_exclusions(&self) -> bool {
        self.holdings.iter().any(|h| h.error.is_some())
    }
}

pub struct ValuationEngine {
    store: Arc<dyn PortfolioStore>,
    converter: Arc<CurrencyConverter>,
    totals: MemoryCache<String, Decimal>,
    total_ttl: Duration,
}

impl ValuationEngine {
    pub fn new(store: Arc<dyn PortfolioStore>, converter: Arc<CurrencyConverter>) -> Self {
        Self::with_ttl(store, converter, DEFAULT_TOTAL_TTL)
    }

    pub fn with_ttl(
        store: Arc<dyn PortfolioStore>,
        converter: Arc<CurrencyConverter>,
        total_ttl: Duration,
    ) -> Self {
        ValuationEngine {
            store,
            converter,
            totals: MemoryCache::new(),
            total_ttl,
        }
    }

    /// Total value of a portfolio in its display currency, memoized for a
    /// short window.
    ///
    /// Partial data degrades the total instead of failing it: holdings
    /// without a price contribute zero, and holdings whose conversion
    /// fails are excluded from the sum (never zero-filled into it).
    pub async fn portfolio_value(&self, portfolio_id: &str) -> Result<Decimal> {
        if let Some(total) = self.totals.get(&portfolio_id.to_string()).await {
            return Ok(total);
        }
        Ok(self.refresh(portfolio_id).await?.total_value)
    }

    /// Recomputes the whole portfolio and returns a snapshot suitable for a
    /// bulk display update after a position edit. Always bypasses and
    /// repopulates the total cache.
    pub async fn refresh(&self, portfolio_id: &str) -> Result<PortfolioSnapshot> {
        let portfolio = self
            .store
            .get_portfolio(portfolio_id)?
            .ok_or_else(|| EngineError::NotFound(format!("portfolio {portfolio_id}")))?;
        let rows = self.store.holdings_for_portfolio(portfolio_id)?;

        let mut holdings = Vec::with_capacity(rows.len());
        let mut total = Decimal::ZERO;

        for row in rows {
            let holding = row.holding;
            let asset = row.asset;
            let mut valuation = HoldingValuation {
                holding_id: holding.id.clone(),
                symbol: holding.symbol.clone(),
                name: asset.name.clone(),
                position: holding.position,
                price: asset.latest_price,
                market_value: None,
                currency: asset.currency,
                converted_value: None,
                ratio: Decimal::ZERO,
                target_ratio: holding.target_ratio,
                error: None,
            };

            let Some(value) = asset.market_value(holding.position) else {
                warn!(
                    symbol = %holding.symbol,
                    "No price available; holding contributes zero"
                );
                valuation.error = Some("no price available".to_string());
                holdings.push(valuation);
                continue;
            };
            valuation.market_value = Some(value);

            let Some(currency) = asset.currency else {
                warn!(
                    symbol = %holding.symbol,
                    "Asset currency unknown; holding excluded from total"
                );
                valuation.error = Some("asset currency unknown".to_string());
                holdings.push(valuation);
                continue;
            };

            match self
                .converter
                .convert(value, currency, portfolio.currency)
                .await
            {
                Ok(converted) => {
                    total += converted;
                    valuation.converted_value = Some(converted);
                }
                Err(e) => {
                    warn!(
                        symbol = %holding.symbol,
                        "Conversion failed; holding excluded from total: {e}"
                    );
                    valuation.error = Some(e.to_string());
                }
            }
            holdings.push(valuation);
        }

        // One denominator for the whole batch.
        for valuation in &mut holdings {
            if let Some(converted) = valuation.converted_value {
                valuation.ratio = ratio_of(converted, total);
            }
        }

        debug!(
            portfolio = %portfolio.name,
            total = %total,
            "Portfolio valued"
        );
        self.totals
            .put(portfolio_id.to_string(), total, Some(self.total_ttl))
            .await;

        Ok(PortfolioSnapshot {
            portfolio_id: portfolio.id,
            name: portfolio.name,
            currency: portfolio.currency,
            total_value: total,
            holdings,
        })
    }

    /// Allocation ratio of one holding within its portfolio, 0 to 100.
    pub async fn holding_ratio(&self, holding_id: &str) -> Result<Decimal> {
        let holding: Holding = self
            .store
            .get_holding(holding_id)?
            .ok_or_else(|| EngineError::NotFound(format!("holding {holding_id}")))?;
        let snapshot = self.refresh(&holding.portfolio_id).await?;
        Ok(snapshot
            .holdings
            .iter()
            .find(|h| h.holding_id == holding_id)
            .map(|h| h.ratio)
            .unwrap_or(Decimal::ZERO))
    }

    /// Total value of all of a user's portfolios in the user's default
    /// currency. A portfolio whose conversion fails contributes zero and
    /// is logged, not fatal to the aggregate.
    pub async fn user_total_value(&self, user_id: &str) -> Result<Decimal> {
        let user = self
            .store
            .get_user(user_id)?
            .ok_or_else(|| EngineError::NotFound(format!("user {user_id}")))?;

        let mut total = Decimal::ZERO;
        for portfolio in self.store.portfolios_for_user(user_id)? {
            let value = self.portfolio_value(&portfolio.id).await?;
            match self
                .converter
                .convert(value, portfolio.currency, user.default_currency)
                .await
            {
                Ok(converted) => total += converted,
                Err(e) => {
                    warn!(
                        portfolio = %portfolio.name,
                        "Portfolio excluded from user total: {e}"
                    );
                }
            }
        }
        Ok(total)
    }

    pub async fn clear_cache(&self) {
        self.totals.clear().await;
    }
}

/// `value / total * 100`, defined as 0 when `total` is 0.
pub fn ratio_of(value: Decimal, total: Decimal) -> Decimal {
    if total == Decimal::ZERO {
        return Decimal::ZERO;
    }
    value / total * Decimal::ONE_HUNDRED
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::market::{MarketDataProvider, SymbolMatch, SymbolQuote};
    use crate::core::model::{Asset, Portfolio, User};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockProvider {
        rates: HashMap<(Currency, Currency), Decimal>,
        rate_calls: AtomicUsize,
    }

    impl MockProvider {
        fn new() -> Self {
            MockProvider {
                rates: HashMap::new(),
                rate_calls: AtomicUsize::new(0),
            }
        }

        fn with_rate(mut self, from: Currency, to: Currency, rate: Decimal) -> Self {
            self.rates.insert((from, to), rate);
            self
        }
    }

    #[async_trait]
    impl MarketDataProvider for MockProvider {
        async fn get_prices(&self, _symbols: &[String]) -> Result<HashMap<String, SymbolQuote>> {
            Ok(HashMap::new())
        }

        async fn get_exchange_rate(&self, from: Currency, to: Currency) -> Result<Decimal> {
            self.rate_calls.fetch_add(1, Ordering::SeqCst);
            self.rates
                .get(&(from, to))
                .copied()
                .ok_or_else(|| EngineError::ProviderUnavailable("no rate".to_string()))
        }

        async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<SymbolMatch>> {
            Ok(Vec::new())
        }
    }

    fn asset(symbol: &str, price: Option<Decimal>, currency: Option<Currency>) -> Asset {
        Asset {
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            asset_type: "EQUITY".to_string(),
            currency,
            latest_price: price,
            last_updated: Utc::now(),
            timezone_full: None,
            timezone_short: None,
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        engine: ValuationEngine,
        user: User,
        portfolio: Portfolio,
    }

    fn fixture(provider: MockProvider) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let user = store.create_user(User::new("test", Currency::Usd)).unwrap();
        let portfolio = store
            .create_portfolio(Portfolio::new(&user.id, "Main", Currency::Usd))
            .unwrap();
        let converter = Arc::new(CurrencyConverter::new(Arc::new(provider)));
        let engine = ValuationEngine::new(
            Arc::clone(&store) as Arc<dyn PortfolioStore>,
            converter,
        );
        Fixture {
            store,
            engine,
            user,
            portfolio,
        }
    }

    #[tokio::test]
    async fn test_portfolio_value_across_currencies() {
        // 10 * 100 USD + 5 * 50 EUR at EUR->USD 1.1 = 1275.00
        let f = fixture(MockProvider::new().with_rate(Currency::Eur, Currency::Usd, dec!(1.1)));
        f.store
            .upsert_asset(asset("TEST", Some(dec!(100)), Some(Currency::Usd)))
            .unwrap();
        f.store
            .upsert_asset(asset("EURX", Some(dec!(50)), Some(Currency::Eur)))
            .unwrap();
        f.store.add_holding(&f.portfolio.id, "TEST", dec!(10)).unwrap();
        f.store.add_holding(&f.portfolio.id, "EURX", dec!(5)).unwrap();

        let total = f.engine.portfolio_value(&f.portfolio.id).await.unwrap();
        assert_eq!(total, dec!(1275.00));

        let snapshot = f.engine.refresh(&f.portfolio.id).await.unwrap();
        assert!(!snapshot.has_exclusions());
        let test = snapshot.holdings.iter().find(|h| h.symbol == "TEST").unwrap();
        let eurx = snapshot.holdings.iter().find(|h| h.symbol == "EURX").unwrap();
        assert_eq!(test.converted_value, Some(dec!(1000)));
        assert_eq!(eurx.converted_value, Some(dec!(275.0)));
        assert_eq!(test.ratio.round_dp(2), dec!(78.43));
        assert_eq!(eurx.ratio.round_dp(2), dec!(21.57));
        assert_eq!((test.ratio + eurx.ratio).round_dp(6), dec!(100));
    }

    #[tokio::test]
    async fn test_missing_price_contributes_zero_not_failure() {
        let f = fixture(MockProvider::new());
        f.store
            .upsert_asset(asset("A", Some(dec!(10)), Some(Currency::Usd)))
            .unwrap();
        f.store
            .upsert_asset(asset("B", Some(dec!(20)), Some(Currency::Usd)))
            .unwrap();
        f.store.upsert_asset(asset("C", None, Some(Currency::Usd))).unwrap();
        f.store.add_holding(&f.portfolio.id, "A", dec!(1)).unwrap();
        f.store.add_holding(&f.portfolio.id, "B", dec!(1)).unwrap();
        f.store.add_holding(&f.portfolio.id, "C", dec!(100)).unwrap();

        let snapshot = f.engine.refresh(&f.portfolio.id).await.unwrap();
        assert_eq!(snapshot.total_value, dec!(30));
        assert!(snapshot.has_exclusions());

        let flagged = snapshot.holdings.iter().find(|h| h.symbol == "C").unwrap();
        assert_eq!(flagged.error.as_deref(), Some("no price available"));
        assert_eq!(flagged.ratio, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_failed_conversion_is_excluded_not_zero_filled() {
        // No EUR->USD rate configured.
        let f = fixture(MockProvider::new());
        f.store
            .upsert_asset(asset("USDX", Some(dec!(10)), Some(Currency::Usd)))
            .unwrap();
        f.store
            .upsert_asset(asset("EURX", Some(dec!(50)), Some(Currency::Eur)))
            .unwrap();
        f.store.add_holding(&f.portfolio.id, "USDX", dec!(3)).unwrap();
        f.store.add_holding(&f.portfolio.id, "EURX", dec!(5)).unwrap();

        let snapshot = f.engine.refresh(&f.portfolio.id).await.unwrap();
        assert_eq!(snapshot.total_value, dec!(30));

        let excluded = snapshot.holdings.iter().find(|h| h.symbol == "EURX").unwrap();
        assert!(excluded.error.is_some());
        assert_eq!(excluded.market_value, Some(dec!(250)));
        assert_eq!(excluded.converted_value, None);
        // The USD holding owns the entire degraded total.
        let kept = snapshot.holdings.iter().find(|h| h.symbol == "USDX").unwrap();
        assert_eq!(kept.ratio, dec!(100));
    }

    #[tokio::test]
    async fn test_target_ratio_surfaces_in_snapshot() {
        let f = fixture(MockProvider::new());
        f.store
            .upsert_asset(asset("A", Some(dec!(10)), Some(Currency::Usd)))
            .unwrap();
        f.store
            .upsert_asset(asset("B", Some(dec!(10)), Some(Currency::Usd)))
            .unwrap();
        let a = f.store.add_holding(&f.portfolio.id, "A", dec!(3)).unwrap();
        f.store.add_holding(&f.portfolio.id, "B", dec!(1)).unwrap();
        f.store.set_target_ratio(&a.id, Some(dec!(60))).unwrap();

        let snapshot = f.engine.refresh(&f.portfolio.id).await.unwrap();
        let a_val = snapshot.holdings.iter().find(|h| h.symbol == "A").unwrap();
        let b_val = snapshot.holdings.iter().find(|h| h.symbol == "B").unwrap();
        assert_eq!(a_val.target_ratio, Some(dec!(60)));
        assert_eq!(a_val.ratio, dec!(75));
        assert_eq!(b_val.target_ratio, None);
    }

    #[tokio::test]
    async fn test_ratio_zero_when_total_zero() {
        let f = fixture(MockProvider::new());
        f.store
            .upsert_asset(asset("A", Some(dec!(10)), Some(Currency::Usd)))
            .unwrap();
        let holding = f.store.add_holding(&f.portfolio.id, "A", dec!(0)).unwrap();

        let ratio = f.engine.holding_ratio(&holding.id).await.unwrap();
        assert_eq!(ratio, Decimal::ZERO);

        assert_eq!(ratio_of(dec!(0), dec!(0)), Decimal::ZERO);
        assert_eq!(ratio_of(dec!(25), dec!(100)), dec!(25));
    }

    #[tokio::test]
    async fn test_total_cache_absorbs_bursts() {
        let provider = MockProvider::new().with_rate(Currency::Eur, Currency::Usd, dec!(1.1));
        let store = Arc::new(MemoryStore::new());
        let user = store.create_user(User::new("test", Currency::Usd)).unwrap();
        let portfolio = store
            .create_portfolio(Portfolio::new(&user.id, "Main", Currency::Usd))
            .unwrap();
        store
            .upsert_asset(asset("EURX", Some(dec!(50)), Some(Currency::Eur)))
            .unwrap();
        store.add_holding(&portfolio.id, "EURX", dec!(5)).unwrap();

        let converter = Arc::new(CurrencyConverter::new(Arc::new(provider)));
        let engine = ValuationEngine::new(Arc::clone(&store) as Arc<dyn PortfolioStore>, converter);

        let first = engine.portfolio_value(&portfolio.id).await.unwrap();
        // Mutate the position; the memoized total is intentionally stale
        // within its window.
        store.add_holding(&portfolio.id, "EURX", dec!(5)).unwrap();
        let second = engine.portfolio_value(&portfolio.id).await.unwrap();
        assert_eq!(first, second);

        // refresh always recomputes.
        let snapshot = engine.refresh(&portfolio.id).await.unwrap();
        assert_eq!(snapshot.total_value, dec!(550.0));
    }

    #[tokio::test]
    async fn test_user_total_value_spans_portfolios() {
        let provider = MockProvider::new()
            .with_rate(Currency::Eur, Currency::Usd, dec!(1.1))
            .with_rate(Currency::Nzd, Currency::Usd, dec!(0.6));
        let store = Arc::new(MemoryStore::new());
        let user = store.create_user(User::new("test", Currency::Usd)).unwrap();
        let usd = store
            .create_portfolio(Portfolio::new(&user.id, "US", Currency::Usd))
            .unwrap();
        let nzd = store
            .create_portfolio(Portfolio::new(&user.id, "NZ", Currency::Nzd))
            .unwrap();
        store
            .upsert_asset(asset("USDX", Some(dec!(100)), Some(Currency::Usd)))
            .unwrap();
        store
            .upsert_asset(asset("NZX", Some(dec!(10)), Some(Currency::Nzd)))
            .unwrap();
        store.add_holding(&usd.id, "USDX", dec!(1)).unwrap();
        store.add_holding(&nzd.id, "NZX", dec!(50)).unwrap();

        let converter = Arc::new(CurrencyConverter::new(Arc::new(provider)));
        let engine = ValuationEngine::new(Arc::clone(&store) as Arc<dyn PortfolioStore>, converter);

        // 100 USD + 500 NZD * 0.6 = 400 USD
        let total = engine.user_total_value(&user.id).await.unwrap();
        assert_eq!(total, dec!(400.0));
    }

    #[tokio::test]
    async fn test_user_total_skips_unconvertible_portfolio() {
        let f = fixture(MockProvider::new());
        // Second portfolio in EUR with no rate available.
        let eur = f
            .store
            .create_portfolio(Portfolio::new(&f.user.id, "EU", Currency::Eur))
            .unwrap();
        f.store
            .upsert_asset(asset("USDX", Some(dec!(100)), Some(Currency::Usd)))
            .unwrap();
        f.store
            .upsert_asset(asset("EURX", Some(dec!(50)), Some(Currency::Eur)))
            .unwrap();
        f.store.add_holding(&f.portfolio.id, "USDX", dec!(1)).unwrap();
        f.store.add_holding(&eur.id, "EURX", dec!(1)).unwrap();

        let total = f.engine.user_total_value(&f.user.id).await.unwrap();
        assert_eq!(total, dec!(100));
    }
}
