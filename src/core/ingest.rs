//! Asset ingestion: creating and refreshing assets from market data.

use crate::core::currency::Currency;
use crate::core::error::{EngineError, Result};
use crate::core::market::{MarketDataProvider, SymbolMatch, SymbolQuote};
use crate::core::model::{Asset, Holding, PositionPoint};
use crate::store::PortfolioStore;
use chrono::Utc;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

const UNKNOWN: &str = "Unknown";

pub struct AssetIngestor {
    store: Arc<dyn PortfolioStore>,
    provider: Arc<dyn MarketDataProvider>,
}

impl AssetIngestor {
    pub fn new(store: Arc<dyn PortfolioStore>, provider: Arc<dyn MarketDataProvider>) -> Self {
        AssetIngestor { store, provider }
    }

    /// Fetches a fresh quote for `symbol` and upserts the asset row.
    ///
    /// The row is keyed by symbol, so repeated calls update in place.
    /// Fields the quote omits keep their stored value; a brand new asset
    /// falls back to "Unknown" placeholders so it can be held before the
    /// provider knows much about it. If the provider has no data at all
    /// the stored row is left untouched and the error is surfaced.
    pub async fn create_or_refresh_asset(&self, symbol: &str) -> Result<Asset> {
        let mut quotes = self.provider.get_prices(&[symbol.to_string()]).await?;
        let quote = quotes.remove(symbol).ok_or_else(|| {
            EngineError::ProviderUnavailable(format!("no quote data for {symbol}"))
        })?;

        let existing = self.store.get_asset(symbol)?;
        let asset = merge_quote(symbol, existing, quote);
        debug!(symbol = %asset.symbol, price = ?asset.latest_price, "Refreshed asset");
        self.store.upsert_asset(asset)
    }

    /// Refreshes every stored asset, fail-soft per symbol. Returns
    /// (updated, failed) counts.
    pub async fn refresh_all_assets(&self) -> Result<(usize, usize)> {
        let mut updated = 0;
        let mut failed = 0;
        for asset in self.store.list_assets()? {
            match self.create_or_refresh_asset(&asset.symbol).await {
                Ok(_) => updated += 1,
                Err(e) => {
                    warn!(symbol = %asset.symbol, "Failed to refresh asset: {e}");
                    failed += 1;
                }
            }
        }
        info!(updated, failed, "Asset refresh finished");
        Ok((updated, failed))
    }

    /// Adds `quantity` of `symbol` to a portfolio, creating or refreshing
    /// the asset row first. When the provider is down but the asset is
    /// already known, the stale row is good enough to record the position.
    pub async fn add_to_portfolio(
        &self,
        portfolio_id: &str,
        symbol: &str,
        quantity: Decimal,
    ) -> Result<Holding> {
        if let Err(e) = self.create_or_refresh_asset(symbol).await {
            if self.store.get_asset(symbol)?.is_none() {
                return Err(e);
            }
            warn!(symbol, "Using stored asset data: {e}");
        }
        let holding = self.store.add_holding(portfolio_id, symbol, quantity)?;
        self.audit_position(&holding)?;
        Ok(holding)
    }

    /// Replaces a holding's position and appends an audit row.
    pub fn set_position(&self, holding_id: &str, position: Decimal) -> Result<Holding> {
        let holding = self.store.set_position(holding_id, position)?;
        self.audit_position(&holding)?;
        Ok(holding)
    }

    fn audit_position(&self, holding: &Holding) -> Result<()> {
        let price_at_time = self
            .store
            .get_asset(&holding.symbol)?
            .and_then(|asset| asset.latest_price);
        self.store.record_position(PositionPoint {
            holding_id: holding.id.clone(),
            timestamp: Utc::now(),
            position: holding.position,
            price_at_time,
        })
    }

    /// Symbol search, best-effort: provider trouble yields an empty list
    /// rather than an error.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SymbolMatch>> {
        match self.provider.search(query, limit).await {
            Ok(matches) => Ok(matches),
            Err(e) => {
                warn!(query, "Symbol search failed: {e}");
                Ok(Vec::new())
            }
        }
    }
}

/// Folds a quote into the stored asset row, or builds a new row with
/// sentinel defaults. A currency code outside the supported set is stored
/// as unknown; valuation later flags the holding instead of guessing.
fn merge_quote(symbol: &str, existing: Option<Asset>, quote: SymbolQuote) -> Asset {
    let currency = match quote.currency.as_deref() {
        Some(code) => match Currency::from_str(code) {
            Ok(currency) => Some(currency),
            Err(_) => {
                warn!(symbol, code, "Unsupported quote currency");
                None
            }
        },
        None => None,
    };

    match existing {
        Some(mut asset) => {
            if let Some(name) = quote.long_name.or(quote.name) {
                asset.name = name;
            }
            if let Some(asset_type) = quote.asset_type {
                asset.asset_type = asset_type;
            }
            if currency.is_some() {
                asset.currency = currency;
            }
            if quote.price.is_some() {
                asset.latest_price = quote.price;
            }
            if quote.timezone_full.is_some() {
                asset.timezone_full = quote.timezone_full;
            }
            if quote.timezone_short.is_some() {
                asset.timezone_short = quote.timezone_short;
            }
            asset.last_updated = Utc::now();
            asset
        }
        None => Asset {
            symbol: symbol.to_string(),
            name: quote
                .long_name
                .or(quote.name)
                .unwrap_or_else(|| UNKNOWN.to_string()),
            asset_type: quote.asset_type.unwrap_or_else(|| UNKNOWN.to_string()),
            currency,
            latest_price: quote.price,
            last_updated: Utc::now(),
            timezone_full: quote.timezone_full,
            timezone_short: quote.timezone_short,
        },
    }
}
