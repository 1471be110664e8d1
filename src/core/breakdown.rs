//! Holding classification: growth/income buckets and geographic regions.

use crate::core::convert::CurrencyConverter;
use crate::core::currency::Currency;
use crate::core::error::{EngineError, Result};
use crate::store::{HoldingWithAsset, PortfolioStore};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Asset-type bucket for the two-way breakdown. Equity-like types count as
/// growth-oriented, everything else as income-oriented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetBucket {
    Growth,
    Income,
}

impl From<&str> for AssetBucket {
    fn from(asset_type: &str) -> Self {
        match asset_type.to_lowercase().as_str() {
            "equity" | "stock" | "etf" => AssetBucket::Growth,
            _ => AssetBucket::Income,
        }
    }
}

impl AssetBucket {
    pub fn label(&self) -> &'static str {
        match self {
            AssetBucket::Growth => "Growth",
            AssetBucket::Income => "Income",
        }
    }
}

/// Full timezone name to market region. Unmapped timezones land in
/// [`OTHER_REGION`].
const TIMEZONE_REGIONS: &[(&str, &str)] = &[
    ("America/New_York", "US"),
    ("America/Chicago", "US"),
    ("America/Los_Angeles", "US"),
    ("Europe/London", "Europe"),
    ("Europe/Paris", "Europe"),
    ("Asia/Tokyo", "Japan"),
    ("Asia/Shanghai", "China"),
    ("Australia/Sydney", "Australia"),
    ("Pacific/Auckland", "New Zealand"),
];

pub const OTHER_REGION: &str = "Other";

pub fn region_for(timezone_full: Option<&str>) -> &'static str {
    timezone_full
        .and_then(|tz| {
            TIMEZONE_REGIONS
                .iter()
                .find(|(name, _)| *name == tz)
                .map(|(_, region)| *region)
        })
        .unwrap_or(OTHER_REGION)
}

/// The two-bucket asset-type breakdown, valued in the user's currency.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeBreakdown {
    pub currency: Currency,
    pub growth: Decimal,
    pub income: Decimal,
}

/// One region's share of the user's holdings, in the user's currency.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionValue {
    pub region: String,
    pub total_value: Decimal,
}

pub struct BreakdownService {
    store: Arc<dyn PortfolioStore>,
    converter: Arc<CurrencyConverter>,
}

impl BreakdownService {
    pub fn new(store: Arc<dyn PortfolioStore>, converter: Arc<CurrencyConverter>) -> Self {
        BreakdownService { store, converter }
    }

    /// All of the user's holdings with their value converted to the user's
    /// currency. Holdings without a price, without a known currency or with
    /// a failed conversion are skipped with a warning; they degrade the
    /// breakdown instead of failing it.
    async fn valued_holdings(&self, user_id: &str) -> Result<(Currency, Vec<(HoldingWithAsset, Decimal)>)> {
        let user = self
            .store
            .get_user(user_id)?
            .ok_or_else(|| EngineError::NotFound(format!("user {user_id}")))?;

        let mut valued = Vec::new();
        for portfolio in self.store.portfolios_for_user(user_id)? {
            for row in self.store.holdings_for_portfolio(&portfolio.id)? {
                let Some(value) = row.asset.market_value(row.holding.position) else {
                    warn!(symbol = %row.holding.symbol, "No price; skipped from breakdown");
                    continue;
                };
                let Some(currency) = row.asset.currency else {
                    warn!(symbol = %row.holding.symbol, "Unknown currency; skipped from breakdown");
                    continue;
                };
                match self
                    .converter
                    .convert(value, currency, user.default_currency)
                    .await
                {
                    Ok(converted) => valued.push((row, converted)),
                    Err(e) => {
                        warn!(symbol = %row.holding.symbol, "Skipped from breakdown: {e}");
                    }
                }
            }
        }
        Ok((user.default_currency, valued))
    }

    /// Buckets the user's holdings into growth vs income, each valued in
    /// the user's currency.
    pub async fn asset_type_breakdown(&self, user_id: &str) -> Result<TypeBreakdown> {
        let (currency, valued) = self.valued_holdings(user_id).await?;
        let mut breakdown = TypeBreakdown {
            currency,
            growth: Decimal::ZERO,
            income: Decimal::ZERO,
        };
        for (row, value) in valued {
            match AssetBucket::from(row.asset.asset_type.as_str()) {
                AssetBucket::Growth => breakdown.growth += value,
                AssetBucket::Income => breakdown.income += value,
            }
        }
        Ok(breakdown)
    }

    /// Buckets the user's holdings by market region, derived from each
    /// asset's full timezone name, sorted descending by value.
    pub async fn geographic_breakdown(&self, user_id: &str) -> Result<Vec<RegionValue>> {
        let (_currency, valued) = self.valued_holdings(user_id).await?;
        let mut regions: HashMap<&'static str, Decimal> = HashMap::new();
        for (row, value) in valued {
            let region = region_for(row.asset.timezone_full.as_deref());
            *regions.entry(region).or_insert(Decimal::ZERO) += value;
        }
        let mut breakdown: Vec<RegionValue> = regions
            .into_iter()
            .map(|(region, total_value)| RegionValue {
                region: region.to_string(),
                total_value,
            })
            .collect();
        breakdown.sort_by(|a, b| b.total_value.cmp(&a.total_value));
        Ok(breakdown)
    }
}
