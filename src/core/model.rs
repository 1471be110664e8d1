//! Domain records persisted through the store

use crate::core::currency::Currency;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A tradable asset, keyed by its ticker symbol. Shared across holdings of
/// different portfolios; deleting a holding never deletes the asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub symbol: String,
    pub name: String,
    pub asset_type: String,
    /// None until the provider reports a code from the supported set.
    pub currency: Option<Currency>,
    /// None until the first successful price fetch.
    pub latest_price: Option<Decimal>,
    pub last_updated: DateTime<Utc>,
    pub timezone_full: Option<String>,
    pub timezone_short: Option<String>,
}

impl Asset {
    /// Market value of `position` units in the asset's native currency, or
    /// None while no price is known.
    pub fn market_value(&self, position: Decimal) -> Option<Decimal> {
        self.latest_price.map(|price| position * price)
    }
}

/// A named collection of holdings with a display currency, owned by exactly
/// one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub currency: Currency,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Portfolio {
    pub fn new(user_id: &str, name: &str, currency: Currency) -> Self {
        let now = Utc::now();
        Portfolio {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            currency,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A portfolio's position in one asset. At most one holding exists per
/// (portfolio, symbol) pair; adding the same symbol again merges positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub id: String,
    pub portfolio_id: String,
    pub symbol: String,
    pub position: Decimal,
    pub target_ratio: Option<Decimal>,
}

impl Holding {
    pub fn new(portfolio_id: &str, symbol: &str, position: Decimal) -> Self {
        Holding {
            id: uuid::Uuid::new_v4().to_string(),
            portfolio_id: portfolio_id.to_string(),
            symbol: symbol.to_string(),
            position,
            target_ratio: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub default_currency: Currency,
}

impl User {
    pub fn new(name: &str, default_currency: Currency) -> Self {
        User {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            default_currency,
        }
    }
}

/// Audit row appended whenever a holding's position changes: the new
/// position and the asset price at that moment, when one was known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionPoint {
    pub holding_id: String,
    pub timestamp: DateTime<Utc>,
    pub position: Decimal,
    pub price_at_time: Option<Decimal>,
}

/// One total-value data point per user per calendar day, in the user's
/// default currency. Recomputation on the same day updates in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalValuePoint {
    pub user_id: String,
    pub date: NaiveDate,
    pub timestamp: DateTime<Utc>,
    pub total_value: Decimal,
}
