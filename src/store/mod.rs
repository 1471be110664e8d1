//! Persistence seam for the valuation engine.
//!
//! The engine reads and writes domain records through [`PortfolioStore`]
//! instead of issuing queries; all arithmetic happens in the engine. Tests
//! use the in-memory implementation, the CLI uses the fjall-backed one.

pub mod disk;
pub mod memory;

pub use disk::DiskStore;
pub use memory::MemoryStore;

use crate::core::error::{EngineError, Result};
use crate::core::model::{Asset, Holding, Portfolio, PositionPoint, TotalValuePoint, User};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

pub(crate) fn check_position(position: Decimal) -> Result<()> {
    if position < Decimal::ZERO {
        return Err(EngineError::InvalidValue(format!(
            "position cannot be negative: {position}"
        )));
    }
    Ok(())
}

pub(crate) fn check_target_ratio(target_ratio: Option<Decimal>) -> Result<()> {
    if let Some(ratio) = target_ratio {
        if ratio < Decimal::ZERO || ratio > Decimal::ONE_HUNDRED {
            return Err(EngineError::InvalidValue(format!(
                "target ratio must be between 0 and 100: {ratio}"
            )));
        }
    }
    Ok(())
}

/// A holding joined with its asset, read under a single lock so one
/// valuation pass sees a consistent snapshot.
#[derive(Debug, Clone)]
pub struct HoldingWithAsset {
    pub holding: Holding,
    pub asset: Asset,
}

pub trait PortfolioStore: Send + Sync {
    fn create_user(&self, user: User) -> Result<User>;
    fn get_user(&self, user_id: &str) -> Result<Option<User>>;
    fn list_users(&self) -> Result<Vec<User>>;

    fn create_portfolio(&self, portfolio: Portfolio) -> Result<Portfolio>;
    fn get_portfolio(&self, portfolio_id: &str) -> Result<Option<Portfolio>>;
    fn portfolios_for_user(&self, user_id: &str) -> Result<Vec<Portfolio>>;
    /// Deletes the portfolio and cascades to its holdings. Assets are
    /// shared records and stay untouched.
    fn delete_portfolio(&self, portfolio_id: &str) -> Result<()>;

    fn holdings_for_portfolio(&self, portfolio_id: &str) -> Result<Vec<HoldingWithAsset>>;
    fn get_holding(&self, holding_id: &str) -> Result<Option<Holding>>;
    /// Adds `quantity` of `symbol` to the portfolio. When a holding for the
    /// pair already exists its position is incremented; a duplicate row is
    /// never created. A negative `quantity` is rejected: positions can only
    /// shrink through `set_position`, which keeps them non-negative too.
    fn add_holding(&self, portfolio_id: &str, symbol: &str, quantity: Decimal) -> Result<Holding>;
    /// Replaces the holding's position. Negative positions are rejected.
    fn set_position(&self, holding_id: &str, position: Decimal) -> Result<Holding>;
    /// Sets or clears the holding's target allocation ratio (0 to 100).
    fn set_target_ratio(&self, holding_id: &str, target_ratio: Option<Decimal>)
    -> Result<Holding>;
    fn remove_holding(&self, holding_id: &str) -> Result<()>;

    /// Appends a position audit row. Rows are never updated or deleted.
    fn record_position(&self, point: PositionPoint) -> Result<()>;
    /// Audit rows for one holding in ascending timestamp order.
    fn position_history(&self, holding_id: &str) -> Result<Vec<PositionPoint>>;

    fn get_asset(&self, symbol: &str) -> Result<Option<Asset>>;
    /// Upsert keyed by symbol; repeated calls update in place.
    fn upsert_asset(&self, asset: Asset) -> Result<Asset>;
    fn list_assets(&self) -> Result<Vec<Asset>>;

    /// Atomic upsert of the (user, day) total-value row. Concurrent calls
    /// for the same day must never produce a duplicate row.
    fn upsert_history(
        &self,
        user_id: &str,
        date: NaiveDate,
        timestamp: DateTime<Utc>,
        total_value: Decimal,
    ) -> Result<TotalValuePoint>;
    /// History points for a user in ascending date order.
    fn history_for_user(&self, user_id: &str) -> Result<Vec<TotalValuePoint>>;
}
