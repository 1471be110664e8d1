//! In-memory store, used by tests and as a fallback when no data
//! directory is available.

use crate::core::error::{EngineError, Result};
use crate::core::model::{Asset, Holding, Portfolio, PositionPoint, TotalValuePoint, User};
use crate::store::{HoldingWithAsset, PortfolioStore, check_position, check_target_ratio};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
struct Inner {
    users: HashMap<String, User>,
    portfolios: HashMap<String, Portfolio>,
    // Keyed by "portfolio_id/symbol" so merge-on-duplicate is a plain
    // entry update.
    holdings: HashMap<String, Holding>,
    assets: HashMap<String, Asset>,
    history: HashMap<(String, NaiveDate), TotalValuePoint>,
    positions: Vec<PositionPoint>,
}

pub struct MemoryStore {
    inner: RwLock<Inner>,
}

fn holding_key(portfolio_id: &str, symbol: &str) -> String {
    format!("{portfolio_id}/{symbol}")
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            inner: RwLock::new(Inner::default()),
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|e| EngineError::Store(e.to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|e| EngineError::Store(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PortfolioStore for MemoryStore {
    fn create_user(&self, user: User) -> Result<User> {
        self.write()?.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        Ok(self.read()?.users.get(user_id).cloned())
    }

    fn list_users(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> = self.read()?.users.values().cloned().collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    fn create_portfolio(&self, portfolio: Portfolio) -> Result<Portfolio> {
        self.write()?
            .portfolios
            .insert(portfolio.id.clone(), portfolio.clone());
        Ok(portfolio)
    }

    fn get_portfolio(&self, portfolio_id: &str) -> Result<Option<Portfolio>> {
        Ok(self.read()?.portfolios.get(portfolio_id).cloned())
    }

    fn portfolios_for_user(&self, user_id: &str) -> Result<Vec<Portfolio>> {
        let mut portfolios: Vec<Portfolio> = self
            .read()?
            .portfolios
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        portfolios.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(portfolios)
    }

    fn delete_portfolio(&self, portfolio_id: &str) -> Result<()> {
        let mut inner = self.write()?;
        inner.portfolios.remove(portfolio_id);
        inner
            .holdings
            .retain(|_, holding| holding.portfolio_id != portfolio_id);
        Ok(())
    }

    fn holdings_for_portfolio(&self, portfolio_id: &str) -> Result<Vec<HoldingWithAsset>> {
        let inner = self.read()?;
        let mut rows: Vec<HoldingWithAsset> = inner
            .holdings
            .values()
            .filter(|h| h.portfolio_id == portfolio_id)
            .map(|holding| {
                let asset = inner
                    .assets
                    .get(&holding.symbol)
                    .cloned()
                    .ok_or_else(|| EngineError::NotFound(format!("asset {}", holding.symbol)))?;
                Ok(HoldingWithAsset {
                    holding: holding.clone(),
                    asset,
                })
            })
            .collect::<Result<_>>()?;
        rows.sort_by(|a, b| a.holding.symbol.cmp(&b.holding.symbol));
        Ok(rows)
    }

    fn get_holding(&self, holding_id: &str) -> Result<Option<Holding>> {
        Ok(self
            .read()?
            .holdings
            .values()
            .find(|h| h.id == holding_id)
            .cloned())
    }

    fn add_holding(&self, portfolio_id: &str, symbol: &str, quantity: Decimal) -> Result<Holding> {
        check_position(quantity)?;
        let mut inner = self.write()?;
        if !inner.portfolios.contains_key(portfolio_id) {
            return Err(EngineError::NotFound(format!("portfolio {portfolio_id}")));
        }
        let holding = inner
            .holdings
            .entry(holding_key(portfolio_id, symbol))
            .and_modify(|h| h.position += quantity)
            .or_insert_with(|| Holding::new(portfolio_id, symbol, quantity));
        Ok(holding.clone())
    }

    fn set_position(&self, holding_id: &str, position: Decimal) -> Result<Holding> {
        check_position(position)?;
        let mut inner = self.write()?;
        let holding = inner
            .holdings
            .values_mut()
            .find(|h| h.id == holding_id)
            .ok_or_else(|| EngineError::NotFound(format!("holding {holding_id}")))?;
        holding.position = position;
        Ok(holding.clone())
    }

    fn set_target_ratio(
        &self,
        holding_id: &str,
        target_ratio: Option<Decimal>,
    ) -> Result<Holding> {
        check_target_ratio(target_ratio)?;
        let mut inner = self.write()?;
        let holding = inner
            .holdings
            .values_mut()
            .find(|h| h.id == holding_id)
            .ok_or_else(|| EngineError::NotFound(format!("holding {holding_id}")))?;
        holding.target_ratio = target_ratio;
        Ok(holding.clone())
    }

    fn remove_holding(&self, holding_id: &str) -> Result<()> {
        self.write()?.holdings.retain(|_, h| h.id != holding_id);
        Ok(())
    }

    fn record_position(&self, point: PositionPoint) -> Result<()> {
        self.write()?.positions.push(point);
        Ok(())
    }

    fn position_history(&self, holding_id: &str) -> Result<Vec<PositionPoint>> {
        let mut points: Vec<PositionPoint> = self
            .read()?
            .positions
            .iter()
            .filter(|p| p.holding_id == holding_id)
            .cloned()
            .collect();
        points.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(points)
    }

    fn get_asset(&self, symbol: &str) -> Result<Option<Asset>> {
        Ok(self.read()?.assets.get(symbol).cloned())
    }

    fn upsert_asset(&self, asset: Asset) -> Result<Asset> {
        self.write()?
            .assets
            .insert(asset.symbol.clone(), asset.clone());
        Ok(asset)
    }

    fn list_assets(&self) -> Result<Vec<Asset>> {
        let mut assets: Vec<Asset> = self.read()?.assets.values().cloned().collect();
        assets.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(assets)
    }

    fn upsert_history(
        &self,
        user_id: &str,
        date: NaiveDate,
        timestamp: DateTime<Utc>,
        total_value: Decimal,
    ) -> Result<TotalValuePoint> {
        let point = TotalValuePoint {
            user_id: user_id.to_string(),
            date,
            timestamp,
            total_value,
        };
        // Single write under the lock keeps the (user, day) row unique even
        // when two snapshot attempts race.
        self.write()?
            .history
            .insert((user_id.to_string(), date), point.clone());
        Ok(point)
    }

    fn history_for_user(&self, user_id: &str) -> Result<Vec<TotalValuePoint>> {
        let mut points: Vec<TotalValuePoint> = self
            .read()?
            .history
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        points.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(points)
    }
}
