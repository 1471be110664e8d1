//! Fjall-backed store used by the CLI.
//!
//! One partition per record type, values as JSON. Key layout makes the two
//! uniqueness invariants single-key writes: holdings are keyed by
//! `portfolio_id/symbol` and history rows by `user_id/date`, so merges and
//! daily upserts are last-write-wins on one key and can never duplicate.

use crate::core::error::{EngineError, Result};
use crate::core::model::{Asset, Holding, Portfolio, PositionPoint, TotalValuePoint, User};
use crate::store::{HoldingWithAsset, PortfolioStore, check_position, check_target_ratio};
use chrono::{DateTime, NaiveDate, Utc};
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle};
use rust_decimal::Decimal;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Mutex;

pub struct DiskStore {
    _keyspace: Keyspace,
    users: PartitionHandle,
    portfolios: PartitionHandle,
    holdings: PartitionHandle,
    assets: PartitionHandle,
    history: PartitionHandle,
    positions: PartitionHandle,
    // Serializes read-modify-write sequences (holding merge); fjall only
    // makes the individual key write atomic.
    write_lock: Mutex<()>,
}

fn store_err(e: impl std::fmt::Display) -> EngineError {
    EngineError::Store(e.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(store_err)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(store_err)
}

impl DiskStore {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path).map_err(store_err)?;
        let keyspace = fjall::Config::new(path).open().map_err(store_err)?;
        let open = |name: &str| {
            keyspace
                .open_partition(name, PartitionCreateOptions::default())
                .map_err(store_err)
        };
        Ok(DiskStore {
            users: open("users")?,
            portfolios: open("portfolios")?,
            holdings: open("holdings")?,
            assets: open("assets")?,
            history: open("history")?,
            positions: open("positions")?,
            _keyspace: keyspace,
            write_lock: Mutex::new(()),
        })
    }

    fn get_value<T: DeserializeOwned>(partition: &PartitionHandle, key: &str) -> Result<Option<T>> {
        match partition.get(key).map_err(store_err)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_value<T: Serialize>(partition: &PartitionHandle, key: &str, value: &T) -> Result<()> {
        partition.insert(key, encode(value)?).map_err(store_err)
    }

    fn scan<T: DeserializeOwned>(partition: &PartitionHandle) -> Result<Vec<T>> {
        let mut values = Vec::new();
        for kv in partition.iter() {
            let (_key, bytes) = kv.map_err(store_err)?;
            values.push(decode(&bytes)?);
        }
        Ok(values)
    }

    fn holding_key(portfolio_id: &str, symbol: &str) -> String {
        format!("{portfolio_id}/{symbol}")
    }

    fn history_key(user_id: &str, date: NaiveDate) -> String {
        // Date formatted to sort ascending under a prefix scan.
        format!("{user_id}/{}", date.format("%Y-%m-%d"))
    }
}

impl PortfolioStore for DiskStore {
    fn create_user(&self, user: User) -> Result<User> {
        Self::put_value(&self.users, &user.id, &user)?;
        Ok(user)
    }

    fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        Self::get_value(&self.users, user_id)
    }

    fn list_users(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> = Self::scan(&self.users)?;
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    fn create_portfolio(&self, portfolio: Portfolio) -> Result<Portfolio> {
        Self::put_value(&self.portfolios, &portfolio.id, &portfolio)?;
        Ok(portfolio)
    }

    fn get_portfolio(&self, portfolio_id: &str) -> Result<Option<Portfolio>> {
        Self::get_value(&self.portfolios, portfolio_id)
    }

    fn portfolios_for_user(&self, user_id: &str) -> Result<Vec<Portfolio>> {
        let mut portfolios: Vec<Portfolio> = Self::scan::<Portfolio>(&self.portfolios)?
            .into_iter()
            .filter(|p| p.user_id == user_id)
            .collect();
        portfolios.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(portfolios)
    }

    fn delete_portfolio(&self, portfolio_id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().map_err(store_err)?;
        self.portfolios.remove(portfolio_id).map_err(store_err)?;
        let prefix = format!("{portfolio_id}/");
        let mut keys = Vec::new();
        for kv in self.holdings.prefix(&prefix) {
            let (key, _) = kv.map_err(store_err)?;
            keys.push(key);
        }
        for key in keys {
            self.holdings.remove(key).map_err(store_err)?;
        }
        Ok(())
    }

    fn holdings_for_portfolio(&self, portfolio_id: &str) -> Result<Vec<HoldingWithAsset>> {
        let prefix = format!("{portfolio_id}/");
        let mut rows = Vec::new();
        for kv in self.holdings.prefix(&prefix) {
            let (_key, bytes) = kv.map_err(store_err)?;
            let holding: Holding = decode(&bytes)?;
            let asset = Self::get_value(&self.assets, &holding.symbol)?
                .ok_or_else(|| EngineError::NotFound(format!("asset {}", holding.symbol)))?;
            rows.push(HoldingWithAsset { holding, asset });
        }
        Ok(rows)
    }

    fn get_holding(&self, holding_id: &str) -> Result<Option<Holding>> {
        Ok(Self::scan::<Holding>(&self.holdings)?
            .into_iter()
            .find(|h| h.id == holding_id))
    }

    fn add_holding(&self, portfolio_id: &str, symbol: &str, quantity: Decimal) -> Result<Holding> {
        check_position(quantity)?;
        let _guard = self.write_lock.lock().map_err(store_err)?;
        if self.get_portfolio(portfolio_id)?.is_none() {
            return Err(EngineError::NotFound(format!("portfolio {portfolio_id}")));
        }
        let key = Self::holding_key(portfolio_id, symbol);
        let holding = match Self::get_value::<Holding>(&self.holdings, &key)? {
            Some(mut existing) => {
                existing.position += quantity;
                existing
            }
            None => Holding::new(portfolio_id, symbol, quantity),
        };
        Self::put_value(&self.holdings, &key, &holding)?;
        Ok(holding)
    }

    fn set_position(&self, holding_id: &str, position: Decimal) -> Result<Holding> {
        check_position(position)?;
        let _guard = self.write_lock.lock().map_err(store_err)?;
        let mut holding = self
            .get_holding(holding_id)?
            .ok_or_else(|| EngineError::NotFound(format!("holding {holding_id}")))?;
        holding.position = position;
        let key = Self::holding_key(&holding.portfolio_id, &holding.symbol);
        Self::put_value(&self.holdings, &key, &holding)?;
        Ok(holding)
    }

    fn set_target_ratio(
        &self,
        holding_id: &str,
        target_ratio: Option<Decimal>,
    ) -> Result<Holding> {
        check_target_ratio(target_ratio)?;
        let _guard = self.write_lock.lock().map_err(store_err)?;
        let mut holding = self
            .get_holding(holding_id)?
            .ok_or_else(|| EngineError::NotFound(format!("holding {holding_id}")))?;
        holding.target_ratio = target_ratio;
        let key = Self::holding_key(&holding.portfolio_id, &holding.symbol);
        Self::put_value(&self.holdings, &key, &holding)?;
        Ok(holding)
    }

    fn remove_holding(&self, holding_id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().map_err(store_err)?;
        if let Some(holding) = self.get_holding(holding_id)? {
            let key = Self::holding_key(&holding.portfolio_id, &holding.symbol);
            self.holdings.remove(key.as_str()).map_err(store_err)?;
        }
        Ok(())
    }

    fn get_asset(&self, symbol: &str) -> Result<Option<Asset>> {
        Self::get_value(&self.assets, symbol)
    }

    fn upsert_asset(&self, asset: Asset) -> Result<Asset> {
        Self::put_value(&self.assets, &asset.symbol, &asset)?;
        Ok(asset)
    }

    fn list_assets(&self) -> Result<Vec<Asset>> {
        let mut assets: Vec<Asset> = Self::scan(&self.assets)?;
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
        // One key per (user, day); concurrent writers race to the same key
        // and the row count stays at one.
        Self::put_value(&self.history, &Self::history_key(user_id, date), &point)?;
        Ok(point)
    }

    fn record_position(&self, point: PositionPoint) -> Result<()> {
        // Fixed-width timestamp so a prefix scan yields ascending order.
        let key = format!(
            "{}/{}",
            point.holding_id,
            point.timestamp.format("%Y-%m-%dT%H:%M:%S%.9f")
        );
        Self::put_value(&self.positions, &key, &point)
    }

    fn position_history(&self, holding_id: &str) -> Result<Vec<PositionPoint>> {
        let prefix = format!("{holding_id}/");
        let mut points = Vec::new();
        for kv in self.positions.prefix(&prefix) {
            let (_key, bytes) = kv.map_err(store_err)?;
            points.push(decode(&bytes)?);
        }
        Ok(points)
    }

    fn history_for_user(&self, user_id: &str) -> Result<Vec<TotalValuePoint>> {
        let prefix = format!("{user_id}/");
        let mut points = Vec::new();
        for kv in self.history.prefix(&prefix) {
            let (_key, bytes) = kv.map_err(store_err)?;
            points.push(decode(&bytes)?);
        }
        Ok(points)
    }
}
