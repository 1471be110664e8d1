pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::breakdown::BreakdownService;
use crate::core::config::AppConfig;
use crate::core::convert::CurrencyConverter;
use crate::core::currency::Currency;
use crate::core::history::HistoryRecorder;
use crate::core::ingest::AssetIngestor;
use crate::core::market::MarketDataProvider;
use crate::core::model::{Portfolio, User};
use crate::core::valuation::ValuationEngine;
use crate::providers::YahooProvider;
use crate::store::{DiskStore, PortfolioStore};
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub enum AppCommand {
    Summary,
    Snapshot,
    Breakdown,
    History,
    RefreshAssets,
    Add {
        portfolio: String,
        symbol: String,
        quantity: Decimal,
        currency: Option<Currency>,
    },
    Set {
        portfolio: String,
        symbol: String,
        position: Option<Decimal>,
        target_ratio: Option<Decimal>,
    },
    Remove {
        portfolio: String,
        symbol: String,
    },
    Search {
        query: String,
        limit: usize,
    },
}

struct App {
    store: Arc<dyn PortfolioStore>,
    converter: Arc<CurrencyConverter>,
    engine: Arc<ValuationEngine>,
    recorder: HistoryRecorder,
    breakdowns: BreakdownService,
    ingestor: AssetIngestor,
    user: User,
}

impl App {
    fn build(config: &AppConfig) -> Result<Self> {
        let data_path = config.data_path()?;
        let store: Arc<dyn PortfolioStore> = Arc::new(DiskStore::open(&data_path)?);

        let yahoo = config.providers.yahoo.as_ref();
        let base_url = yahoo.map_or(providers::yahoo::DEFAULT_BASE_URL, |p| &p.base_url);
        let timeout = yahoo.and_then(|p| p.timeout_secs);
        let provider: Arc<dyn MarketDataProvider> = Arc::new(YahooProvider::new(base_url, timeout)?);

        let converter = Arc::new(CurrencyConverter::with_ttl(
            Arc::clone(&provider),
            Duration::from_secs(config.cache.rate_ttl_secs),
        ));
        let engine = Arc::new(ValuationEngine::with_ttl(
            Arc::clone(&store),
            Arc::clone(&converter),
            Duration::from_secs(config.cache.valuation_ttl_secs),
        ));
        let recorder = HistoryRecorder::new(Arc::clone(&store), Arc::clone(&engine));
        let breakdowns = BreakdownService::new(Arc::clone(&store), Arc::clone(&converter));
        let ingestor = AssetIngestor::new(Arc::clone(&store), Arc::clone(&provider));

        let user = find_or_create_user(&store, &config.user, config.currency)?;

        Ok(App {
            store,
            converter,
            engine,
            recorder,
            breakdowns,
            ingestor,
            user,
        })
    }

    /// Refreshes quotes for every stored asset, fail-soft, with a progress
    /// bar. Stale rows are better than no summary when the provider is
    /// flaky.
    async fn refresh_assets_with_progress(&self) -> Result<(usize, usize)> {
        // Quotes and rates age together; a manual refresh should not mix
        // fresh prices with hour-old exchange rates.
        self.converter.clear_cache().await;
        let assets = self.store.list_assets()?;
        let pb = cli::ui::new_progress_bar(assets.len() as u64, true);
        pb.set_message("Fetching prices...");

        let mut updated = 0;
        let mut failed = 0;
        for asset in &assets {
            match self.ingestor.create_or_refresh_asset(&asset.symbol).await {
                Ok(_) => updated += 1,
                Err(e) => {
                    debug!(symbol = %asset.symbol, "Refresh failed: {e}");
                    failed += 1;
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();
        Ok((updated, failed))
    }
}

fn find_or_create_user(
    store: &Arc<dyn PortfolioStore>,
    name: &str,
    currency: Currency,
) -> Result<User> {
    if let Some(user) = store.list_users()?.into_iter().find(|u| u.name == name) {
        return Ok(user);
    }
    info!(name, "Creating user");
    Ok(store.create_user(User::new(name, currency))?)
}

fn find_or_create_portfolio(
    store: &Arc<dyn PortfolioStore>,
    user: &User,
    name: &str,
    currency: Option<Currency>,
) -> Result<Portfolio> {
    if let Some(portfolio) = store
        .portfolios_for_user(&user.id)?
        .into_iter()
        .find(|p| p.name == name)
    {
        return Ok(portfolio);
    }
    let currency = currency.unwrap_or(user.default_currency);
    info!(name, %currency, "Creating portfolio");
    Ok(store.create_portfolio(Portfolio::new(&user.id, name, currency))?)
}

/// Looks up an existing holding by portfolio and symbol. Unlike `add`,
/// edits never create anything implicitly.
fn find_holding(
    store: &Arc<dyn PortfolioStore>,
    user: &User,
    portfolio_name: &str,
    symbol: &str,
) -> Result<core::model::Holding> {
    let portfolio = store
        .portfolios_for_user(&user.id)?
        .into_iter()
        .find(|p| p.name == portfolio_name)
        .with_context(|| format!("No portfolio named \"{portfolio_name}\""))?;
    let row = store
        .holdings_for_portfolio(&portfolio.id)?
        .into_iter()
        .find(|r| r.holding.symbol == symbol)
        .with_context(|| format!("No {symbol} holding in \"{portfolio_name}\""))?;
    Ok(row.holding)
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let app = App::build(&config).context("Failed to initialize application")?;

    match command {
        AppCommand::Summary => {
            app.refresh_assets_with_progress().await?;
            cli::summary::run(&app.store, &app.engine, &app.user.id).await
        }
        AppCommand::Snapshot => {
            let point = app.recorder.record_today(&app.user.id).await?;
            println!(
                "Recorded total value for {}: {:.2} {}",
                point.date,
                point.total_value.round_dp(2),
                app.user.default_currency
            );
            Ok(())
        }
        AppCommand::Breakdown => cli::breakdown::run(&app.breakdowns, &app.user.id).await,
        AppCommand::History => cli::history::run(&app.recorder, &app.user.id).await,
        AppCommand::RefreshAssets => {
            let (updated, failed) = app.refresh_assets_with_progress().await?;
            println!("Assets refreshed: {updated} updated, {failed} failed");
            Ok(())
        }
        AppCommand::Add {
            portfolio,
            symbol,
            quantity,
            currency,
        } => {
            let portfolio = find_or_create_portfolio(&app.store, &app.user, &portfolio, currency)?;
            let holding = app
                .ingestor
                .add_to_portfolio(&portfolio.id, &symbol, quantity)
                .await?;
            println!(
                "Added {} {} to {} (position now {})",
                quantity, holding.symbol, portfolio.name, holding.position
            );
            Ok(())
        }
        AppCommand::Set {
            portfolio,
            symbol,
            position,
            target_ratio,
        } => {
            let mut holding = find_holding(&app.store, &app.user, &portfolio, &symbol)?;
            if position.is_none() && target_ratio.is_none() {
                anyhow::bail!("Nothing to change; pass a position and/or --target-ratio");
            }
            if let Some(position) = position {
                holding = app.ingestor.set_position(&holding.id, position)?;
            }
            if let Some(ratio) = target_ratio {
                holding = app.store.set_target_ratio(&holding.id, Some(ratio))?;
            }
            match holding.target_ratio {
                Some(ratio) => println!(
                    "{} in {}: position {}, target {}%",
                    holding.symbol, portfolio, holding.position, ratio
                ),
                None => println!(
                    "{} in {}: position {}",
                    holding.symbol, portfolio, holding.position
                ),
            }
            Ok(())
        }
        AppCommand::Remove { portfolio, symbol } => {
            let holding = find_holding(&app.store, &app.user, &portfolio, &symbol)?;
            app.store.remove_holding(&holding.id)?;
            println!("Removed {} from {}", holding.symbol, portfolio);
            Ok(())
        }
        AppCommand::Search { query, limit } => {
            let matches = app.ingestor.search(&query, limit).await?;
            if matches.is_empty() {
                println!("No matches for \"{query}\"");
                return Ok(());
            }
            let mut table = cli::ui::new_styled_table();
            table.set_header(vec![
                cli::ui::header_cell("Symbol"),
                cli::ui::header_cell("Name"),
                cli::ui::header_cell("Exchange"),
                cli::ui::header_cell("Type"),
            ]);
            for m in &matches {
                table.add_row(vec![
                    m.symbol.clone(),
                    m.name.clone(),
                    m.exchange.clone().unwrap_or_default(),
                    m.asset_type.clone().unwrap_or_default(),
                ]);
            }
            println!("{table}");
            Ok(())
        }
    }
}
