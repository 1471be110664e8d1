pub mod breakdown;
pub mod cache;
pub mod config;
pub mod convert;
pub mod currency;
pub mod error;
pub mod history;
pub mod ingest;
pub mod log;
pub mod market;
pub mod model;
pub mod valuation;

pub use breakdown::BreakdownService;
pub use config::AppConfig;
pub use convert::CurrencyConverter;
pub use currency::Currency;
pub use error::{EngineError, Result};
pub use history::HistoryRecorder;
pub use ingest::AssetIngestor;
pub use market::MarketDataProvider;
pub use valuation::ValuationEngine;
