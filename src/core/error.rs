//! Engine error taxonomy

use crate::core::currency::Currency;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The market data provider could not be reached or returned no usable
    /// data. Callers treat the affected item as "no data", never as zero.
    #[error("market data provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// No exchange rate could be obtained for the pair. The affected value
    /// is unknown and must be excluded from sums, not zero-filled.
    #[error("no exchange rate available from {from} to {to}")]
    ConversionUnavailable { from: Currency, to: Currency },

    /// A currency code outside the supported set was supplied.
    #[error("unsupported currency code: {0}")]
    UnsupportedCurrency(String),

    /// A position or ratio outside its valid range was supplied.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("store operation failed: {0}")]
    Store(String),

    #[error("{0} not found")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
