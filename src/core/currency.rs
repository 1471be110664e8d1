//! Supported currency codes

use crate::core::error::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// A currency code from the fixed supported set.
///
/// Amounts are only ever converted between these codes; anything else is
/// rejected at the parse boundary instead of being passed to the market
/// data provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Cny,
    Nzd,
    Eur,
    Gbp,
    Jpy,
    Aud,
    Cad,
    Chf,
    Inr,
    Sgd,
    Hkd,
    Krw,
    Mxn,
}

impl Currency {
    pub const ALL: [Currency; 14] = [
        Currency::Usd,
        Currency::Cny,
        Currency::Nzd,
        Currency::Eur,
        Currency::Gbp,
        Currency::Jpy,
        Currency::Aud,
        Currency::Cad,
        Currency::Chf,
        Currency::Inr,
        Currency::Sgd,
        Currency::Hkd,
        Currency::Krw,
        Currency::Mxn,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Cny => "CNY",
            Currency::Nzd => "NZD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Jpy => "JPY",
            Currency::Aud => "AUD",
            Currency::Cad => "CAD",
            Currency::Chf => "CHF",
            Currency::Inr => "INR",
            Currency::Sgd => "SGD",
            Currency::Hkd => "HKD",
            Currency::Krw => "KRW",
            Currency::Mxn => "MXN",
        }
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Currency {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "CNY" => Ok(Currency::Cny),
            "NZD" => Ok(Currency::Nzd),
            "EUR" => Ok(Currency::Eur),
            "GBP" => Ok(Currency::Gbp),
            "JPY" => Ok(Currency::Jpy),
            "AUD" => Ok(Currency::Aud),
            "CAD" => Ok(Currency::Cad),
            "CHF" => Ok(Currency::Chf),
            "INR" => Ok(Currency::Inr),
            "SGD" => Ok(Currency::Sgd),
            "HKD" => Ok(Currency::Hkd),
            "KRW" => Ok(Currency::Krw),
            "MXN" => Ok(Currency::Mxn),
            _ => Err(EngineError::UnsupportedCurrency(s.to_string())),
        }
    }
}
