//! Trade observations and derived quotes.

use crate::Symbol;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One per-symbol observation split out of a trade batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: Symbol,
    pub price: f64,
    /// Exchange timestamp (epoch milliseconds).
    pub timestamp_ms: i64,
    pub volume: Option<f64>,
    /// Trade condition codes, when the venue reports them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<String>,
}

/// Latest observed price for a symbol.
///
/// `change_percent` is measured against the previous tick this process
/// saw for the symbol, not against a market close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: Symbol,
    pub price: f64,
    pub change_percent: Option<f64>,
    /// Observation timestamp (epoch milliseconds).
    pub observed_at_ms: i64,
}

impl Quote {
    /// Build a quote from a trade and the previously observed price.
    pub fn from_trade(trade: &Trade, previous_price: Option<f64>) -> Self {
        Self {
            symbol: trade.symbol.clone(),
            price: trade.price,
            change_percent: Some(change_percent(trade.price, previous_price)),
            observed_at_ms: trade.timestamp_ms,
        }
    }

    /// Observation time as a UTC datetime.
    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.observed_at_ms)
    }
}

/// Percent change from `previous` to `price`.
///
/// Returns 0 for the first tick of a symbol and when the previous price
/// is not positive.
pub fn change_percent(price: f64, previous: Option<f64>) -> f64 {
    match previous {
        Some(prev) if prev > 0.0 => (price - prev) / prev * 100.0,
        _ => 0.0,
    }
}
