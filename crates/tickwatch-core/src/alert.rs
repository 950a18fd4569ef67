//! Price alert definition.
//!
//! An alert is owned by the caller's store. The evaluation engine reads it
//! and asks the store to record `last_triggered_at_ms` when it fires.

use crate::error::{CoreError, Result};
use crate::Symbol;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default minimum time between two triggers of the same alert.
pub const DEFAULT_COOLDOWN_MS: i64 = 60_000;

/// Unique alert identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertId(pub String);

impl AlertId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Upward price-threshold alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub symbol: Symbol,
    /// Fires while the price is strictly above this value.
    pub target_price: f64,
    pub enabled: bool,
    /// Epoch milliseconds of the last trigger, if any.
    #[serde(default)]
    pub last_triggered_at_ms: Option<i64>,
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: i64,
}

fn default_cooldown_ms() -> i64 {
    DEFAULT_COOLDOWN_MS
}

impl Alert {
    /// Create an enabled alert with the default cooldown.
    ///
    /// Returns an error if `target_price` is not a positive finite number.
    pub fn new(id: AlertId, symbol: Symbol, target_price: f64) -> Result<Self> {
        if !target_price.is_finite() || target_price <= 0.0 {
            return Err(CoreError::InvalidTargetPrice(target_price));
        }
        Ok(Self {
            id,
            symbol,
            target_price,
            enabled: true,
            last_triggered_at_ms: None,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
        })
    }

    /// Set the cooldown window.
    pub fn with_cooldown_ms(mut self, cooldown_ms: i64) -> Self {
        self.cooldown_ms = cooldown_ms;
        self
    }

    /// Milliseconds since the last trigger (an alert that never fired
    /// counts from the epoch).
    pub fn elapsed_since_trigger_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.last_triggered_at_ms.unwrap_or(0))
    }
}
