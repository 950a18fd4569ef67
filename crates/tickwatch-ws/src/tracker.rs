//! Per-symbol previous-price tracking.

use dashmap::DashMap;
use tickwatch_core::{Quote, Symbol, Trade};

/// Turns trades into quotes by remembering the last price per symbol.
///
/// Lives as long as the manager, so the change of the first tick after a
/// reconnect is still measured against the tick before the drop.
#[derive(Debug, Default)]
pub struct QuoteTracker {
    last_prices: DashMap<Symbol, f64>,
}

impl QuoteTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a trade and build its quote.
    pub fn observe(&self, trade: &Trade) -> Quote {
        let previous = self.last_prices.insert(trade.symbol.clone(), trade.price);
        Quote::from_trade(trade, previous)
    }
}
