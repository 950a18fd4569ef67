//! Trigger notifications.
//!
//! Presentation is outside this crate; a `Notifier` receives a formatted
//! notification and delivers it however the host sees fit.

use crate::error::AlertResult;
use serde::Serialize;
use tickwatch_core::Symbol;
use tracing::info;

/// Formatted price-alert notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceAlertNotification {
    pub symbol: Symbol,
    /// Symbol without its `EXCHANGE:` prefix.
    pub display_symbol: String,
    pub current_price: f64,
    pub target_price: f64,
    /// Distance above target, in percent of target.
    pub percent_above_target: f64,
    pub title: String,
    pub body: String,
}

impl PriceAlertNotification {
    pub fn new(symbol: &Symbol, current_price: f64, target_price: f64) -> Self {
        let display_symbol = symbol.display_name().to_string();
        let percent_above_target = if target_price > 0.0 {
            (current_price - target_price) / target_price * 100.0
        } else {
            0.0
        };

        let title = format!("{display_symbol} Alert Triggered!");
        let body = format!(
            "{display_symbol} reached ${current_price:.2} (target: ${target_price:.2}) (+{percent_above_target:.1}%)"
        );

        Self {
            symbol: symbol.clone(),
            display_symbol,
            current_price,
            target_price,
            percent_above_target,
            title,
            body,
        }
    }
}

/// Delivers trigger notifications.
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &PriceAlertNotification) -> AlertResult<()>;
}

/// Notifier that writes each notification to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &PriceAlertNotification) -> AlertResult<()> {
        info!(
            symbol = %notification.symbol,
            current_price = notification.current_price,
            target_price = notification.target_price,
            title = %notification.title,
            "{}",
            notification.body
        );
        Ok(())
    }
}
