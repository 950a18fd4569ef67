//! Tick handler joining the stream to the evaluation engine.

use crate::error::AlertResult;
use crate::evaluator::evaluate;
use crate::notify::{Notifier, PriceAlertNotification};
use crate::store::AlertStore;
use std::sync::Arc;
use tickwatch_core::{now_ms, Alert, Quote};
use tickwatch_telemetry::Metrics;
use tickwatch_ws::{HandlerError, HandlerResult, TickListener};
use tracing::{info, warn};

type Clock = Box<dyn Fn() -> i64 + Send + Sync>;

/// Evaluates every quote against the store's current alerts.
///
/// On each trigger the store records the trigger time first, so a failing
/// notifier can not cause the same alert to fire again on the next tick.
pub struct AlertMonitor {
    store: Arc<dyn AlertStore>,
    notifier: Arc<dyn Notifier>,
    clock: Clock,
}

impl AlertMonitor {
    pub fn new(store: Arc<dyn AlertStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            clock: Box::new(now_ms),
        }
    }

    /// Replace the wall clock (epoch ms).
    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Evaluate one quote. Returns how many alerts fired.
    pub fn process(&self, quote: &Quote) -> AlertResult<usize> {
        let alerts = self.store.alerts()?;
        let now = (self.clock)();

        let mut first_error = None;
        let fired = evaluate(&quote.symbol, quote.price, now, &alerts, |alert| {
            if let Err(e) = self.fire(alert, quote.price, now) {
                warn!(alert_id = %alert.id, error = %e, "Failed to handle alert trigger");
                first_error.get_or_insert(e);
            }
        });

        match first_error {
            Some(e) => Err(e),
            None => Ok(fired),
        }
    }

    fn fire(&self, alert: &Alert, price: f64, now: i64) -> AlertResult<()> {
        self.store.update_last_triggered(&alert.id, now)?;
        Metrics::alert_fired(alert.symbol.as_str());

        info!(
            alert_id = %alert.id,
            symbol = %alert.symbol,
            price,
            target_price = alert.target_price,
            "Alert triggered"
        );

        let notification = PriceAlertNotification::new(&alert.symbol, price, alert.target_price);
        self.notifier.notify(&notification)
    }
}

impl TickListener for AlertMonitor {
    fn on_tick(&self, quote: &Quote) -> HandlerResult {
        self.process(quote).map(|_| ()).map_err(HandlerError::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AlertError;
    use crate::notify::{LogNotifier, MockNotifier};
    use crate::store::{AlertCatalog, InMemoryAlertStore, MockAlertStore};
    use std::sync::atomic::{AtomicI64, Ordering};
    use tickwatch_core::{AlertId, Symbol};

    const T: i64 = 1_700_000_000_000;

    fn quote(symbol: &str, price: f64) -> Quote {
        Quote {
            symbol: Symbol::new(symbol).unwrap(),
            price,
            change_percent: Some(0.0),
            observed_at_ms: T,
        }
    }

    fn alert(id: &str, symbol: &str, target: f64) -> Alert {
        Alert::new(AlertId::new(id), Symbol::new(symbol).unwrap(), target).unwrap()
    }

    #[test]
    fn test_trigger_updates_store_then_notifies() {
        let mut store = MockAlertStore::new();
        store
            .expect_alerts()
            .returning(|| Ok(vec![alert("a", "AAPL", 150.0), alert("b", "MSFT", 1.0)]));
        store
            .expect_update_last_triggered()
            .withf(|id, ts| id.as_str() == "a" && *ts == T)
            .times(1)
            .returning(|_, _| Ok(()));

        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|n| n.title == "AAPL Alert Triggered!" && n.current_price == 155.0)
            .times(1)
            .returning(|_| Ok(()));

        let monitor = AlertMonitor::new(Arc::new(store), Arc::new(notifier)).with_clock(|| T);
        assert_eq!(monitor.process(&quote("AAPL", 155.0)).unwrap(), 1);
    }

    #[test]
    fn test_store_failure_skips_notification() {
        let mut store = MockAlertStore::new();
        store
            .expect_alerts()
            .returning(|| Ok(vec![alert("a", "AAPL", 150.0)]));
        store
            .expect_update_last_triggered()
            .returning(|_, _| Err(AlertError::StoreUnavailable("disk full".to_string())));

        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(0);

        let monitor = AlertMonitor::new(Arc::new(store), Arc::new(notifier)).with_clock(|| T);
        assert!(monitor.on_tick(&quote("AAPL", 155.0)).is_err());
    }

    #[test]
    fn test_unreadable_store_is_handler_error() {
        let mut store = MockAlertStore::new();
        store
            .expect_alerts()
            .returning(|| Err(AlertError::StoreUnavailable("offline".to_string())));
        let monitor = AlertMonitor::new(Arc::new(store), Arc::new(MockNotifier::new()));

        let err = monitor.on_tick(&quote("AAPL", 1.0)).unwrap_err();
        assert!(err.to_string().contains("offline"));
    }

    #[test]
    fn test_cooldown_across_ticks_with_in_memory_store() {
        let store = Arc::new(InMemoryAlertStore::new());
        let created = store.add_alert("AAPL", 150.0).unwrap();

        let now = Arc::new(AtomicI64::new(T));
        let clock = now.clone();
        let monitor = AlertMonitor::new(store.clone(), Arc::new(LogNotifier))
            .with_clock(move || clock.load(Ordering::SeqCst));

        let fired_at = |ts: i64, price: f64| {
            now.store(ts, Ordering::SeqCst);
            monitor.process(&quote("AAPL", price)).unwrap()
        };

        assert_eq!(fired_at(T, 151.0), 1);
        assert_eq!(store.alerts().unwrap()[0].last_triggered_at_ms, Some(T));

        assert_eq!(fired_at(T + 30_000, 151.0), 0);
        assert_eq!(fired_at(T + 60_001, 140.0), 0);
        assert_eq!(fired_at(T + 60_001, 151.0), 1);
        assert_eq!(fired_at(T + 60_002, 151.0), 0);

        store.set_enabled(&created.id, false).unwrap();
        assert_eq!(fired_at(T + 1_000_000, 151.0), 0);
    }
}
