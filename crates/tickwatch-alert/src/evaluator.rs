//! Alert evaluation.
//!
//! Strategy: fire while the price is strictly above target, at most once per
//! cooldown window per alert.
//! - `price > target_price`
//! - `now - (last_triggered_at or 0) > cooldown`
//!
//! This is debouncing, not edge detection: an alert keeps re-firing every
//! cooldown window for as long as the price stays above target. The cooldown
//! clock lives in `Alert::last_triggered_at_ms`, owned by the caller, so
//! evaluation holds no state of its own.

use tickwatch_core::{Alert, Symbol};

/// Whether `alert` fires for a tick at `price` observed at `now_ms`.
///
/// Ignores the symbol; see [`evaluate`].
pub fn should_trigger(alert: &Alert, price: f64, now_ms: i64) -> bool {
    alert.enabled
        && price > alert.target_price
        && alert.elapsed_since_trigger_ms(now_ms) > alert.cooldown_ms
}

/// Evaluate one tick against `alerts`.
///
/// Calls `on_trigger` once for each enabled alert on `symbol` that fires,
/// in slice order, and returns how many fired. The caller is expected to
/// record the trigger time so the next call sees the cooldown.
pub fn evaluate<F>(
    symbol: &Symbol,
    price: f64,
    now_ms: i64,
    alerts: &[Alert],
    mut on_trigger: F,
) -> usize
where
    F: FnMut(&Alert),
{
    let mut fired = 0;
    for alert in alerts
        .iter()
        .filter(|a| a.symbol == *symbol && should_trigger(a, price, now_ms))
    {
        on_trigger(alert);
        fired += 1;
    }
    fired
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickwatch_core::{AlertId, DEFAULT_COOLDOWN_MS};

    const T: i64 = 1_700_000_000_000;

    fn sym(s: &str) -> Symbol {
        Symbol::new(s).unwrap()
    }

    fn alert(id: &str, symbol: &str, target: f64) -> Alert {
        Alert::new(AlertId::new(id), sym(symbol), target).unwrap()
    }

    fn fired_ids(symbol: &str, price: f64, now: i64, alerts: &[Alert]) -> Vec<String> {
        let mut ids = Vec::new();
        evaluate(&sym(symbol), price, now, alerts, |a| ids.push(a.id.to_string()));
        ids
    }

    #[test]
    fn test_fires_only_above_target() {
        let alerts = vec![alert("a", "AAPL", 150.0)];
        assert!(fired_ids("AAPL", 149.99, T, &alerts).is_empty());
        assert!(fired_ids("AAPL", 150.0, T, &alerts).is_empty());
        assert_eq!(fired_ids("AAPL", 150.01, T, &alerts), vec!["a"]);
    }

    #[test]
    fn test_cooldown_sequence() {
        let mut alerts = vec![alert("a", "AAPL", 150.0)];
        assert_eq!(alerts[0].cooldown_ms, DEFAULT_COOLDOWN_MS);

        // Never fired: elapsed counts from the epoch.
        assert_eq!(fired_ids("AAPL", 151.0, T, &alerts), vec!["a"]);

        // Caller did not thread the update back: fires again.
        assert_eq!(fired_ids("AAPL", 151.0, T + 30_000, &alerts), vec!["a"]);

        alerts[0].last_triggered_at_ms = Some(T);
        assert!(fired_ids("AAPL", 151.0, T + 30_000, &alerts).is_empty());
        // Exactly the cooldown is not enough; the comparison is strict.
        assert!(fired_ids("AAPL", 151.0, T + 60_000, &alerts).is_empty());
        assert_eq!(fired_ids("AAPL", 151.0, T + 60_001, &alerts), vec!["a"]);
    }

    #[test]
    fn test_disabled_never_fires() {
        let mut alerts = vec![alert("a", "AAPL", 150.0)];
        alerts[0].enabled = false;
        assert!(fired_ids("AAPL", 1_000.0, T, &alerts).is_empty());
        assert!(fired_ids("AAPL", 1_000.0, T + 10 * DEFAULT_COOLDOWN_MS, &alerts).is_empty());
    }

    #[test]
    fn test_scoped_to_symbol_after_normalization() {
        let alerts = vec![alert("a", "aapl", 150.0), alert("m", "MSFT", 100.0)];
        assert_eq!(fired_ids("AAPL", 200.0, T, &alerts), vec!["a"]);
        assert_eq!(fired_ids("msft", 200.0, T, &alerts), vec!["m"]);
        assert!(fired_ids("TSLA", 200.0, T, &alerts).is_empty());
    }

    #[test]
    fn test_each_matching_alert_fires_once() {
        let alerts = vec![
            alert("low", "AAPL", 100.0),
            alert("high", "AAPL", 200.0),
            alert("mid", "AAPL", 150.0).with_cooldown_ms(0),
        ];
        assert_eq!(fired_ids("AAPL", 175.0, T, &alerts), vec!["low", "mid"]);
    }

    #[test]
    fn test_zero_cooldown_fires_on_every_later_tick() {
        let mut alerts = vec![alert("a", "AAPL", 10.0).with_cooldown_ms(0)];
        alerts[0].last_triggered_at_ms = Some(T);
        assert!(fired_ids("AAPL", 11.0, T, &alerts).is_empty());
        assert_eq!(fired_ids("AAPL", 11.0, T + 1, &alerts), vec!["a"]);
    }
}
