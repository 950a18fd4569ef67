//! Alert storage.
//!
//! The evaluation engine never mutates alerts directly; it reads the
//! current list and asks the store to record trigger times.

use crate::error::{AlertError, AlertResult};
use parking_lot::{Mutex, RwLock};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tickwatch_core::{Alert, AlertId, Symbol, DEFAULT_COOLDOWN_MS};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Source of the current alert list.
#[cfg_attr(test, mockall::automock)]
pub trait AlertStore: Send + Sync {
    /// Current alerts.
    fn alerts(&self) -> AlertResult<Vec<Alert>>;

    /// Record that an alert fired at `triggered_at_ms` (epoch ms).
    fn update_last_triggered(&self, id: &AlertId, triggered_at_ms: i64) -> AlertResult<()>;
}

/// Alert list management on top of [`AlertStore`].
pub trait AlertCatalog: AlertStore {
    /// Cooldown given to alerts created without one.
    fn default_cooldown_ms(&self) -> i64;

    /// Create an enabled alert with a fresh id.
    fn add_alert_with_cooldown(
        &self,
        symbol: &str,
        target_price: f64,
        cooldown_ms: i64,
    ) -> AlertResult<Alert>;

    /// Delete an alert. Returns the removed alert.
    fn remove_alert(&self, id: &AlertId) -> AlertResult<Alert>;

    fn set_enabled(&self, id: &AlertId, enabled: bool) -> AlertResult<()>;

    fn add_alert(&self, symbol: &str, target_price: f64) -> AlertResult<Alert> {
        self.add_alert_with_cooldown(symbol, target_price, self.default_cooldown_ms())
    }

    /// Distinct symbols with at least one alert, sorted.
    fn symbols(&self) -> AlertResult<Vec<Symbol>> {
        let mut symbols: Vec<Symbol> = self.alerts()?.into_iter().map(|a| a.symbol).collect();
        symbols.sort();
        symbols.dedup();
        Ok(symbols)
    }
}

/// Process-local alert store.
pub struct InMemoryAlertStore {
    alerts: RwLock<Vec<Alert>>,
    default_cooldown_ms: i64,
}

impl InMemoryAlertStore {
    pub fn new() -> Self {
        Self::with_default_cooldown(DEFAULT_COOLDOWN_MS)
    }

    /// Store whose new alerts use `cooldown_ms` unless overridden.
    pub fn with_default_cooldown(cooldown_ms: i64) -> Self {
        Self::from_alerts(Vec::new(), cooldown_ms)
    }

    /// Store holding previously saved alerts.
    pub fn from_alerts(alerts: Vec<Alert>, default_cooldown_ms: i64) -> Self {
        Self {
            alerts: RwLock::new(alerts),
            default_cooldown_ms,
        }
    }

    fn modify(&self, id: &AlertId, f: impl FnOnce(&mut Alert)) -> AlertResult<()> {
        let mut alerts = self.alerts.write();
        let alert = alerts
            .iter_mut()
            .find(|a| a.id == *id)
            .ok_or_else(|| AlertError::NotFound(id.clone()))?;
        f(alert);
        Ok(())
    }
}

impl Default for InMemoryAlertStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertStore for InMemoryAlertStore {
    fn alerts(&self) -> AlertResult<Vec<Alert>> {
        Ok(self.alerts.read().clone())
    }

    fn update_last_triggered(&self, id: &AlertId, triggered_at_ms: i64) -> AlertResult<()> {
        self.modify(id, |alert| alert.last_triggered_at_ms = Some(triggered_at_ms))?;
        debug!(alert_id = %id, triggered_at_ms, "Recorded alert trigger");
        Ok(())
    }
}

impl AlertCatalog for InMemoryAlertStore {
    fn default_cooldown_ms(&self) -> i64 {
        self.default_cooldown_ms
    }

    fn add_alert_with_cooldown(
        &self,
        symbol: &str,
        target_price: f64,
        cooldown_ms: i64,
    ) -> AlertResult<Alert> {
        let symbol = Symbol::new(symbol)?;
        let id = AlertId::new(Uuid::new_v4().to_string());
        let alert = Alert::new(id, symbol, target_price)?.with_cooldown_ms(cooldown_ms);

        info!(
            alert_id = %alert.id,
            symbol = %alert.symbol,
            target_price,
            cooldown_ms,
            "Alert added"
        );
        self.alerts.write().push(alert.clone());
        Ok(alert)
    }

    fn remove_alert(&self, id: &AlertId) -> AlertResult<Alert> {
        let mut alerts = self.alerts.write();
        let index = alerts
            .iter()
            .position(|a| a.id == *id)
            .ok_or_else(|| AlertError::NotFound(id.clone()))?;
        let removed = alerts.remove(index);
        info!(alert_id = %id, symbol = %removed.symbol, "Alert removed");
        Ok(removed)
    }

    fn set_enabled(&self, id: &AlertId, enabled: bool) -> AlertResult<()> {
        self.modify(id, |alert| alert.enabled = enabled)
    }
}

/// Alert store saved as a JSON array.
///
/// The file is read on open and rewritten after every change through a
/// temporary sibling and a rename, so a crash never leaves a partial file.
/// A missing file is an empty store.
pub struct JsonFileAlertStore {
    path: PathBuf,
    alerts: InMemoryAlertStore,
    /// Serializes change-then-save so snapshots land in change order.
    writes: Mutex<()>,
}

impl JsonFileAlertStore {
    pub fn open(path: impl Into<PathBuf>, default_cooldown_ms: i64) -> AlertResult<Self> {
        let path = path.into();
        let alerts: Vec<Alert> = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        info!(path = %path.display(), alerts = alerts.len(), "Alert store loaded");
        Ok(Self {
            path,
            alerts: InMemoryAlertStore::from_alerts(alerts, default_cooldown_ms),
            writes: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> AlertResult<()> {
        let alerts = self.alerts.alerts()?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&alerts)?)?;
        fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), alerts = alerts.len(), "Alert store saved");
        Ok(())
    }
}

impl AlertStore for JsonFileAlertStore {
    fn alerts(&self) -> AlertResult<Vec<Alert>> {
        self.alerts.alerts()
    }

    /// The trigger time is kept in memory even when the file write fails,
    /// so the cooldown still holds for this process.
    fn update_last_triggered(&self, id: &AlertId, triggered_at_ms: i64) -> AlertResult<()> {
        let _writes = self.writes.lock();
        self.alerts.update_last_triggered(id, triggered_at_ms)?;
        if let Err(e) = self.save() {
            warn!(alert_id = %id, error = %e, "Failed to save alert trigger");
        }
        Ok(())
    }
}

impl AlertCatalog for JsonFileAlertStore {
    fn default_cooldown_ms(&self) -> i64 {
        self.alerts.default_cooldown_ms()
    }

    fn add_alert_with_cooldown(
        &self,
        symbol: &str,
        target_price: f64,
        cooldown_ms: i64,
    ) -> AlertResult<Alert> {
        let _writes = self.writes.lock();
        let alert = self
            .alerts
            .add_alert_with_cooldown(symbol, target_price, cooldown_ms)?;
        self.save()?;
        Ok(alert)
    }

    fn remove_alert(&self, id: &AlertId) -> AlertResult<Alert> {
        let _writes = self.writes.lock();
        let removed = self.alerts.remove_alert(id)?;
        self.save()?;
        Ok(removed)
    }

    fn set_enabled(&self, id: &AlertId, enabled: bool) -> AlertResult<()> {
        let _writes = self.writes.lock();
        self.alerts.set_enabled(id, enabled)?;
        self.save()
    }
}
