//! Price-threshold alerts for the tickwatch stream.
//!
//! Evaluates each quote against user-defined alerts with a per-alert
//! cooldown, records trigger times through the alert store and hands
//! formatted notifications to a notifier. Alerts live in memory or in a
//! JSON file that survives restarts.

pub mod error;
pub mod evaluator;
pub mod monitor;
pub mod notify;
pub mod store;

pub use error::{AlertError, AlertResult};
pub use evaluator::{evaluate, should_trigger};
pub use monitor::AlertMonitor;
pub use notify::{LogNotifier, Notifier, PriceAlertNotification};
pub use store::{AlertCatalog, AlertStore, InMemoryAlertStore, JsonFileAlertStore};
