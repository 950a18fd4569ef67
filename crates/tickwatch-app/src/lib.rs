//! tickwatch price-alert service.
//!
//! Wires the components together:
//! - Shared market-data stream
//! - Alert monitor driven by the alert store
//! - Latest-quote book
//! - Connection-state logging

pub mod app;
pub mod config;
pub mod error;
pub mod quote_book;

pub use app::{Application, RunningApp};
pub use config::{AlertRule, AlertsConfig, AppConfig, StreamConfig};
pub use error::{AppError, AppResult};
pub use quote_book::QuoteBook;
