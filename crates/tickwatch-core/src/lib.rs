//! Core domain types for the tickwatch price stream.
//!
//! This crate provides the types shared by the stream and alert crates:
//! - `Symbol`: Case-normalized instrument identifier
//! - `Trade`: One raw observation from the market-data stream
//! - `Quote`: A trade enriched with the change since the previous tick
//! - `Alert`: A user-defined price threshold with cooldown state

pub mod alert;
pub mod error;
pub mod quote;
pub mod symbol;

pub use alert::{Alert, AlertId, DEFAULT_COOLDOWN_MS};
pub use error::{CoreError, Result};
pub use quote::{Quote, Trade};
pub use symbol::Symbol;

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
