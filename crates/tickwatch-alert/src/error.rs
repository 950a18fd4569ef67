//! Alert error types.

use thiserror::Error;
use tickwatch_core::{AlertId, CoreError};

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Alert not found: {0}")]
    NotFound(AlertId),

    #[error("Invalid alert: {0}")]
    Invalid(#[from] CoreError),

    #[error("Alert store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Alert file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Alert file JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type AlertResult<T> = Result<T, AlertError>;
