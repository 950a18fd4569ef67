//! Error types for tickwatch-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid symbol: {0:?}")]
    InvalidSymbol(String),

    #[error("Invalid target price: {0}")]
    InvalidTargetPrice(f64),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
