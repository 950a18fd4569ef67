//! WebSocket error types.
//!
//! Transport failures (`ConnectionFailed`, `ConnectionClosed`, timeouts,
//! `Tungstenite`) are recovered by the session's reconnect loop and only
//! surface to callers as connection-state transitions. Decode failures are
//! logged and the frame is dropped.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WsError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed: code={code}, reason={reason}")]
    ConnectionClosed { code: u16, reason: String },

    #[error("Connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("Idle timeout: no frame received for {0} ms")]
    IdleTimeout(u64),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid symbol: {0}")]
    Symbol(#[from] tickwatch_core::CoreError),

    #[error("Tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WsError {
    /// Whether this error is a socket-level failure handled by reconnecting.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_)
                | Self::ConnectionClosed { .. }
                | Self::ConnectTimeout(_)
                | Self::IdleTimeout(_)
                | Self::Tungstenite(_)
        )
    }

    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::ConnectionFailed(_) => "connect_failed",
            Self::ConnectionClosed { .. } => "closed",
            Self::ConnectTimeout(_) => "connect_timeout",
            Self::IdleTimeout(_) => "idle_timeout",
            Self::Decode(_) | Self::Json(_) => "decode",
            Self::Config(_) | Self::Symbol(_) => "config",
            Self::Tungstenite(_) => "transport",
        }
    }
}

pub type WsResult<T> = Result<T, WsError>;

/// Failure reported by a tick or state listener.
///
/// Caught at the dispatch boundary and logged; it never reaches the
/// connection or sibling listeners.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HandlerError(String);

impl HandlerError {
    pub fn new(message: impl std::fmt::Display) -> Self {
        Self(message.to_string())
    }
}

pub type HandlerResult = Result<(), HandlerError>;
