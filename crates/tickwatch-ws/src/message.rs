//! WebSocket message types.
//!
//! Inbound frames are JSON objects discriminated by `type`:
//! - `{"type":"trade","data":[{"s":"AAPL","p":151.2,"t":1700000000000,"v":100}]}`
//! - `{"type":"ping"}`
//! - `{"type":"error","msg":"..."}`
//!
//! Outbound frames are subscribe/unsubscribe requests and `pong` replies.

use crate::error::{WsError, WsResult};
use serde::{Deserialize, Serialize};
use tickwatch_core::{Symbol, Trade};

// ============================================================================
// Outbound
// ============================================================================

/// Frame sent to the market-data endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundFrame {
    Subscribe { symbol: Symbol },
    Unsubscribe { symbol: Symbol },
    Pong,
}

impl OutboundFrame {
    /// Encode as a JSON text frame.
    pub fn to_json(&self) -> WsResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Short label for logging and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Subscribe { .. } => "subscribe",
            Self::Unsubscribe { .. } => "unsubscribe",
            Self::Pong => "pong",
        }
    }
}

// ============================================================================
// Inbound
// ============================================================================

/// Single trade entry as sent on the wire.
#[derive(Debug, Clone, Deserialize)]
struct RawTrade {
    /// Symbol.
    s: String,
    /// Last price.
    p: f64,
    /// Timestamp (epoch ms).
    t: i64,
    /// Volume.
    #[serde(default)]
    v: Option<f64>,
    /// Trade conditions.
    #[serde(default)]
    c: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawTradeBatch {
    data: Vec<RawTrade>,
}

#[derive(Debug, Deserialize)]
struct RawErrorFrame {
    #[serde(default)]
    msg: Option<String>,
}

/// Decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Trade batch split into per-symbol observations, in wire order.
    Trades(Vec<Trade>),
    /// Application-level keep-alive; must be answered with `pong`.
    Ping,
    Pong,
    /// Error reported by the endpoint (e.g., unknown symbol).
    Error { message: String },
    /// Any other `type`; dropped by the connection.
    Unknown(String),
}

impl InboundFrame {
    pub fn kind(&self) -> &str {
        match self {
            Self::Trades(_) => "trade",
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Error { .. } => "error",
            Self::Unknown(kind) => kind,
        }
    }
}

/// Decode a JSON text frame.
///
/// Returns `WsError::Decode`/`WsError::Json` for malformed frames; the
/// caller drops them.
pub fn decode_frame(text: &str) -> WsResult<InboundFrame> {
    let value: serde_json::Value = serde_json::from_str(text)?;

    let kind = value
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| WsError::Decode("missing \"type\" field".to_string()))?;

    match kind {
        "trade" => {
            let batch: RawTradeBatch = serde_json::from_value(value)?;
            let trades = batch
                .data
                .into_iter()
                .map(into_trade)
                .collect::<WsResult<Vec<_>>>()?;
            Ok(InboundFrame::Trades(trades))
        }
        "ping" => Ok(InboundFrame::Ping),
        "pong" => Ok(InboundFrame::Pong),
        "error" => {
            let frame: RawErrorFrame = serde_json::from_value(value)?;
            Ok(InboundFrame::Error {
                message: frame.msg.unwrap_or_default(),
            })
        }
        other => Ok(InboundFrame::Unknown(other.to_string())),
    }
}

fn into_trade(raw: RawTrade) -> WsResult<Trade> {
    if !raw.p.is_finite() {
        return Err(WsError::Decode(format!("non-finite price for {}", raw.s)));
    }
    Ok(Trade {
        symbol: Symbol::new(&raw.s).map_err(|e| WsError::Decode(e.to_string()))?,
        price: raw.p,
        timestamp_ms: raw.t,
        volume: raw.v,
        conditions: raw.c.unwrap_or_default(),
    })
}
