//! Prometheus metrics for tickwatch.
//!
//! Provides observability for:
//! - Stream connection state and reconnects
//! - Tick throughput and malformed frames
//! - Listener failures
//! - Fired alerts
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration fails,
//! it indicates a fatal configuration error (e.g., duplicate metric names)
//! that should cause an immediate crash at startup rather than silent failure.
//! These panics only occur during static initialization, never at runtime.

use crate::error::{TelemetryError, TelemetryResult};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_int_counter, CounterVec, Encoder, Gauge,
    IntCounter, TextEncoder,
};

/// WebSocket connection state (1 = connected, 0 = disconnected).
pub static WS_CONNECTED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "tickwatch_ws_connected",
        "WebSocket connection state (1=connected)"
    )
    .unwrap()
});

/// Total WebSocket reconnection attempts.
pub static WS_RECONNECT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tickwatch_ws_reconnect_total",
        "Total WebSocket reconnection attempts",
        &["reason"]
    )
    .unwrap()
});

/// Frames written to the socket.
pub static WS_FRAMES_SENT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tickwatch_ws_frames_sent_total",
        "Total frames written to the WebSocket",
        &["kind"]
    )
    .unwrap()
});

/// Trades received per symbol.
pub static TICKS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tickwatch_ticks_total",
        "Total trades received from the stream",
        &["symbol"]
    )
    .unwrap()
});

/// Frames dropped because they could not be decoded.
pub static DECODE_ERRORS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tickwatch_decode_errors_total",
        "Total malformed frames dropped"
    )
    .unwrap()
});

/// Listener errors and panics caught at the dispatch boundary.
/// Labels: kind (tick/state)
pub static HANDLER_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tickwatch_handler_failures_total",
        "Total listener failures caught during fan-out",
        &["kind"]
    )
    .unwrap()
});

/// Alerts fired per symbol.
pub static ALERTS_FIRED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tickwatch_alerts_fired_total",
        "Total price alerts fired",
        &["symbol"]
    )
    .unwrap()
});

/// Metrics helper for recording values.
pub struct Metrics;

impl Metrics {
    /// Record WebSocket connected.
    pub fn ws_connected() {
        WS_CONNECTED.set(1.0);
    }

    /// Record WebSocket disconnected.
    pub fn ws_disconnected() {
        WS_CONNECTED.set(0.0);
    }

    /// Record WebSocket reconnection.
    pub fn ws_reconnect(reason: &str) {
        WS_RECONNECT_TOTAL.with_label_values(&[reason]).inc();
    }

    /// Record a frame written to the socket.
    pub fn ws_frame_sent(kind: &str) {
        WS_FRAMES_SENT_TOTAL.with_label_values(&[kind]).inc();
    }

    /// Record a trade received.
    pub fn tick_received(symbol: &str) {
        TICKS_TOTAL.with_label_values(&[symbol]).inc();
    }

    /// Record a malformed frame.
    pub fn decode_error() {
        DECODE_ERRORS_TOTAL.inc();
    }

    /// Record a listener failure.
    pub fn handler_failure(kind: &str) {
        HANDLER_FAILURES_TOTAL.with_label_values(&[kind]).inc();
    }

    /// Record a fired alert.
    pub fn alert_fired(symbol: &str) {
        ALERTS_FIRED_TOTAL.with_label_values(&[symbol]).inc();
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&prometheus::gather(), &mut buffer)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}
