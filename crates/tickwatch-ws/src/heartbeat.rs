//! Connection liveness tracking.
//!
//! The endpoint sends application-level `ping` frames and streams trades;
//! a connection that delivers nothing for `idle_timeout_ms` is considered
//! dead and reopened.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::time::Duration;
use tracing::debug;

/// Liveness monitor for one connection.
pub struct HeartbeatMonitor {
    /// Idle timeout (0 = disabled).
    idle_timeout_ms: u64,
    /// Last frame received time (any frame).
    last_frame: RwLock<DateTime<Utc>>,
    /// Last server ping received time.
    last_ping: RwLock<Option<DateTime<Utc>>>,
    /// Pings answered on this connection.
    pongs_sent: RwLock<u64>,
}

impl HeartbeatMonitor {
    pub fn new(idle_timeout_ms: u64) -> Self {
        Self {
            idle_timeout_ms,
            last_frame: RwLock::new(Utc::now()),
            last_ping: RwLock::new(None),
            pongs_sent: RwLock::new(0),
        }
    }

    /// Whether idle detection is active.
    pub fn is_enabled(&self) -> bool {
        self.idle_timeout_ms > 0
    }

    pub fn idle_timeout_ms(&self) -> u64 {
        self.idle_timeout_ms
    }

    /// Reset state (called when a connection opens).
    pub fn reset(&self) {
        *self.last_frame.write() = Utc::now();
        *self.last_ping.write() = None;
        *self.pongs_sent.write() = 0;
    }

    /// Record that any frame was received.
    pub fn record_frame(&self) {
        *self.last_frame.write() = Utc::now();
    }

    /// Record a server ping and the pong sent in reply.
    pub fn record_ping_answered(&self) {
        let now = Utc::now();
        *self.last_ping.write() = Some(now);
        *self.pongs_sent.write() += 1;
        debug!(time = %now, "Answered server ping");
    }

    pub fn time_since_last_frame_ms(&self) -> i64 {
        (Utc::now() - *self.last_frame.read()).num_milliseconds()
    }

    /// Check if the connection has been silent longer than the timeout.
    pub fn is_idle(&self) -> bool {
        self.is_enabled() && self.time_since_last_frame_ms() > self.idle_timeout_ms as i64
    }

    /// Wait for the next idle check.
    pub async fn wait_for_check(&self) {
        let interval = (self.idle_timeout_ms / 2).max(1);
        tokio::time::sleep(Duration::from_millis(interval)).await;
    }

    pub fn stats(&self) -> HeartbeatStats {
        HeartbeatStats {
            last_frame: *self.last_frame.read(),
            last_ping: *self.last_ping.read(),
            pongs_sent: *self.pongs_sent.read(),
            time_since_last_frame_ms: self.time_since_last_frame_ms(),
        }
    }
}

/// Liveness statistics.
#[derive(Debug, Clone)]
pub struct HeartbeatStats {
    pub last_frame: DateTime<Utc>,
    pub last_ping: Option<DateTime<Utc>>,
    pub pongs_sent: u64,
    pub time_since_last_frame_ms: i64,
}
