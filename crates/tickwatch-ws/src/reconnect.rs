//! Reconnection backoff policy.
//!
//! Delay for the n-th consecutive failure (0-based) is
//! `initial_delay * growth_factor^n`, capped at `max_delay`, plus optional
//! jitter. The policy gives up after `max_attempts` consecutive failures
//! (0 = never) and is reset whenever a connection opens.

use std::time::Duration;

/// Reconnection policy parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Multiplier applied per consecutive failure.
    pub growth_factor: f64,
    /// Upper bound on the delay.
    pub max_delay: Duration,
    /// Maximum consecutive failed attempts (0 = unlimited).
    pub max_attempts: u32,
    /// Maximum random jitter added to each delay.
    pub max_jitter: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(3000),
            growth_factor: 1.3,
            max_delay: Duration::from_millis(30000),
            max_attempts: 10,
            max_jitter: Duration::ZERO,
        }
    }
}

/// Stateful backoff calculator owned by one session task.
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    /// Delay before the next attempt, or `None` once the policy gives up.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.config.max_attempts > 0 && self.attempts >= self.config.max_attempts {
            return None;
        }

        let delay = self.delay_for(self.attempts);
        self.attempts += 1;
        Some(delay + jitter(self.config.max_jitter))
    }

    /// Un-jittered delay for the given 0-based failure count.
    pub fn delay_for(&self, failures: u32) -> Duration {
        let base_ms = self.config.initial_delay.as_millis() as f64;
        let max_ms = self.config.max_delay.as_millis() as f64;
        let exponent = failures.min(64) as i32;
        let delay_ms = (base_ms * self.config.growth_factor.powi(exponent)).min(max_ms);
        Duration::from_millis(delay_ms as u64)
    }

    /// Consecutive failed attempts since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Reset after a successful connection.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

/// Random jitter in `[0, max]`, seeded from the clock's sub-second nanos.
fn jitter(max: Duration) -> Duration {
    use std::time::{SystemTime, UNIX_EPOCH};

    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    Duration::from_millis(u64::from(nanos) % (max_ms + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_attempts: u32) -> ReconnectConfig {
        ReconnectConfig {
            initial_delay: Duration::from_millis(1000),
            growth_factor: 2.0,
            max_delay: Duration::from_millis(5000),
            max_attempts,
            max_jitter: Duration::ZERO,
        }
    }

    #[test]
    fn test_exponential_growth_with_cap() {
        let mut policy = ReconnectPolicy::new(config(0));
        let delays: Vec<u64> = (0..5)
            .map(|_| policy.next_delay().unwrap().as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 5000, 5000]);
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let mut policy = ReconnectPolicy::new(config(2));
        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_none());
        assert_eq!(policy.attempts(), 2);
    }

    #[test]
    fn test_reset_restarts_schedule() {
        let mut policy = ReconnectPolicy::new(config(2));
        policy.next_delay();
        policy.next_delay();
        policy.reset();
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(1000)));
    }

    #[test]
    fn test_default_schedule() {
        let policy = ReconnectPolicy::new(ReconnectConfig::default());
        assert_eq!(policy.delay_for(0), Duration::from_millis(3000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(3900));
        assert_eq!(policy.delay_for(20), Duration::from_millis(30000));
    }

    #[test]
    fn test_jitter_bounded() {
        let mut cfg = config(0);
        cfg.max_jitter = Duration::from_millis(250);
        let mut policy = ReconnectPolicy::new(cfg);
        let delay = policy.next_delay().unwrap();
        assert!(delay >= Duration::from_millis(1000));
        assert!(delay <= Duration::from_millis(1250));
    }
}
