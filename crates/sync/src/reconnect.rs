//! Exponential-backoff policy for the sync connection.
//!
//! After each failed or dropped connection the client waits
//! `min(initial * multiplier^attempt, max)` before trying again, up to
//! [`ReconnectConfig::max_attempts`] consecutive failures. A successful
//! open resets the count. Once the ceiling is reached the client stops
//! retrying and reports a terminal error.

use std::time::Duration;

/// Tunable parameters for the exponential-backoff strategy.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
    /// Consecutive failures tolerated before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_attempts: 5,
        }
    }
}

/// Delay before retry number `attempt` (zero-based).
pub fn delay_for_attempt(attempt: u32, config: &ReconnectConfig) -> Duration {
    let initial_ms = config.initial_delay.as_millis() as f64;
    let max_ms = config.max_delay.as_millis() as f64;
    let ms = (initial_ms * config.multiplier.powi(attempt as i32)).min(max_ms);
    Duration::from_millis(ms as u64)
}

/// What to do after a connection failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStep {
    /// Wait `delay`, then make attempt number `attempt` (one-based).
    Retry { attempt: u32, delay: Duration },
    /// The ceiling is exhausted; no further automatic attempts.
    GiveUp { attempts: u32 },
}

/// Counts consecutive failures against a [`ReconnectConfig`].
#[derive(Debug, Clone)]
pub struct Backoff {
    config: ReconnectConfig,
    failures: u32,
}

impl Backoff {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            failures: 0,
        }
    }

    /// Call when a connection opens.
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    /// Consecutive failures recorded since the last reset.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Record a failure and decide whether to retry.
    pub fn on_failure(&mut self) -> BackoffStep {
        if self.failures >= self.config.max_attempts {
            return BackoffStep::GiveUp {
                attempts: self.failures,
            };
        }
        let delay = delay_for_attempt(self.failures, &self.config);
        self.failures += 1;
        BackoffStep::Retry {
            attempt: self.failures,
            delay,
        }
    }
}
