//! Exponential backoff for transient transport errors and receipt polling.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::error::TransportError;

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    10_000
}

fn default_multiplier() -> f64 {
    2.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not counting the first try).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Caps exponential growth.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Adds `jitter_fraction / 2 * backoff` on top of each delay.
    #[serde(default)]
    pub jitter_fraction: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
            jitter_fraction: 0.0,
        }
    }
}

/// Stateless policy: computes the delay for a given attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Delay before the `attempt`-th retry (1-based), or `None` once
    /// `max_retries` is exhausted.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.config.max_retries {
            return None;
        }
        Some(self.backoff(attempt - 1))
    }

    /// Delay for a 0-based `step`: `initial * multiplier^step`, capped at
    /// `max_backoff_ms`.
    pub fn backoff(&self, step: u32) -> Duration {
        let exp = i32::try_from(step).unwrap_or(i32::MAX);
        let base_ms = self.config.initial_backoff_ms as f64 * self.config.multiplier.powi(exp);
        let capped = base_ms.min(self.config.max_backoff_ms as f64);
        let jitter_ms = capped * self.config.jitter_fraction * 0.5;
        Duration::from_millis((capped + jitter_ms) as u64)
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.config.max_retries
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// retry budget is spent.
    pub async fn run<T, F, Fut>(&self, method: &str, mut op: F) -> Result<T, TransportError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() => match self.next_delay(attempt) {
                    Some(delay) => {
                        tracing::warn!(
                            attempt,
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            error = %e,
                            method,
                            "retrying request"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        tracing::error!(attempt, error = %e, method, "max retries exceeded");
                        return Err(e);
                    }
                },
                Err(e) => return Err(e),
            }
        }
    }
}

/// Receipt polling schedule: starts at `interval`, grows by `multiplier`
/// per poll, never exceeds `max_interval`.
#[derive(Debug, Clone)]
pub struct PollSchedule {
    interval: Duration,
    max_interval: Duration,
    multiplier: f64,
    polls: u32,
}

impl PollSchedule {
    pub fn new(interval: Duration, max_interval: Duration, multiplier: f64) -> Self {
        Self {
            interval,
            max_interval: max_interval.max(interval),
            multiplier: multiplier.max(1.0),
            polls: 0,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let exp = i32::try_from(self.polls).unwrap_or(i32::MAX);
        self.polls = self.polls.saturating_add(1);
        let ms = self.interval.as_millis() as f64 * self.multiplier.powi(exp);
        Duration::from_millis(ms.min(self.max_interval.as_millis() as f64) as u64)
    }
}
