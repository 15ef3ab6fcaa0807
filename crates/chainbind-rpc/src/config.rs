//! Invoker configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::retry::{PollSchedule, RetryConfig};
use crate::subscription::OverflowPolicy;

/// Settings shared by reads, writes and subscriptions of one [`Invoker`].
///
/// [`Invoker`]: crate::invoker::Invoker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokerConfig {
    /// Backoff for transient transport failures.
    #[serde(default)]
    pub retry: RetryConfig,
    /// First receipt / filter poll interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Receipt poll interval never grows past this
    #[serde(default = "default_max_poll_interval_ms")]
    pub max_poll_interval_ms: u64,
    /// Growth factor between receipt polls
    #[serde(default = "default_poll_multiplier")]
    pub poll_multiplier: f64,
    /// Default deadline for `Invoker::wait`
    #[serde(default = "default_receipt_timeout_ms")]
    pub receipt_timeout_ms: u64,
    /// Resubmissions with a freshly fetched nonce after a nonce rejection
    #[serde(default = "default_nonce_retries")]
    pub nonce_retries: u32,
    /// Block span of one `eth_getLogs` request in historical queries
    #[serde(default = "default_log_chunk_size")]
    pub log_chunk_size: u64,
    /// Buffered logs per live subscription
    #[serde(default = "default_subscription_capacity")]
    pub subscription_capacity: usize,
    #[serde(default)]
    pub overflow_policy: OverflowPolicy,
    /// Replay a failed transaction with `eth_call` to recover its reason
    #[serde(default = "bool_true")]
    pub replay_reverts: bool,
    /// EIP-155 chain id; fetched with `eth_chainId` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
}

fn default_poll_interval_ms() -> u64 { 1_000 }
fn default_max_poll_interval_ms() -> u64 { 12_000 }
fn default_poll_multiplier() -> f64 { 1.5 }
fn default_receipt_timeout_ms() -> u64 { 120_000 }
fn default_nonce_retries() -> u32 { 2 }
fn default_log_chunk_size() -> u64 { 2_000 }
fn default_subscription_capacity() -> usize { 1_024 }
fn bool_true() -> bool { true }

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_interval_ms: default_max_poll_interval_ms(),
            poll_multiplier: default_poll_multiplier(),
            receipt_timeout_ms: default_receipt_timeout_ms(),
            nonce_retries: default_nonce_retries(),
            log_chunk_size: default_log_chunk_size(),
            subscription_capacity: default_subscription_capacity(),
            overflow_policy: OverflowPolicy::default(),
            replay_reverts: true,
            chain_id: None,
        }
    }
}

impl InvokerConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_millis(self.receipt_timeout_ms)
    }

    pub fn poll_schedule(&self) -> PollSchedule {
        PollSchedule::new(
            self.poll_interval(),
            Duration::from_millis(self.max_poll_interval_ms),
            self.poll_multiplier,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let cfg = InvokerConfig::from_json(
            r#"{"nonce_retries": 5, "overflow_policy": "fail", "retry": {"max_retries": 1}}"#,
        )
        .unwrap();
        assert_eq!(cfg.nonce_retries, 5);
        assert_eq!(cfg.overflow_policy, OverflowPolicy::Fail);
        assert_eq!(cfg.retry.max_retries, 1);
        assert_eq!(cfg.retry.initial_backoff_ms, 100);
        assert_eq!(cfg.log_chunk_size, 2_000);
        assert!(cfg.replay_reverts);
        assert_eq!(cfg.chain_id, None);
    }

    #[test]
    fn empty_json_equals_default() {
        assert_eq!(InvokerConfig::from_json("{}").unwrap(), InvokerConfig::default());
    }
}
