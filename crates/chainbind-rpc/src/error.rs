//! Transport, invocation and subscription errors.

use alloy_primitives::B256;
use chainbind_abi::{AbiError, DecodeError, EncodeError, RevertReason};
use thiserror::Error;

use crate::request::JsonRpcError;

/// Errors that can occur during a single RPC round trip.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection-level failure (refused, reset, HTTP 5xx, ...).
    #[error("Transport error: {0}")]
    Connection(String),

    /// JSON-RPC error object returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Rate limit exceeded")]
    RateLimited,

    /// The node answered, but not with the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
}

impl TransportError {
    /// Returns `true` if this error is transient and the request may be
    /// repeated as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Timeout { .. } | Self::RateLimited
        )
    }

    /// The node-side error object, if any.
    pub fn rpc_error(&self) -> Option<&JsonRpcError> {
        match self {
            Self::Rpc(e) => Some(e),
            _ => None,
        }
    }
}

/// Error returned by an external transaction signer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Signer error: {0}")]
pub struct SignerError(pub String);

/// Errors from a read call, a transaction submission or a receipt wait.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error(transparent)]
    Abi(#[from] AbiError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error("No signer configured for transaction submission")]
    NoSigner,

    /// The node rejected the sequence number and resubmission with a fresh
    /// one did not succeed either.
    #[error("Nonce rejected after {attempts} attempt(s): {message}")]
    Nonce { attempts: u32, message: String },

    /// `eth_call` reverted, or a mined transaction has a failure status.
    #[error("Execution reverted{}", fmt_reason(.reason))]
    Revert {
        /// Receipt status for mined transactions; `None` for calls.
        status: Option<u64>,
        reason: Option<RevertReason>,
    },

    /// No receipt before the deadline. The transaction may still be mined.
    #[error("No receipt for {hash:#x} before the deadline")]
    Timeout { hash: B256 },

    #[error("Cancelled by caller")]
    Cancelled,

    #[error("Invalid state transition {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// The receipt of a deployment carries no contract address.
    #[error("Receipt for {hash:#x} has no contract address")]
    MissingContractAddress { hash: B256 },

    #[error(transparent)]
    Subscription(#[from] SubscriptionError),
}

fn fmt_reason(reason: &Option<RevertReason>) -> String {
    match reason {
        Some(r) => format!(": {r}"),
        None => String::new(),
    }
}

impl From<EncodeError> for InvokeError {
    fn from(e: EncodeError) -> Self {
        Self::Abi(e.into())
    }
}

impl From<DecodeError> for InvokeError {
    fn from(e: DecodeError) -> Self {
        Self::Abi(e.into())
    }
}

impl InvokeError {
    pub fn is_revert(&self) -> bool {
        matches!(self, Self::Revert { .. })
    }

    pub fn revert_reason(&self) -> Option<&RevertReason> {
        match self {
            Self::Revert { reason, .. } => reason.as_ref(),
            _ => None,
        }
    }
}

/// Errors terminating a live log subscription.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// The consumer fell behind and the overflow policy is `Fail`.
    #[error("Subscription buffer overflowed (capacity {capacity})")]
    Overflow { capacity: usize },

    #[error("Subscription transport failure: {0}")]
    Transport(#[from] TransportError),
}
