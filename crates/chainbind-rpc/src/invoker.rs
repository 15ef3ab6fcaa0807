//! Read calls, transaction submission and receipt tracking.
//!
//! ```text
//! Built ─► Submitted ─► Pending ─► Mined ─► Confirmed
//!              │           │         └────► Reverted
//!              └───────────┴─► TimedOut ─► Pending / Mined (re-poll)
//! ```

use alloy_primitives::{Address, Bytes, B256, U256};
use chainbind_abi::{
    build_call, decode_return, encode_constructor, keccak256, AbiType, AbiValue, EncodedCall,
    FunctionSignature, Log, RevertReason,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::config::InvokerConfig;
use crate::error::{InvokeError, TransportError};
use crate::eth::{BlockId, CallRequest, EthRpc, LogFilter, Receipt};
use crate::nonce::NonceManager;
use crate::signer::{TransactionSigner, TxRequest, UnsignedTransaction};
use crate::subscription::{self, LogSubscription, SubscriptionOptions};
use crate::transport::RpcTransport;

// ─── Lifecycle ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxState {
    Built,
    Submitted,
    Pending,
    Mined,
    Confirmed,
    Reverted,
    TimedOut,
}

impl TxState {
    pub fn can_transition(self, to: TxState) -> bool {
        use TxState::*;
        matches!(
            (self, to),
            (Built, Submitted)
                | (Submitted, Pending)
                | (Submitted, Mined)
                | (Pending, Mined)
                | (Submitted, TimedOut)
                | (Pending, TimedOut)
                | (TimedOut, Pending)
                | (TimedOut, Mined)
                | (Mined, Confirmed)
                | (Mined, Reverted)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Reverted)
    }
}

impl fmt::Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Built => "built",
            Self::Submitted => "submitted",
            Self::Pending => "pending",
            Self::Mined => "mined",
            Self::Confirmed => "confirmed",
            Self::Reverted => "reverted",
            Self::TimedOut => "timed_out",
        };
        f.write_str(s)
    }
}

/// A submitted transaction. Kept by the caller and handed back to
/// [`Invoker::wait`] / [`Invoker::poll_once`]; a timed-out transaction can
/// be polled again later. Once settled, polling returns the recorded
/// outcome without another request.
#[derive(Debug, Clone)]
pub struct PendingTransaction {
    hash: B256,
    from: Address,
    nonce: u64,
    request: TxRequest,
    state: TxState,
    outcome: Option<TxOutcome>,
}

impl PendingTransaction {
    fn built(from: Address, nonce: u64, request: TxRequest) -> Self {
        Self {
            hash: B256::ZERO,
            from,
            nonce,
            request,
            state: TxState::Built,
            outcome: None,
        }
    }

    /// Resume tracking a transaction submitted elsewhere.
    pub fn from_hash(hash: B256, from: Address, nonce: u64, request: TxRequest) -> Self {
        Self {
            hash,
            from,
            nonce,
            request,
            state: TxState::Submitted,
            outcome: None,
        }
    }

    pub fn hash(&self) -> B256 {
        self.hash
    }

    pub fn from(&self) -> Address {
        self.from
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn request(&self) -> &TxRequest {
        &self.request
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    /// The confirmed or reverted outcome, once settled.
    pub fn outcome(&self) -> Option<&TxOutcome> {
        self.outcome.as_ref()
    }

    /// Move to `to`. Re-entering the current state is a no-op.
    pub fn transition(&mut self, to: TxState) -> Result<(), InvokeError> {
        if self.state == to {
            return Ok(());
        }
        if !self.state.can_transition(to) {
            return Err(InvokeError::InvalidTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        tracing::debug!(hash = %self.hash, from = %self.state, to = %to, "transaction state");
        self.state = to;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOutcome {
    Confirmed(Receipt),
    /// Mined with status 0. `reason` is best effort.
    Reverted {
        receipt: Receipt,
        reason: Option<RevertReason>,
    },
    /// No receipt before the deadline. Says nothing about the final result.
    TimedOut { hash: B256 },
}

impl TxOutcome {
    pub fn receipt(&self) -> Option<&Receipt> {
        match self {
            Self::Confirmed(r) | Self::Reverted { receipt: r, .. } => Some(r),
            Self::TimedOut { .. } => None,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed(_))
    }

    /// The receipt of a successful transaction, or the matching error.
    pub fn into_result(self) -> Result<Receipt, InvokeError> {
        match self {
            Self::Confirmed(r) => Ok(r),
            Self::Reverted { receipt, reason } => Err(InvokeError::Revert {
                status: Some(receipt.status),
                reason,
            }),
            Self::TimedOut { hash } => Err(InvokeError::Timeout { hash }),
        }
    }
}

enum Waited {
    Done(Result<TxOutcome, InvokeError>),
    Deadline,
    Cancelled,
}

// ─── Invoker ──────────────────────────────────────────────────────────────────

/// The single invocation path for every contract: reads through
/// `eth_call`, writes through an external signer and
/// `eth_sendRawTransaction`, logs through `eth_getLogs` / filters.
pub struct Invoker<T> {
    rpc: Arc<EthRpc<T>>,
    signer: Option<Arc<dyn TransactionSigner>>,
    nonces: NonceManager,
    chain_id: OnceCell<u64>,
    config: InvokerConfig,
}

impl<T: RpcTransport> Invoker<T> {
    pub fn new(transport: T, config: InvokerConfig) -> Self {
        let chain_id = match config.chain_id {
            Some(id) => OnceCell::new_with(Some(id)),
            None => OnceCell::new(),
        };
        Self {
            rpc: Arc::new(EthRpc::new(transport, config.retry.clone())),
            signer: None,
            nonces: NonceManager::new(),
            chain_id,
            config,
        }
    }

    pub fn with_signer(mut self, signer: impl TransactionSigner) -> Self {
        self.signer = Some(Arc::new(signer));
        self
    }

    pub fn rpc(&self) -> &EthRpc<T> {
        &self.rpc
    }

    pub fn config(&self) -> &InvokerConfig {
        &self.config
    }

    pub fn signer_address(&self) -> Option<Address> {
        self.signer.as_ref().map(|s| s.address())
    }

    pub fn nonces(&self) -> &NonceManager {
        &self.nonces
    }

    /// Configured chain id, or `eth_chainId` fetched once.
    pub async fn chain_id(&self) -> Result<u64, TransportError> {
        self.chain_id
            .get_or_try_init(|| self.rpc.chain_id())
            .await
            .copied()
    }

    // ─── Reads ────────────────────────────────────────────────────────────

    /// One `eth_call`. A node-reported revert becomes
    /// [`InvokeError::Revert`] with the decoded reason.
    pub async fn call(
        &self,
        to: Address,
        call: &EncodedCall,
        block: BlockId,
    ) -> Result<Bytes, InvokeError> {
        let req = CallRequest {
            from: self.signer_address(),
            to: Some(to),
            data: call.data().into(),
            value: None,
        };
        match self.rpc.call(&req, block).await {
            Ok(data) => Ok(data),
            Err(TransportError::Rpc(e)) if e.is_revert() => {
                let reason = e.revert_data().and_then(|d| RevertReason::decode(&d));
                tracing::debug!(to = %to, selector = %call.selector_hex(), ?reason, "call reverted");
                Err(InvokeError::Revert {
                    status: None,
                    reason,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Encode, call and decode the outputs of `sig`.
    pub async fn call_function(
        &self,
        to: Address,
        sig: &FunctionSignature,
        args: &[AbiValue],
        block: BlockId,
    ) -> Result<Vec<AbiValue>, InvokeError> {
        let call = build_call(sig, args)?;
        let data = self.call(to, &call, block).await?;
        Ok(decode_return(&data, &sig.output_types())?)
    }

    // ─── Writes ───────────────────────────────────────────────────────────

    /// Sign and send `tx` from the signer's account.
    ///
    /// Submissions from one account are serialized. A nonce rejection drops
    /// the cached nonce and resubmits with a fresh one at most
    /// `nonce_retries` times. An "already known" answer means the node holds
    /// this exact transaction, so its hash is returned as a success.
    pub async fn submit(&self, tx: TxRequest) -> Result<PendingTransaction, InvokeError> {
        let signer = self.signer.as_ref().ok_or(InvokeError::NoSigner)?;
        let from = signer.address();
        let chain_id = self.chain_id().await?;

        let mut slot = self.nonces.lock(from).await;
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let nonce = match slot.cached() {
                Some(n) => n,
                None => {
                    let n = self.rpc.transaction_count(from, BlockId::Pending).await?;
                    tracing::debug!(from = %from, nonce = n, "fetched account nonce");
                    slot.set(n);
                    n
                }
            };

            let mut pending = PendingTransaction::built(from, nonce, tx.clone());
            let unsigned = UnsignedTransaction {
                chain_id,
                nonce,
                from,
                request: tx.clone(),
            };
            let raw = signer.sign(&unsigned).await?;
            let hash = keccak256(&raw);

            match self.rpc.send_raw_transaction(&raw).await {
                Ok(node_hash) => {
                    if node_hash != hash {
                        tracing::warn!(local = %hash, node = %node_hash, "node reported a different transaction hash");
                    }
                }
                Err(TransportError::Rpc(e)) if e.is_already_known() => {
                    tracing::info!(hash = %hash, nonce, "transaction already known to node");
                }
                Err(TransportError::Rpc(e)) if e.is_nonce_error() => {
                    slot.invalidate();
                    if attempts > self.config.nonce_retries {
                        tracing::error!(from = %from, attempts, error = %e.message, "nonce retries exhausted");
                        return Err(InvokeError::Nonce {
                            attempts,
                            message: e.message,
                        });
                    }
                    tracing::warn!(from = %from, nonce, attempts, error = %e.message, "nonce rejected, refreshing");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }

            slot.advance(nonce);
            pending.hash = hash;
            pending.transition(TxState::Submitted)?;
            tracing::info!(hash = %hash, from = %from, nonce, "transaction submitted");
            return Ok(pending);
        }
    }

    /// One `eth_getTransactionReceipt`. `None` while not mined.
    pub async fn poll_once(
        &self,
        pending: &mut PendingTransaction,
    ) -> Result<Option<TxOutcome>, InvokeError> {
        if let Some(outcome) = &pending.outcome {
            return Ok(Some(outcome.clone()));
        }
        match self.rpc.transaction_receipt(pending.hash).await? {
            None => {
                pending.transition(TxState::Pending)?;
                Ok(None)
            }
            Some(receipt) => {
                pending.transition(TxState::Mined)?;
                Ok(Some(self.settle(pending, receipt).await?))
            }
        }
    }

    /// Poll until mined or `timeout` elapses.
    pub async fn wait(
        &self,
        pending: &mut PendingTransaction,
        timeout: Duration,
    ) -> Result<TxOutcome, InvokeError> {
        self.wait_or_cancel(pending, timeout, std::future::pending::<()>())
            .await
    }

    /// [`wait`](Self::wait) that also gives up with
    /// [`InvokeError::Cancelled`] once `cancel` completes. The transaction
    /// itself is not affected and can be waited on again.
    pub async fn wait_or_cancel<C>(
        &self,
        pending: &mut PendingTransaction,
        timeout: Duration,
        cancel: C,
    ) -> Result<TxOutcome, InvokeError>
    where
        C: Future<Output = ()>,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        let waited = {
            let polling = self.poll_until_mined(pending);
            tokio::pin!(polling);
            tokio::pin!(cancel);
            tokio::select! {
                res = &mut polling => Waited::Done(res),
                _ = tokio::time::sleep_until(deadline) => Waited::Deadline,
                _ = &mut cancel => Waited::Cancelled,
            }
        };

        match waited {
            Waited::Done(res) => res,
            Waited::Deadline => {
                if pending.state.can_transition(TxState::TimedOut) {
                    pending.transition(TxState::TimedOut)?;
                }
                tracing::warn!(
                    hash = %pending.hash,
                    timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    "no receipt before deadline"
                );
                Ok(TxOutcome::TimedOut { hash: pending.hash })
            }
            Waited::Cancelled => {
                tracing::debug!(hash = %pending.hash, "receipt wait cancelled");
                Err(InvokeError::Cancelled)
            }
        }
    }

    async fn poll_until_mined(
        &self,
        pending: &mut PendingTransaction,
    ) -> Result<TxOutcome, InvokeError> {
        let mut schedule = self.config.poll_schedule();
        loop {
            if let Some(outcome) = self.poll_once(pending).await? {
                return Ok(outcome);
            }
            tokio::time::sleep(schedule.next_delay()).await;
        }
    }

    async fn settle(
        &self,
        pending: &mut PendingTransaction,
        receipt: Receipt,
    ) -> Result<TxOutcome, InvokeError> {
        if receipt.is_success() {
            pending.transition(TxState::Confirmed)?;
            tracing::info!(
                hash = %pending.hash,
                block = receipt.block_number,
                gas_used = receipt.gas_used,
                "transaction confirmed"
            );
            let outcome = TxOutcome::Confirmed(receipt);
            pending.outcome = Some(outcome.clone());
            return Ok(outcome);
        }

        let reason = if self.config.replay_reverts {
            self.replay_revert(pending, &receipt).await
        } else {
            None
        };
        pending.transition(TxState::Reverted)?;
        tracing::warn!(
            hash = %pending.hash,
            block = receipt.block_number,
            reason = ?reason,
            "transaction reverted"
        );
        let outcome = TxOutcome::Reverted { receipt, reason };
        pending.outcome = Some(outcome.clone());
        Ok(outcome)
    }

    /// Re-run a failed transaction as `eth_call` at its block to recover
    /// the revert data. Any failure to do so yields `None`.
    async fn replay_revert(
        &self,
        pending: &PendingTransaction,
        receipt: &Receipt,
    ) -> Option<RevertReason> {
        let req = CallRequest {
            from: Some(pending.from),
            to: pending.request.to,
            data: pending.request.data.clone(),
            value: (pending.request.value != U256::ZERO).then_some(pending.request.value),
        };
        match self.rpc.call(&req, BlockId::Number(receipt.block_number)).await {
            Err(TransportError::Rpc(e)) => e.revert_data().and_then(|d| RevertReason::decode(&d)),
            Ok(_) => {
                tracing::debug!(hash = %pending.hash, "replay did not revert");
                None
            }
            Err(e) => {
                tracing::debug!(hash = %pending.hash, error = %e, "revert replay failed");
                None
            }
        }
    }

    /// Deploy `bytecode` with encoded constructor `args`; returns the new
    /// contract address and the receipt.
    pub async fn deploy(
        &self,
        bytecode: &[u8],
        constructor: &[AbiType],
        args: &[AbiValue],
    ) -> Result<(Address, Receipt), InvokeError> {
        let init_code = encode_constructor(bytecode, constructor, args)?;
        let mut pending = self.submit(TxRequest::deploy(init_code)).await?;
        let receipt = self
            .wait(&mut pending, self.config.receipt_timeout())
            .await?
            .into_result()?;
        let address = receipt
            .contract_address
            .ok_or(InvokeError::MissingContractAddress { hash: pending.hash })?;
        tracing::info!(address = %address, hash = %pending.hash, "contract deployed");
        Ok((address, receipt))
    }

    /// Build, submit and wait for a state-changing call.
    pub async fn send_function(
        &self,
        to: Address,
        sig: &FunctionSignature,
        args: &[AbiValue],
        value: U256,
    ) -> Result<Receipt, InvokeError> {
        let call = build_call(sig, args)?;
        let mut pending = self
            .submit(TxRequest::call(to, call.data()).value(value))
            .await?;
        self.wait(&mut pending, self.config.receipt_timeout())
            .await?
            .into_result()
    }

    // ─── Logs ─────────────────────────────────────────────────────────────

    /// All logs matching `filter`, fetched in `log_chunk_size` block spans.
    pub async fn logs(&self, filter: &LogFilter) -> Result<Vec<Log>, TransportError> {
        subscription::fetch_logs(&self.rpc, filter, self.config.log_chunk_size).await
    }

    pub fn historical_stream(
        &self,
        filter: LogFilter,
    ) -> impl Stream<Item = Result<Log, TransportError>> + '_ {
        subscription::historical_stream(&self.rpc, filter, self.config.log_chunk_size)
    }

    /// Follow new logs matching `filter` until cancelled or dropped.
    pub async fn subscribe(&self, filter: LogFilter) -> Result<LogSubscription, TransportError> {
        let opts = SubscriptionOptions {
            capacity: self.config.subscription_capacity,
            overflow: self.config.overflow_policy,
            poll_interval: self.config.poll_interval(),
        };
        subscription::subscribe(Arc::clone(&self.rpc), filter, opts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_transitions() {
        use TxState::*;
        assert!(Built.can_transition(Submitted));
        assert!(Submitted.can_transition(Mined));
        assert!(TimedOut.can_transition(Mined));
        assert!(Mined.can_transition(Reverted));
        assert!(!Built.can_transition(Mined));
        assert!(!Confirmed.can_transition(Pending));
        assert!(!Reverted.can_transition(Confirmed));
        assert!(Confirmed.is_terminal());
        assert!(!TimedOut.is_terminal());
    }

    #[test]
    fn pending_rejects_illegal_transition() {
        let mut p = PendingTransaction::built(Address::ZERO, 0, TxRequest::default());
        let err = p.transition(TxState::Confirmed).unwrap_err();
        assert!(matches!(err, InvokeError::InvalidTransition { .. }));
        assert_eq!(p.state(), TxState::Built);
        p.transition(TxState::Submitted).unwrap();
        p.transition(TxState::Submitted).unwrap();
        assert_eq!(p.state(), TxState::Submitted);
    }

    #[test]
    fn outcome_into_result() {
        let err = TxOutcome::TimedOut { hash: B256::ZERO }.into_result().unwrap_err();
        assert!(matches!(err, InvokeError::Timeout { .. }));
    }
}
