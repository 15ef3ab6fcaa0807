//! A deployed contract: address + ABI table + invoker.

use alloy_primitives::{Address, U256};
use chainbind_abi::{
    decode_log, matches, AbiError, AbiValue, ContractAbi, DecodedCall, DecodedEvent,
    EventSignature,
};
use chainbind_rpc::{
    BlockId, InvokeError, Invoker, LogFilter, LogSubscription, PendingTransaction, Receipt,
    RpcTransport, TxRequest,
};
use std::sync::Arc;

/// Per-transaction overrides for [`Contract::send`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    pub value: U256,
    pub gas_limit: Option<u64>,
}

impl SendOptions {
    pub fn value(value: U256) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }
}

/// Every function and event of a contract, looked up by name in its ABI
/// table and executed through the shared [`Invoker`].
///
/// Cheap to clone; handles for many contracts share one invoker.
pub struct Contract<T> {
    address: Address,
    abi: Arc<ContractAbi>,
    invoker: Arc<Invoker<T>>,
}

impl<T> Clone for Contract<T> {
    fn clone(&self) -> Self {
        Self {
            address: self.address,
            abi: Arc::clone(&self.abi),
            invoker: Arc::clone(&self.invoker),
        }
    }
}

impl<T: RpcTransport> Contract<T> {
    pub fn new(address: Address, abi: Arc<ContractAbi>, invoker: Arc<Invoker<T>>) -> Self {
        Self {
            address,
            abi,
            invoker,
        }
    }

    /// Deploy `bytecode` with the table's constructor and return a handle
    /// at the new address.
    pub async fn deploy(
        invoker: Arc<Invoker<T>>,
        abi: Arc<ContractAbi>,
        bytecode: &[u8],
        args: &[AbiValue],
    ) -> Result<Self, InvokeError> {
        let (address, _receipt) = invoker
            .deploy(bytecode, &abi.constructor_types(), args)
            .await?;
        Ok(Self::new(address, abi, invoker))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn abi(&self) -> &ContractAbi {
        &self.abi
    }

    pub fn invoker(&self) -> &Invoker<T> {
        &self.invoker
    }

    /// Same table and invoker at another address (e.g. behind a proxy).
    pub fn at(&self, address: Address) -> Self {
        Self {
            address,
            ..self.clone()
        }
    }

    /// Read-only call at the latest block.
    pub async fn call(&self, name: &str, args: &[AbiValue]) -> Result<Vec<AbiValue>, InvokeError> {
        self.call_at(name, args, BlockId::Latest).await
    }

    pub async fn call_at(
        &self,
        name: &str,
        args: &[AbiValue],
        block: BlockId,
    ) -> Result<Vec<AbiValue>, InvokeError> {
        let sig = self.abi.function(name)?;
        self.invoker
            .call_function(self.address, sig, args, block)
            .await
    }

    /// Submit a state-changing call without waiting for it.
    pub async fn send(
        &self,
        name: &str,
        args: &[AbiValue],
        opts: SendOptions,
    ) -> Result<PendingTransaction, InvokeError> {
        let call = self.abi.encode_call(name, args)?;
        let mut tx = TxRequest::call(self.address, call.data()).value(opts.value);
        tx.gas_limit = opts.gas_limit;
        tracing::debug!(contract = %self.address, function = name, "sending transaction");
        self.invoker.submit(tx).await
    }

    /// [`send`](Self::send), then wait for a successful receipt.
    pub async fn transact(
        &self,
        name: &str,
        args: &[AbiValue],
        opts: SendOptions,
    ) -> Result<Receipt, InvokeError> {
        let mut pending = self.send(name, args, opts).await?;
        let timeout = self.invoker.config().receipt_timeout();
        self.invoker.wait(&mut pending, timeout).await?.into_result()
    }

    fn event_filter(&self, sig: &EventSignature) -> LogFilter {
        LogFilter::new().address(self.address).event(sig)
    }

    /// Decoded `name` events emitted by this contract in `[from, to]`.
    pub async fn events(
        &self,
        name: &str,
        from: impl Into<BlockId>,
        to: impl Into<BlockId>,
    ) -> Result<Vec<DecodedEvent>, InvokeError> {
        let sig = self.abi.event(name)?;
        let filter = self.event_filter(sig).from_block(from).to_block(to);
        let logs = self.invoker.logs(&filter).await?;
        let events = logs
            .iter()
            .filter(|log| matches(log, sig))
            .map(|log| decode_log(log, sig))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    /// Follow new `name` events.
    pub async fn subscribe(&self, name: &str) -> Result<EventSubscription, InvokeError> {
        let sig = self.abi.event(name)?.clone();
        let logs = self.invoker.subscribe(self.event_filter(&sig)).await?;
        Ok(EventSubscription { sig, logs })
    }

    /// Decoded `name` events this contract emitted in a receipt.
    pub fn receipt_events(&self, name: &str, receipt: &Receipt) -> Result<Vec<DecodedEvent>, AbiError> {
        let sig = self.abi.event(name)?;
        receipt
            .logs
            .iter()
            .filter(|log| log.address == self.address && matches(log, sig))
            .map(|log| decode_log(log, sig))
            .collect()
    }

    /// Decode a custom error from a revert against this contract's table.
    pub fn decode_error(&self, err: &InvokeError) -> Option<DecodedCall> {
        match err.revert_reason()? {
            chainbind_abi::RevertReason::Custom { data } => self.abi.decode_error(data),
            _ => None,
        }
    }
}

/// Decoded events from a live log subscription.
pub struct EventSubscription {
    sig: EventSignature,
    logs: LogSubscription,
}

impl EventSubscription {
    /// Next decoded event. Logs that do not decode as this event are
    /// skipped; `None` once the subscription ended.
    pub async fn next(&mut self) -> Option<Result<DecodedEvent, InvokeError>> {
        loop {
            let log = match self.logs.next().await? {
                Ok(log) => log,
                Err(e) => return Some(Err(e.into())),
            };
            match decode_log(&log, &self.sig) {
                Ok(event) => return Some(Ok(event)),
                Err(e) => {
                    tracing::debug!(event = self.sig.name(), error = %e, "skipping undecodable log");
                }
            }
        }
    }

    pub fn dropped(&self) -> u64 {
        self.logs.dropped()
    }

    pub async fn cancel(self) {
        self.logs.cancel().await;
    }
}
