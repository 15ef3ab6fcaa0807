//! # chainbind-rpc
//!
//! The I/O half of contract binding: a transport boundary, typed `eth_*`
//! calls, the transaction lifecycle and log subscriptions.
//!
//! ## Modules
//! - [`transport`]    : `RpcTransport`, implemented by HTTP / WS clients outside this crate
//! - [`eth`]          : typed JSON-RPC calls, receipts, log filters
//! - [`invoker`]      : reads, signed writes, receipt polling with deadlines
//! - [`nonce`]        : per-account submission serialization
//! - [`subscription`] : chunked historical logs and polled live filters
//! - [`retry`]        : exponential backoff
//! - [`config`] / [`logging`] : `InvokerConfig`, tracing setup

pub mod config;
pub mod error;
pub mod eth;
pub mod invoker;
pub mod logging;
pub mod nonce;
pub mod request;
pub mod retry;
pub mod signer;
pub mod subscription;
pub mod transport;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use config::InvokerConfig;
pub use error::{InvokeError, SignerError, SubscriptionError, TransportError};
pub use eth::{BlockId, CallRequest, EthRpc, LogFilter, Receipt};
pub use invoker::{Invoker, PendingTransaction, TxOutcome, TxState};
pub use logging::{init_tracing, LogConfig};
pub use nonce::NonceManager;
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId};
pub use retry::{PollSchedule, RetryConfig, RetryPolicy};
pub use signer::{TransactionSigner, TxRequest, UnsignedTransaction};
pub use subscription::{LogSubscription, OverflowPolicy, SubscriptionOptions};
pub use transport::RpcTransport;
