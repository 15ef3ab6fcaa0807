//! Scripted transport and signer for offline tests.
//!
//! Enabled with the `test-util` feature.

use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{SignerError, TransportError};
use crate::request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use crate::signer::{TransactionSigner, UnsignedTransaction};
use crate::transport::RpcTransport;

/// One scripted answer.
#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    Result(Value),
    Error(JsonRpcError),
    /// Fails the round trip with [`TransportError::Connection`].
    Connection(String),
}

#[derive(Default)]
struct MockState {
    queued: HashMap<String, VecDeque<MockReply>>,
    sticky: HashMap<String, MockReply>,
    requests: Vec<JsonRpcRequest>,
}

/// In-memory [`RpcTransport`].
///
/// Each method answers from its queue first, then from its sticky reply.
/// A method with neither answers with JSON-RPC error `-32601`.
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, method: &str, reply: MockReply) -> &Self {
        self.state()
            .queued
            .entry(method.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn push_result(&self, method: &str, result: Value) -> &Self {
        self.push(method, MockReply::Result(result))
    }

    pub fn push_error(&self, method: &str, error: JsonRpcError) -> &Self {
        self.push(method, MockReply::Error(error))
    }

    /// Answer every otherwise unscripted call to `method` with `result`.
    pub fn set_result(&self, method: &str, result: Value) -> &Self {
        self.state()
            .sticky
            .insert(method.to_string(), MockReply::Result(result));
        self
    }

    pub fn requests(&self) -> Vec<JsonRpcRequest> {
        self.state().requests.clone()
    }

    /// Params of every recorded call to `method`, in order.
    pub fn calls(&self, method: &str) -> Vec<Vec<Value>> {
        self.state()
            .requests
            .iter()
            .filter(|r| r.method == method)
            .map(|r| r.params.clone())
            .collect()
    }

    pub fn count(&self, method: &str) -> usize {
        self.state()
            .requests
            .iter()
            .filter(|r| r.method == method)
            .count()
    }
}

#[async_trait]
impl RpcTransport for MockTransport {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        let reply = {
            let mut state = self.state();
            state.requests.push(req.clone());
            let queued = state
                .queued
                .get_mut(&req.method)
                .and_then(VecDeque::pop_front);
            queued.or_else(|| state.sticky.get(&req.method).cloned())
        };
        match reply {
            Some(MockReply::Result(v)) => Ok(JsonRpcResponse::success(req.id, v)),
            Some(MockReply::Error(e)) => Ok(JsonRpcResponse::failure(req.id, e)),
            Some(MockReply::Connection(msg)) => Err(TransportError::Connection(msg)),
            None => Ok(JsonRpcResponse::failure(
                req.id,
                JsonRpcError::new(-32601, format!("the method {} does not exist", req.method)),
            )),
        }
    }

    fn url(&self) -> &str {
        "mock://"
    }
}

/// Signer whose "raw transaction" is the JSON of the unsigned transaction.
/// Distinct nonces therefore give distinct hashes.
pub struct MockSigner {
    address: Address,
    signed: Mutex<Vec<UnsignedTransaction>>,
    fail: Option<String>,
}

impl MockSigner {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            signed: Mutex::new(Vec::new()),
            fail: None,
        }
    }

    /// A signer that refuses every transaction with `message`.
    pub fn failing(address: Address, message: impl Into<String>) -> Self {
        Self {
            fail: Some(message.into()),
            ..Self::new(address)
        }
    }

    pub fn signed(&self) -> Vec<UnsignedTransaction> {
        self.signed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Raw bytes this signer produces for `tx`.
    pub fn raw(tx: &UnsignedTransaction) -> Result<Bytes, SignerError> {
        serde_json::to_vec(tx)
            .map(Bytes::from)
            .map_err(|e| SignerError(e.to_string()))
    }
}

#[async_trait]
impl TransactionSigner for MockSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign(&self, tx: &UnsignedTransaction) -> Result<Bytes, SignerError> {
        if let Some(msg) = &self.fail {
            return Err(SignerError(msg.clone()));
        }
        self.signed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx.clone());
        Self::raw(tx)
    }
}
