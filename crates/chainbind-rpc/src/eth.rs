//! Typed `eth_*` calls over an [`RpcTransport`].
//!
//! Quantities arrive as `0x`-prefixed hex strings; the `Raw*` DTOs keep
//! them as strings and convert once, so a malformed node response is an
//! error instead of a silent zero.

use alloy_primitives::{Address, Bytes, B256, U256};
use chainbind_abi::{EventSignature, Log};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::TransportError;
use crate::request::JsonRpcRequest;
use crate::retry::{RetryConfig, RetryPolicy};
use crate::transport::RpcTransport;

// ─── Block parameter ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BlockId {
    #[default]
    Latest,
    Earliest,
    Pending,
    Safe,
    Finalized,
    Number(u64),
}

impl BlockId {
    pub fn to_value(self) -> Value {
        Value::String(self.to_string())
    }

    pub fn as_number(self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(n),
            _ => None,
        }
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str("latest"),
            Self::Earliest => f.write_str("earliest"),
            Self::Pending => f.write_str("pending"),
            Self::Safe => f.write_str("safe"),
            Self::Finalized => f.write_str("finalized"),
            Self::Number(n) => write!(f, "0x{n:x}"),
        }
    }
}

impl From<u64> for BlockId {
    fn from(n: u64) -> Self {
        Self::Number(n)
    }
}

// ─── Log filter ───────────────────────────────────────────────────────────────

/// `eth_getLogs` / `eth_newFilter` parameters.
///
/// `topics[i] == None` matches anything in that position; `Some(list)`
/// matches any of the listed values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    pub address: Vec<Address>,
    pub topics: Vec<Option<Vec<B256>>>,
    pub from_block: Option<BlockId>,
    pub to_block: Option<BlockId>,
}

impl LogFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn address(mut self, address: Address) -> Self {
        self.address.push(address);
        self
    }

    /// Match logs of `sig` (sets `topics[0]`). Anonymous events have no
    /// signature topic and leave the filter unchanged.
    pub fn event(self, sig: &EventSignature) -> Self {
        if sig.is_anonymous() {
            return self;
        }
        self.topic(0, vec![sig.topic()])
    }

    pub fn topic(mut self, position: usize, values: Vec<B256>) -> Self {
        if self.topics.len() <= position {
            self.topics.resize(position + 1, None);
        }
        self.topics[position] = Some(values);
        self
    }

    pub fn from_block(mut self, block: impl Into<BlockId>) -> Self {
        self.from_block = Some(block.into());
        self
    }

    pub fn to_block(mut self, block: impl Into<BlockId>) -> Self {
        self.to_block = Some(block.into());
        self
    }

    /// Same filter over `[from, to]`.
    pub fn with_range(&self, from: u64, to: u64) -> Self {
        Self {
            from_block: Some(BlockId::Number(from)),
            to_block: Some(BlockId::Number(to)),
            ..self.clone()
        }
    }

    pub fn to_value(&self) -> Value {
        let mut obj = serde_json::Map::new();
        match self.address.as_slice() {
            [] => {}
            [one] => {
                obj.insert("address".into(), json!(one));
            }
            many => {
                obj.insert("address".into(), json!(many));
            }
        }
        if !self.topics.is_empty() {
            let mut topics = self.topics.clone();
            while topics.last() == Some(&None) {
                topics.pop();
            }
            let topics: Vec<Value> = topics
                .into_iter()
                .map(|slot| match slot {
                    None => Value::Null,
                    Some(values) if values.len() == 1 => json!(values[0]),
                    Some(values) => json!(values),
                })
                .collect();
            obj.insert("topics".into(), Value::Array(topics));
        }
        if let Some(from) = self.from_block {
            obj.insert("fromBlock".into(), from.to_value());
        }
        if let Some(to) = self.to_block {
            obj.insert("toBlock".into(), to.to_value());
        }
        Value::Object(obj)
    }
}

// ─── Wire DTOs ────────────────────────────────────────────────────────────────

/// Parse a hex quantity (`0x1a`).
pub fn parse_quantity(s: &str) -> Result<u64, TransportError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(digits, 16)
        .map_err(|_| TransportError::InvalidResponse(format!("bad quantity '{s}'")))
}

fn parse_opt_quantity(s: &Option<String>) -> Result<Option<u64>, TransportError> {
    s.as_deref().map(parse_quantity).transpose()
}

/// A log as returned by `eth_getLogs` / `eth_getFilterChanges`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: Option<String>,
    pub block_hash: Option<B256>,
    pub transaction_hash: Option<B256>,
    pub transaction_index: Option<String>,
    pub log_index: Option<String>,
    #[serde(default)]
    pub removed: Option<bool>,
}

impl RawLog {
    pub fn into_log(self) -> Result<Log, TransportError> {
        Ok(Log {
            block_number: parse_opt_quantity(&self.block_number)?,
            transaction_index: parse_opt_quantity(&self.transaction_index)?,
            log_index: parse_opt_quantity(&self.log_index)?,
            address: self.address,
            topics: self.topics,
            data: self.data,
            block_hash: self.block_hash,
            transaction_hash: self.transaction_hash,
            removed: self.removed.unwrap_or(false),
        })
    }
}

/// A mined transaction receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub transaction_hash: B256,
    pub block_number: u64,
    pub block_hash: B256,
    /// `1` success, `0` failure.
    pub status: u64,
    pub gas_used: u64,
    pub from: Address,
    pub to: Option<Address>,
    pub contract_address: Option<Address>,
    pub effective_gas_price: Option<U256>,
    pub logs: Vec<Log>,
}

impl Receipt {
    pub fn is_success(&self) -> bool {
        self.status == 1
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReceipt {
    pub transaction_hash: B256,
    pub block_number: String,
    pub block_hash: B256,
    /// Absent on pre-Byzantium receipts, which carry a state root instead.
    pub status: Option<String>,
    pub gas_used: String,
    pub from: Address,
    pub to: Option<Address>,
    pub contract_address: Option<Address>,
    pub effective_gas_price: Option<U256>,
    #[serde(default)]
    pub logs: Vec<RawLog>,
}

impl RawReceipt {
    pub fn into_receipt(self) -> Result<Receipt, TransportError> {
        let status = match self.status.as_deref() {
            Some(s) => parse_quantity(s)?,
            None => {
                return Err(TransportError::InvalidResponse(format!(
                    "receipt {:#x} has no status field",
                    self.transaction_hash
                )))
            }
        };
        Ok(Receipt {
            transaction_hash: self.transaction_hash,
            block_number: parse_quantity(&self.block_number)?,
            block_hash: self.block_hash,
            status,
            gas_used: parse_quantity(&self.gas_used)?,
            from: self.from,
            to: self.to,
            contract_address: self.contract_address,
            effective_gas_price: self.effective_gas_price,
            logs: self
                .logs
                .into_iter()
                .map(RawLog::into_log)
                .collect::<Result<_, _>>()?,
        })
    }
}

/// `eth_call` transaction object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    pub data: Bytes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
}

// ─── Client ───────────────────────────────────────────────────────────────────

/// Typed JSON-RPC client. Transient transport errors are retried on the
/// configured backoff schedule; node errors are returned immediately.
pub struct EthRpc<T> {
    transport: T,
    retry: RetryPolicy,
    next_id: AtomicU64,
}

impl<T: RpcTransport> EthRpc<T> {
    pub fn new(transport: T, retry: RetryConfig) -> Self {
        Self {
            transport,
            retry: RetryPolicy::new(retry),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send `method` with `params` and deserialize the result.
    pub async fn request<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<R, TransportError> {
        let params = &params;
        let this = self;
        let value = self
            .retry
            .run(method, move || async move {
                let id = this.next_id.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(id, method, url = this.transport.url(), "rpc request");
                let resp = this
                    .transport
                    .send(JsonRpcRequest::new(id, method, params.clone()))
                    .await?;
                resp.into_result().map_err(TransportError::Rpc)
            })
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn block_number(&self) -> Result<u64, TransportError> {
        let n: String = self.request("eth_blockNumber", vec![]).await?;
        parse_quantity(&n)
    }

    pub async fn chain_id(&self) -> Result<u64, TransportError> {
        let n: String = self.request("eth_chainId", vec![]).await?;
        parse_quantity(&n)
    }

    pub async fn transaction_count(
        &self,
        address: Address,
        block: BlockId,
    ) -> Result<u64, TransportError> {
        let n: String = self
            .request("eth_getTransactionCount", vec![json!(address), block.to_value()])
            .await?;
        parse_quantity(&n)
    }

    pub async fn call(&self, req: &CallRequest, block: BlockId) -> Result<Bytes, TransportError> {
        self.request("eth_call", vec![serde_json::to_value(req)?, block.to_value()])
            .await
    }

    pub async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, TransportError> {
        self.request(
            "eth_sendRawTransaction",
            vec![json!(format!("0x{}", hex::encode(raw)))],
        )
        .await
    }

    /// `None` while the transaction is not mined.
    pub async fn transaction_receipt(&self, hash: B256) -> Result<Option<Receipt>, TransportError> {
        let raw: Option<RawReceipt> = self
            .request("eth_getTransactionReceipt", vec![json!(hash)])
            .await?;
        raw.map(RawReceipt::into_receipt).transpose()
    }

    pub async fn logs(&self, filter: &LogFilter) -> Result<Vec<Log>, TransportError> {
        let raw: Vec<RawLog> = self.request("eth_getLogs", vec![filter.to_value()]).await?;
        raw.into_iter().map(RawLog::into_log).collect()
    }

    /// Install a log filter; returns the node's filter id.
    pub async fn new_filter(&self, filter: &LogFilter) -> Result<String, TransportError> {
        self.request("eth_newFilter", vec![filter.to_value()]).await
    }

    pub async fn filter_changes(&self, id: &str) -> Result<Vec<Log>, TransportError> {
        let raw: Vec<RawLog> = self.request("eth_getFilterChanges", vec![json!(id)]).await?;
        raw.into_iter().map(RawLog::into_log).collect()
    }

    pub async fn uninstall_filter(&self, id: &str) -> Result<bool, TransportError> {
        self.request("eth_uninstallFilter", vec![json!(id)]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_id_wire_format() {
        assert_eq!(BlockId::Latest.to_value(), json!("latest"));
        assert_eq!(BlockId::Number(26).to_value(), json!("0x1a"));
        assert_eq!(BlockId::Finalized.to_string(), "finalized");
    }

    #[test]
    fn parse_quantity_rejects_garbage() {
        assert_eq!(parse_quantity("0xff").unwrap(), 255);
        assert!(parse_quantity("0xzz").is_err());
    }

    #[test]
    fn filter_json_shape() {
        let a = Address::repeat_byte(0x11);
        let t = B256::repeat_byte(0x22);
        let filter = LogFilter::new()
            .address(a)
            .topic(0, vec![t])
            .topic(2, vec![t, t])
            .from_block(5u64)
            .to_block(BlockId::Latest);
        let v = filter.to_value();
        assert_eq!(v["address"], json!(a));
        assert_eq!(v["topics"][0], json!(t));
        assert_eq!(v["topics"][1], Value::Null);
        assert_eq!(v["topics"][2], json!([t, t]));
        assert_eq!(v["fromBlock"], json!("0x5"));
        assert_eq!(v["toBlock"], json!("latest"));
    }

    #[test]
    fn raw_log_conversion() {
        let raw: RawLog = serde_json::from_value(json!({
            "address": "0x1111111111111111111111111111111111111111",
            "topics": ["0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"],
            "data": "0x01",
            "blockNumber": "0x12a05f200",
            "blockHash": null,
            "transactionHash": null,
            "transactionIndex": "0x0",
            "logIndex": "0x5"
        }))
        .unwrap();
        let log = raw.into_log().unwrap();
        assert_eq!(log.block_number, Some(5_000_000_000));
        assert_eq!(log.log_index, Some(5));
        assert_eq!(log.data.as_ref(), &[0x01]);
        assert!(!log.removed);
    }

    #[test]
    fn receipt_conversion() {
        let raw: RawReceipt = serde_json::from_value(json!({
            "transactionHash": format!("{:#x}", B256::repeat_byte(1)),
            "blockNumber": "0x10",
            "blockHash": format!("{:#x}", B256::repeat_byte(2)),
            "status": "0x0",
            "gasUsed": "0x5208",
            "from": "0x1111111111111111111111111111111111111111",
            "to": null,
            "contractAddress": "0x2222222222222222222222222222222222222222",
            "logs": []
        }))
        .unwrap();
        let receipt = raw.into_receipt().unwrap();
        assert!(!receipt.is_success());
        assert_eq!(receipt.gas_used, 21_000);
        assert_eq!(receipt.contract_address, Some(Address::repeat_byte(0x22)));
    }
}
