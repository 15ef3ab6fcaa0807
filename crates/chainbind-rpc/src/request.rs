//! JSON-RPC 2.0 wire types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// JSON-RPC request ID: a number, a string or null.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcId {
    Number(u64),
    String(String),
    Null,
}

impl fmt::Display for RpcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Null => write!(f, "null"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Vec<Value>,
    pub id: RpcId,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            method: method.into(),
            params,
            id: RpcId::Number(id),
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Revert payload attached to an `eth_call` / `eth_estimateGas` failure.
    ///
    /// Nodes put it in `data` either as a bare hex string (geth, erigon) or
    /// nested as `{"data": "0x..."}` (some hosted providers).
    pub fn revert_data(&self) -> Option<Vec<u8>> {
        let hex_str = match self.data.as_ref()? {
            Value::String(s) => s.as_str(),
            Value::Object(map) => map.get("data")?.as_str()?,
            _ => return None,
        };
        hex::decode(hex_str.strip_prefix("0x").unwrap_or(hex_str)).ok()
    }

    /// `true` for execution reverts (`code: 3` or an "execution reverted"
    /// message).
    pub fn is_revert(&self) -> bool {
        self.code == 3 || self.message.to_ascii_lowercase().contains("execution reverted")
    }

    /// `true` when the node rejected a transaction because of its sequence
    /// number. These must not be retried with the same nonce.
    pub fn is_nonce_error(&self) -> bool {
        let msg = self.message.to_ascii_lowercase();
        ["nonce too low", "nonce too high", "replacement transaction underpriced", "invalid nonce", "nonce has already been used"]
            .iter()
            .any(|needle| msg.contains(needle))
    }

    /// `true` when the node already holds this exact transaction.
    pub fn is_already_known(&self) -> bool {
        let msg = self.message.to_ascii_lowercase();
        msg.contains("already known") || msg.contains("known transaction")
    }

    /// `true` when a filter id is no longer recognized by the node.
    pub fn is_filter_not_found(&self) -> bool {
        self.message.to_ascii_lowercase().contains("filter not found")
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: RpcId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: RpcId, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: RpcId, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// The result value, or the error object. A missing result is `null`
    /// (e.g. `eth_getTransactionReceipt` for an unmined hash).
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}
