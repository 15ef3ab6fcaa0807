//! External signing boundary.
//!
//! Key management and transaction serialization (legacy / EIP-1559 RLP)
//! live outside this crate. The invoker hands a signer a fully resolved
//! [`UnsignedTransaction`] and submits whatever raw bytes come back.

use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::SignerError;

/// A transaction as the caller describes it. Nonce and chain id are
/// filled in by the invoker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxRequest {
    /// `None` deploys `data` as init code.
    pub to: Option<Address>,
    pub data: Bytes,
    #[serde(default)]
    pub value: U256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<U256>,
}

impl TxRequest {
    pub fn call(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to: Some(to),
            data: data.into(),
            ..Self::default()
        }
    }

    pub fn deploy(init_code: impl Into<Bytes>) -> Self {
        Self {
            to: None,
            data: init_code.into(),
            ..Self::default()
        }
    }

    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn gas_limit(mut self, gas: u64) -> Self {
        self.gas_limit = Some(gas);
        self
    }
}

/// What the signer receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedTransaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub from: Address,
    #[serde(flatten)]
    pub request: TxRequest,
}

/// # Thread Safety
/// One signer may be shared by concurrent submissions for its account;
/// the invoker serializes them, so `sign` never races itself on a nonce.
#[async_trait]
pub trait TransactionSigner: Send + Sync + 'static {
    /// The account transactions are sent from.
    fn address(&self) -> Address;

    /// Produce the raw signed transaction for `eth_sendRawTransaction`.
    async fn sign(&self, tx: &UnsignedTransaction) -> Result<Bytes, SignerError>;
}

#[async_trait]
impl<S: TransactionSigner + ?Sized> TransactionSigner for Arc<S> {
    fn address(&self) -> Address {
        (**self).address()
    }

    async fn sign(&self, tx: &UnsignedTransaction) -> Result<Bytes, SignerError> {
        (**self).sign(tx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsigned_tx_flattens_request() {
        let tx = UnsignedTransaction {
            chain_id: 1,
            nonce: 7,
            from: Address::repeat_byte(1),
            request: TxRequest::call(Address::repeat_byte(2), vec![0xa9, 0x05]).gas_limit(21_000),
        };
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["nonce"], 7);
        assert_eq!(json["gasLimit"], 21_000);
        assert_eq!(json["data"], "0xa905");
        assert!(json.get("maxFeePerGas").is_none());
    }
}
