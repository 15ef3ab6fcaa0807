//! Event log matching and decoding.
//!
//! Layout of an EVM log for `event E(T1 indexed a, T2 b, T3 indexed c)`:
//!   topics[0] = keccak256("E(T1,T2,T3)")   (absent for anonymous events)
//!   topics[1] = a, topics[2] = c            (indexed, declaration order)
//!   data      = abi.encode(b)               (non-indexed, as a tuple)
//!
//! Indexed params of a reference type (`bytes`, `string`, arrays, tuples)
//! are stored as the keccak256 of their encoding. That hash is surfaced as
//! [`EventField::Hashed`]; the original value cannot be recovered from a log.

use alloy_primitives::{Address, Bytes, B256};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::codec::{decode, decode_params, encode, topic_preimage};
use crate::error::{AbiError, DecodeError, EncodeError};
use crate::selector::keccak256;
use crate::signature::EventSignature;
use crate::types::{AbiType, AbiValue};

/// A raw log as returned by the node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: Option<u64>,
    pub block_hash: Option<B256>,
    pub transaction_hash: Option<B256>,
    pub transaction_index: Option<u64>,
    pub log_index: Option<u64>,
    /// Set by the node when a reorg removed the log.
    #[serde(default)]
    pub removed: bool,
}

/// One decoded event parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum EventField {
    Value(AbiValue),
    /// keccak256 of an indexed reference-type value.
    Hashed(B256),
}

impl EventField {
    pub fn value(&self) -> Option<&AbiValue> {
        match self {
            Self::Value(v) => Some(v),
            Self::Hashed(_) => None,
        }
    }

    pub fn hash(&self) -> Option<B256> {
        match self {
            Self::Value(_) => None,
            Self::Hashed(h) => Some(*h),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedEvent {
    pub name: String,
    /// Params in declaration order; unnamed ones are keyed `arg{i}`.
    pub fields: IndexMap<String, EventField>,
    pub log: Log,
}

impl DecodedEvent {
    pub fn field(&self, name: &str) -> Option<&EventField> {
        self.fields.get(name)
    }

    /// Decoded value of a field; `None` for missing or hashed fields.
    pub fn value(&self, name: &str) -> Option<&AbiValue> {
        self.fields.get(name).and_then(EventField::value)
    }
}

/// `true` if `log` has the topic layout of `sig`.
///
/// For anonymous events only the topic count can be checked.
pub fn matches(log: &Log, sig: &EventSignature) -> bool {
    if log.topics.len() != sig.topic_count() {
        return false;
    }
    sig.is_anonymous() || log.topics.first() == Some(&sig.topic())
}

/// Decode `log` as an instance of `sig`.
pub fn decode_log(log: &Log, sig: &EventSignature) -> Result<DecodedEvent, AbiError> {
    let mut topics = log.topics.iter();
    if !sig.is_anonymous() {
        let first = topics.next().ok_or(DecodeError::TopicCount {
            expected: sig.topic_count(),
            got: 0,
        })?;
        if *first != sig.topic() {
            return Err(AbiError::SelectorMismatch {
                expected: format!("{:#x}", sig.topic()),
                got: format!("{first:#x}"),
            });
        }
    }
    if log.topics.len() != sig.topic_count() {
        return Err(DecodeError::TopicCount {
            expected: sig.topic_count(),
            got: log.topics.len(),
        }
        .into());
    }

    let data_types: Vec<AbiType> = sig
        .params()
        .iter()
        .filter(|p| !p.indexed)
        .map(|p| p.ty.clone())
        .collect();
    let mut data_values = decode_params(&log.data, &data_types)?.into_iter();

    let mut fields = IndexMap::with_capacity(sig.params().len());
    for (i, param) in sig.params().iter().enumerate() {
        let field = if param.indexed {
            // Topic count was checked above.
            let topic = topics.next().ok_or(DecodeError::TopicCount {
                expected: sig.topic_count(),
                got: log.topics.len(),
            })?;
            if param.ty.is_word() {
                let (value, _) = decode(topic.as_slice(), 0, &param.ty)?;
                EventField::Value(value)
            } else {
                EventField::Hashed(*topic)
            }
        } else {
            let value = data_values.next().ok_or(DecodeError::Truncated {
                offset: 0,
                needed: 32,
                len: log.data.len(),
            })?;
            EventField::Value(value)
        };
        let key = param.name.clone().unwrap_or_else(|| format!("arg{i}"));
        fields.insert(key, field);
    }

    Ok(DecodedEvent {
        name: sig.name().to_string(),
        fields,
        log: log.clone(),
    })
}

/// Decode every log in `logs` that matches `sig`, skipping the rest.
/// A matching log that fails to decode is an error.
pub fn decode_all(logs: &[Log], sig: &EventSignature) -> Result<Vec<DecodedEvent>, AbiError> {
    logs.iter()
        .filter(|log| matches(log, sig))
        .map(|log| decode_log(log, sig))
        .collect()
}

/// The topic an indexed parameter of type `ty` holding `value` produces.
/// Used to build topic filters.
pub fn encode_topic(value: &AbiValue, ty: &AbiType) -> Result<B256, EncodeError> {
    if ty.is_word() {
        let word = encode(value, ty)?;
        return Ok(B256::from_slice(&word));
    }
    Ok(keccak256(topic_preimage(value, ty)?))
}
