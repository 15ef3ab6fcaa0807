//! # chainbind-abi
//!
//! Ethereum ABI codec and the pure (no I/O) half of contract binding.
//!
//! ## Modules
//! - [`types`]     : `AbiType` / `AbiValue`, the closed ABI type universe
//! - [`codec`]     : head/tail encoding, strict decoding, packed and topic encodings
//! - [`selector`]  : keccak256, function selectors, event topics
//! - [`signature`] : function / event signatures, human-readable parsing
//! - [`call`]      : calldata construction, return and calldata decoding
//! - [`event`]     : log matching and decoding
//! - [`revert`]    : `Error(string)` / `Panic(uint256)` revert reasons
//! - [`abi`]       : `ContractAbi` tables loaded from JSON or declarations

pub mod abi;
pub mod call;
pub mod codec;
pub mod error;
pub mod event;
pub mod revert;
pub mod selector;
pub mod signature;
pub mod types;

pub use abi::ContractAbi;
pub use call::{build_call, decode_input, decode_return, encode_constructor, DecodedCall, EncodedCall};
pub use codec::{decode, decode_params, encode, encode_packed, encode_params, topic_preimage};
pub use error::{AbiError, DecodeError, EncodeError};
pub use event::{decode_all, decode_log, encode_topic, matches, DecodedEvent, EventField, Log};
pub use revert::RevertReason;
pub use selector::{event_topic, function_selector, keccak256};
pub use signature::{EventParam, EventSignature, FunctionSignature, Param, StateMutability};
pub use types::{AbiType, AbiValue};

pub use alloy_primitives::{Address, Bytes, B256, I256, U256};
