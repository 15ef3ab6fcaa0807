//! Error types for the ABI codec.
//!
//! Encoding and decoding failures are always local to the single call or
//! log being processed; they never carry transport state.

use thiserror::Error;

/// Errors raised while validating or encoding a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Value {value} does not fit in {ty}")]
    IntegerOverflow { ty: String, value: String },

    #[error("Invalid length for {ty}: expected {expected}, got {got}")]
    InvalidLength {
        ty: String,
        expected: usize,
        got: usize,
    },

    #[error("Argument count mismatch: expected {expected}, got {got}")]
    ArgumentCount { expected: usize, got: usize },

    #[error("Invalid ABI type: {0}")]
    InvalidType(String),
}

/// Errors raised while decoding ABI-encoded bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Buffer too short: need {needed} bytes at offset {offset}, have {len}")]
    Truncated {
        offset: usize,
        needed: usize,
        len: usize,
    },

    #[error("Offset {offset} points outside buffer of {len} bytes")]
    OffsetOutOfBounds { offset: usize, len: usize },

    #[error("Length {length} at offset {offset} exceeds the remaining buffer")]
    LengthOutOfBounds { offset: usize, length: String },

    #[error("Word at offset {offset} is not a valid {ty}")]
    InvalidValue { offset: usize, ty: String },

    #[error("String at offset {offset} is not valid UTF-8")]
    InvalidUtf8 { offset: usize },

    #[error("Topic count mismatch: expected {expected}, got {got}")]
    TopicCount { expected: usize, got: usize },

    /// Offsets pointing into the same tail made the payload decode to more
    /// words than it could hold.
    #[error("Payload expands past {limit} words; offsets overlap")]
    ExpansionLimit { limit: usize },

    #[error("Invalid ABI type: {0}")]
    InvalidType(String),
}

/// Top-level error for the ABI layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbiError {
    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The payload or log does not belong to the expected function / event.
    #[error("Selector mismatch: expected {expected}, got {got}")]
    SelectorMismatch { expected: String, got: String },

    #[error("Function '{0}' not found in ABI")]
    UnknownFunction(String),

    #[error("Event '{0}' not found in ABI")]
    UnknownEvent(String),

    #[error("No ABI entry for selector {0}")]
    UnknownSelector(String),

    #[error("Invalid signature '{signature}': {reason}")]
    InvalidSignature { signature: String, reason: String },

    #[error("Invalid ABI JSON: {0}")]
    InvalidAbiJson(String),
}

impl AbiError {
    /// Returns `true` if this error means "not this function / event"
    /// rather than a malformed payload.
    pub fn is_selector_mismatch(&self) -> bool {
        matches!(self, Self::SelectorMismatch { .. })
    }
}
