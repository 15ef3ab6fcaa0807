//! Revert data decoding.
//!
//! `require(cond, "message")` reverts with `0x08c379a0 ++ abi.encode(string)`,
//! compiler-inserted checks with `0x4e487b71 ++ abi.encode(uint256)`.
//! Anything else is a custom error (or no data at all) and is kept raw.
//!
//! Decoding here is best-effort: malformed payloads yield `None`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::codec::decode_params;
use crate::types::{AbiType, AbiValue};

/// `keccak256("Error(string)")[..4]`
pub const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// `keccak256("Panic(uint256)")[..4]`
pub const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RevertReason {
    /// `Error(string)`
    Message { message: String },
    /// `Panic(uint256)`
    Panic { code: u64, meaning: String },
    /// Unrecognized selector; raw revert data including the selector.
    Custom { data: Vec<u8> },
}

impl RevertReason {
    /// Classify revert data. Returns `None` for empty data.
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.is_empty() {
            return None;
        }
        if let Some(message) = decode_error_string(data) {
            return Some(Self::Message { message });
        }
        if let Some((code, meaning)) = decode_panic(data) {
            return Some(Self::Panic {
                code,
                meaning: meaning.to_string(),
            });
        }
        Some(Self::Custom {
            data: data.to_vec(),
        })
    }

    /// First four bytes of a custom error.
    pub fn custom_selector(&self) -> Option<[u8; 4]> {
        match self {
            Self::Custom { data } if data.len() >= 4 => {
                let mut sel = [0u8; 4];
                sel.copy_from_slice(&data[..4]);
                Some(sel)
            }
            _ => None,
        }
    }
}

impl fmt::Display for RevertReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message { message } => write!(f, "{message}"),
            Self::Panic { code, meaning } => write!(f, "panic 0x{code:02x}: {meaning}"),
            Self::Custom { data } => write!(f, "custom error 0x{}", hex::encode(data)),
        }
    }
}

/// Decode an `Error(string)` payload.
pub fn decode_error_string(data: &[u8]) -> Option<String> {
    let payload = data.strip_prefix(&ERROR_STRING_SELECTOR)?;
    match decode_params(payload, &[AbiType::String]).ok()?.pop()? {
        AbiValue::String(s) => Some(s),
        _ => None,
    }
}

/// Decode a `Panic(uint256)` payload into `(code, meaning)`.
pub fn decode_panic(data: &[u8]) -> Option<(u64, &'static str)> {
    let payload = data.strip_prefix(&PANIC_SELECTOR)?;
    let code = decode_params(payload, &[AbiType::Uint(256)])
        .ok()?
        .pop()?
        .as_u256()?;
    let code = u64::try_from(code).ok()?;
    Some((code, panic_meaning(code)))
}

/// Solidity panic codes.
pub fn panic_meaning(code: u64) -> &'static str {
    match code {
        0x00 => "generic compiler-inserted panic",
        0x01 => "assert() called with false condition",
        0x11 => "arithmetic overflow or underflow",
        0x12 => "division or modulo by zero",
        0x21 => "invalid enum value",
        0x22 => "corrupted storage byte array",
        0x31 => ".pop() on empty array",
        0x32 => "out-of-bounds array access",
        0x41 => "too much memory allocated",
        0x51 => "called zero-initialized internal function pointer",
        _ => "unknown panic code",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `require(false, "Not enough tokens to transfer")`
    const REVERT_HEX: &str = "08c379a00000000000000000000000000000000000000000000000000000000000000020000000000000000000000000000000000000000000000000000000000000001e4e6f7420656e6f75676820746f6b656e7320746f207472616e73666572000000";

    const PANIC_OVERFLOW_HEX: &str =
        "4e487b710000000000000000000000000000000000000000000000000000000000000011";

    #[test]
    fn error_string() {
        let data = hex::decode(REVERT_HEX).unwrap();
        assert_eq!(
            RevertReason::decode(&data),
            Some(RevertReason::Message {
                message: "Not enough tokens to transfer".into()
            })
        );
    }

    #[test]
    fn panic_overflow() {
        let data = hex::decode(PANIC_OVERFLOW_HEX).unwrap();
        let reason = RevertReason::decode(&data).unwrap();
        assert!(matches!(reason, RevertReason::Panic { code: 0x11, .. }));
        assert_eq!(reason.to_string(), "panic 0x11: arithmetic overflow or underflow");
    }

    #[test]
    fn error_string_selector_does_not_decode_panic() {
        let data = hex::decode(PANIC_OVERFLOW_HEX).unwrap();
        assert!(decode_error_string(&data).is_none());
    }

    #[test]
    fn custom_error_kept_raw() {
        let data = vec![0xde, 0xad, 0xbe, 0xef, 0x01];
        let reason = RevertReason::decode(&data).unwrap();
        assert_eq!(reason.custom_selector(), Some([0xde, 0xad, 0xbe, 0xef]));
    }

    #[test]
    fn malformed_error_string_falls_back_to_custom() {
        let data = [ERROR_STRING_SELECTOR.as_slice(), &[0u8; 5]].concat();
        assert!(matches!(
            RevertReason::decode(&data),
            Some(RevertReason::Custom { .. })
        ));
    }

    #[test]
    fn empty_revert_data() {
        assert_eq!(RevertReason::decode(&[]), None);
    }
}
