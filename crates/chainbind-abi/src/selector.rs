//! Function selector and event topic derivation.
//!
//! Both are keccak256 of the canonical signature string, e.g.:
//!   keccak256("transfer(address,uint256)")[..4] → 0xa9059cbb
//!   keccak256("Transfer(address,address,uint256)")
//!   → 0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef
//!
//! Signatures compute their selector / topic once at construction, so the
//! functions taking a signature here are lookups, not hashes.

use alloy_primitives::B256;
use tiny_keccak::{Hasher, Keccak};

use crate::signature::{EventSignature, FunctionSignature};
use crate::types::AbiType;

/// keccak256 of arbitrary bytes.
pub fn keccak256(data: impl AsRef<[u8]>) -> B256 {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(data.as_ref());
    hasher.finalize(&mut output);
    B256::from(output)
}

/// `name(t1,t2,...)` with canonical type spellings and tuples expanded.
pub fn canonical_signature(name: &str, types: &[AbiType]) -> String {
    let parts: Vec<String> = types.iter().map(AbiType::to_string).collect();
    format!("{name}({})", parts.join(","))
}

/// First four bytes of keccak256 of a canonical signature string.
pub fn selector_of(canonical: &str) -> [u8; 4] {
    let hash = keccak256(canonical.as_bytes());
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&hash[..4]);
    selector
}

/// keccak256 of a canonical event signature string.
pub fn topic_of(canonical: &str) -> B256 {
    keccak256(canonical.as_bytes())
}

pub fn function_selector(sig: &FunctionSignature) -> [u8; 4] {
    sig.selector()
}

pub fn event_topic(sig: &EventSignature) -> B256 {
    sig.topic()
}

/// `0x`-prefixed lowercase hex of a selector.
pub fn selector_hex(selector: [u8; 4]) -> String {
    format!("0x{}", hex::encode(selector))
}
