//! Owned upgradeability proxy.
//!
//! Calls to the implementation go through the proxy address with the
//! implementation's table; this table only covers the proxy's own admin
//! surface.

use chainbind_abi::{AbiError, ContractAbi};
use std::sync::Arc;

pub const DECLARATIONS: &[&str] = &[
    "function implementation() view returns (address)",
    "function proxyOwner() view returns (address)",
    "function upgradeTo(address implementation)",
    "function upgradeToAndCall(address implementation, bytes data) payable",
    "function transferProxyOwnership(address newOwner)",
    "event Upgraded(address indexed implementation)",
    "event ProxyOwnershipTransferred(address previousOwner, address newOwner)",
];

pub fn abi() -> Result<Arc<ContractAbi>, AbiError> {
    static ABI: super::Cell = std::sync::OnceLock::new();
    super::load(&ABI, DECLARATIONS)
}
