//! Bridge deposit relay: forwards deposited tokens to the master contract
//! and releases withdrawals signed by the bridge peers.

use chainbind_abi::{AbiError, ContractAbi};
use std::sync::Arc;

pub const DECLARATIONS: &[&str] = &[
    "constructor(address master)",
    "function initialize(address master)",
    "function sendToMaster(address tokenAddress)",
    "function withdraw(address tokenAddress, uint256 amount, address to, bytes32 txHash, \
     uint8[] v, bytes32[] r, bytes32[] s, address from)",
    "function mintTokensByPeers(address tokenAddress, uint256 amount, address beneficiary, \
     bytes32 txHash, uint8[] v, bytes32[] r, bytes32[] s)",
    "event AddressEvent(address input)",
    "event StringEvent(string input)",
    "event BytesEvent(bytes32 input)",
    "event NumberEvent(uint256 input)",
];

pub fn abi() -> Result<Arc<ContractAbi>, AbiError> {
    static ABI: super::Cell = std::sync::OnceLock::new();
    super::load(&ABI, DECLARATIONS)
}
