//! Registry of relays and the withdrawal addresses whitelisted per relay.

use chainbind_abi::{AbiError, ContractAbi};
use std::sync::Arc;

pub const DECLARATIONS: &[&str] = &[
    "function initialize(address owner)",
    "function addNewRelayAddress(address relay, address[] whiteList)",
    "function getWhiteListByRelay(address relay) view returns (address[])",
    "function isWhiteListed(address relay, address who) view returns (bool)",
    "event AddNewRelay(address indexed relayAddress, address[] indexed whiteList)",
];

pub fn abi() -> Result<Arc<ContractAbi>, AbiError> {
    static ABI: super::Cell = std::sync::OnceLock::new();
    super::load(&ABI, DECLARATIONS)
}
