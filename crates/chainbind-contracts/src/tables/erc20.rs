//! ERC-20 with the mintable, burnable and ownable extensions.

use chainbind_abi::{AbiError, ContractAbi};
use std::sync::Arc;

pub const DECLARATIONS: &[&str] = &[
    "function name() view returns (string)",
    "function symbol() view returns (string)",
    "function decimals() view returns (uint8)",
    "function totalSupply() view returns (uint256)",
    "function balanceOf(address owner) view returns (uint256)",
    "function allowance(address owner, address spender) view returns (uint256)",
    "function transfer(address to, uint256 value) returns (bool)",
    "function approve(address spender, uint256 value) returns (bool)",
    "function transferFrom(address from, address to, uint256 value) returns (bool)",
    "function increaseAllowance(address spender, uint256 addedValue) returns (bool)",
    "function decreaseAllowance(address spender, uint256 subtractedValue) returns (bool)",
    // mintable / burnable
    "function mint(address to, uint256 value) returns (bool)",
    "function mintTokens(address beneficiary, uint256 amount)",
    "function burn(uint256 value)",
    "function burnFrom(address from, uint256 value)",
    "function INITIAL_SUPPLY() view returns (uint256)",
    // ownable
    "function owner() view returns (address)",
    "function isOwner() view returns (bool)",
    "function renounceOwnership()",
    "function transferOwnership(address newOwner)",
    "event Transfer(address indexed from, address indexed to, uint256 value)",
    "event Approval(address indexed owner, address indexed spender, uint256 value)",
    "event OwnershipTransferred(address indexed previousOwner, address indexed newOwner)",
];

pub fn abi() -> Result<Arc<ContractAbi>, AbiError> {
    static ABI: super::Cell = std::sync::OnceLock::new();
    super::load(&ABI, DECLARATIONS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainbind_abi::selector::selector_hex;

    #[test]
    fn standard_selectors() {
        let abi = abi().unwrap();
        let sel = |name: &str| selector_hex(abi.function(name).unwrap().selector());
        assert_eq!(sel("transfer"), "0xa9059cbb");
        assert_eq!(sel("approve"), "0x095ea7b3");
        assert_eq!(sel("transferFrom"), "0x23b872dd");
        assert_eq!(sel("balanceOf"), "0x70a08231");
        assert_eq!(sel("totalSupply"), "0x18160ddd");
    }

    #[test]
    fn transfer_topic() {
        let abi = abi().unwrap();
        assert_eq!(
            format!("{:#x}", abi.event("Transfer").unwrap().topic()),
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }
}
