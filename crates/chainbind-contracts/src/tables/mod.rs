//! Built-in ABI tables.
//!
//! Each table is a list of human-readable declarations parsed once into a
//! shared [`ContractAbi`]. Adding a contract means adding a table, not code.

use chainbind_abi::{AbiError, ContractAbi};
use std::sync::{Arc, OnceLock};

pub mod erc20;
pub mod proxy;
pub mod relay;
pub mod relay_registry;

type Cell = OnceLock<Result<Arc<ContractAbi>, AbiError>>;

fn load(cell: &'static Cell, declarations: &[&str]) -> Result<Arc<ContractAbi>, AbiError> {
    cell.get_or_init(|| ContractAbi::from_signatures(declarations).map(Arc::new))
        .clone()
}

/// Every built-in table by name.
pub fn all() -> Result<Vec<(&'static str, Arc<ContractAbi>)>, AbiError> {
    Ok(vec![
        ("erc20", erc20::abi()?),
        ("proxy", proxy::abi()?),
        ("relay", relay::abi()?),
        ("relay_registry", relay_registry::abi()?),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_table_parses() {
        for (name, abi) in all().unwrap() {
            assert!(!abi.functions().is_empty(), "{name} has no functions");
        }
    }

    #[test]
    fn tables_are_shared() {
        assert!(Arc::ptr_eq(&erc20::abi().unwrap(), &erc20::abi().unwrap()));
    }
}
