//! # chainbind-contracts
//!
//! One generic [`Contract`] handle drives every contract; what differs per
//! contract is only its ABI table.
//!
//! ```ignore
//! let invoker = Arc::new(Invoker::new(transport, InvokerConfig::default()).with_signer(signer));
//! let token = Contract::new(token_address, tables::erc20::abi()?, invoker);
//! let balance = token.call("balanceOf", &[AbiValue::Address(holder)]).await?;
//! let receipt = token
//!     .transact("transfer", &[AbiValue::Address(to), AbiValue::uint256(10u64)], SendOptions::default())
//!     .await?;
//! let transfers = token.receipt_events("Transfer", &receipt)?;
//! ```

pub mod contract;
pub mod tables;

pub use contract::{Contract, EventSubscription, SendOptions};
