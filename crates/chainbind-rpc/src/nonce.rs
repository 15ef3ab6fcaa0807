//! Per-account nonce serialization.
//!
//! Each account has one async slot holding its next nonce. A submission
//! holds the slot's lock across fetch → sign → send, so two writes from
//! the same account can never be signed with the same nonce. Different
//! accounts never contend.

use alloy_primitives::Address;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slot = Arc<AsyncMutex<Option<u64>>>;

#[derive(Debug, Default)]
pub struct NonceManager {
    slots: Mutex<HashMap<Address, Slot>>,
}

impl NonceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the account's slot. Held until the returned guard is dropped.
    pub async fn lock(&self, account: Address) -> NonceGuard {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(account).or_default())
        };
        NonceGuard {
            account,
            guard: slot.lock_owned().await,
        }
    }

    /// Drop the cached nonce so the next submission refetches it.
    pub async fn reset(&self, account: Address) {
        self.lock(account).await.invalidate();
    }

    /// Cached next nonce, if any. Waits for in-flight submissions.
    pub async fn cached(&self, account: Address) -> Option<u64> {
        self.lock(account).await.cached()
    }
}

/// Exclusive access to one account's nonce.
#[derive(Debug)]
pub struct NonceGuard {
    account: Address,
    guard: OwnedMutexGuard<Option<u64>>,
}

impl NonceGuard {
    pub fn account(&self) -> Address {
        self.account
    }

    pub fn cached(&self) -> Option<u64> {
        *self.guard
    }

    pub fn set(&mut self, nonce: u64) {
        *self.guard = Some(nonce);
    }

    /// Record a successful submission with `nonce`.
    pub fn advance(&mut self, nonce: u64) {
        *self.guard = Some(nonce.saturating_add(1));
    }

    pub fn invalidate(&mut self) {
        *self.guard = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn advance_and_invalidate() {
        let mgr = NonceManager::new();
        let a = Address::repeat_byte(1);
        {
            let mut g = mgr.lock(a).await;
            assert_eq!(g.cached(), None);
            g.set(4);
            g.advance(4);
        }
        assert_eq!(mgr.cached(a).await, Some(5));
        mgr.reset(a).await;
        assert_eq!(mgr.cached(a).await, None);
    }

    #[tokio::test]
    async fn same_account_is_serialized() {
        let mgr = Arc::new(NonceManager::new());
        let a = Address::repeat_byte(1);
        let guard = mgr.lock(a).await;

        let other = Arc::clone(&mgr);
        let waiter = tokio::spawn(async move { other.lock(a).await.cached() });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        assert_eq!(waiter.await.unwrap(), None);
    }

    #[tokio::test]
    async fn accounts_do_not_contend() {
        let mgr = NonceManager::new();
        let _a = mgr.lock(Address::repeat_byte(1)).await;
        let b = tokio::time::timeout(Duration::from_millis(50), mgr.lock(Address::repeat_byte(2))).await;
        assert!(b.is_ok());
    }
}
