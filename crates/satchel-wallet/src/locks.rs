//! Per-address send serialization.
//!
//! Two sends from the same address must not pick the same UTXOs, so each
//! address gets its own async mutex. Sends from different addresses never
//! contend.

use std::sync::Arc;

use bitcoin::Address;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lazily created async mutex per address.
#[derive(Debug, Default)]
pub struct AddressLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl AddressLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, address: &Address) -> Arc<Mutex<()>> {
        // The map guard is released before any await.
        Arc::clone(self.locks.entry(address.to_string()).or_default().value())
    }

    /// Wait for exclusive use of `address`. Released when the guard drops.
    pub async fn lock(&self, address: &Address) -> OwnedMutexGuard<()> {
        self.slot(address).lock_owned().await
    }

    /// Take the lock only if no send for `address` is in flight.
    pub fn try_lock(&self, address: &Address) -> Option<OwnedMutexGuard<()>> {
        self.slot(address).try_lock_owned().ok()
    }

    pub fn is_locked(&self, address: &Address) -> bool {
        self.locks
            .get(&address.to_string())
            .is_some_and(|m| m.try_lock().is_err())
    }
}
