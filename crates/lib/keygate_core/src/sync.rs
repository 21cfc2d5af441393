//! Per-key async serialization.
//!
//! Login's session lookup and the following create/update are two separate
//! store operations; `KeyedLocks` serializes them per (user, device) key so
//! two concurrent logins from the same device cannot both take the
//! "no session" branch.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Map of named async mutexes. Keys accumulate until `cleanup` is called.
#[derive(Default)]
pub struct KeyedLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, creating it on first use.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(key.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Drop entries nobody currently holds.
    pub fn cleanup(&self) {
        // A held guard keeps a second Arc clone alive.
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}
