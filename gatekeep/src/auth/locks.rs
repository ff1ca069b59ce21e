//! Per-identity serialization of mutations.

use crate::identity::IdentityId;
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Entries are pruned once the map grows past this many idle locks
const PRUNE_THRESHOLD: usize = 1024;

/// Registry of async mutexes keyed by identity id.
///
/// Every read-modify-write of an identity holds its guard, so two commands on
/// the same identity never interleave their updates.
#[derive(Default)]
pub struct IdentityLocks {
    locks: Mutex<HashMap<IdentityId, Arc<AsyncMutex<()>>>>,
}

impl IdentityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`
    pub async fn lock(&self, id: IdentityId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            if locks.len() >= PRUNE_THRESHOLD {
                locks.retain(|_, l| Arc::strong_count(l) > 1);
            }
            locks.entry(id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Ids with a lock entry, held or idle
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
