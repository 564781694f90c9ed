//! Named locks.
//!
//! Some DataArts calls (batch delete, publish) must not run concurrently
//! against the same workspace. Callers take a lock keyed by the collection
//! they touch; unrelated keys never block each other.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct MutexKV {
    store: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl MutexKV {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the lock named `key`, creating it on first use.
    ///
    /// The lock is released when the returned guard is dropped. Locks nobody
    /// holds or waits for are pruned here, so the map only keeps busy keys.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut store = self.store.lock().await;
            store.retain(|_, m| Arc::strong_count(m) > 1);
            Arc::clone(store.entry(key.to_string()).or_default())
        };
        tracing::debug!(key, "locking");
        let guard = mutex.lock_owned().await;
        tracing::debug!(key, "locked");
        guard
    }
}
