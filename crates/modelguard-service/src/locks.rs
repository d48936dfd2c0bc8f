//! Per-artifact mutual exclusion
//!
//! Record mutations (link resolution, promotion, update arbitration) are
//! read-modify-write sequences against the metadata store. Holding the lock
//! for the target id serializes them within the process. Guards are never
//! nested, so lock ordering does not arise.

use modelguard_core::ArtifactId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of per-id locks
#[derive(Debug, Clone, Default)]
pub struct ArtifactLocks {
    inner: Arc<Mutex<HashMap<ArtifactId, Arc<Mutex<()>>>>>,
}

impl ArtifactLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`
    pub async fn acquire(&self, id: ArtifactId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.lock().await;
            // Drop entries nobody holds or waits on
            locks.retain(|held, lock| *held == id || Arc::strong_count(lock) > 1);
            locks.entry(id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of ids currently tracked
    pub async fn tracked(&self) -> usize {
        self.inner.lock().await.len()
    }
}
