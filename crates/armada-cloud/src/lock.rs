//! Per-object serialization of lifecycle operations

use crate::id::RemoteObjectId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;

/// Async mutexes keyed by remote object ID
///
/// Two operations on the same object never run concurrently within one
/// process; operations on different objects are independent.
#[derive(Debug, Default)]
pub struct ObjectLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ObjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`
    pub async fn acquire(&self, id: &RemoteObjectId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // entries nobody holds or waits on
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(id.lock_key()).or_default().clone()
        };
        lock.lock_owned().await
    }
}
