use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

const CLEANUP_THRESHOLD: usize = 1024;

/// Async mutex handed out per key. Two reconcile attempts for the same
/// payment, or a reconcile and a subscription read-modify-write for the same
/// user, serialize here; unrelated keys never contend.
#[derive(Default)]
pub struct KeyedLock {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.locks.lock().await;
            if map.len() > CLEANUP_THRESHOLD {
                // Entries nobody holds can be dropped; holders keep their Arc alive.
                map.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            Arc::clone(
                map.entry(key.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }
}
