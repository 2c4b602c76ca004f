//! Per-key serialization of read-modify-write transactions.
//!
//! All mutations to shared persisted state (the captured-page list, each
//! conversation's history, the insight singleton) route through
//! [`KeyedMutationQueue::with_lock`]. Two handlers racing on the same
//! logical resource would otherwise both read a snapshot, modify it
//! locally, and write back, silently discarding one of the updates.
//!
//! Waiters on the same key run in submission order (tokio's mutex hands
//! the lock out FIFO); distinct keys proceed fully in parallel. A key
//! with no pending waiters holds no entry in the map.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex;

#[derive(Default)]
struct KeySlot {
    lock: Arc<Mutex<()>>,
    waiters: usize,
}

#[derive(Default)]
pub struct KeyedMutationQueue {
    slots: StdMutex<HashMap<String, KeySlot>>,
}

impl KeyedMutationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `op` while holding the exclusive lock for `key`.
    ///
    /// The closure should read the current persisted state, compute the
    /// new value, and write it back; a second transaction on the same key
    /// observes the first one's result, never a stale snapshot.
    pub async fn with_lock<T, F, Fut>(&self, key: &str, op: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let lock = {
            let mut slots = self.slots.lock().expect("queue map poisoned");
            let slot = slots.entry(key.to_string()).or_default();
            slot.waiters += 1;
            Arc::clone(&slot.lock)
        };

        let guard = lock.lock().await;
        let result = op().await;
        drop(guard);

        let mut slots = self.slots.lock().expect("queue map poisoned");
        if let Some(slot) = slots.get_mut(key) {
            slot.waiters -= 1;
            if slot.waiters == 0 {
                slots.remove(key);
            }
        }

        result
    }

    #[cfg(test)]
    fn pending_keys(&self) -> usize {
        self.slots.lock().expect("queue map poisoned").len()
    }
}
