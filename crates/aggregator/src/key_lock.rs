//! KeyLocks - per-key async locks serialising check-then-write

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::lock;

struct Slot {
    cell: Arc<AsyncMutex<()>>,
    /// holders plus waiters, including cancelled-but-not-yet-dropped ones
    users: usize,
}

/// Keyed async locks; entries are dropped once no holder or waiter remains
pub struct KeyLocks<K = String> {
    locks: Mutex<HashMap<K, Slot>>,
}

impl<K> Default for KeyLocks<K> {
    fn default() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }
}

impl<K> std::fmt::Debug for KeyLocks<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyLocks")
            .field("keys", &lock(&self.locks).len())
            .finish()
    }
}

impl<K: Eq + Hash + Clone> KeyLocks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`
    ///
    /// Dropping the returned future while it waits releases its claim on
    /// the entry.
    pub async fn acquire(&self, key: K) -> KeyGuard<'_, K> {
        let cell = {
            let mut locks = lock(&self.locks);
            let slot = locks.entry(key.clone()).or_insert_with(|| Slot {
                cell: Arc::new(AsyncMutex::new(())),
                users: 0,
            });
            slot.users += 1;
            Arc::clone(&slot.cell)
        };

        // registered before the await so cancellation still runs Drop
        let mut guard = KeyGuard {
            owner: self,
            key,
            held: None,
        };
        guard.held = Some(cell.lock_owned().await);
        guard
    }

    /// Number of keys currently held or awaited
    pub fn len(&self) -> usize {
        lock(&self.locks).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive access to one key; released on drop
pub struct KeyGuard<'a, K: Eq + Hash + Clone = String> {
    owner: &'a KeyLocks<K>,
    key: K,
    held: Option<OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash + Clone> KeyGuard<'_, K> {
    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<K: Eq + Hash + Clone> Drop for KeyGuard<'_, K> {
    fn drop(&mut self) {
        self.held.take();
        let mut locks = lock(&self.owner.locks);
        if let Some(slot) = locks.get_mut(&self.key) {
            slot.users -= 1;
            if slot.users == 0 {
                locks.remove(&self.key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_entry_removed_after_release() {
        let locks = KeyLocks::new();
        {
            let guard = locks.acquire("a@x.com".to_string()).await;
            assert_eq!(guard.key(), "a@x.com");
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_same_key_is_serialised() {
        let locks = Arc::new(KeyLocks::new());
        let inside = Arc::new(AtomicBool::new(false));

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let locks = Arc::clone(&locks);
            let inside = Arc::clone(&inside);
            tasks.push(tokio::spawn(async move {
                let _guard = locks.acquire("same".to_string()).await;
                assert!(!inside.swap(true, Ordering::SeqCst));
                tokio::time::sleep(Duration::from_millis(5)).await;
                inside.store(false, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let locks = KeyLocks::new();
        let _a = locks.acquire("a").await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.acquire("b")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_waiter_leaves_no_entry() {
        let locks = KeyLocks::new();
        let held = locks.acquire("a").await;

        let mut waiter = Box::pin(locks.acquire("a"));
        let timed_out = tokio::time::timeout(Duration::from_millis(20), &mut waiter).await;
        assert!(timed_out.is_err());

        // holder leaves first, then the waiter is abandoned without being polled
        drop(held);
        assert_eq!(locks.len(), 1);
        drop(waiter);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_tuple_keys() {
        let locks: KeyLocks<(String, String)> = KeyLocks::new();
        let _a = locks
            .acquire(("memory://a".to_string(), "x@y.com".to_string()))
            .await;
        let other_store = tokio::time::timeout(
            Duration::from_millis(100),
            locks.acquire(("memory://b".to_string(), "x@y.com".to_string())),
        )
        .await;
        assert!(other_store.is_ok());
    }
}
