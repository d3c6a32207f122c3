//! Per-key write locks
//!
//! Each key maps to its own mutex. Entries are checked out under a single
//! table lock and dropped from the table once nobody holds or waits on them,
//! so the table only holds keys with writes in flight.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

type Entry = Arc<Mutex<()>>;

pub(crate) struct KeyLocks<K> {
    table: Mutex<HashMap<K, Entry>>,
}

/// A checked-out table entry; returns itself to the table on drop
struct Checkout<'a, K: Hash + Eq> {
    locks: &'a KeyLocks<K>,
    key: K,
    entry: Entry,
}

impl<K: Hash + Eq> Drop for Checkout<'_, K> {
    fn drop(&mut self) {
        let mut table = self.locks.table.lock();
        // One reference in the table plus ours: nobody else holds or waits.
        if Arc::strong_count(&self.entry) == 2 {
            table.remove(&self.key);
        }
    }
}

impl<K: Hash + Eq + Clone> KeyLocks<K> {
    pub(crate) fn new() -> Self {
        KeyLocks {
            table: Mutex::new(HashMap::new()),
        }
    }

    /// Run `f` while holding the lock for `key`
    ///
    /// Calls for the same key are serialized; different keys run
    /// independently.
    pub(crate) fn with_key<T>(&self, key: &K, f: impl FnOnce() -> T) -> T {
        let checkout = self.checkout(key);
        let _held = checkout.entry.lock();
        f()
    }

    fn checkout(&self, key: &K) -> Checkout<'_, K> {
        let entry = {
            let mut table = self.table.lock();
            Arc::clone(table.entry(key.clone()).or_default())
        };
        Checkout {
            locks: self,
            key: key.clone(),
            entry,
        }
    }

    /// Number of keys with a holder or waiter
    pub(crate) fn len(&self) -> usize {
        self.table.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_same_key_is_serialized() {
        let locks = Arc::new(KeyLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                thread::spawn(move || {
                    locks.with_key(&"same".to_string(), || {
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(5));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    });
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(locks.len(), 0);
    }

    #[test]
    fn test_different_keys_run_together() {
        let locks = Arc::new(KeyLocks::new());
        let barrier = Arc::new(Barrier::new(2));

        // Both threads must be inside their critical sections at once to
        // pass the barrier; a shared lock would deadlock here.
        let handles: Vec<_> = ["a", "b"]
            .into_iter()
            .map(|key| {
                let locks = Arc::clone(&locks);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    locks.with_key(&key.to_string(), || {
                        barrier.wait();
                    });
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_entries_released_after_use() {
        let locks = KeyLocks::new();
        for i in 0..100 {
            let value = locks.with_key(&i, || i * 2);
            assert_eq!(value, i * 2);
        }
        assert_eq!(locks.len(), 0);
    }

    #[test]
    fn test_entry_released_after_panic() {
        let locks = Arc::new(KeyLocks::new());
        let cloned = Arc::clone(&locks);
        let result = thread::spawn(move || {
            cloned.with_key(&"boom".to_string(), || panic!("writer failed"));
        })
        .join();

        assert!(result.is_err());
        assert_eq!(locks.len(), 0);
        assert_eq!(locks.with_key(&"boom".to_string(), || 7), 7);
    }
}
