//! Keyed memoization for derived subsets and aggregates.
//!
//! Retention is unbounded: keys come from small slider/categorical parameter
//! spaces, and the whole cache is dropped when the dataset is replaced.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

type Slot<V> = Arc<OnceLock<Arc<V>>>;

/// Hit/miss counters, for logs and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Thread-safe memo table with at most one computation in flight per key.
///
/// The map lock is held only while locating a key's slot. The computation
/// itself runs inside the slot's [`OnceLock`], so a second caller for the same
/// key blocks until the first result is available and then shares it, while
/// callers for other keys proceed independently.
pub struct MemoizationCache<K, V> {
    slots: Mutex<HashMap<K, Slot<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> Default for MemoizationCache<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> MemoizationCache<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Completed value for `key`, if any. Does not wait for in-flight work.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.slots.lock().get(key).and_then(|slot| slot.get().cloned())
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub fn put(&self, key: K, value: V) -> Arc<V> {
        let value = Arc::new(value);
        let slot = OnceLock::new();
        let _ = slot.set(Arc::clone(&value));
        self.slots.lock().insert(key, Arc::new(slot));
        value
    }

    /// Return the cached value for `key`, computing it with `compute` on a miss.
    pub fn get_or_compute<F>(&self, key: K, compute: F) -> Arc<V>
    where
        F: FnOnce() -> V,
    {
        let slot = {
            let mut slots = self.slots.lock();
            Arc::clone(slots.entry(key).or_default())
        };

        let mut computed = false;
        let value = slot.get_or_init(|| {
            computed = true;
            Arc::new(compute())
        });

        if computed {
            self.misses.fetch_add(1, Ordering::Relaxed);
        } else {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        Arc::clone(value)
    }

    /// Drop every entry. In-flight computations finish but are not retained.
    pub fn invalidate(&self) {
        self.slots.lock().clear();
    }

    /// Number of completed entries.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|slot| slot.get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;
    use std::time::Duration;

    #[test]
    fn second_lookup_is_a_hit() {
        let cache: MemoizationCache<&str, u32> = MemoizationCache::new();
        let a = cache.get_or_compute("k", || 7);
        let b = cache.get_or_compute("k", || unreachable!("recomputed"));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn put_then_get() {
        let cache: MemoizationCache<u8, String> = MemoizationCache::default();
        assert!(cache.get(&1).is_none());
        cache.put(1, "one".to_string());
        assert_eq!(cache.get(&1).as_deref().map(String::as_str), Some("one"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn invalidate_forces_recompute() {
        let cache: MemoizationCache<u8, u8> = MemoizationCache::new();
        cache.get_or_compute(1, || 1);
        cache.invalidate();
        assert!(cache.is_empty());
        let v = cache.get_or_compute(1, || 2);
        assert_eq!(*v, 2);
    }

    #[test]
    fn concurrent_requests_compute_once() {
        let cache: MemoizationCache<&str, usize> = MemoizationCache::new();
        let calls = AtomicUsize::new(0);
        let barrier = Barrier::new(8);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    barrier.wait();
                    let v = cache.get_or_compute("shared", || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(20));
                        42
                    });
                    assert_eq!(*v, 42);
                });
            }
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().misses, 1);
        assert_eq!(cache.stats().hits, 7);
    }
}
