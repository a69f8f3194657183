use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// An in-process memo table shared between a store and its transactions.
pub trait CacheMap<K, V>: Send + Sync {
    fn get(&self, key: &K) -> Option<V>;

    fn set(&self, key: K, value: V);

    fn delete(&self, key: &K);

    /// Sorted snapshot of every visible entry.
    fn snapshot(&self) -> BTreeMap<K, V>;
}

/// The root store's caches: a plain map behind a lock.
pub struct SharedCache<K, V> {
    entries: RwLock<BTreeMap<K, V>>,
}

impl<K: Ord, V> SharedCache<K, V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Ord, V> Default for SharedCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> CacheMap<K, V> for SharedCache<K, V>
where
    K: Ord + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> Option<V> {
        self.entries.read().expect("lock poisoned").get(key).cloned()
    }

    fn set(&self, key: K, value: V) {
        self.entries
            .write()
            .expect("lock poisoned")
            .insert(key, value);
    }

    fn delete(&self, key: &K) {
        self.entries.write().expect("lock poisoned").remove(key);
    }

    fn snapshot(&self) -> BTreeMap<K, V> {
        self.entries.read().expect("lock poisoned").clone()
    }
}

/// A transaction's view of a parent cache.
///
/// Reads check the overlay and fall through to the parent. Writes and
/// deletes stay in the overlay until [`flush`](Self::flush).
pub struct LayeredCache<K, V> {
    parent: Arc<dyn CacheMap<K, V>>,
    overlay: RwLock<BTreeMap<K, Option<V>>>,
}

impl<K: Ord, V> LayeredCache<K, V> {
    pub fn over(parent: Arc<dyn CacheMap<K, V>>) -> Self {
        Self {
            parent,
            overlay: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of buffered writes and deletes.
    pub fn pending(&self) -> usize {
        self.overlay.read().expect("lock poisoned").len()
    }

    /// Apply every buffered write to the parent and clear the overlay.
    /// Returns the number of entries applied.
    pub fn flush(&self) -> usize {
        let overlay = std::mem::take(&mut *self.overlay.write().expect("lock poisoned"));
        let count = overlay.len();
        for (key, value) in overlay {
            match value {
                Some(v) => self.parent.set(key, v),
                None => self.parent.delete(&key),
            }
        }
        count
    }

    pub fn discard(&self) {
        self.overlay.write().expect("lock poisoned").clear();
    }
}

impl<K, V> CacheMap<K, V> for LayeredCache<K, V>
where
    K: Ord + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> Option<V> {
        if let Some(buffered) = self.overlay.read().expect("lock poisoned").get(key) {
            return buffered.clone();
        }
        self.parent.get(key)
    }

    fn set(&self, key: K, value: V) {
        self.overlay
            .write()
            .expect("lock poisoned")
            .insert(key, Some(value));
    }

    fn delete(&self, key: &K) {
        self.overlay
            .write()
            .expect("lock poisoned")
            .insert(key.clone(), None);
    }

    fn snapshot(&self) -> BTreeMap<K, V> {
        let mut merged = self.parent.snapshot();
        for (key, value) in self.overlay.read().expect("lock poisoned").iter() {
            match value {
                Some(v) => {
                    merged.insert(key.clone(), v.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        merged
    }
}
