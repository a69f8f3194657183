use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::RwLock;

use crate::error::{KvError, KvResult};
use crate::merkle::{leaf_hash, merkle_root};
use crate::range::first_in_range;
use crate::traits::{KvIter, KvPair, KvStore};

/// In-memory, `BTreeMap`-based key-value store.
///
/// Intended for tests and embedding. All entries are held in memory behind a
/// `RwLock` for safe concurrent access. Values are cloned on read/write.
pub struct InMemoryKvStore {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl InMemoryKvStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }

    /// Remove all entries from the store.
    pub fn clear(&self) {
        self.entries.write().expect("lock poisoned").clear();
    }

    /// Sorted snapshot of every entry.
    pub fn entries(&self) -> Vec<KvPair> {
        self.entries
            .read()
            .expect("lock poisoned")
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Merkle root over every entry in key order.
    ///
    /// Two stores with identical contents always have the same root; an
    /// empty store has the all-zero root.
    pub fn root_hash(&self) -> [u8; 32] {
        let map = self.entries.read().expect("lock poisoned");
        let leaves: Vec<[u8; 32]> = map.iter().map(|(k, v)| leaf_hash(k, v)).collect();
        merkle_root(&leaves)
    }
}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for InMemoryKvStore {
    fn get(&self, key: &[u8]) -> KvResult<Option<Vec<u8>>> {
        let map = self.entries.read().expect("lock poisoned");
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> KvResult<()> {
        if key.is_empty() {
            return Err(KvError::EmptyKey);
        }
        let mut map = self.entries.write().expect("lock poisoned");
        map.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> KvResult<bool> {
        let mut map = self.entries.write().expect("lock poisoned");
        Ok(map.remove(key).is_some())
    }

    fn iterator<'a>(&'a self, start: &[u8], end: Option<&[u8]>) -> KvIter<'a> {
        Box::new(MemRangeIter {
            store: self,
            cursor: Bound::Included(start.to_vec()),
            end: end.map(<[u8]>::to_vec),
        })
    }
}

impl std::fmt::Debug for InMemoryKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len();
        f.debug_struct("InMemoryKvStore")
            .field("key_count", &count)
            .finish()
    }
}

/// Cursor-based range iterator: re-seeks under a short read lock per step.
struct MemRangeIter<'a> {
    store: &'a InMemoryKvStore,
    cursor: Bound<Vec<u8>>,
    end: Option<Vec<u8>>,
}

impl Iterator for MemRangeIter<'_> {
    type Item = KvResult<KvPair>;

    fn next(&mut self) -> Option<Self::Item> {
        let map = self.store.entries.read().expect("lock poisoned");
        let (key, value) = first_in_range(&map, &self.cursor, self.end.as_deref())?;
        let pair = (key.clone(), value.clone());
        drop(map);
        self.cursor = Bound::Excluded(pair.0.clone());
        Some(Ok(pair))
    }
}
