use std::collections::BTreeMap;
use std::iter::Peekable;
use std::ops::Bound;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::error::{KvError, KvResult};
use crate::range::first_in_range;
use crate::traits::{KvIter, KvPair, KvStore};

/// Buffered writes: `Some(value)` is a pending set, `None` a pending delete.
type DirtyMap = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

/// A write-buffering view over another [`KvStore`].
///
/// Reads consult the local buffer first and fall through to the wrapped
/// store. Writes and deletes stay in the buffer until [`write`] flushes them
/// into the wrapped store; dropping the wrapper without writing discards
/// them. Wrappers nest: a `CacheKvStore` can wrap another one.
///
/// [`write`]: CacheKvStore::write
pub struct CacheKvStore {
    parent: Arc<dyn KvStore>,
    dirty: RwLock<DirtyMap>,
}

impl CacheKvStore {
    /// Begin a buffered session over `parent`.
    pub fn wrap(parent: Arc<dyn KvStore>) -> Self {
        Self {
            parent,
            dirty: RwLock::new(BTreeMap::new()),
        }
    }

    /// The wrapped store.
    pub fn parent(&self) -> &Arc<dyn KvStore> {
        &self.parent
    }

    /// Number of buffered sets and deletes.
    pub fn pending(&self) -> usize {
        self.dirty.read().expect("lock poisoned").len()
    }

    /// Flush every buffered write into the wrapped store, in key order.
    ///
    /// Returns the number of writes applied. If the wrapped store fails
    /// part-way, the unapplied writes stay buffered (newer buffered writes to
    /// the same keys win) and the error is returned.
    pub fn write(&self) -> KvResult<usize> {
        let pending = std::mem::take(&mut *self.dirty.write().expect("lock poisoned"));
        let total = pending.len();
        let mut iter = pending.into_iter();

        while let Some((key, value)) = iter.next() {
            let applied = match &value {
                Some(v) => self.parent.set(&key, v),
                None => self.parent.delete(&key).map(|_| ()),
            };
            if let Err(e) = applied {
                let mut dirty = self.dirty.write().expect("lock poisoned");
                for (k, v) in std::iter::once((key, value)).chain(iter) {
                    dirty.entry(k).or_insert(v);
                }
                return Err(e);
            }
        }

        debug!(writes = total, "cache-wrapped store flushed");
        Ok(total)
    }

    /// Drop every buffered write.
    pub fn discard(&self) {
        self.dirty.write().expect("lock poisoned").clear();
    }
}

impl KvStore for CacheKvStore {
    fn get(&self, key: &[u8]) -> KvResult<Option<Vec<u8>>> {
        if let Some(buffered) = self.dirty.read().expect("lock poisoned").get(key) {
            return Ok(buffered.clone());
        }
        self.parent.get(key)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> KvResult<()> {
        if key.is_empty() {
            return Err(KvError::EmptyKey);
        }
        self.dirty
            .write()
            .expect("lock poisoned")
            .insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> KvResult<bool> {
        let existed = self.get(key)?.is_some();
        self.dirty
            .write()
            .expect("lock poisoned")
            .insert(key.to_vec(), None);
        Ok(existed)
    }

    fn iterator<'a>(&'a self, start: &[u8], end: Option<&[u8]>) -> KvIter<'a> {
        Box::new(MergeIter {
            parent: self.parent.iterator(start, end).peekable(),
            dirty: &self.dirty,
            cursor: Bound::Included(start.to_vec()),
            end: end.map(<[u8]>::to_vec),
            peeked: None,
            dirty_done: false,
        })
    }
}

impl std::fmt::Debug for CacheKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheKvStore")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Merges the wrapped store's range with the buffered writes.
///
/// Buffered entries shadow parent entries with the same key; buffered
/// deletes hide them.
struct MergeIter<'a> {
    parent: Peekable<KvIter<'a>>,
    dirty: &'a RwLock<DirtyMap>,
    cursor: Bound<Vec<u8>>,
    end: Option<Vec<u8>>,
    peeked: Option<(Vec<u8>, Option<Vec<u8>>)>,
    dirty_done: bool,
}

impl MergeIter<'_> {
    fn peek_dirty(&mut self) {
        if self.peeked.is_some() || self.dirty_done {
            return;
        }
        let dirty = self.dirty.read().expect("lock poisoned");
        match first_in_range(&dirty, &self.cursor, self.end.as_deref()) {
            Some((k, v)) => {
                let entry = (k.clone(), v.clone());
                drop(dirty);
                self.cursor = Bound::Excluded(entry.0.clone());
                self.peeked = Some(entry);
            }
            None => self.dirty_done = true,
        }
    }
}

impl Iterator for MergeIter<'_> {
    type Item = KvResult<KvPair>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.peek_dirty();

            let parent_key = match self.parent.peek() {
                Some(Ok((k, _))) => Some(k.clone()),
                Some(Err(_)) => None,
                None => None,
            };
            if parent_key.is_none() && matches!(self.parent.peek(), Some(Err(_))) {
                return self.parent.next();
            }

            let take_dirty = match (&parent_key, &self.peeked) {
                (None, None) => return None,
                (Some(_), None) => false,
                (None, Some(_)) => true,
                (Some(pk), Some((dk, _))) => {
                    if dk == pk {
                        // Buffered entry shadows the parent's.
                        self.parent.next();
                        true
                    } else {
                        dk < pk
                    }
                }
            };

            if !take_dirty {
                return self.parent.next();
            }
            if let Some((key, Some(value))) = self.peeked.take() {
                return Some(Ok((key, value)));
            }
            // Buffered delete: skip and keep merging.
        }
    }
}
