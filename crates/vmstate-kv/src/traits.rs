use crate::error::KvResult;
use crate::range::prefix_end;

/// A key/value pair yielded by iteration.
pub type KvPair = (Vec<u8>, Vec<u8>);

/// Lazy ascending iterator over a key range.
pub type KvIter<'a> = Box<dyn Iterator<Item = KvResult<KvPair>> + 'a>;

/// Ordered, byte-keyed backing store.
///
/// All implementations must satisfy these invariants:
/// - `iterator(start, end)` yields keys in ascending byte order, starting at
///   `start` (inclusive) and stopping before `end` (exclusive, `None` means
///   unbounded). A range with `start >= end` is empty, never an error.
/// - A value written with `set` is returned by every later `get` and
///   iteration until overwritten or deleted.
/// - All I/O errors are propagated, never silently ignored.
pub trait KvStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    fn get(&self, key: &[u8]) -> KvResult<Option<Vec<u8>>>;

    /// Write (create or overwrite) the value under `key`.
    fn set(&self, key: &[u8], value: &[u8]) -> KvResult<()>;

    /// Delete `key`. Returns `true` if the key existed.
    fn delete(&self, key: &[u8]) -> KvResult<bool>;

    /// Check whether `key` exists.
    fn has(&self, key: &[u8]) -> KvResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Iterate `[start, end)` in ascending key order.
    fn iterator<'a>(&'a self, start: &[u8], end: Option<&[u8]>) -> KvIter<'a>;

    /// Iterate every key that begins with `prefix`.
    fn prefix_iterator<'a>(&'a self, prefix: &[u8]) -> KvIter<'a> {
        let end = prefix_end(prefix);
        self.iterator(prefix, end.as_deref())
    }
}
