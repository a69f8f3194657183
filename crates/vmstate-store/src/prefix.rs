use std::collections::VecDeque;
use std::sync::Arc;

use tracing::warn;
use vmstate_kv::{prefix_end, KvStore};

use crate::error::StoreResult;
use crate::keys::{index_search_key, INDEX_PREFIX, STDLIB_NAMESPACE};

/// One contiguous range of index keys.
#[derive(Debug)]
struct Scan {
    start: Vec<u8>,
    end: Option<Vec<u8>>,
}

impl Scan {
    fn prefix(prefix: Vec<u8>) -> Self {
        let end = prefix_end(&prefix);
        Self { start: prefix, end }
    }
}

/// Lazy iterator over package paths in the prefix index.
///
/// Paths come out in backing-store key order. Each step re-seeks the
/// backing store from just past the previous key, so nothing is held
/// between steps and the caller may stop at any point with `take` or by
/// dropping the iterator. A backing-store error ends the iteration.
pub struct PathIter {
    store: Arc<dyn KvStore>,
    scans: VecDeque<Scan>,
}

impl PathIter {
    pub fn new(store: Arc<dyn KvStore>, prefix: &[u8]) -> Self {
        Self {
            store,
            scans: plan(prefix).into(),
        }
    }
}

/// Key ranges to visit, in order, for `prefix`.
fn plan(prefix: &[u8]) -> Vec<Scan> {
    if !prefix.is_empty() {
        return vec![Scan::prefix(index_search_key(prefix))];
    }
    // Standard library first, then user paths on either side of the
    // reserved `_` byte.
    vec![
        Scan::prefix(index_search_key(STDLIB_NAMESPACE.as_bytes())),
        Scan {
            start: INDEX_PREFIX.to_vec(),
            end: Some(index_search_key(b"_")),
        },
        Scan {
            start: index_search_key(&[b'_' + 1]),
            end: prefix_end(INDEX_PREFIX),
        },
    ]
}

impl Iterator for PathIter {
    type Item = StoreResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let scan = self.scans.front_mut()?;
            let found = self
                .store
                .iterator(&scan.start, scan.end.as_deref())
                .next();

            let (mut key, value) = match found {
                None => {
                    self.scans.pop_front();
                    continue;
                }
                Some(Err(e)) => {
                    self.scans.clear();
                    return Some(Err(e.into()));
                }
                Some(Ok(pair)) => pair,
            };

            let path = String::from_utf8(value);
            if path.is_err() {
                warn!(
                    key = %String::from_utf8_lossy(&key),
                    "skipping index record with non-UTF-8 path"
                );
            }
            // Smallest key strictly after `key`.
            key.push(0);
            scan.start = key;

            if let Ok(path) = path {
                return Some(Ok(path));
            }
        }
    }
}

impl std::fmt::Debug for PathIter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathIter")
            .field("scans_left", &self.scans.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::index_key;
    use vmstate_kv::InMemoryKvStore;

    fn index(stdlib: &[&str], user: &[&str]) -> Arc<InMemoryKvStore> {
        let store = Arc::new(InMemoryKvStore::new());
        for p in stdlib {
            store.set(&index_key(p, true), p.as_bytes()).unwrap();
        }
        for p in user {
            store.set(&index_key(p, false), p.as_bytes()).unwrap();
        }
        // Unrelated keys on both sides of the index range.
        store.set(b"oid:x", b"-").unwrap();
        store.set(b"tid:x", b"-").unwrap();
        store.set(b"pkg:zzz", b"-").unwrap();
        store
    }

    fn paths(store: &Arc<InMemoryKvStore>, prefix: &[u8]) -> Vec<String> {
        PathIter::new(store.clone(), prefix)
            .map(Result::unwrap)
            .collect()
    }

    #[test]
    fn empty_prefix_orders_stdlib_first() {
        // "Zed.org" sorts before "_", "a.org" after it.
        let store = index(&["os", "fmt"], &["a.org/x", "Zed.org/y"]);
        assert_eq!(
            paths(&store, b""),
            vec!["fmt", "os", "Zed.org/y", "a.org/x"]
        );
    }

    #[test]
    fn namespaced_and_user_prefixes() {
        let store = index(&["os", "fmt"], &["a.org/x"]);
        assert_eq!(paths(&store, b"_"), vec!["fmt", "os"]);
        assert_eq!(paths(&store, b"_/o"), vec!["os"]);
        assert_eq!(paths(&store, b"a."), vec!["a.org/x"]);
        assert!(paths(&store, b"o").is_empty());
    }

    #[test]
    fn edge_byte_prefixes_are_empty() {
        let store = index(&["os"], &["a.org/x"]);
        assert!(paths(&store, &[0xFF]).is_empty());
        assert!(paths(&store, &[0x00]).is_empty());
    }

    #[test]
    fn iteration_is_lazy() {
        let store = index(&[], &["a/1", "a/2", "a/3"]);
        let mut iter = PathIter::new(store.clone(), b"a/");
        assert_eq!(iter.next().unwrap().unwrap(), "a/1");
        // A record added behind the cursor is not revisited; one ahead is seen.
        store.set(&index_key("a/0", false), b"a/0").unwrap();
        store.set(&index_key("a/25", false), b"a/25").unwrap();
        let rest: Vec<_> = iter.map(Result::unwrap).collect();
        assert_eq!(rest, vec!["a/2", "a/25", "a/3"]);
    }

    #[test]
    fn corrupt_records_are_skipped() {
        let store = index(&[], &["a/1", "a/3"]);
        store.set(&index_key("a/2", false), &[0xC3, 0x28]).unwrap();
        assert_eq!(paths(&store, b"a/"), vec!["a/1", "a/3"]);
    }
}
