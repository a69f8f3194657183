//! Ordered key-value backing stores for the VM state store.
//!
//! The object store persists everything through the [`KvStore`] trait: a
//! byte-keyed, byte-valued map with ordered range iteration. Transaction
//! isolation is built from one primitive, [`CacheKvStore`], a write buffer
//! layered over any other `KvStore` whose writes reach the wrapped store only
//! when [`CacheKvStore::write`] is called.
//!
//! # Storage Backends
//!
//! - [`InMemoryKvStore`] -- `BTreeMap`-based store for tests and embedding,
//!   with a Merkle root over its contents
//! - [`CacheKvStore`] -- buffered view over another store
//!
//! # Design Rules
//!
//! 1. Iteration is ascending by raw key bytes over `[start, end)`.
//! 2. Iterators are lazy: each step re-seeks from the last key returned, so
//!    no lock is held between steps and a consumer may stop at any time.
//! 3. Empty keys are rejected on write.
//! 4. The store never interprets keys or values.

pub mod cache;
pub mod error;
pub mod memory;
pub mod merkle;
pub mod range;
pub mod traits;

pub use cache::CacheKvStore;
pub use error::{KvError, KvResult};
pub use memory::InMemoryKvStore;
pub use merkle::{leaf_hash, merkle_root};
pub use range::prefix_end;
pub use traits::{KvIter, KvPair, KvStore};
