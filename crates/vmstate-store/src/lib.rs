//! Transactional, cached object store for a contract VM.
//!
//! This crate holds the VM's persistent state: source packages, declared
//! types, and runtime objects. It sits on two ordered key-value backing
//! stores (`base` for metadata and object bytes, `iavl` for Merkle-verified
//! package records and object hashes) and keeps in-process caches in front
//! of them.
//!
//! # Stores
//!
//! All stores implement the [`Store`] trait:
//!
//! - [`RootStore`] -- long-lived; writes go straight to the backing stores
//! - [`TransactionStore`] -- copy-on-write session over a parent store;
//!   nothing reaches the parent until [`TransactionStore::commit`]
//!
//! # Objects
//!
//! Composite values live in arenas keyed by [`ObjectId`](vmstate_types::ObjectId):
//! a [`Heap`] before persistence, a store afterwards. Values crossing an
//! arena boundary are deep-cloned by [`DeepCloner`], which preserves shared
//! sub-graphs and cycles and charges an [`Allocator`] for every object.
//!
//! # Design Rules
//!
//! 1. Reads hit the caches first and fall through to the backing stores.
//! 2. A missing package is `Ok(None)`; a missing declared type is an error.
//! 3. Resolver hooks are set on the root only, before any transaction is
//!    derived.
//! 4. Transactions may nest; a commit flushes exactly one level.
//! 5. Commits of sibling transactions are not coordinated. Callers
//!    serialize them.

pub mod alloc;
pub mod cache;
pub mod clone;
pub mod codec;
pub mod config;
pub mod error;
pub mod heap;
pub mod hooks;
pub mod keys;
mod layers;
pub mod prefix;
pub mod root;
pub mod seed;
pub mod traits;
pub mod transaction;

pub use alloc::Allocator;
pub use cache::{CacheMap, LayeredCache, SharedCache};
pub use clone::{
    deep_clone_object, deep_clone_value, transfer_value, DeepCloner, ObjectSink, ObjectSource,
    StoreSink, StoreSource,
};
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use heap::Heap;
pub use hooks::{NativeFn, NativeResolver, PackageGetter, ResolverHooks};
pub use prefix::PathIter;
pub use root::RootStore;
pub use seed::{copy_from_cached_store, SeedReport};
pub use traits::Store;
pub use transaction::{CommitSummary, TransactionStore};
