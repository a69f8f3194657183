use std::collections::BTreeMap;
use std::sync::Arc;

use vmstate_kv::KvStore;
use vmstate_types::{
    DeclaredType, MemPackage, MemPackageType, Object, ObjectId, PkgId, TypeId,
};

use crate::alloc::Allocator;
use crate::error::{StoreError, StoreResult};
use crate::hooks::{NativeFn, NativeResolver, PackageGetter};
use crate::prefix::PathIter;
use crate::transaction::TransactionStore;

/// The VM's view of persistent state: packages, declared types, and objects.
///
/// Implemented by [`RootStore`](crate::root::RootStore) and
/// [`TransactionStore`]. All implementations must satisfy these invariants:
/// - Every read consults the in-memory caches first and falls through to
///   the backing stores on a miss; what is loaded is cached.
/// - A missing package is `Ok(None)`; a missing declared type is an error.
/// - Writes made through a transaction are invisible to its parent until
///   the transaction commits.
/// - Resolver hooks are configured on the root only, and only before a
///   transaction is derived from it.
pub trait Store: Send + Sync {
    // ----- Packages -----

    /// Load the package stored at `path`.
    fn get_mem_package(&self, path: &str) -> StoreResult<Option<Arc<MemPackage>>>;

    /// Store a new package. `kind` is a filter the package's own type must
    /// pass. Fails if `path` is already taken.
    fn add_mem_package(&self, pkg: MemPackage, kind: MemPackageType) -> StoreResult<()>;

    /// Store a package, overwriting any package at the same path.
    fn replace_mem_package(&self, pkg: MemPackage, kind: MemPackageType) -> StoreResult<()>;

    /// Like [`get_mem_package`](Self::get_mem_package), but asks the
    /// package getter hook on a miss and stores what it returns.
    fn get_package(&self, path: &str) -> StoreResult<Option<Arc<MemPackage>>>;

    // ----- Types -----

    /// Load a declared type. Fails with [`StoreError::TypeNotFound`] if it
    /// was never registered.
    fn get_type(&self, id: &TypeId) -> StoreResult<Arc<DeclaredType>> {
        self.get_type_safe(id)?
            .ok_or_else(|| StoreError::TypeNotFound(id.clone()))
    }

    /// Load a declared type, `None` if it was never registered.
    fn get_type_safe(&self, id: &TypeId) -> StoreResult<Option<Arc<DeclaredType>>>;

    fn set_type(&self, ty: DeclaredType) -> StoreResult<()>;

    // ----- Objects -----

    /// Load an object by id. The returned copy is detached: changes are
    /// persisted only through [`set_object`](Self::set_object).
    fn get_object(&self, id: &ObjectId) -> StoreResult<Option<Object>>;

    fn set_object(&self, obj: &Object) -> StoreResult<()>;

    /// Delete an object. Returns `true` if it existed.
    fn del_object(&self, id: &ObjectId) -> StoreResult<bool>;

    /// Allocate a fresh object id in package `pkg`.
    fn next_object_id(&self, pkg: &PkgId) -> StoreResult<ObjectId>;

    // ----- Hooks -----

    fn set_package_getter(&self, getter: PackageGetter) -> StoreResult<()>;

    fn set_native_resolver(&self, resolver: NativeResolver) -> StoreResult<()>;

    fn get_native(&self, pkg_path: &str, name: &str) -> Option<NativeFn>;

    // ----- Prefix search -----

    /// Lazily enumerate package paths matching `prefix`.
    ///
    /// An empty prefix yields every standard-library path, then every user
    /// path. A prefix beginning with `_` searches the standard-library
    /// namespace (`"_"` matches all of it, `"_/a"` the names starting with
    /// `a`). Any other prefix matches user paths.
    fn find_paths_by_prefix(&self, prefix: &[u8]) -> PathIter {
        PathIter::new(self.base_store(), prefix)
    }

    /// Feed matching paths to `f` until it returns `false`.
    fn for_each_path_by_prefix(
        &self,
        prefix: &[u8],
        f: &mut dyn FnMut(&str) -> bool,
    ) -> StoreResult<()> {
        for path in self.find_paths_by_prefix(prefix) {
            if !f(&path?) {
                break;
            }
        }
        Ok(())
    }

    // ----- Transactions -----

    /// Derive a transaction. `base` and `iavl` replace this store's backing
    /// stores as the transaction's parents; `None` uses this store's own.
    /// `alloc` replaces the allocator.
    fn begin_transaction(
        &self,
        base: Option<Arc<dyn KvStore>>,
        iavl: Option<Arc<dyn KvStore>>,
        alloc: Option<Arc<Allocator>>,
    ) -> TransactionStore;

    /// This store as a transaction, if it is one.
    fn as_transaction(&self) -> Option<&TransactionStore> {
        None
    }

    // ----- Accessors -----

    /// Snapshot of the type cache.
    fn cached_types(&self) -> BTreeMap<TypeId, Arc<DeclaredType>>;

    /// Snapshot of the package cache.
    fn cached_packages(&self) -> BTreeMap<String, Arc<MemPackage>>;

    fn base_store(&self) -> Arc<dyn KvStore>;

    fn iavl_store(&self) -> Arc<dyn KvStore>;

    fn allocator(&self) -> Arc<Allocator>;
}
