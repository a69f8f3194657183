use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};
use vmstate_kv::{CacheKvStore, KvStore};
use vmstate_types::{DeclaredType, MemPackage, MemPackageType, Object, ObjectId, PkgId, TypeId};

use crate::alloc::Allocator;
use crate::cache::{CacheMap, LayeredCache};
use crate::error::{StoreError, StoreResult};
use crate::hooks::{NativeFn, NativeResolver, PackageGetter};
use crate::layers::StoreCore;
use crate::traits::Store;

/// Counts reported by [`TransactionStore::commit`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub base_writes: usize,
    pub iavl_writes: usize,
    pub cache_entries: usize,
}

/// A copy-on-write session over a parent store.
///
/// Backing-store writes are buffered in [`CacheKvStore`] wrappers and cache
/// writes in [`LayeredCache`] overlays; reads fall through to the parent.
/// Nothing reaches the parent until [`commit`](Self::commit). Dropping the
/// transaction without committing discards its writes.
pub struct TransactionStore {
    core: StoreCore,
    base: Arc<CacheKvStore>,
    iavl: Arc<CacheKvStore>,
    types: Arc<LayeredCache<TypeId, Arc<DeclaredType>>>,
    packages: Arc<LayeredCache<String, Arc<MemPackage>>>,
    objects: Arc<LayeredCache<ObjectId, Arc<Object>>>,
}

impl TransactionStore {
    pub(crate) fn derive(
        parent: &StoreCore,
        base: Option<Arc<dyn KvStore>>,
        iavl: Option<Arc<dyn KvStore>>,
        alloc: Option<Arc<Allocator>>,
    ) -> Self {
        let base = Arc::new(CacheKvStore::wrap(base.unwrap_or_else(|| parent.base.clone())));
        let iavl = Arc::new(CacheKvStore::wrap(iavl.unwrap_or_else(|| parent.iavl.clone())));
        let types = Arc::new(LayeredCache::over(parent.types.clone()));
        let packages = Arc::new(LayeredCache::over(parent.packages.clone()));
        let objects = Arc::new(LayeredCache::over(parent.objects.clone()));

        debug!("transaction started");
        Self {
            core: StoreCore {
                config: parent.config.clone(),
                alloc: alloc.unwrap_or_else(|| parent.alloc.clone()),
                base: base.clone(),
                iavl: iavl.clone(),
                types: types.clone(),
                packages: packages.clone(),
                objects: objects.clone(),
                hooks: parent.hooks.clone(),
            },
            base,
            iavl,
            types,
            packages,
            objects,
        }
    }

    /// Flush every buffered write into the parent.
    ///
    /// The base buffer is written first, then the iavl buffer, then the
    /// cache overlays. The transaction stays usable afterwards with empty
    /// buffers.
    ///
    /// The two backing stores are not written atomically. If a write fails,
    /// the writes already applied stay in the parent, the rest stay
    /// buffered, and no cache overlay is flushed. Calling `commit` again
    /// resumes from the first unapplied write.
    pub fn commit(&self) -> StoreResult<CommitSummary> {
        let base_writes = self.base.write()?;
        let iavl_writes = self.iavl.write()?;
        let cache_entries = self.types.flush() + self.packages.flush() + self.objects.flush();
        let summary = CommitSummary {
            base_writes,
            iavl_writes,
            cache_entries,
        };
        info!(base_writes, iavl_writes, cache_entries, "transaction committed");
        Ok(summary)
    }

    /// Alias for [`commit`](Self::commit).
    pub fn write(&self) -> StoreResult<CommitSummary> {
        self.commit()
    }

    /// Drop every buffered write.
    pub fn discard(self) {
        let pending = self.pending_writes();
        self.base.discard();
        self.iavl.discard();
        self.types.discard();
        self.packages.discard();
        self.objects.discard();
        debug!(pending, "transaction discarded");
    }

    /// Buffered backing-store writes not yet committed.
    pub fn pending_writes(&self) -> usize {
        self.base.pending() + self.iavl.pending()
    }

    /// The buffered base store.
    pub(crate) fn buffered_base(&self) -> &CacheKvStore {
        &self.base
    }

    /// The buffered iavl store.
    pub(crate) fn buffered_iavl(&self) -> &CacheKvStore {
        &self.iavl
    }

    pub(crate) fn type_overlay(&self) -> &LayeredCache<TypeId, Arc<DeclaredType>> {
        &self.types
    }

    pub(crate) fn package_overlay(&self) -> &LayeredCache<String, Arc<MemPackage>> {
        &self.packages
    }
}

impl Store for TransactionStore {
    fn get_mem_package(&self, path: &str) -> StoreResult<Option<Arc<MemPackage>>> {
        self.core.get_mem_package(path)
    }

    fn add_mem_package(&self, pkg: MemPackage, kind: MemPackageType) -> StoreResult<()> {
        self.core.add_mem_package(pkg, kind)
    }

    fn replace_mem_package(&self, pkg: MemPackage, kind: MemPackageType) -> StoreResult<()> {
        self.core.replace_mem_package(pkg, kind)
    }

    fn get_package(&self, path: &str) -> StoreResult<Option<Arc<MemPackage>>> {
        self.core.get_package(path)
    }

    fn get_type_safe(&self, id: &TypeId) -> StoreResult<Option<Arc<DeclaredType>>> {
        self.core.get_type_safe(id)
    }

    fn set_type(&self, ty: DeclaredType) -> StoreResult<()> {
        self.core.set_type(ty)
    }

    fn get_object(&self, id: &ObjectId) -> StoreResult<Option<Object>> {
        self.core.get_object(id)
    }

    fn set_object(&self, obj: &Object) -> StoreResult<()> {
        self.core.set_object(obj)
    }

    fn del_object(&self, id: &ObjectId) -> StoreResult<bool> {
        self.core.del_object(id)
    }

    fn next_object_id(&self, pkg: &PkgId) -> StoreResult<ObjectId> {
        self.core.next_object_id(pkg)
    }

    fn set_package_getter(&self, _getter: PackageGetter) -> StoreResult<()> {
        Err(StoreError::RootOnly {
            op: "set_package_getter",
        })
    }

    fn set_native_resolver(&self, _resolver: NativeResolver) -> StoreResult<()> {
        Err(StoreError::RootOnly {
            op: "set_native_resolver",
        })
    }

    fn get_native(&self, pkg_path: &str, name: &str) -> Option<NativeFn> {
        self.core.hooks.resolve_native(pkg_path, name)
    }

    fn begin_transaction(
        &self,
        base: Option<Arc<dyn KvStore>>,
        iavl: Option<Arc<dyn KvStore>>,
        alloc: Option<Arc<Allocator>>,
    ) -> TransactionStore {
        TransactionStore::derive(&self.core, base, iavl, alloc)
    }

    fn as_transaction(&self) -> Option<&TransactionStore> {
        Some(self)
    }

    fn cached_types(&self) -> BTreeMap<TypeId, Arc<DeclaredType>> {
        self.types.snapshot()
    }

    fn cached_packages(&self) -> BTreeMap<String, Arc<MemPackage>> {
        self.packages.snapshot()
    }

    fn base_store(&self) -> Arc<dyn KvStore> {
        self.core.base.clone()
    }

    fn iavl_store(&self) -> Arc<dyn KvStore> {
        self.core.iavl.clone()
    }

    fn allocator(&self) -> Arc<Allocator> {
        self.core.alloc.clone()
    }
}

impl std::fmt::Debug for TransactionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionStore")
            .field("pending_writes", &self.pending_writes())
            .field("pending_types", &self.types.pending())
            .field("pending_packages", &self.packages.pending())
            .finish()
    }
}
