use std::sync::Arc;

use tracing::{debug, info, warn};
use vmstate_kv::KvStore;
use vmstate_types::{
    DeclaredType, MemPackage, MemPackageType, Object, ObjectId, PkgId, TypeId,
};

use crate::alloc::Allocator;
use crate::cache::CacheMap;
use crate::codec;
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::hooks::ResolverHooks;
use crate::keys;

pub(crate) type TypeCache = dyn CacheMap<TypeId, Arc<DeclaredType>>;
pub(crate) type PackageCache = dyn CacheMap<String, Arc<MemPackage>>;
pub(crate) type ObjectCache = dyn CacheMap<ObjectId, Arc<Object>>;

/// Everything a store reads and writes through.
///
/// The root store and transactions differ only in which backing stores and
/// caches they plug in here.
#[derive(Clone)]
pub(crate) struct StoreCore {
    pub config: StoreConfig,
    pub alloc: Arc<Allocator>,
    pub base: Arc<dyn KvStore>,
    pub iavl: Arc<dyn KvStore>,
    pub types: Arc<TypeCache>,
    pub packages: Arc<PackageCache>,
    pub objects: Arc<ObjectCache>,
    pub hooks: Arc<ResolverHooks>,
}

impl StoreCore {
    // -----------------------------------------------------------------------
    // Packages
    // -----------------------------------------------------------------------

    pub fn get_mem_package(&self, path: &str) -> StoreResult<Option<Arc<MemPackage>>> {
        let path_key = path.to_string();
        if let Some(pkg) = self.packages.get(&path_key) {
            return Ok(Some(pkg));
        }
        let Some(bytes) = self.iavl.get(&keys::package_key(path))? else {
            return Ok(None);
        };
        let pkg = codec::decode_package(&bytes)?;
        self.alloc.allocate_mem_package(&pkg)?;
        let pkg = Arc::new(pkg);
        self.packages.set(path_key, pkg.clone());
        debug!(path, files = pkg.files.len(), "package loaded");
        Ok(Some(pkg))
    }

    pub fn add_mem_package(&self, pkg: MemPackage, kind: MemPackageType) -> StoreResult<()> {
        self.check_package(&pkg, kind)?;
        if self.packages.get(&pkg.path).is_some() || self.iavl.has(&keys::package_key(&pkg.path))? {
            return Err(StoreError::PackageExists(pkg.path));
        }
        self.write_package(pkg)
    }

    pub fn replace_mem_package(&self, pkg: MemPackage, kind: MemPackageType) -> StoreResult<()> {
        self.check_package(&pkg, kind)?;
        // A path is indexed in exactly one namespace.
        let stale = keys::index_key(&pkg.path, !pkg.is_stdlib());
        if self.base.delete(&stale)? {
            debug!(path = %pkg.path, "package moved between index namespaces");
        }
        self.write_package(pkg)
    }

    pub fn get_package(&self, path: &str) -> StoreResult<Option<Arc<MemPackage>>> {
        if let Some(pkg) = self.get_mem_package(path)? {
            return Ok(Some(pkg));
        }
        let Some(pkg) = self.hooks.fetch_package(path) else {
            return Ok(None);
        };
        if pkg.path != path {
            warn!(path, returned = %pkg.path, "package getter returned a different path");
            return Ok(None);
        }
        self.check_package(&pkg, MemPackageType::AnyAll)?;
        debug!(path, "package produced by getter");
        self.write_package(pkg)?;
        Ok(self.packages.get(&path.to_string()))
    }

    fn check_package(&self, pkg: &MemPackage, kind: MemPackageType) -> StoreResult<()> {
        pkg.validate()?;
        if !kind.accepts(pkg.kind) {
            return Err(StoreError::PackageTypeMismatch {
                path: pkg.path.clone(),
                filter: kind,
                actual: pkg.kind,
            });
        }
        Ok(())
    }

    fn write_package(&self, pkg: MemPackage) -> StoreResult<()> {
        self.alloc.allocate_mem_package(&pkg)?;
        let bytes = codec::encode_package(&pkg)?;
        self.iavl.set(&keys::package_key(&pkg.path), &bytes)?;
        self.base
            .set(&keys::index_key(&pkg.path, pkg.is_stdlib()), pkg.path.as_bytes())?;
        info!(path = %pkg.path, kind = %pkg.kind, files = pkg.files.len(), "package stored");
        self.packages.set(pkg.path.clone(), Arc::new(pkg));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Types
    // -----------------------------------------------------------------------

    pub fn get_type_safe(&self, id: &TypeId) -> StoreResult<Option<Arc<DeclaredType>>> {
        if let Some(ty) = self.types.get(id) {
            return Ok(Some(ty));
        }
        let Some(bytes) = self.base.get(&keys::type_key(id))? else {
            return Ok(None);
        };
        let ty = codec::decode_type(&bytes)?;
        self.alloc.allocate_type()?;
        let ty = Arc::new(ty);
        self.types.set(id.clone(), ty.clone());
        debug!(id = %id, "type loaded");
        Ok(Some(ty))
    }

    pub fn set_type(&self, ty: DeclaredType) -> StoreResult<()> {
        let id = ty.id();
        self.base.set(&keys::type_key(&id), &codec::encode_type(&ty)?)?;
        debug!(id = %id, "type stored");
        self.types.set(id, Arc::new(ty));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Objects
    // -----------------------------------------------------------------------

    pub fn get_object(&self, id: &ObjectId) -> StoreResult<Option<Object>> {
        if let Some(obj) = self.objects.get(id) {
            return Ok(Some((*obj).clone()));
        }
        let Some(bytes) = self.base.get(&keys::object_key(id))? else {
            return Ok(None);
        };
        if self.config.verify_object_hashes {
            self.verify_object(id, &bytes)?;
        }
        let obj = codec::decode_object(&bytes)?;
        self.alloc.allocate_object(&obj)?;
        if self.config.cache_objects {
            self.objects.set(*id, Arc::new(obj.clone()));
        }
        debug!(id = %id.short(), kind = %obj.kind(), "object loaded");
        Ok(Some(obj))
    }

    fn verify_object(&self, id: &ObjectId, bytes: &[u8]) -> StoreResult<()> {
        let computed = codec::object_hash(bytes);
        let expected = self.iavl.get(&keys::object_hash_key(id))?;
        if expected.as_deref() == Some(computed.as_slice()) {
            return Ok(());
        }
        let expected = expected.map(hex::encode).unwrap_or_else(|| "none".to_string());
        let computed = hex::encode(computed);
        warn!(id = %id.short(), %expected, %computed, "object hash mismatch");
        Err(StoreError::HashMismatch {
            id: *id,
            expected,
            computed,
        })
    }

    pub fn set_object(&self, obj: &Object) -> StoreResult<()> {
        let id = obj.id();
        if id.is_null() {
            return Err(StoreError::NullObjectId);
        }
        let bytes = codec::encode_object(obj)?;
        self.base.set(&keys::object_key(&id), &bytes)?;
        self.iavl
            .set(&keys::object_hash_key(&id), &codec::object_hash(&bytes))?;
        if self.config.cache_objects {
            self.objects.set(id, Arc::new(obj.clone()));
        }
        debug!(id = %id.short(), kind = %obj.kind(), bytes = bytes.len(), "object stored");
        Ok(())
    }

    pub fn del_object(&self, id: &ObjectId) -> StoreResult<bool> {
        let existed = self.base.delete(&keys::object_key(id))?;
        self.iavl.delete(&keys::object_hash_key(id))?;
        self.objects.delete(id);
        Ok(existed)
    }

    pub fn next_object_id(&self, pkg: &PkgId) -> StoreResult<ObjectId> {
        let key = keys::time_key(pkg);
        let last = match self.base.get(&key)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    StoreError::Codec(format!("object counter is {} bytes, want 8", bytes.len()))
                })?;
                u64::from_be_bytes(raw)
            }
            None => 0,
        };
        let time = last.checked_add(1).ok_or(StoreError::IdsExhausted(*pkg))?;
        self.base.set(&key, &time.to_be_bytes())?;
        Ok(ObjectId::new(*pkg, time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SharedCache;
    use vmstate_kv::InMemoryKvStore;
    use vmstate_types::{Block, MemFile, Type, Value};

    fn core_over(base: Arc<InMemoryKvStore>, iavl: Arc<InMemoryKvStore>) -> StoreCore {
        StoreCore {
            config: StoreConfig::default(),
            alloc: Arc::new(Allocator::unlimited()),
            base,
            iavl,
            types: Arc::new(SharedCache::<TypeId, Arc<DeclaredType>>::new()),
            packages: Arc::new(SharedCache::<String, Arc<MemPackage>>::new()),
            objects: Arc::new(SharedCache::<ObjectId, Arc<Object>>::new()),
            hooks: Arc::new(ResolverHooks::new()),
        }
    }

    fn fresh() -> (StoreCore, Arc<InMemoryKvStore>, Arc<InMemoryKvStore>) {
        let base = Arc::new(InMemoryKvStore::new());
        let iavl = Arc::new(InMemoryKvStore::new());
        (core_over(base.clone(), iavl.clone()), base, iavl)
    }

    fn math() -> MemPackage {
        MemPackage::new(
            MemPackageType::StdlibAll,
            "math",
            "math",
            vec![MemFile::new("math.gno", "package math")],
        )
    }

    #[test]
    fn package_records_and_index() {
        let (core, base, iavl) = fresh();
        core.add_mem_package(math(), MemPackageType::AnyAll).unwrap();
        assert!(iavl.has(b"pkg:math").unwrap());
        assert_eq!(base.get(b"pkgidx:_/math").unwrap(), Some(b"math".to_vec()));
    }

    #[test]
    fn filter_and_duplicate_checks() {
        let (core, _, _) = fresh();
        let err = core
            .add_mem_package(math(), MemPackageType::UserProd)
            .unwrap_err();
        assert!(matches!(err, StoreError::PackageTypeMismatch { .. }));

        core.add_mem_package(math(), MemPackageType::StdlibAll).unwrap();
        let err = core
            .add_mem_package(math(), MemPackageType::StdlibAll)
            .unwrap_err();
        assert!(matches!(err, StoreError::PackageExists(p) if p == "math"));

        let mut updated = math();
        updated.files[0].body = "package math // v2".into();
        core.replace_mem_package(updated.clone(), MemPackageType::AnyAll)
            .unwrap();
        assert_eq!(*core.get_mem_package("math").unwrap().unwrap(), updated);
    }

    #[test]
    fn loads_are_cached_and_charged() {
        let (writer, base, iavl) = fresh();
        writer.add_mem_package(math(), MemPackageType::AnyAll).unwrap();
        writer
            .set_type(DeclaredType::new("io", "Reader", Type::BOOL))
            .unwrap();

        let reader = core_over(base, iavl);
        assert!(reader.get_mem_package("math").unwrap().is_some());
        assert!(reader.get_type_safe(&TypeId::from("io.Reader")).unwrap().is_some());
        assert!(reader.alloc.used() > 0);
        assert!(reader.packages.get(&"math".to_string()).is_some());
        assert!(reader.types.get(&TypeId::from("io.Reader")).is_some());
    }

    #[test]
    fn object_store_and_verify() {
        let (core, base, iavl) = fresh();
        let id = core.next_object_id(&PkgId::from_path("p")).unwrap();
        assert_eq!(id.time, 1);
        let mut block = Block::new(vec![Value::Int(1)]);
        block.info.id = id;
        core.set_object(&block.into()).unwrap();

        // A fresh core over the same backing stores must hit the disk path.
        let cold = core_over(base.clone(), iavl);
        assert_eq!(cold.get_object(&id).unwrap().unwrap().id(), id);

        base.set(&keys::object_key(&id), &codec::encode_object(&Block::default().into()).unwrap())
            .unwrap();
        cold.objects.delete(&id);
        assert!(matches!(
            cold.get_object(&id),
            Err(StoreError::HashMismatch { .. })
        ));
    }

    #[test]
    fn null_id_is_rejected() {
        let (core, _, _) = fresh();
        assert!(matches!(
            core.set_object(&Block::default().into()),
            Err(StoreError::NullObjectId)
        ));
    }

    #[test]
    fn object_counter_is_per_package() {
        let (core, _, _) = fresh();
        let a = PkgId::from_path("a");
        let b = PkgId::from_path("b");
        assert_eq!(core.next_object_id(&a).unwrap().time, 1);
        assert_eq!(core.next_object_id(&a).unwrap().time, 2);
        assert_eq!(core.next_object_id(&b).unwrap().time, 1);
    }

    #[test]
    fn exhausted_counter_is_an_error() {
        let (core, base, _) = fresh();
        let pkg = PkgId::from_path("a");
        base.set(&keys::time_key(&pkg), &u64::MAX.to_be_bytes())
            .unwrap();
        let err = core.next_object_id(&pkg).unwrap_err();
        assert!(matches!(err, StoreError::IdsExhausted(p) if p == pkg));
        assert_eq!(
            base.get(&keys::time_key(&pkg)).unwrap(),
            Some(u64::MAX.to_be_bytes().to_vec())
        );
    }
}
