use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;
use vmstate_kv::KvStore;
use vmstate_types::{DeclaredType, MemPackage, MemPackageType, Object, ObjectId, PkgId, TypeId};

use crate::alloc::Allocator;
use crate::cache::{CacheMap, SharedCache};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::hooks::{NativeFn, NativeResolver, PackageGetter, ResolverHooks};
use crate::layers::StoreCore;
use crate::traits::Store;
use crate::transaction::TransactionStore;

/// The long-lived store at the bottom of every transaction stack.
///
/// Writes go straight to the backing stores. The root owns the caches that
/// every derived transaction reads through, and the only writable handle to
/// the resolver hooks.
pub struct RootStore {
    core: StoreCore,
    types: Arc<SharedCache<TypeId, Arc<DeclaredType>>>,
    packages: Arc<SharedCache<String, Arc<MemPackage>>>,
    derived: AtomicBool,
}

impl RootStore {
    /// Create a root store over `base` and `iavl`. Without an allocator the
    /// budget is unlimited.
    pub fn new(
        alloc: Option<Arc<Allocator>>,
        base: Arc<dyn KvStore>,
        iavl: Arc<dyn KvStore>,
    ) -> Self {
        let config = StoreConfig::default();
        let alloc = alloc.unwrap_or_else(|| config.allocator());
        Self::build(config, alloc, base, iavl)
    }

    /// Create a root store with an explicit configuration.
    pub fn with_config(config: StoreConfig, base: Arc<dyn KvStore>, iavl: Arc<dyn KvStore>) -> Self {
        let alloc = config.allocator();
        Self::build(config, alloc, base, iavl)
    }

    fn build(
        config: StoreConfig,
        alloc: Arc<Allocator>,
        base: Arc<dyn KvStore>,
        iavl: Arc<dyn KvStore>,
    ) -> Self {
        let types: Arc<SharedCache<TypeId, Arc<DeclaredType>>> = Arc::new(SharedCache::new());
        let packages: Arc<SharedCache<String, Arc<MemPackage>>> = Arc::new(SharedCache::new());
        let objects: Arc<SharedCache<ObjectId, Arc<Object>>> = Arc::new(SharedCache::new());
        Self {
            core: StoreCore {
                config,
                alloc,
                base,
                iavl,
                types: types.clone(),
                packages: packages.clone(),
                objects,
                hooks: Arc::new(ResolverHooks::new()),
            },
            types,
            packages,
            derived: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.core.config
    }

    /// Whether a transaction has been derived from this store.
    pub fn is_derived(&self) -> bool {
        self.derived.load(Ordering::Acquire)
    }

    /// Number of cached declared types.
    pub fn cached_type_count(&self) -> usize {
        self.types.len()
    }

    /// Number of cached packages.
    pub fn cached_package_count(&self) -> usize {
        self.packages.len()
    }

    fn check_configurable(&self, op: &'static str) -> StoreResult<()> {
        if self.is_derived() {
            return Err(StoreError::ConfigAfterDerive { op });
        }
        Ok(())
    }
}

impl Store for RootStore {
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

    fn set_package_getter(&self, getter: PackageGetter) -> StoreResult<()> {
        self.check_configurable("set_package_getter")?;
        self.core.hooks.set_package_getter(getter);
        Ok(())
    }

    fn set_native_resolver(&self, resolver: NativeResolver) -> StoreResult<()> {
        self.check_configurable("set_native_resolver")?;
        self.core.hooks.set_native_resolver(resolver);
        Ok(())
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
        if !self.derived.swap(true, Ordering::AcqRel) {
            debug!("root store configuration frozen");
        }
        TransactionStore::derive(&self.core, base, iavl, alloc)
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

impl std::fmt::Debug for RootStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootStore")
            .field("types", &self.types.len())
            .field("packages", &self.packages.len())
            .field("derived", &self.is_derived())
            .field("hooks", &self.core.hooks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmstate_kv::InMemoryKvStore;
    use vmstate_types::{MemFile, Type, Value};

    fn store() -> (RootStore, Arc<InMemoryKvStore>) {
        let kv = Arc::new(InMemoryKvStore::new());
        (RootStore::new(None, kv.clone(), kv.clone()), kv)
    }

    fn package(kind: MemPackageType, path: &str) -> MemPackage {
        let name = path.rsplit('/').next().unwrap_or(path);
        MemPackage::new(
            kind,
            name,
            path,
            vec![MemFile::new(format!("{name}.gno"), format!("package {name}"))],
        )
    }

    fn find(store: &RootStore, prefix: &[u8], limit: usize) -> Vec<String> {
        let mut out = Vec::new();
        store
            .for_each_path_by_prefix(prefix, &mut |path: &str| {
                if out.len() >= limit {
                    return false;
                }
                out.push(path.to_string());
                true
            })
            .unwrap();
        out
    }

    // -----------------------------------------------------------------------
    // Packages and types
    // -----------------------------------------------------------------------

    #[test]
    fn missing_package_is_none() {
        let (store, _) = store();
        assert!(store.get_mem_package("p/x").unwrap().is_none());
        assert!(store.get_package("p/x").unwrap().is_none());
    }

    #[test]
    fn missing_type_names_the_id() {
        let (store, _) = store();
        let err = store.get_type(&TypeId::from("gno.vm/t/hello.A")).unwrap_err();
        assert_eq!(err.to_string(), "unexpected type with id gno.vm/t/hello.A");
        assert!(store
            .get_type_safe(&TypeId::from("gno.vm/t/hello.A"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn types_round_trip_through_a_fresh_root() {
        let (store, kv) = store();
        store
            .set_type(DeclaredType::new("io", "Reader", Type::BOOL))
            .unwrap();
        assert_eq!(store.cached_type_count(), 1);

        let reopened = RootStore::new(None, kv.clone(), kv);
        let ty = reopened.get_type(&TypeId::from("io.Reader")).unwrap();
        assert_eq!(ty.base, Type::BOOL);
        assert_eq!(reopened.cached_type_count(), 1);
    }

    #[test]
    fn package_getter_fills_misses() {
        let (store, _) = store();
        store
            .set_package_getter(Arc::new(|path: &str| {
                (path == "gno.land/p/demo/avl").then(|| package(MemPackageType::UserProd, path))
            }))
            .unwrap();

        assert!(store.get_mem_package("gno.land/p/demo/avl").unwrap().is_none());
        let pkg = store.get_package("gno.land/p/demo/avl").unwrap().unwrap();
        assert_eq!(pkg.name, "avl");
        assert!(store.get_mem_package("gno.land/p/demo/avl").unwrap().is_some());
        assert!(store.get_package("gno.land/p/demo/other").unwrap().is_none());
    }

    #[test]
    fn native_resolver_is_consulted() {
        let (store, _) = store();
        assert!(store.get_native("math", "Abs").is_none());
        store
            .set_native_resolver(Arc::new(|pkg: &str, name: &str| {
                let f: NativeFn = Arc::new(|args: &[Value]| args.to_vec());
                (pkg == "math" && name == "Abs").then_some(f)
            }))
            .unwrap();
        let abs = store.get_native("math", "Abs").unwrap();
        assert_eq!(abs(&[Value::Int(1)]), vec![Value::Int(1)]);
    }

    #[test]
    fn configuration_freezes_after_derive() {
        let (store, _) = store();
        store.set_package_getter(Arc::new(|_: &str| None)).unwrap();
        let _tx = store.begin_transaction(None, None, None);
        assert!(store.is_derived());

        let err = store
            .set_package_getter(Arc::new(|_: &str| None))
            .unwrap_err();
        assert!(matches!(err, StoreError::ConfigAfterDerive { op: "set_package_getter" }));
        assert!(matches!(
            store.set_native_resolver(Arc::new(|_: &str, _: &str| None)),
            Err(StoreError::ConfigAfterDerive { .. })
        ));
    }

    #[test]
    fn allocation_budget_applies_to_loads() {
        let kv = Arc::new(InMemoryKvStore::new());
        let writer = RootStore::new(None, kv.clone(), kv.clone());
        writer
            .add_mem_package(package(MemPackageType::StdlibAll, "math"), MemPackageType::AnyAll)
            .unwrap();

        let reader = RootStore::with_config(StoreConfig::with_max_alloc(16), kv.clone(), kv);
        assert!(matches!(
            reader.get_mem_package("math"),
            Err(StoreError::OutOfMemory { .. })
        ));
        assert_eq!(reader.allocator().used(), 0);
    }

    // -----------------------------------------------------------------------
    // Prefix search
    // -----------------------------------------------------------------------

    const STDLIBS: [&str; 5] = ["abricot", "balloon", "call", "dingdong", "gnocchi"];
    const PKGS: [&str; 3] = [
        "fruits.org/t/abricot",
        "fruits.org/t/abricot/fraise",
        "fruits.org/t/fraise",
    ];

    fn fruit_store() -> RootStore {
        let (store, _) = store();
        for lib in STDLIBS {
            store
                .add_mem_package(package(MemPackageType::StdlibAll, lib), MemPackageType::StdlibAll)
                .unwrap();
        }
        for pkg in PKGS {
            store
                .add_mem_package(package(MemPackageType::UserProd, pkg), MemPackageType::UserProd)
                .unwrap();
        }
        store
    }

    #[test]
    fn find_by_prefix_cases() {
        let store = fruit_store();
        let all: Vec<&str> = STDLIBS.iter().chain(PKGS.iter()).copied().collect();

        let cases: Vec<(Vec<u8>, usize, Vec<&str>)> = vec![
            (b"".to_vec(), 100, all),
            (b"fruits.org".to_vec(), 100, PKGS.to_vec()),
            (
                b"fruits.org/t/abricot".to_vec(),
                100,
                vec!["fruits.org/t/abricot", "fruits.org/t/abricot/fraise"],
            ),
            (
                b"fruits.org/t/abricot/".to_vec(),
                100,
                vec!["fruits.org/t/abricot/fraise"],
            ),
            (b"fruits".to_vec(), 100, PKGS.to_vec()),
            (b"_".to_vec(), 100, STDLIBS.to_vec()),
            (b"_/a".to_vec(), 100, vec!["abricot"]),
            // Edge bytes must not fail.
            (vec![0xFF], 100, vec![]),
            (vec![0x00], 100, vec![]),
            (b"_".to_vec(), 0, vec![]),
            (b"_".to_vec(), 2, STDLIBS[..2].to_vec()),
        ];

        for (prefix, limit, expected) in cases {
            assert_eq!(
                find(&store, &prefix, limit),
                expected,
                "prefix {:?} limit {}",
                String::from_utf8_lossy(&prefix),
                limit
            );
        }
    }

    #[test]
    fn reserved_namespace_scenario() {
        let (store, _) = store();
        for lib in ["alpha", "beta"] {
            store
                .add_mem_package(package(MemPackageType::StdlibProd, lib), MemPackageType::AnyAll)
                .unwrap();
        }
        store
            .add_mem_package(
                package(MemPackageType::UserProd, "proj.org/t/widget"),
                MemPackageType::AnyAll,
            )
            .unwrap();

        assert_eq!(find(&store, b"_", 100), vec!["alpha", "beta"]);
        assert_eq!(find(&store, b"proj.org", 100), vec!["proj.org/t/widget"]);
    }

    #[test]
    fn replace_across_namespaces_keeps_one_index_record() {
        let (store, _) = store();
        store
            .add_mem_package(package(MemPackageType::UserProd, "math"), MemPackageType::AnyAll)
            .unwrap();
        store
            .replace_mem_package(package(MemPackageType::StdlibAll, "math"), MemPackageType::AnyAll)
            .unwrap();
        assert_eq!(find(&store, b"", 100), vec!["math"]);
        assert_eq!(find(&store, b"_", 100), vec!["math"]);
        assert!(find(&store, b"m", 100).is_empty());

        store
            .replace_mem_package(package(MemPackageType::UserAll, "math"), MemPackageType::AnyAll)
            .unwrap();
        assert_eq!(find(&store, b"", 100), vec!["math"]);
        assert!(find(&store, b"_", 100).is_empty());
        assert_eq!(
            store.get_mem_package("math").unwrap().unwrap().kind,
            MemPackageType::UserAll
        );
    }

    #[test]
    fn path_iter_takes_from_the_front() {
        let store = fruit_store();
        let first: Vec<String> = store
            .find_paths_by_prefix(b"")
            .take(6)
            .map(Result::unwrap)
            .collect();
        assert_eq!(first[..5], STDLIBS.map(String::from));
        assert_eq!(first[5], PKGS[0]);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use vmstate_kv::InMemoryKvStore;
    use vmstate_types::MemFile;

    proptest! {
        /// The empty prefix lists sorted stdlib paths, then sorted user paths.
        #[test]
        fn empty_prefix_is_stdlib_then_user(
            stdlib in prop::collection::btree_set("[a-z]{1,6}", 0..6),
            user in prop::collection::btree_set("[a-z]{1,4}\\.org/[a-z]{1,4}", 0..6),
        ) {
            let kv = Arc::new(InMemoryKvStore::new());
            let store = RootStore::new(None, kv.clone(), kv);
            for path in &stdlib {
                let pkg = MemPackage::new(MemPackageType::StdlibAll, "lib", path.as_str(), vec![MemFile::new("a.gno", "")]);
                store.add_mem_package(pkg, MemPackageType::AnyAll).unwrap();
            }
            for path in &user {
                let pkg = MemPackage::new(MemPackageType::UserProd, "pkg", path.as_str(), vec![MemFile::new("a.gno", "")]);
                store.add_mem_package(pkg, MemPackageType::AnyAll).unwrap();
            }

            let found: Vec<String> = store.find_paths_by_prefix(b"").map(Result::unwrap).collect();
            let expected: Vec<String> = stdlib.iter().chain(user.iter()).cloned().collect();
            prop_assert_eq!(found, expected);
        }
    }
}
