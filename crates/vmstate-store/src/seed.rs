use tracing::info;
use vmstate_kv::KvStore;

use crate::cache::CacheMap;
use crate::error::{StoreError, StoreResult};
use crate::traits::Store;

/// What [`copy_from_cached_store`] copied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub base_keys: usize,
    pub iavl_keys: usize,
    pub types: usize,
    pub packages: usize,
}

/// Seed a transaction from a fully populated store.
///
/// Copies every entry of `src_base` and `src_iavl` into `dest`'s buffered
/// backing stores, and every cached type and package of `src` into
/// `dest`'s cache overlays. Nothing reaches `dest`'s parent until `dest`
/// commits. `dest` must be a transaction; any other store is rejected
/// before anything is copied.
pub fn copy_from_cached_store(
    dest: &dyn Store,
    src: &dyn Store,
    src_base: &dyn KvStore,
    src_iavl: &dyn KvStore,
) -> StoreResult<SeedReport> {
    let tx = dest.as_transaction().ok_or(StoreError::NotTransaction)?;
    let mut report = SeedReport::default();

    for pair in src_base.iterator(b"", None) {
        let (key, value) = pair?;
        tx.buffered_base().set(&key, &value)?;
        report.base_keys += 1;
    }
    for pair in src_iavl.iterator(b"", None) {
        let (key, value) = pair?;
        tx.buffered_iavl().set(&key, &value)?;
        report.iavl_keys += 1;
    }

    for (id, ty) in src.cached_types() {
        tx.type_overlay().set(id, ty);
        report.types += 1;
    }
    for (path, pkg) in src.cached_packages() {
        tx.package_overlay().set(path, pkg);
        report.packages += 1;
    }

    info!(
        base_keys = report.base_keys,
        iavl_keys = report.iavl_keys,
        types = report.types,
        packages = report.packages,
        "transaction seeded from cached store"
    );
    Ok(report)
}
