//! Backing-store key layout.
//!
//! | Store | Key                 | Value                          |
//! |-------|---------------------|--------------------------------|
//! | iavl  | `pkg:<path>`        | JSON [`MemPackage`]            |
//! | iavl  | `hash:<object id>`  | BLAKE3 hash of the object bytes|
//! | base  | `pkgidx:<nskey>`    | package path                   |
//! | base  | `tid:<type id>`     | bincode [`DeclaredType`]       |
//! | base  | `oid:<object id>`   | bincode [`Object`]             |
//! | base  | `time:<pkg hex>`    | next object time, big-endian   |
//!
//! No prefix is shared between the two columns, so a single backing store
//! can serve as both.
//!
//! [`MemPackage`]: vmstate_types::MemPackage
//! [`DeclaredType`]: vmstate_types::DeclaredType
//! [`Object`]: vmstate_types::Object

use vmstate_types::{ObjectId, PkgId, TypeId};

pub const PACKAGE_PREFIX: &[u8] = b"pkg:";
pub const OBJECT_HASH_PREFIX: &[u8] = b"hash:";
pub const INDEX_PREFIX: &[u8] = b"pkgidx:";
pub const TYPE_PREFIX: &[u8] = b"tid:";
pub const OBJECT_PREFIX: &[u8] = b"oid:";
pub const TIME_PREFIX: &[u8] = b"time:";

/// Namespace marker prepended to standard-library paths in the index.
pub const STDLIB_NAMESPACE: &str = "_/";

fn join(prefix: &[u8], rest: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + rest.len());
    key.extend_from_slice(prefix);
    key.extend_from_slice(rest);
    key
}

pub fn package_key(path: &str) -> Vec<u8> {
    join(PACKAGE_PREFIX, path.as_bytes())
}

/// Namespaced index key for a package path: `_/<path>` for the standard
/// library, the path itself otherwise.
pub fn namespace_key(path: &str, stdlib: bool) -> String {
    if stdlib {
        format!("{STDLIB_NAMESPACE}{path}")
    } else {
        path.to_string()
    }
}

pub fn index_key(path: &str, stdlib: bool) -> Vec<u8> {
    join(INDEX_PREFIX, namespace_key(path, stdlib).as_bytes())
}

/// Index key for a raw search prefix; the prefix may be any bytes.
pub fn index_search_key(prefix: &[u8]) -> Vec<u8> {
    join(INDEX_PREFIX, prefix)
}

pub fn type_key(id: &TypeId) -> Vec<u8> {
    join(TYPE_PREFIX, id.as_str().as_bytes())
}

pub fn object_key(id: &ObjectId) -> Vec<u8> {
    join(OBJECT_PREFIX, id.to_string().as_bytes())
}

pub fn object_hash_key(id: &ObjectId) -> Vec<u8> {
    join(OBJECT_HASH_PREFIX, id.to_string().as_bytes())
}

pub fn time_key(pkg: &PkgId) -> Vec<u8> {
    join(TIME_PREFIX, pkg.to_hex().as_bytes())
}
