use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of the package (realm) that allocated an object.
///
/// A `PkgId` is the BLAKE3 hash of a package path, domain-separated so it
/// cannot collide with any other hash the store computes. The same path
/// always produces the same `PkgId`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PkgId([u8; 32]);

impl PkgId {
    pub fn from_path(path: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"vmstate-pkg-v1:");
        hasher.update(path.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    /// All zeros. Carried by objects never attached to a heap or store.
    pub const fn null() -> Self {
        Self([0u8; 32])
    }

    pub fn is_null(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for PkgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PkgId({})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for PkgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Store-scoped identifier of a composite object.
///
/// An object id pairs the [`PkgId`] of the package that created the object
/// with a per-package creation counter. Ids are handed out by the store or
/// an object heap and never reused, so an id is stable for the lifetime of
/// the object it names.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId {
    pub pkg: PkgId,
    pub time: u64,
}

impl ObjectId {
    pub const fn new(pkg: PkgId, time: u64) -> Self {
        Self { pkg, time }
    }

    /// The null object id. Represents "not yet stored".
    pub const fn null() -> Self {
        Self {
            pkg: PkgId::null(),
            time: 0,
        }
    }

    /// Returns `true` if this is the null object id.
    pub fn is_null(&self) -> bool {
        self.pkg.is_null() && self.time == 0
    }

    /// Short form used in log fields: `<first 8 hex>:<time>`.
    pub fn short(&self) -> String {
        format!("{}:{}", hex::encode(&self.pkg.0[..4]), self.time)
    }

    /// Fixed-width binary encoding (32-byte package id, big-endian time).
    pub fn to_bytes(&self) -> [u8; 40] {
        let mut out = [0u8; 40];
        out[..32].copy_from_slice(&self.pkg.0);
        out[32..].copy_from_slice(&self.time.to_be_bytes());
        out
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.short())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.pkg.to_hex(), self.time)
    }
}

/// Identity and ownership metadata carried by every composite object.
///
/// `dirty` is an advisory hint for the persistence layer; nothing in the
/// store depends on it for correctness.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Stable identifier, null until the object is placed in a heap or store.
    pub id: ObjectId,
    /// The object that owns this one, if any.
    pub owner: Option<ObjectId>,
    /// Set when the object changed since it was last persisted.
    pub dirty: bool,
    /// Number of owning references to this object.
    pub ref_count: u32,
}

impl ObjectInfo {
    /// Fresh metadata for a newly created object.
    pub fn new(id: ObjectId) -> Self {
        Self {
            id,
            owner: None,
            dirty: true,
            ref_count: 0,
        }
    }

    /// Fresh metadata for an object owned by `owner`.
    pub fn owned_by(id: ObjectId, owner: ObjectId) -> Self {
        Self {
            id,
            owner: Some(owner),
            dirty: true,
            ref_count: 1,
        }
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::null()
    }
}
