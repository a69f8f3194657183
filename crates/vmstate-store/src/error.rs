use vmstate_kv::KvError;
use vmstate_types::{MemPackageType, ObjectId, PkgId, TypeError, TypeId};

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A declared type was requested that was never registered.
    #[error("unexpected type with id {0}")]
    TypeNotFound(TypeId),

    /// An object reference points at nothing.
    #[error("object not found: {0}")]
    ObjectNotFound(ObjectId),

    /// The allocation budget would be exceeded.
    #[error("allocation limit exceeded: requested {requested} bytes with {used} of {max} in use")]
    OutOfMemory { requested: u64, used: u64, max: u64 },

    /// A configuration hook was called on a transaction store.
    #[error("{op} may only be called on the root store")]
    RootOnly { op: &'static str },

    /// A configuration hook was called on a root store that already has
    /// derived transactions.
    #[error("{op} called after a transaction was derived")]
    ConfigAfterDerive { op: &'static str },

    /// A bulk copy targeted a store that is not a transaction.
    #[error("destination store is not a transaction store")]
    NotTransaction,

    /// A package is already stored under this path.
    #[error("package already exists: {0}")]
    PackageExists(String),

    /// The package's type does not pass the caller's filter.
    #[error("package {path} has type {actual}, filter {filter} rejects it")]
    PackageTypeMismatch {
        path: String,
        filter: MemPackageType,
        actual: MemPackageType,
    },

    /// The package is structurally malformed.
    #[error("invalid package {path}: {reason}")]
    InvalidPackage { path: String, reason: String },

    /// Attempted to store an object with the null id.
    #[error("cannot store object with null ID")]
    NullObjectId,

    /// The package's object counter cannot advance.
    #[error("object ids exhausted for package {0}")]
    IdsExhausted(PkgId),

    /// Stored object bytes do not match the recorded hash.
    #[error("hash mismatch for {id}: expected {expected}, computed {computed}")]
    HashMismatch {
        id: ObjectId,
        expected: String,
        computed: String,
    },

    /// Serialization or deserialization failure.
    #[error("codec error: {0}")]
    Codec(String),

    /// Failure in a backing store.
    #[error("backing store error: {0}")]
    Kv(#[from] KvError),
}

impl From<TypeError> for StoreError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidPackage { path, reason } => Self::InvalidPackage { path, reason },
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
