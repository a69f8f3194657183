/// Errors from key-value store operations.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    /// Attempted to write under an empty key.
    #[error("cannot store value under an empty key")]
    EmptyKey,

    /// Storage backend is read-only or otherwise unavailable.
    #[error("store is read-only")]
    ReadOnly,

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other backend failure.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result alias for key-value store operations.
pub type KvResult<T> = Result<T, KvError>;
