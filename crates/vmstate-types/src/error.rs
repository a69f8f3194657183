use thiserror::Error;

/// Errors produced by value-model operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid package {path:?}: {reason}")]
    InvalidPackage { path: String, reason: String },
}
