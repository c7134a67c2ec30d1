//! Storage error types

use thiserror::Error;

/// Errors that can occur during storage operations.
///
/// Only failures that abort a call live here. Missing records are reported as
/// `None` / `true`, and an exhausted cursor is an absent continuation key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The storage boundary cannot be reached or opened
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Storage backend error (transaction, request, etc.)
    #[error("storage backend error: {0}")]
    Backend(String),

    /// Record has no usable primary key at the store's key path
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Invalid record or request data
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// `first` / `single` found no element, or more than one
    #[error("sequence {0}")]
    EmptyOrAmbiguous(Cardinality),
}

/// Which cardinality contract a terminal operator violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// No element matched.
    Empty,
    /// More than one element matched where exactly one was required.
    MoreThanOne,
}

impl std::fmt::Display for Cardinality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cardinality::Empty => write!(f, "contains no elements"),
            Cardinality::MoreThanOne => write!(f, "contains more than one element"),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;
