use std::io;

use thiserror::Error;

/// Errors raised by the key-value store and the repositories built on it.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not read the value under `key`.
    #[error("failed to read store key '{key}'")]
    StoreRead {
        key: String,
        #[source]
        source: io::Error,
    },

    /// The store could not write the value under `key`.
    ///
    /// The in-memory state of the caller is left as it was after the mutation.
    #[error("failed to write store key '{key}'")]
    StoreWrite {
        key: String,
        #[source]
        source: io::Error,
    },

    /// The stored record exists but is not a valid task list.
    #[error("stored value under '{key}' is not a valid task list")]
    Deserialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Input was refused before any I/O was attempted.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("task not found: {id}")]
    NotFound { id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("task title must not be empty")]
    EmptyTitle,

    #[error("duplicate task id: {0}")]
    DuplicateId(String),
}
