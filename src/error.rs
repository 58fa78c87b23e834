//! Error types for the task store.
//!
//! Each concern gets its own enum so callers can tell a structural no-op from
//! a storage failure; `StoreError` wraps them at the facade.

use thiserror::Error;

/// Structural failures of tree operations. Callers treat these as no-ops.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("task not found: {0}")]
    NotFound(String),
    #[error("task {id} cannot nest below depth {depth}")]
    MaxDepth { id: String, depth: u8 },
    #[error("order does not match the sibling list")]
    InvalidOrder,
    #[error("cannot move task {0} under itself or its descendants")]
    MoveIntoSelf(String),
    #[error("task id already in use: {0}")]
    DuplicateId(String),
}

/// Local cache failures.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("cache I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cache quota exceeded: {bytes} bytes > {quota} bytes")]
    QuotaExceeded { bytes: u64, quota: u64 },
}

/// External target failures.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("permission to {0} was denied or revoked")]
    PermissionDenied(String),
    #[error("no external target connected")]
    NotConnected,
    #[error("external target I/O failed: {0}")]
    Io(std::io::Error),
    #[error(transparent)]
    Import(#[from] ImportError),
}

/// Import validation failures. The whole file is rejected.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("file is {bytes} bytes, limit is {limit}")]
    TooLarge { bytes: usize, limit: usize },
    #[error("file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid task data at {path}: {reason}")]
    Invalid { path: String, reason: String },
}

impl ImportError {
    pub fn invalid(path: impl Into<String>, reason: impl Into<String>) -> Self {
        ImportError::Invalid {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Project and label directory failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("name cannot be empty")]
    EmptyName,
    #[error("'{0}' already exists")]
    Exists(String),
    #[error("no such entry: {0}")]
    NotFound(String),
}

/// Top-level error returned by the store facade.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Target(#[from] TargetError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error("invalid config file: {0}")]
    Config(serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
