//! Cache error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::lock::LockError;

/// Cache result type
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors from cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt cache table {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cache table {path} does not hold a JSON object")]
    NotAnObject { path: PathBuf },

    #[error("cache table '{0}' has not been created")]
    InvalidCacheTable(String),

    #[error("invalid cache table name: {0:?}")]
    InvalidTableName(String),

    #[error("a namespace needs at least one table name")]
    EmptyNamespace,
}
