//! Storage error types.

/// Errors from snapshot persistence operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Reading or writing the backing medium failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The atomic replace of the snapshot file failed.
    #[error("persist error: {0}")]
    Persist(String),
}

/// Result type for snapshot persistence operations.
pub type StorageResult<T> = Result<T, StorageError>;
