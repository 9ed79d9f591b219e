//! The snapshot store port and its two built-in backends.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::{StorageError, StorageResult};

/// Port for persisting the ledger's state record.
///
/// Implementations are synchronous on purpose: the engine calls `save`
/// inside ledger critical sections, which must not suspend. A backend
/// that needs async IO should buffer internally rather than block.
pub trait SnapshotStore: Send + Sync {
    /// Load the most recently saved record.
    ///
    /// Returns `Ok(None)` when nothing has been saved yet.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] when the backing medium cannot be read.
    fn load(&self) -> StorageResult<Option<Vec<u8>>>;

    /// Replace the saved record with `bytes`.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] when the write fails. Callers treat this
    /// as non-fatal and continue memory-only.
    fn save(&self, bytes: &[u8]) -> StorageResult<()>;
}

/// In-memory snapshot store for tests and persistence-free sessions.
#[derive(Default)]
pub struct MemorySnapshotStore {
    record: RwLock<Option<Vec<u8>>>,
}

impl MemorySnapshotStore {
    /// Create an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a record has been saved.
    #[must_use]
    pub fn has_record(&self) -> bool {
        self.record
            .read()
            .map(|record| record.is_some())
            .unwrap_or(false)
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self) -> StorageResult<Option<Vec<u8>>> {
        let record = self
            .record
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(record.clone())
    }

    fn save(&self, bytes: &[u8]) -> StorageResult<()> {
        let mut record = self
            .record
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *record = Some(bytes.to_vec());
        Ok(())
    }
}

impl fmt::Debug for MemorySnapshotStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySnapshotStore")
            .field("has_record", &self.has_record())
            .finish()
    }
}

/// File-backed snapshot store.
///
/// Saves write to a temporary file in the same directory and then rename
/// over the target, so readers never observe a half-written record.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    /// Create a store backed by the given file path.
    ///
    /// The file and its parent directory are created on first save.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self) -> StorageResult<Option<Vec<u8>>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn save(&self, bytes: &[u8]) -> StorageResult<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        std::io::Write::write_all(&mut tmp, bytes)?;
        tmp.persist(&self.path)
            .map_err(|e| StorageError::Persist(e.to_string()))?;
        Ok(())
    }
}
