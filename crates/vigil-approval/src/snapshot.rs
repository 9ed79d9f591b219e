//! Versioned layout of the persisted ledger cache.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use vigil_core::{ProjectId, Version};

use crate::request::ApprovalRequest;
use crate::settings::HitlSettings;

/// Schema version written into every snapshot.
///
/// Bump the major version on any change an older reader would misread;
/// incompatible snapshots are discarded on load, never migrated in place.
pub const SNAPSHOT_VERSION: Version = Version::new(1, 0, 0);

/// The single persisted record: the full request table and the
/// per-project settings map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Schema version this snapshot was written with.
    pub version: Version,
    /// Every request the ledger holds, pending and resolved.
    pub requests: Vec<ApprovalRequest>,
    /// Per-project oversight settings.
    pub settings: HashMap<ProjectId, HitlSettings>,
}

impl LedgerSnapshot {
    /// Build a snapshot at the current schema version.
    #[must_use]
    pub fn new(requests: Vec<ApprovalRequest>, settings: HashMap<ProjectId, HitlSettings>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            requests,
            settings,
        }
    }

    /// Serialize to the persisted byte form.
    ///
    /// # Errors
    ///
    /// Returns a serialization error; callers treat this as a
    /// persistence failure and continue memory-only.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize and version-check a persisted record.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Decode`] for unparseable bytes and
    /// [`SnapshotError::Incompatible`] when the record was written by a
    /// schema this reader cannot interpret. Either way the cache is
    /// discarded rather than misread.
    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_slice(bytes)?;
        if !SNAPSHOT_VERSION.can_read(&snapshot.version) {
            return Err(SnapshotError::Incompatible {
                found: snapshot.version,
            });
        }
        Ok(snapshot)
    }
}

/// Errors reading a persisted snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// The bytes were not a valid snapshot record.
    #[error("snapshot decode failed: {0}")]
    Decode(#[from] serde_json::Error),

    /// The record was written by an incompatible schema version.
    #[error("snapshot version {found} is incompatible with {SNAPSHOT_VERSION}")]
    Incompatible {
        /// The version found in the record.
        found: Version,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_roundtrip() {
        let snapshot = LedgerSnapshot::new(Vec::new(), HashMap::new());
        let bytes = snapshot.encode().unwrap();
        let back = LedgerSnapshot::decode(&bytes).unwrap();
        assert_eq!(back.version, SNAPSHOT_VERSION);
        assert!(back.requests.is_empty());
        assert!(back.settings.is_empty());
    }

    #[test]
    fn test_incompatible_version_discarded() {
        let mut snapshot = LedgerSnapshot::new(Vec::new(), HashMap::new());
        snapshot.version = Version::new(99, 0, 0);
        let bytes = snapshot.encode().unwrap();
        assert!(matches!(
            LedgerSnapshot::decode(&bytes),
            Err(SnapshotError::Incompatible { .. })
        ));
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        assert!(matches!(
            LedgerSnapshot::decode(b"not json"),
            Err(SnapshotError::Decode(_))
        ));
    }
}
