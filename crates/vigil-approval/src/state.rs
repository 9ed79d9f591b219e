//! Shared mutable state behind the request and settings ledgers.
//!
//! Both ledgers are facades over one [`StateCell`] so that every
//! mutation can persist the *combined* snapshot (the persisted layout is
//! a single record) from inside the same critical section that made the
//! change. No suspension point ever occurs while the lock is held; the
//! storage port is synchronous.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{info, warn};
use vigil_core::{LocalId, ProjectId};
use vigil_storage::SnapshotStore;

use crate::request::ApprovalRequest;
use crate::settings::HitlSettings;
use crate::snapshot::LedgerSnapshot;

/// The in-memory tables both ledgers operate on.
#[derive(Debug, Default)]
pub(crate) struct LedgerState {
    /// All approval requests, pending and resolved.
    pub(crate) requests: HashMap<LocalId, ApprovalRequest>,
    /// Per-project oversight settings.
    pub(crate) settings: HashMap<ProjectId, HitlSettings>,
}

/// Lock-guarded state plus the storage port for write-through.
pub(crate) struct StateCell {
    inner: RwLock<LedgerState>,
    store: Arc<dyn SnapshotStore>,
}

impl StateCell {
    pub(crate) fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            inner: RwLock::new(LedgerState::default()),
            store,
        }
    }

    /// Acquire the read lock, recovering from poisoning.
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, LedgerState> {
        self.inner.read().unwrap_or_else(|e| {
            warn!("ledger state read lock poisoned, recovering");
            e.into_inner()
        })
    }

    /// Acquire the write lock, recovering from poisoning.
    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, LedgerState> {
        self.inner.write().unwrap_or_else(|e| {
            warn!("ledger state write lock poisoned, recovering");
            e.into_inner()
        })
    }

    /// Write the combined snapshot through to the storage port.
    ///
    /// Persistence failures are logged and swallowed; the ledger runs
    /// memory-only for the rest of the session rather than blocking on
    /// storage errors.
    pub(crate) fn persist(&self, state: &LedgerState) {
        let snapshot = LedgerSnapshot::new(
            state.requests.values().cloned().collect(),
            state.settings.clone(),
        );
        let bytes = match snapshot.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "failed to encode ledger snapshot, skipping persist");
                return;
            },
        };
        if let Err(e) = self.store.save(&bytes) {
            warn!(error = %e, "failed to persist ledger snapshot, continuing memory-only");
        }
    }

    /// One-time startup pass: load the persisted snapshot into memory.
    ///
    /// An unreadable or incompatible snapshot is discarded with a warning
    /// and the session starts empty. Returns the number of restored
    /// requests and settings records.
    pub(crate) fn restore(&self) -> (usize, usize) {
        let bytes = match self.store.load() {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return (0, 0),
            Err(e) => {
                warn!(error = %e, "failed to read persisted ledger snapshot, starting empty");
                return (0, 0);
            },
        };
        let snapshot = match LedgerSnapshot::decode(&bytes) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "discarding unreadable ledger snapshot");
                return (0, 0);
            },
        };

        let mut state = self.write();
        state.requests = snapshot
            .requests
            .into_iter()
            .map(|request| (request.local_id, request))
            .collect();
        state.settings = snapshot.settings;
        let counts = (state.requests.len(), state.settings.len());
        drop(state);

        info!(
            requests = counts.0,
            settings = counts.1,
            "restored ledger snapshot"
        );
        counts
    }
}

impl std::fmt::Debug for StateCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateCell").finish_non_exhaustive()
    }
}
