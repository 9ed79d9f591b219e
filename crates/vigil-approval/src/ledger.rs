//! The request ledger — single source of truth for the presentation layer.

use std::fmt;
use std::sync::Arc;

use vigil_core::{LocalId, Timestamp};

use crate::request::{ApprovalRequest, RequestStatus};
use crate::state::StateCell;

/// Table of approval requests and their status.
///
/// Mutations go through this contract only — ingestion, the resolution
/// pipeline, and the expiry sweeper; presentation code reads. Every
/// mutation persists the combined ledger snapshot write-through from
/// inside its critical section.
pub struct RequestLedger {
    cell: Arc<StateCell>,
    ttl: chrono::Duration,
}

impl RequestLedger {
    pub(crate) fn new(cell: Arc<StateCell>, ttl: chrono::Duration) -> Self {
        Self { cell, ttl }
    }

    /// Time-to-live applied to undecided requests.
    #[must_use]
    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Insert a request unless a pending entry with the same identity key
    /// already exists.
    ///
    /// This is the deduplication gate's atomic check-and-insert: the scan
    /// and the insert happen under one write lock, so racing producers
    /// (push handler, poll loop) cannot both insert the same approval.
    ///
    /// # Errors
    ///
    /// Returns the existing entry's [`LocalId`] when the incoming request
    /// duplicates a pending one.
    pub fn add(&self, request: ApprovalRequest) -> Result<LocalId, LocalId> {
        let key = request.identity_key();
        let mut state = self.cell.write();
        if let Some(existing) = state
            .requests
            .values()
            .find(|r| r.is_pending() && r.identity_key() == key)
        {
            return Err(existing.local_id);
        }
        let local_id = request.local_id;
        state.requests.insert(local_id, request);
        self.cell.persist(&state);
        Ok(local_id)
    }

    /// Look up a request by its process-local id.
    #[must_use]
    pub fn get(&self, local_id: LocalId) -> Option<ApprovalRequest> {
        self.cell.read().requests.get(&local_id).cloned()
    }

    /// All requests for one agent, newest first.
    #[must_use]
    pub fn list_by_agent(&self, agent_name: &str) -> Vec<ApprovalRequest> {
        let state = self.cell.read();
        let mut requests: Vec<ApprovalRequest> = state
            .requests
            .values()
            .filter(|r| r.agent_name == agent_name)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        requests
    }

    /// Requests still needing a decision as of `now`, most urgent first.
    ///
    /// Applies the expiry rule inline: a request whose age exceeds the
    /// TTL is excluded even though the sweeper has not removed it yet.
    #[must_use]
    pub fn list_pending(&self, now: Timestamp) -> Vec<ApprovalRequest> {
        let state = self.cell.read();
        let mut requests: Vec<ApprovalRequest> = state
            .requests
            .values()
            .filter(|r| r.is_pending() && !r.is_expired(now, self.ttl))
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.created_at.cmp(&b.created_at)));
        requests
    }

    /// Number of requests still needing a decision as of `now`.
    ///
    /// Same inline expiry rule as [`list_pending`](Self::list_pending),
    /// so a count read between sweeps never over-reports.
    #[must_use]
    pub fn count_pending(&self, now: Timestamp) -> usize {
        self.cell
            .read()
            .requests
            .values()
            .filter(|r| r.is_pending() && !r.is_expired(now, self.ttl))
            .count()
    }

    /// The pending entry holding the given identity key, if any.
    #[must_use]
    pub fn find_pending_by_key(&self, key: &str) -> Option<LocalId> {
        self.cell
            .read()
            .requests
            .values()
            .find(|r| r.is_pending() && r.identity_key() == key)
            .map(|r| r.local_id)
    }

    /// Move a request to a terminal status, recording the note.
    ///
    /// The note is always materialized — an absent operator note becomes
    /// the explicit empty string, so persisted terminal requests never
    /// carry an undefined note. Returns the updated request, or `None`
    /// when the id is unknown.
    pub fn mark_resolved(
        &self,
        local_id: LocalId,
        status: RequestStatus,
        note: String,
    ) -> Option<ApprovalRequest> {
        let mut state = self.cell.write();
        let request = state.requests.get_mut(&local_id)?;
        request.status = status;
        request.decision_note = Some(note);
        let updated = request.clone();
        self.cell.persist(&state);
        Some(updated)
    }

    /// Remove a request outright.
    ///
    /// Used for stale entries whose remote counterpart was decided
    /// elsewhere, and by the sweeper. Returns the removed request.
    pub fn remove(&self, local_id: LocalId) -> Option<ApprovalRequest> {
        let mut state = self.cell.write();
        let removed = state.requests.remove(&local_id)?;
        self.cell.persist(&state);
        Some(removed)
    }

    /// Remove every request that has outlived the TTL as of `now`.
    ///
    /// Expired requests are removed, not marked rejected: the ledger
    /// reflects what still needs a decision, and recording that an
    /// opportunity lapsed is the authority's history's job. Returns the
    /// removed requests.
    pub fn sweep(&self, now: Timestamp) -> Vec<ApprovalRequest> {
        let mut state = self.cell.write();
        let expired: Vec<LocalId> = state
            .requests
            .values()
            .filter(|r| r.is_expired(now, self.ttl))
            .map(|r| r.local_id)
            .collect();
        let mut removed = Vec::with_capacity(expired.len());
        for local_id in expired {
            if let Some(request) = state.requests.remove(&local_id) {
                removed.push(request);
            }
        }
        if !removed.is_empty() {
            self.cell.persist(&state);
        }
        removed
    }

    /// Total number of requests held, regardless of status.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cell.read().requests.len()
    }

    /// Whether the ledger holds no requests at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cell.read().requests.is_empty()
    }
}

impl fmt::Debug for RequestLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestLedger")
            .field("len", &self.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}
