//! The reconciliation service.
//!
//! [`ApprovalSync`] is the composition root for the engine: it owns the
//! request and settings ledgers, the authority port, and the outbound
//! event bus, and exposes every mutation contract — ingestion, the
//! resolution pipeline, the expiry sweeper, and the counter gate.
//!
//! Construct it explicitly at application start and hand references to
//! whatever needs them; there is no ambient global state. [`start`]
//! performs the one-time startup pass (snapshot restore + sweep) and
//! spawns the background loops.
//!
//! [`start`]: ApprovalSync::start

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use vigil_core::{Decision, LocalId, ProjectId, Timestamp};
use vigil_events::{EventBus, EventReceiver, VigilEvent};
use vigil_storage::SnapshotStore;

use crate::authority::{ApprovalAuthority, DecideOutcome, StatusLookup};
use crate::config::SyncConfig;
use crate::error::ApprovalResult;
use crate::event::{InboundApproval, PullApprovalPayload, PushApprovalPayload, SettingsPayload};
use crate::ledger::RequestLedger;
use crate::request::{ApprovalRequest, RequestStatus};
use crate::settings::{HitlSettings, SettingsLedger};
use crate::state::StateCell;

/// Guard that aborts a spawned Tokio task when dropped.
///
/// Unlike `JoinHandle::drop`, which does NOT cancel the task, this guard
/// ensures background loops are torn down when their owner goes away
/// (logout, navigation away).
pub struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl std::fmt::Debug for AbortOnDrop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbortOnDrop").finish_non_exhaustive()
    }
}

/// Guards for the engine's background loops.
///
/// Dropping the handles cancels both loops; this is lifecycle cleanup,
/// not cancellation of any in-flight authority call.
#[derive(Debug)]
pub struct SyncHandles {
    /// The periodic expiry sweep.
    pub sweeper: AbortOnDrop,
    /// The periodic pull-fallback poll.
    pub poller: AbortOnDrop,
}

/// The approval-request lifecycle and reconciliation engine.
pub struct ApprovalSync {
    cell: Arc<StateCell>,
    requests: RequestLedger,
    settings: SettingsLedger,
    authority: Arc<dyn ApprovalAuthority>,
    bus: EventBus,
    config: SyncConfig,
}

impl ApprovalSync {
    /// Build the engine from its dependencies.
    ///
    /// # Errors
    ///
    /// Returns a config error when `config` fails validation.
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        authority: Arc<dyn ApprovalAuthority>,
        config: SyncConfig,
    ) -> ApprovalResult<Self> {
        config.validate()?;
        let cell = Arc::new(StateCell::new(store));
        let requests = RequestLedger::new(Arc::clone(&cell), config.request_ttl());
        let settings = SettingsLedger::new(Arc::clone(&cell));
        let bus = EventBus::with_capacity(config.event_capacity);
        Ok(Self {
            cell,
            requests,
            settings,
            authority,
            bus,
            config,
        })
    }

    /// One-time startup pass, then spawn the background loops.
    ///
    /// Restores the persisted snapshot, sweeps anything that expired
    /// while the process was not running, and starts the periodic sweep
    /// and pull-fallback loops. Must be called from within a Tokio
    /// runtime.
    pub fn start(self: &Arc<Self>) -> SyncHandles {
        self.cell.restore();
        let removed = self.sweep_now(Timestamp::now());
        if removed > 0 {
            info!(removed, "startup sweep removed expired requests");
        }
        SyncHandles {
            sweeper: self.spawn_sweep_loop(),
            poller: self.spawn_poll_loop(),
        }
    }

    /// The request ledger, for presentation-layer reads.
    #[must_use]
    pub fn requests(&self) -> &RequestLedger {
        &self.requests
    }

    /// The settings ledger, for presentation-layer reads.
    #[must_use]
    pub fn settings(&self) -> &SettingsLedger {
        &self.settings
    }

    /// The outbound event bus.
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Subscribe to ledger-change events.
    #[must_use]
    pub fn subscribe(&self) -> EventReceiver {
        self.bus.subscribe()
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Ingestion
    // -----------------------------------------------------------------------

    /// Ingest a normalized approval-need event through the dedup gate.
    ///
    /// Push delivery is not guaranteed and the pull fallback re-derives
    /// the same set, so the same underlying approval is routinely
    /// observed twice; the gate drops the second observation. Returns the
    /// new entry's id, or `None` when the event was a duplicate.
    pub fn ingest(&self, inbound: InboundApproval) -> Option<LocalId> {
        let request = ApprovalRequest::from_inbound(inbound, Timestamp::now());
        let approval_id = request.approval_id.clone();
        let agent_name = request.agent_name.clone();
        let priority = request.priority;

        match self.requests.add(request) {
            Ok(local_id) => {
                self.bus.publish(VigilEvent::ApprovalIngested {
                    local_id,
                    approval_id,
                    agent_name,
                    priority,
                });
                Some(local_id)
            },
            Err(existing) => {
                debug!(
                    key = approval_id.as_deref().unwrap_or("<local>"),
                    existing = %existing,
                    "dropping duplicate approval event"
                );
                None
            },
        }
    }

    /// Ingest a push-channel payload.
    pub fn ingest_push(&self, payload: PushApprovalPayload) -> Option<LocalId> {
        self.ingest(payload.into())
    }

    /// Ingest a pull-channel payload.
    pub fn ingest_pull(&self, payload: PullApprovalPayload) -> Option<LocalId> {
        self.ingest(payload.into())
    }

    /// Ingest a push-delivered settings-changed notification.
    pub fn ingest_settings(&self, payload: SettingsPayload) -> HitlSettings {
        let project = ProjectId::new(payload.project_id.clone());
        self.apply_authoritative(&project, &payload)
    }

    /// Fetch the authority's pending set once and ingest it.
    ///
    /// Returns the number of newly added requests.
    ///
    /// # Errors
    ///
    /// Returns a transient error when the fetch fails; already-ingested
    /// requests are unaffected.
    pub async fn poll_once(&self) -> ApprovalResult<usize> {
        let payloads = self.authority.fetch_pending().await?;
        let mut added = 0usize;
        for payload in payloads {
            if self.ingest_pull(payload).is_some() {
                added = added.saturating_add(1);
            }
        }
        Ok(added)
    }

    // -----------------------------------------------------------------------
    // Resolution pipeline
    // -----------------------------------------------------------------------

    /// Apply a human decision to a request.
    ///
    /// Unknown or already-resolved ids are silent no-ops. Requests
    /// without a valid remote identifier resolve locally. Otherwise the
    /// authority's status gates the submission, and stale signals at
    /// either step (not-found, already-decided) purge the local entry —
    /// local state converges to "absent" rather than asserting a decision
    /// that no longer has meaning.
    ///
    /// # Errors
    ///
    /// Returns a transient error when an authority call fails for any
    /// non-stale reason; the request stays pending so the operator can
    /// retry.
    pub async fn resolve(
        &self,
        local_id: LocalId,
        decision: Decision,
        note: Option<String>,
    ) -> ApprovalResult<()> {
        let Some(request) = self.requests.get(local_id) else {
            debug!(local_id = %local_id, "resolve on unknown request is a no-op");
            return Ok(());
        };
        if !request.is_pending() {
            debug!(local_id = %local_id, "resolve on already-resolved request is a no-op");
            return Ok(());
        }

        let note = note.unwrap_or_default();

        let Some(remote_id) = request.remote_id() else {
            // Local-only: synthesized client-side, nothing to reconcile
            // against. A malformed identifier lands here too, which
            // silently diverges from any server record it should have
            // had; make that visible in the log.
            if let Some(raw) = &request.approval_id {
                warn!(
                    approval_id = %raw,
                    "approval id failed validation, resolving locally"
                );
            }
            self.requests
                .mark_resolved(local_id, RequestStatus::from_decision(decision), note.clone());
            self.bus.publish(VigilEvent::ApprovalResolved {
                local_id,
                approval_id: None,
                decision,
                note,
            });
            return Ok(());
        };

        match self.authority.status(&remote_id).await? {
            StatusLookup::NotFound => {
                self.remove_stale(local_id, "authority has no record");
                return Ok(());
            },
            StatusLookup::Found(status) if !status.is_pending() => {
                self.remove_stale(local_id, "already decided elsewhere");
                return Ok(());
            },
            StatusLookup::Found(_) => {},
        }

        match self.authority.decide(&remote_id, decision, &note).await? {
            DecideOutcome::NotFound => {
                self.remove_stale(local_id, "authority has no record");
                Ok(())
            },
            DecideOutcome::AlreadyDecided => {
                self.remove_stale(local_id, "another resolver decided first");
                Ok(())
            },
            DecideOutcome::Accepted => {
                self.requests.mark_resolved(
                    local_id,
                    RequestStatus::from_decision(decision),
                    note.clone(),
                );
                self.bus.publish(VigilEvent::ApprovalResolved {
                    local_id,
                    approval_id: Some(remote_id),
                    decision,
                    note,
                });
                Ok(())
            },
        }
    }

    fn remove_stale(&self, local_id: LocalId, reason: &str) {
        if let Some(removed) = self.requests.remove(local_id) {
            info!(
                approval_id = removed.approval_id.as_deref().unwrap_or("<local>"),
                reason, "removed stale approval request"
            );
        }
    }

    // -----------------------------------------------------------------------
    // Expiry sweeper
    // -----------------------------------------------------------------------

    /// Sweep expired requests as of `now`.
    ///
    /// Returns the number of removed requests; each removal is published
    /// as an [`VigilEvent::ApprovalExpired`] event.
    pub fn sweep_now(&self, now: Timestamp) -> usize {
        let removed = self.requests.sweep(now);
        for request in &removed {
            self.bus.publish(VigilEvent::ApprovalExpired {
                local_id: request.local_id,
                approval_id: request.approval_id.clone(),
            });
        }
        removed.len()
    }

    /// Spawn the periodic expiry sweep.
    #[must_use]
    pub fn spawn_sweep_loop(self: &Arc<Self>) -> AbortOnDrop {
        let sync = Arc::clone(self);
        let interval = self.config.sweep_interval();
        AbortOnDrop(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; startup already swept.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = sync.sweep_now(Timestamp::now());
                if removed > 0 {
                    debug!(removed, "expiry sweep removed requests");
                }
            }
        }))
    }

    /// Spawn the periodic pull-fallback poll.
    #[must_use]
    pub fn spawn_poll_loop(self: &Arc<Self>) -> AbortOnDrop {
        let sync = Arc::clone(self);
        let interval = self.config.poll_interval();
        AbortOnDrop(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match sync.poll_once().await {
                    Ok(added) if added > 0 => {
                        debug!(added, "pull fallback ingested requests");
                    },
                    Ok(_) => {},
                    Err(e) => {
                        warn!(error = %e, "pull fallback poll failed");
                    },
                }
            }
        }))
    }

    // -----------------------------------------------------------------------
    // Counter gate
    // -----------------------------------------------------------------------

    /// Overwrite a project's settings with an authoritative payload.
    ///
    /// The single convergence point for push-delivered settings
    /// notifications and settings command responses. Always a full
    /// overwrite, never a field merge, so no stale field survives a
    /// partial update.
    pub fn apply_authoritative(
        &self,
        project: &ProjectId,
        payload: &SettingsPayload,
    ) -> HitlSettings {
        let applied = self.settings.apply(project, payload);
        self.bus.publish(VigilEvent::SettingsUpdated {
            project_id: project.clone(),
            enabled: applied.enabled,
            counter_total: applied.counter_total,
            counter_remaining: applied.counter_remaining,
            locked: applied.locked,
        });
        applied
    }

    /// Re-read a project's settings from the authority.
    ///
    /// # Errors
    ///
    /// Returns a transient error when the authority call fails; local
    /// settings are left untouched.
    pub async fn refresh_settings(&self, project: &ProjectId) -> ApprovalResult<HitlSettings> {
        let payload = self.authority.settings(project).await?;
        Ok(self.apply_authoritative(project, &payload))
    }

    /// Switch human approval on or off for a project.
    ///
    /// Calls the authority first; local state changes only on success.
    ///
    /// # Errors
    ///
    /// Returns a transient error when the authority call fails; local
    /// settings are left untouched.
    pub async fn toggle_enabled(
        &self,
        project: &ProjectId,
        enabled: bool,
    ) -> ApprovalResult<HitlSettings> {
        let payload = self.authority.toggle(project, enabled).await?;
        Ok(self.apply_authoritative(project, &payload))
    }

    /// Set the auto-approval budget for a project.
    ///
    /// The authority computes the resulting remainder — never this
    /// engine, since consumption may be happening concurrently on the
    /// remote side as agents act.
    ///
    /// # Errors
    ///
    /// Returns a transient error when the authority call fails; local
    /// settings are left untouched.
    pub async fn set_budget(
        &self,
        project: &ProjectId,
        total: u32,
        reset_remaining: bool,
    ) -> ApprovalResult<HitlSettings> {
        let payload = self
            .authority
            .set_budget(project, total, reset_remaining)
            .await?;
        Ok(self.apply_authoritative(project, &payload))
    }

    /// Re-arm auto-approval after the budget locked, optionally resizing it.
    ///
    /// # Errors
    ///
    /// Returns a transient error when the authority call fails; local
    /// settings are left untouched.
    pub async fn resume_with_budget(
        &self,
        project: &ProjectId,
        total: Option<u32>,
    ) -> ApprovalResult<HitlSettings> {
        let payload = self.authority.resume(project, total).await?;
        Ok(self.apply_authoritative(project, &payload))
    }

    /// Exhaust the budget immediately, restoring human oversight.
    ///
    /// # Errors
    ///
    /// Returns a transient error when the authority call fails; local
    /// settings are left untouched.
    pub async fn halt_budget(&self, project: &ProjectId) -> ApprovalResult<HitlSettings> {
        let payload = self.authority.halt(project).await?;
        Ok(self.apply_authoritative(project, &payload))
    }
}

impl std::fmt::Debug for ApprovalSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalSync")
            .field("requests", &self.requests)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
