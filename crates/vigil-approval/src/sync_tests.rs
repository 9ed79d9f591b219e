use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use super::*;
use crate::authority::{AuthorityError, RemoteStatus};
use crate::error::ApprovalError;
use crate::event::PullApprovalIdentity;
use crate::request::RequestContext;
use vigil_core::ApprovalId;
use vigil_storage::MemorySnapshotStore;

/// Scripted authority double: per-id status and decide outcomes, a
/// programmable pending set, and a transport-failure switch.
#[derive(Default)]
struct MockAuthority {
    statuses: Mutex<HashMap<String, StatusLookup>>,
    decide_outcomes: Mutex<HashMap<String, DecideOutcome>>,
    pending: Mutex<Vec<PullApprovalPayload>>,
    settings_payload: Mutex<Option<SettingsPayload>>,
    fail_transport: AtomicBool,
    decides: Mutex<Vec<(String, Decision, String)>>,
}

impl MockAuthority {
    fn new() -> Self {
        Self::default()
    }

    fn set_status(&self, id: &str, lookup: StatusLookup) {
        self.statuses
            .lock()
            .unwrap()
            .insert(id.to_string(), lookup);
    }

    fn set_decide(&self, id: &str, outcome: DecideOutcome) {
        self.decide_outcomes
            .lock()
            .unwrap()
            .insert(id.to_string(), outcome);
    }

    fn set_pending(&self, payloads: Vec<PullApprovalPayload>) {
        *self.pending.lock().unwrap() = payloads;
    }

    fn set_settings(&self, payload: SettingsPayload) {
        *self.settings_payload.lock().unwrap() = Some(payload);
    }

    fn set_fail_transport(&self, fail: bool) {
        self.fail_transport.store(fail, Ordering::SeqCst);
    }

    fn recorded_decides(&self) -> Vec<(String, Decision, String)> {
        self.decides.lock().unwrap().clone()
    }

    fn transport_err() -> AuthorityError {
        AuthorityError::Transport("connection refused".to_string())
    }

    fn check_transport(&self) -> Result<(), AuthorityError> {
        if self.fail_transport.load(Ordering::SeqCst) {
            Err(Self::transport_err())
        } else {
            Ok(())
        }
    }

    fn settings_or_err(&self) -> Result<SettingsPayload, AuthorityError> {
        self.check_transport()?;
        self.settings_payload
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(Self::transport_err)
    }
}

#[async_trait::async_trait]
impl ApprovalAuthority for MockAuthority {
    async fn status(&self, id: &ApprovalId) -> Result<StatusLookup, AuthorityError> {
        self.check_transport()?;
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .get(id.as_str())
            .cloned()
            .unwrap_or(StatusLookup::Found(RemoteStatus::Pending)))
    }

    async fn decide(
        &self,
        id: &ApprovalId,
        decision: Decision,
        note: &str,
    ) -> Result<DecideOutcome, AuthorityError> {
        self.check_transport()?;
        self.decides
            .lock()
            .unwrap()
            .push((id.as_str().to_string(), decision, note.to_string()));
        Ok(self
            .decide_outcomes
            .lock()
            .unwrap()
            .get(id.as_str())
            .copied()
            .unwrap_or(DecideOutcome::Accepted))
    }

    async fn fetch_pending(&self) -> Result<Vec<PullApprovalPayload>, AuthorityError> {
        self.check_transport()?;
        Ok(self.pending.lock().unwrap().clone())
    }

    async fn settings(&self, _project: &ProjectId) -> Result<SettingsPayload, AuthorityError> {
        self.settings_or_err()
    }

    async fn toggle(
        &self,
        _project: &ProjectId,
        _enabled: bool,
    ) -> Result<SettingsPayload, AuthorityError> {
        self.settings_or_err()
    }

    async fn set_budget(
        &self,
        _project: &ProjectId,
        _total: u32,
        _reset: bool,
    ) -> Result<SettingsPayload, AuthorityError> {
        self.settings_or_err()
    }

    async fn resume(
        &self,
        _project: &ProjectId,
        _total: Option<u32>,
    ) -> Result<SettingsPayload, AuthorityError> {
        self.settings_or_err()
    }

    async fn halt(&self, _project: &ProjectId) -> Result<SettingsPayload, AuthorityError> {
        self.settings_or_err()
    }
}

fn push_payload(id: &str) -> PushApprovalPayload {
    PushApprovalPayload {
        approval_id: id.to_string(),
        agent_type: "analyst".to_string(),
        request_type: "pre-execution".to_string(),
        estimated_tokens: None,
        estimated_cost: None,
        expires_at: None,
        task_id: None,
        project_id: None,
        priority: None,
        request_data: None,
    }
}

fn pull_payload(id: &str) -> PullApprovalPayload {
    PullApprovalPayload {
        approval: PullApprovalIdentity {
            id: id.to_string(),
            agent: "analyst".to_string(),
            kind: "pre-execution".to_string(),
        },
        tokens: None,
        cost: None,
        expires_at: None,
        task: None,
        project: None,
        priority: None,
        data: None,
    }
}

fn settings_payload(project: &str, total: u32, remaining: u32) -> SettingsPayload {
    SettingsPayload {
        project_id: project.to_string(),
        counter_total: total,
        counter_remaining: remaining,
        hitl_enabled: true,
        locked: None,
        reason: None,
    }
}

fn make_sync(authority: Arc<MockAuthority>) -> ApprovalSync {
    ApprovalSync::new(
        Arc::new(MemorySnapshotStore::new()),
        authority,
        SyncConfig::default(),
    )
    .unwrap()
}

fn minutes_ahead(m: i64) -> Timestamp {
    Timestamp::from_datetime(chrono::Utc::now() + chrono::Duration::minutes(m))
}

// ---------------------------------------------------------------------------
// Basic approval flow
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_basic_approval() {
    let authority = Arc::new(MockAuthority::new());
    let sync = make_sync(Arc::clone(&authority));

    let local_id = sync.ingest_push(push_payload("A1")).unwrap();
    assert_eq!(sync.requests().count_pending(Timestamp::now()), 1);

    sync.resolve(local_id, Decision::Approve, Some("ok".to_string()))
        .await
        .unwrap();

    let request = sync.requests().get(local_id).unwrap();
    assert_eq!(request.status, RequestStatus::Approved);
    assert_eq!(request.decision_note.as_deref(), Some("ok"));
    assert_eq!(
        authority.recorded_decides(),
        vec![("A1".to_string(), Decision::Approve, "ok".to_string())]
    );
}

#[tokio::test]
async fn test_resolved_request_is_retained_not_removed() {
    let sync = make_sync(Arc::new(MockAuthority::new()));
    let local_id = sync.ingest_push(push_payload("A1")).unwrap();

    sync.resolve(local_id, Decision::Reject, None).await.unwrap();

    // Retained so the presentation layer can show what was decided.
    let request = sync.requests().get(local_id).unwrap();
    assert_eq!(request.status, RequestStatus::Rejected);
    assert_eq!(request.decision_note.as_deref(), Some(""));
    assert_eq!(sync.requests().count_pending(Timestamp::now()), 0);
}

// ---------------------------------------------------------------------------
// Deduplication
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_duplicate_delivery_across_channels() {
    let sync = make_sync(Arc::new(MockAuthority::new()));

    assert!(sync.ingest_push(push_payload("A1")).is_some());
    assert!(sync.ingest_pull(pull_payload("A1")).is_none());

    assert_eq!(sync.requests().len(), 1);
    assert_eq!(sync.requests().count_pending(Timestamp::now()), 1);
}

#[tokio::test]
async fn test_poll_once_dedups_against_pushed() {
    let authority = Arc::new(MockAuthority::new());
    let sync = make_sync(Arc::clone(&authority));

    sync.ingest_push(push_payload("A1")).unwrap();
    authority.set_pending(vec![pull_payload("A1"), pull_payload("A2")]);

    let added = sync.poll_once().await.unwrap();
    assert_eq!(added, 1);
    assert_eq!(sync.requests().count_pending(Timestamp::now()), 2);

    // Polling again adds nothing.
    assert_eq!(sync.poll_once().await.unwrap(), 0);
}

// ---------------------------------------------------------------------------
// Idempotent resolution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_resolve_unknown_id_is_noop() {
    let sync = make_sync(Arc::new(MockAuthority::new()));
    sync.resolve(LocalId::new(), Decision::Approve, None)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_resolve_twice_is_noop() {
    let authority = Arc::new(MockAuthority::new());
    let sync = make_sync(Arc::clone(&authority));
    let local_id = sync.ingest_push(push_payload("A1")).unwrap();

    sync.resolve(local_id, Decision::Approve, Some("ok".to_string()))
        .await
        .unwrap();
    sync.resolve(local_id, Decision::Reject, Some("changed my mind".to_string()))
        .await
        .unwrap();

    let request = sync.requests().get(local_id).unwrap();
    assert_eq!(request.status, RequestStatus::Approved);
    assert_eq!(request.decision_note.as_deref(), Some("ok"));
    assert_eq!(authority.recorded_decides().len(), 1);
}

// ---------------------------------------------------------------------------
// Stale convergence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_race_with_external_resolution() {
    let authority = Arc::new(MockAuthority::new());
    let sync = make_sync(Arc::clone(&authority));
    let local_id = sync.ingest_push(push_payload("A2")).unwrap();

    // Another actor decided A2 before our operator clicked.
    authority.set_status("A2", StatusLookup::Found(RemoteStatus::Other("APPROVED".to_string())));

    sync.resolve(local_id, Decision::Reject, None).await.unwrap();

    // Removed outright, not marked resolved, and no submission was made.
    assert!(sync.requests().get(local_id).is_none());
    assert!(authority.recorded_decides().is_empty());
}

#[tokio::test]
async fn test_status_not_found_purges_entry() {
    let authority = Arc::new(MockAuthority::new());
    let sync = make_sync(Arc::clone(&authority));
    let local_id = sync.ingest_push(push_payload("A1")).unwrap();

    authority.set_status("A1", StatusLookup::NotFound);
    sync.resolve(local_id, Decision::Approve, None).await.unwrap();

    assert!(sync.requests().get(local_id).is_none());
}

#[tokio::test]
async fn test_stale_at_submission_step() {
    for outcome in [DecideOutcome::NotFound, DecideOutcome::AlreadyDecided] {
        let authority = Arc::new(MockAuthority::new());
        let sync = make_sync(Arc::clone(&authority));
        let local_id = sync.ingest_push(push_payload("A1")).unwrap();

        // Status still reads pending, but the submission loses the race.
        authority.set_decide("A1", outcome);
        sync.resolve(local_id, Decision::Approve, None).await.unwrap();

        assert!(sync.requests().get(local_id).is_none());
    }
}

#[tokio::test]
async fn test_reobserved_key_converges_after_external_decision() {
    let authority = Arc::new(MockAuthority::new());
    let sync = make_sync(Arc::clone(&authority));

    let first = sync.ingest_push(push_payload("A1")).unwrap();
    sync.resolve(first, Decision::Approve, None).await.unwrap();

    // The key frees up once resolved; a second observation becomes a new
    // entry, but the authority now reports the window closed.
    let second = sync.ingest_push(push_payload("A1")).unwrap();
    authority.set_status("A1", StatusLookup::Found(RemoteStatus::Other("APPROVED".to_string())));
    sync.resolve(second, Decision::Reject, None).await.unwrap();

    assert!(sync.requests().get(second).is_none());
    assert_eq!(sync.requests().get(first).unwrap().status, RequestStatus::Approved);
}

// ---------------------------------------------------------------------------
// Transient errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_transient_error_keeps_request_pending() {
    let authority = Arc::new(MockAuthority::new());
    let sync = make_sync(Arc::clone(&authority));
    let local_id = sync.ingest_push(push_payload("A1")).unwrap();

    authority.set_fail_transport(true);
    let err = sync
        .resolve(local_id, Decision::Approve, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApprovalError::Authority(_)));
    assert!(sync.requests().get(local_id).unwrap().is_pending());

    // The operator retries once the network recovers.
    authority.set_fail_transport(false);
    sync.resolve(local_id, Decision::Approve, None).await.unwrap();
    assert_eq!(
        sync.requests().get(local_id).unwrap().status,
        RequestStatus::Approved
    );
}

// ---------------------------------------------------------------------------
// Local-only resolution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_synthetic_request_resolves_without_authority() {
    let authority = Arc::new(MockAuthority::new());
    let sync = make_sync(Arc::clone(&authority));

    let local_id = sync
        .ingest(InboundApproval::synthetic(
            "budget-gate",
            "budget reconfiguration",
            RequestContext::default(),
        ))
        .unwrap();

    sync.resolve(local_id, Decision::Approve, Some("raise it".to_string()))
        .await
        .unwrap();

    let request = sync.requests().get(local_id).unwrap();
    assert_eq!(request.status, RequestStatus::Approved);
    assert!(authority.recorded_decides().is_empty());
}

#[tokio::test]
async fn test_malformed_approval_id_resolves_locally() {
    let authority = Arc::new(MockAuthority::new());
    let sync = make_sync(Arc::clone(&authority));

    let local_id = sync.ingest_push(push_payload("not a valid id!")).unwrap();
    sync.resolve(local_id, Decision::Reject, None).await.unwrap();

    let request = sync.requests().get(local_id).unwrap();
    assert_eq!(request.status, RequestStatus::Rejected);
    // The authority was never contacted with the malformed identifier.
    assert!(authority.recorded_decides().is_empty());
}

// ---------------------------------------------------------------------------
// Expiry
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_expired_request_excluded_then_swept() {
    let sync = make_sync(Arc::new(MockAuthority::new()));
    sync.ingest_push(push_payload("A1")).unwrap();

    // Logically expired: excluded from the count while still present.
    assert_eq!(sync.requests().count_pending(minutes_ahead(31)), 0);
    assert_eq!(sync.requests().len(), 1);

    // Physically removed by the sweep.
    assert_eq!(sync.sweep_now(minutes_ahead(31)), 1);
    assert!(sync.requests().is_empty());
}

#[tokio::test]
async fn test_sweep_publishes_expired_events() {
    let sync = make_sync(Arc::new(MockAuthority::new()));
    let mut receiver = sync.subscribe();

    sync.ingest_push(push_payload("A1")).unwrap();
    sync.sweep_now(minutes_ahead(31));

    let ingested = receiver.recv().await.unwrap();
    assert_eq!(ingested.event_type(), "approval_ingested");
    let expired = receiver.recv().await.unwrap();
    assert_eq!(expired.event_type(), "approval_expired");
}

// ---------------------------------------------------------------------------
// Counter gate
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_budget_exhaustion_locks() {
    let sync = make_sync(Arc::new(MockAuthority::new()));
    let project = ProjectId::new("p-1");

    let applied = sync.apply_authoritative(&project, &settings_payload("p-1", 5, 0));
    assert!(applied.locked);
    assert!(sync.settings().get(&project).unwrap().locked);
}

#[tokio::test]
async fn test_settings_overwrite_is_total() {
    let sync = make_sync(Arc::new(MockAuthority::new()));
    let project = ProjectId::new("p-1");

    sync.apply_authoritative(&project, &settings_payload("p-1", 10, 10));
    let mut second = settings_payload("p-1", 3, 3);
    second.hitl_enabled = false;
    sync.apply_authoritative(&project, &second);

    let settings = sync.settings().get(&project).unwrap();
    assert_eq!(settings.counter_total, 3);
    assert_eq!(settings.counter_remaining, 3);
    assert!(!settings.enabled);
}

#[tokio::test]
async fn test_mutators_call_authority_first() {
    let authority = Arc::new(MockAuthority::new());
    let sync = make_sync(Arc::clone(&authority));
    let project = ProjectId::new("p-1");

    // The authority is down: nothing changes locally.
    authority.set_fail_transport(true);
    assert!(sync.toggle_enabled(&project, false).await.is_err());
    assert!(sync.set_budget(&project, 10, true).await.is_err());
    assert!(sync.halt_budget(&project).await.is_err());
    assert!(sync.settings().get(&project).is_none());

    // The authority answers: its payload is what gets applied.
    authority.set_fail_transport(false);
    authority.set_settings(settings_payload("p-1", 10, 7));
    let applied = sync.resume_with_budget(&project, Some(10)).await.unwrap();
    assert_eq!(applied.counter_remaining, 7);
    assert_eq!(sync.settings().get(&project), Some(applied));
}

#[tokio::test]
async fn test_push_settings_notification_converges() {
    let sync = make_sync(Arc::new(MockAuthority::new()));
    let mut receiver = sync.subscribe();

    let applied = sync.ingest_settings(settings_payload("p-2", 4, 1));
    assert!(!applied.locked);

    let event = receiver.recv().await.unwrap();
    assert_eq!(event.event_type(), "settings_updated");
}

// ---------------------------------------------------------------------------
// Events out
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_resolution_event_carries_approval_id() {
    let sync = make_sync(Arc::new(MockAuthority::new()));
    let mut receiver = sync.subscribe();

    let local_id = sync.ingest_push(push_payload("A1")).unwrap();
    sync.resolve(local_id, Decision::Approve, Some("ok".to_string()))
        .await
        .unwrap();

    let ingested = receiver.recv().await.unwrap();
    assert_eq!(ingested.event_type(), "approval_ingested");

    // The transcript collaborator correlates by approval id.
    let resolved = receiver.recv().await.unwrap();
    match resolved.as_ref() {
        VigilEvent::ApprovalResolved {
            approval_id,
            decision,
            note,
            ..
        } => {
            assert_eq!(approval_id.as_ref().map(ApprovalId::as_str), Some("A1"));
            assert_eq!(*decision, Decision::Approve);
            assert_eq!(note, "ok");
        },
        other => panic!("expected ApprovalResolved, got {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let config = SyncConfig {
        poll_interval_secs: 0,
        ..SyncConfig::default()
    };
    let result = ApprovalSync::new(
        Arc::new(MemorySnapshotStore::new()),
        Arc::new(MockAuthority::new()),
        config,
    );
    assert!(matches!(result, Err(ApprovalError::Config(_))));
}
