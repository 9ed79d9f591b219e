//! Approval request types held by the ledger.

use serde::{Deserialize, Serialize};
use std::fmt;
use vigil_core::{ApprovalId, Decision, LocalId, Priority, ProjectId, TaskId, Timestamp};

use crate::event::InboundApproval;

/// Lifecycle status of an approval request.
///
/// `Pending` is the only non-terminal status. A request never transitions
/// between terminal statuses; re-resolution attempts are no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Awaiting a human decision.
    Pending,
    /// The operator allowed the action.
    Approved,
    /// The operator refused the action.
    Rejected,
    /// The operator allowed the action with modifications.
    Amended,
}

impl RequestStatus {
    /// Whether this request still needs a decision.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// The terminal status a decision resolves to.
    #[must_use]
    pub fn from_decision(decision: Decision) -> Self {
        match decision {
            Decision::Approve => Self::Approved,
            Decision::Reject => Self::Rejected,
            Decision::Amend => Self::Amended,
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
            Self::Amended => write!(f, "amended"),
        }
    }
}

/// Opaque structured payload carried with a request.
///
/// The engine never interprets these fields; they exist so the
/// presentation layer can show the operator what the agent is asking to
/// spend and where the request came from. Unknown wire fields are
/// preserved in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Estimated token usage of the gated action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_tokens: Option<u64>,
    /// Estimated cost of the gated action, in USD.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_cost: Option<f64>,
    /// Authority-side expiry hint, advisory only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
    /// The task that originated the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    /// The project that originated the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    /// What the agent intends to do.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Remaining wire fields, passed through untouched.
    #[serde(default, flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One human decision point.
///
/// Created by ingestion, mutated only by the resolution pipeline or the
/// expiry sweeper. Presentation code reads these and calls resolution
/// intents; it never mutates fields directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Process-local identifier, assigned at ingestion, never reused.
    pub local_id: LocalId,
    /// Remote identifier exactly as observed on the wire.
    ///
    /// Kept raw: format validation happens at resolution time via
    /// [`remote_id`](Self::remote_id), so a malformed identifier still
    /// deduplicates correctly and renders to the operator.
    pub approval_id: Option<String>,
    /// Name of the agent awaiting the decision.
    pub agent_name: String,
    /// Free-form classification, e.g. "pre-execution approval".
    pub request_kind: String,
    /// Opaque payload for the presentation layer.
    pub context: RequestContext,
    /// Urgency of the request.
    pub priority: Priority,
    /// Fixed at ingestion; expiry is computed from this, never refreshed.
    pub created_at: Timestamp,
    /// Lifecycle status.
    pub status: RequestStatus,
    /// Operator note recorded at resolution.
    ///
    /// Always `Some` (possibly empty) once the status is terminal.
    pub decision_note: Option<String>,
}

impl ApprovalRequest {
    /// Build a pending request from a normalized inbound event.
    #[must_use]
    pub fn from_inbound(inbound: InboundApproval, now: Timestamp) -> Self {
        Self {
            local_id: LocalId::new(),
            approval_id: inbound.approval_id,
            agent_name: inbound.agent_name,
            request_kind: inbound.request_kind,
            context: inbound.context,
            priority: inbound.priority,
            created_at: now,
            status: RequestStatus::Pending,
            decision_note: None,
        }
    }

    /// The key the deduplication gate recognizes this request by.
    ///
    /// The remote identifier when one was observed (malformed or not),
    /// otherwise a synthesized key unique to this process.
    #[must_use]
    pub fn identity_key(&self) -> String {
        match &self.approval_id {
            Some(id) => id.clone(),
            None => self.local_id.to_string(),
        }
    }

    /// The validated remote identifier, when one exists.
    ///
    /// Returns `None` both for requests that never had a remote
    /// identifier and for requests whose identifier fails format
    /// validation — either way the request is local-only and no remote
    /// call may be attempted for it.
    #[must_use]
    pub fn remote_id(&self) -> Option<ApprovalId> {
        self.approval_id
            .as_deref()
            .and_then(|raw| ApprovalId::parse(raw).ok())
    }

    /// Whether this request still needs a decision.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status.is_pending()
    }

    /// Whether this request has outlived `ttl` as of `now`.
    ///
    /// A request can be logically expired before the sweeper has run;
    /// pending counts apply this check inline.
    #[must_use]
    pub fn is_expired(&self, now: Timestamp, ttl: chrono::Duration) -> bool {
        self.created_at.elapsed_until(now) > ttl
    }
}

impl fmt::Display for ApprovalRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} ({})",
            self.priority, self.agent_name, self.request_kind, self.status
        )
    }
}
