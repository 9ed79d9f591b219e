//! Inbound wire payloads and their normalization.
//!
//! Approval-need notifications reach the engine over two channels that
//! describe the same underlying fact with different field naming: the
//! push transport delivers a flat record, the pull fallback returns the
//! approval identity nested under an `approval` object. Both shapes
//! convert into one [`InboundApproval`] before touching the ledger, so
//! the deduplication gate only ever reasons about a single event shape.

use serde::{Deserialize, Serialize};
use vigil_core::{Priority, ProjectId, TaskId, Timestamp};

use crate::request::RequestContext;

/// Free-form request body shared by both wire shapes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestData {
    /// What the agent intends to do.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Remaining fields, preserved untouched.
    #[serde(default, flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Approval-need notification as delivered by the push transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushApprovalPayload {
    /// Remote approval identifier.
    pub approval_id: String,
    /// Agent classification, e.g. "analyst".
    pub agent_type: String,
    /// Request classification, e.g. "pre-execution".
    pub request_type: String,
    /// Estimated token usage.
    #[serde(default)]
    pub estimated_tokens: Option<u64>,
    /// Estimated cost in USD.
    #[serde(default)]
    pub estimated_cost: Option<f64>,
    /// Authority-side expiry hint.
    #[serde(default)]
    pub expires_at: Option<Timestamp>,
    /// Originating task.
    #[serde(default)]
    pub task_id: Option<String>,
    /// Originating project.
    #[serde(default)]
    pub project_id: Option<String>,
    /// Urgency; defaults to medium when the transport omits it.
    #[serde(default)]
    pub priority: Option<Priority>,
    /// Free-form request body.
    #[serde(default)]
    pub request_data: Option<RequestData>,
}

/// Identity block nested inside a pull-channel record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullApprovalIdentity {
    /// Remote approval identifier.
    pub id: String,
    /// Agent classification.
    pub agent: String,
    /// Request classification.
    pub kind: String,
}

/// Approval-need record as returned by the pull endpoint.
///
/// Carries the same logical content as [`PushApprovalPayload`] with the
/// identity nested and shorter field names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullApprovalPayload {
    /// Nested identity block.
    pub approval: PullApprovalIdentity,
    /// Estimated token usage.
    #[serde(default)]
    pub tokens: Option<u64>,
    /// Estimated cost in USD.
    #[serde(default)]
    pub cost: Option<f64>,
    /// Authority-side expiry hint.
    #[serde(default)]
    pub expires_at: Option<Timestamp>,
    /// Originating task.
    #[serde(default)]
    pub task: Option<String>,
    /// Originating project.
    #[serde(default)]
    pub project: Option<String>,
    /// Urgency; defaults to medium when the endpoint omits it.
    #[serde(default)]
    pub priority: Option<Priority>,
    /// Free-form request body.
    #[serde(default)]
    pub data: Option<RequestData>,
}

/// One approval-need event, channel differences erased.
#[derive(Debug, Clone)]
pub struct InboundApproval {
    /// Remote identifier exactly as observed; `None` for synthetic
    /// local-only requests.
    pub approval_id: Option<String>,
    /// Name of the agent awaiting the decision.
    pub agent_name: String,
    /// Free-form request classification.
    pub request_kind: String,
    /// Urgency of the request.
    pub priority: Priority,
    /// Opaque payload for the presentation layer.
    pub context: RequestContext,
}

impl InboundApproval {
    /// Build a synthetic local-only event with no remote counterpart.
    ///
    /// Used for decision points the client invents itself, such as
    /// budget-reconfiguration prompts.
    #[must_use]
    pub fn synthetic(
        agent_name: impl Into<String>,
        request_kind: impl Into<String>,
        context: RequestContext,
    ) -> Self {
        Self {
            approval_id: None,
            agent_name: agent_name.into(),
            request_kind: request_kind.into(),
            priority: Priority::default(),
            context,
        }
    }
}

impl From<PushApprovalPayload> for InboundApproval {
    fn from(payload: PushApprovalPayload) -> Self {
        let data = payload.request_data.unwrap_or_default();
        Self {
            approval_id: Some(payload.approval_id),
            agent_name: payload.agent_type,
            request_kind: payload.request_type,
            priority: payload.priority.unwrap_or_default(),
            context: RequestContext {
                estimated_tokens: payload.estimated_tokens,
                estimated_cost: payload.estimated_cost,
                expires_at: payload.expires_at,
                task_id: payload.task_id.map(TaskId::new),
                project_id: payload.project_id.map(ProjectId::new),
                instructions: data.instructions,
                extra: data.extra,
            },
        }
    }
}

impl From<PullApprovalPayload> for InboundApproval {
    fn from(payload: PullApprovalPayload) -> Self {
        let data = payload.data.unwrap_or_default();
        Self {
            approval_id: Some(payload.approval.id),
            agent_name: payload.approval.agent,
            request_kind: payload.approval.kind,
            priority: payload.priority.unwrap_or_default(),
            context: RequestContext {
                estimated_tokens: payload.tokens,
                estimated_cost: payload.cost,
                expires_at: payload.expires_at,
                task_id: payload.task.map(TaskId::new),
                project_id: payload.project.map(ProjectId::new),
                instructions: data.instructions,
                extra: data.extra,
            },
        }
    }
}

/// Authoritative per-project oversight settings, as delivered by the
/// push channel's settings-changed notification and by every settings
/// command response.
///
/// Field values always *replace* local state wholesale; nothing in this
/// payload is ever merged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPayload {
    /// The project these settings belong to.
    pub project_id: String,
    /// Size of the auto-approval budget.
    pub counter_total: u32,
    /// Auto-approvals left in the budget.
    pub counter_remaining: u32,
    /// Whether human approval is required at all.
    pub hitl_enabled: bool,
    /// Explicit lock override; derived from the counter when absent.
    #[serde(default)]
    pub locked: Option<bool>,
    /// Why the authority sent this payload, informational only.
    #[serde(default)]
    pub reason: Option<String>,
}
