//! Event types published by the reconciliation engine.

use serde::{Deserialize, Serialize};
use vigil_core::{ApprovalId, Decision, LocalId, Priority, ProjectId};

/// A ledger-state change, as seen by frontends.
///
/// Resolution and expiry events carry the remote `approval_id` (when one
/// exists) because presentation-side records such as chat transcript
/// entries are correlated by that identifier, not by [`LocalId`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum VigilEvent {
    /// A new approval request passed the deduplication gate.
    ApprovalIngested {
        /// Process-local identifier of the new ledger entry.
        local_id: LocalId,
        /// Remote identifier, absent for synthetic local-only requests.
        approval_id: Option<String>,
        /// Name of the agent awaiting the decision.
        agent_name: String,
        /// Urgency of the request.
        priority: Priority,
    },
    /// A request reached a terminal status through the resolution pipeline.
    ApprovalResolved {
        /// Process-local identifier of the resolved entry.
        local_id: LocalId,
        /// Validated remote identifier; `None` for local-only resolutions.
        approval_id: Option<ApprovalId>,
        /// The decision the operator made.
        decision: Decision,
        /// Operator note recorded with the decision.
        note: String,
    },
    /// A request outlived its time-to-live and was removed by the sweeper.
    ApprovalExpired {
        /// Process-local identifier of the removed entry.
        local_id: LocalId,
        /// Remote identifier, when the request had one.
        approval_id: Option<String>,
    },
    /// A project's oversight settings were replaced by an authoritative payload.
    SettingsUpdated {
        /// The project whose settings changed.
        project_id: ProjectId,
        /// Whether human approval is currently required.
        enabled: bool,
        /// Size of the auto-approval budget.
        counter_total: u32,
        /// Auto-approvals left in the budget.
        counter_remaining: u32,
        /// Whether the budget is exhausted and must be re-armed.
        locked: bool,
    },
}

impl VigilEvent {
    /// Stable string tag for logging and filtering.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ApprovalIngested { .. } => "approval_ingested",
            Self::ApprovalResolved { .. } => "approval_resolved",
            Self::ApprovalExpired { .. } => "approval_expired",
            Self::SettingsUpdated { .. } => "settings_updated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_tags() {
        let event = VigilEvent::ApprovalIngested {
            local_id: LocalId::new(),
            approval_id: Some("A1".to_string()),
            agent_name: "analyst".to_string(),
            priority: Priority::Medium,
        };
        assert_eq!(event.event_type(), "approval_ingested");

        let event = VigilEvent::SettingsUpdated {
            project_id: ProjectId::new("p1"),
            enabled: true,
            counter_total: 5,
            counter_remaining: 0,
            locked: true,
        };
        assert_eq!(event.event_type(), "settings_updated");
    }

    #[test]
    fn test_event_serialization() {
        let event = VigilEvent::ApprovalResolved {
            local_id: LocalId::new(),
            approval_id: Some(ApprovalId::parse("A1").unwrap()),
            decision: Decision::Approve,
            note: "ok".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"approval_resolved\""));
        let back: VigilEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.event_type(), "approval_resolved");
    }
}
