//! The remote authority port.
//!
//! The authority holds the authoritative record of every approval and of
//! per-project oversight settings. The engine never trusts its own view
//! over the authority's: status checks gate every decision submission,
//! and settings mutations apply locally only after the authority has
//! acknowledged them.

use async_trait::async_trait;
use vigil_core::{ApprovalId, Decision, ProjectId};

use crate::event::{PullApprovalPayload, SettingsPayload};

pub mod http;

/// Status of an approval as reported by the authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus {
    /// The decision window is still open.
    Pending,
    /// Any other status the authority reports; the exact label is kept
    /// for logging but all non-pending statuses are treated alike.
    Other(String),
}

impl RemoteStatus {
    /// Map a wire status label; `"PENDING"` is matched case-insensitively.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        if label.eq_ignore_ascii_case("pending") {
            Self::Pending
        } else {
            Self::Other(label.to_string())
        }
    }

    /// Whether the decision window is still open.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// Result of asking the authority about an approval's status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusLookup {
    /// The approval exists with the given status.
    Found(RemoteStatus),
    /// The authority has no record of the approval — someone else already
    /// closed the decision window.
    NotFound,
}

/// Result of submitting a decision to the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecideOutcome {
    /// The decision was recorded.
    Accepted,
    /// The approval no longer exists.
    NotFound,
    /// Another resolver decided first.
    AlreadyDecided,
}

/// Transport-level failures talking to the authority.
///
/// These are the *transient* errors of the taxonomy: the request stays
/// pending locally and the operator may retry.
#[derive(Debug, thiserror::Error)]
pub enum AuthorityError {
    /// The request never completed (connect, timeout, TLS).
    #[error("transport error: {0}")]
    Transport(String),

    /// The authority answered with an unexpected HTTP status.
    #[error("authority returned http {status}")]
    Http {
        /// The unexpected status code.
        status: u16,
    },

    /// The authority's response body could not be decoded.
    #[error("malformed authority response: {0}")]
    Decode(String),
}

/// Operations the engine consumes from the remote authority.
///
/// Implementations must be safe to call concurrently; the engine issues
/// status checks, decision submissions, and settings mutations from
/// independent tasks.
#[async_trait]
pub trait ApprovalAuthority: Send + Sync {
    /// Current status of an approval.
    async fn status(&self, id: &ApprovalId) -> Result<StatusLookup, AuthorityError>;

    /// Submit a human decision for an approval.
    async fn decide(
        &self,
        id: &ApprovalId,
        decision: Decision,
        note: &str,
    ) -> Result<DecideOutcome, AuthorityError>;

    /// All approvals currently awaiting a decision, pull-channel shaped.
    async fn fetch_pending(&self) -> Result<Vec<PullApprovalPayload>, AuthorityError>;

    /// Current oversight settings for a project.
    async fn settings(&self, project: &ProjectId) -> Result<SettingsPayload, AuthorityError>;

    /// Switch human approval on or off for a project.
    async fn toggle(
        &self,
        project: &ProjectId,
        enabled: bool,
    ) -> Result<SettingsPayload, AuthorityError>;

    /// Set the auto-approval budget, optionally resetting the remainder.
    async fn set_budget(
        &self,
        project: &ProjectId,
        total: u32,
        reset: bool,
    ) -> Result<SettingsPayload, AuthorityError>;

    /// Re-arm auto-approval, optionally with a new budget size.
    async fn resume(
        &self,
        project: &ProjectId,
        total: Option<u32>,
    ) -> Result<SettingsPayload, AuthorityError>;

    /// Exhaust the budget immediately, restoring human oversight.
    async fn halt(&self, project: &ProjectId) -> Result<SettingsPayload, AuthorityError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_status_from_label() {
        assert_eq!(RemoteStatus::from_label("PENDING"), RemoteStatus::Pending);
        assert_eq!(RemoteStatus::from_label("pending"), RemoteStatus::Pending);
        assert!(RemoteStatus::from_label("PENDING").is_pending());

        let other = RemoteStatus::from_label("APPROVED");
        assert!(!other.is_pending());
        assert_eq!(other, RemoteStatus::Other("APPROVED".to_string()));
    }
}
