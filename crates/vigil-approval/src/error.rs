//! Error types and results for the reconciliation engine.
//!
//! Only *transient* conditions surface to callers: a remote call that
//! failed for reasons other than "the decision point no longer exists".
//! Stale and format conditions are absorbed internally — the ledger
//! converges and nothing is reported as a failure, because from the
//! operator's point of view nothing went wrong.

use crate::authority::AuthorityError;
use crate::config::ConfigError;

/// Errors surfaced by the reconciliation engine.
#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    /// A remote authority call failed; the request stays pending and the
    /// operator may retry.
    #[error("authority call failed: {0}")]
    Authority(#[from] AuthorityError),

    /// The engine configuration failed validation.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for engine operations.
pub type ApprovalResult<T> = Result<T, ApprovalError>;
