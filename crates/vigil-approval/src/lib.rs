//! Vigil Approval - the approval-request lifecycle and reconciliation engine.
//!
//! Autonomous agents request human approval before costly or irreversible
//! actions. This crate keeps a consistent view of "which approval requests
//! currently need a human decision" across three independent, partially
//! unreliable sources — a real-time push channel, a periodic pull
//! fallback, and a locally persisted cache — while enforcing:
//!
//! - **Deduplication**: the same underlying approval is routinely observed
//!   by both channels; the ledger never holds two pending entries for one
//!   identity key.
//! - **Expiry**: requests that outlive their time-to-live without a
//!   decision are removed, at startup and on a fixed interval.
//! - **Idempotent resolution**: re-resolving a request, or racing another
//!   resolver, converges instead of erroring or double-submitting.
//! - **The counter gate**: a bounded auto-approval budget mirrored from
//!   the remote authority, which alone computes its numbers.
//!
//! The remote authority is the source of truth the engine reconciles
//! against, behind the [`ApprovalAuthority`] port; [`HttpAuthority`] is
//! the production adapter. Persistence sits behind the narrow
//! [`vigil_storage::SnapshotStore`] port, and frontends observe ledger
//! changes through the [`vigil_events::EventBus`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vigil_approval::{ApprovalSync, HttpAuthority, SyncConfig};
//! use vigil_storage::FileSnapshotStore;
//!
//! # async fn example() -> vigil_approval::ApprovalResult<()> {
//! let authority = Arc::new(HttpAuthority::new("https://authority.example")?);
//! let store = Arc::new(FileSnapshotStore::new("/var/lib/vigil/ledger.json"));
//! let sync = Arc::new(ApprovalSync::new(store, authority, SyncConfig::default())?);
//!
//! // Restore the cache, sweep, and start the background loops.
//! let _handles = sync.start();
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod authority;
pub mod config;
pub mod error;
pub mod event;
pub mod ledger;
pub mod request;
pub mod settings;
pub mod snapshot;
pub mod sync;

mod state;

pub use authority::http::HttpAuthority;
pub use authority::{
    ApprovalAuthority, AuthorityError, DecideOutcome, RemoteStatus, StatusLookup,
};
pub use config::{ConfigError, SyncConfig};
pub use error::{ApprovalError, ApprovalResult};
pub use event::{
    InboundApproval, PullApprovalIdentity, PullApprovalPayload, PushApprovalPayload, RequestData,
    SettingsPayload,
};
pub use ledger::RequestLedger;
pub use request::{ApprovalRequest, RequestContext, RequestStatus};
pub use settings::{HitlSettings, SettingsLedger};
pub use snapshot::{LedgerSnapshot, SNAPSHOT_VERSION, SnapshotError};
pub use sync::{AbortOnDrop, ApprovalSync, SyncHandles};
