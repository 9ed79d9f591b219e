//! Prelude module - commonly used types for convenient import.
//!
//! Use `use vigil_approval::prelude::*;` to import the engine surface.

// Errors
pub use crate::{ApprovalError, ApprovalResult};

// The engine and its contracts
pub use crate::{ApprovalSync, RequestLedger, SettingsLedger, SyncConfig, SyncHandles};

// Requests and settings
pub use crate::{ApprovalRequest, HitlSettings, RequestContext, RequestStatus};

// Inbound payloads
pub use crate::{InboundApproval, PullApprovalPayload, PushApprovalPayload, SettingsPayload};

// The authority port
pub use crate::{ApprovalAuthority, AuthorityError, DecideOutcome, RemoteStatus, StatusLookup};

// Core vocabulary
pub use vigil_core::{ApprovalId, Decision, LocalId, Priority, ProjectId, Timestamp};
