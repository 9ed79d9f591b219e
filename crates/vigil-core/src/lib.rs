//! Vigil Core - Foundation types for the Vigil oversight engine.
//!
//! This crate provides:
//! - Typed identifiers used throughout the runtime
//! - Timestamp handling for expiry computation
//! - The decision and priority vocabulary shared by engine and frontends
//! - Version management for persisted-state migrations

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod types;
pub mod version;

pub use types::{
    ApprovalId, Decision, InvalidApprovalId, LocalId, Priority, ProjectId, TaskId, Timestamp,
};
pub use version::{Version, VersionParseError};
