//! Vigil Storage - local snapshot persistence.
//!
//! The ledger survives process restarts by writing its full state through
//! a deliberately narrow port: [`SnapshotStore`] knows how to `load` and
//! `save` one opaque byte record and nothing else. The engine owns the
//! record's schema (and its versioning); this crate owns where the bytes
//! live.
//!
//! Two implementations ship:
//!
//! - [`MemorySnapshotStore`] — keeps the record in memory; used by tests
//!   and by sessions that opt out of persistence.
//! - [`FileSnapshotStore`] — a single file on disk, replaced atomically
//!   on every save so a crash mid-write never corrupts the cache.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use store::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore};
