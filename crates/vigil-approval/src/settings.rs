//! Per-project oversight settings and their ledger.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use vigil_core::ProjectId;

use crate::event::SettingsPayload;
use crate::state::StateCell;

/// Human-in-the-loop configuration for one project.
///
/// The counter fields are mirrors of authoritative numbers: the remote
/// authority decrements `counter_remaining` as it auto-approves actions
/// against the budget, and this record only ever changes by being
/// overwritten wholesale with the authority's latest payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitlSettings {
    /// Whether human approval is currently required at all.
    pub enabled: bool,
    /// Size of the auto-approval budget.
    pub counter_total: u32,
    /// Auto-approvals left in the budget.
    pub counter_remaining: u32,
    /// Whether the budget is exhausted and oversight must be manually
    /// re-armed.
    pub locked: bool,
}

impl HitlSettings {
    /// Build settings from an authoritative payload.
    ///
    /// `counter_remaining` is clamped into `0..=counter_total`. `locked`
    /// is taken from the payload when stated, otherwise derived from the
    /// counter reaching zero.
    #[must_use]
    pub fn from_payload(payload: &SettingsPayload) -> Self {
        let counter_remaining = payload.counter_remaining.min(payload.counter_total);
        Self {
            enabled: payload.hitl_enabled,
            counter_total: payload.counter_total,
            counter_remaining,
            locked: payload.locked.unwrap_or(counter_remaining == 0),
        }
    }
}

impl fmt::Display for HitlSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hitl {} budget {}/{}{}",
            if self.enabled { "on" } else { "off" },
            self.counter_remaining,
            self.counter_total,
            if self.locked { " (locked)" } else { "" }
        )
    }
}

/// Ledger of per-project oversight settings.
///
/// Records are created lazily on first observation and replaced wholesale
/// by every authoritative payload; counter fields are never merged or
/// computed locally.
pub struct SettingsLedger {
    cell: Arc<StateCell>,
}

impl SettingsLedger {
    pub(crate) fn new(cell: Arc<StateCell>) -> Self {
        Self { cell }
    }

    /// Overwrite a project's settings with an authoritative payload.
    ///
    /// Persists the ledger snapshot write-through. Returns the applied
    /// settings.
    pub fn apply(&self, project: &ProjectId, payload: &SettingsPayload) -> HitlSettings {
        let settings = HitlSettings::from_payload(payload);
        let mut state = self.cell.write();
        state.settings.insert(project.clone(), settings);
        self.cell.persist(&state);
        settings
    }

    /// Current settings for a project, if any have been observed.
    #[must_use]
    pub fn get(&self, project: &ProjectId) -> Option<HitlSettings> {
        self.cell.read().settings.get(project).copied()
    }

    /// All per-project settings currently held.
    #[must_use]
    pub fn all(&self) -> HashMap<ProjectId, HitlSettings> {
        self.cell.read().settings.clone()
    }

    /// Number of projects with observed settings.
    #[must_use]
    pub fn count(&self) -> usize {
        self.cell.read().settings.len()
    }
}

impl fmt::Debug for SettingsLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsLedger")
            .field("count", &self.count())
            .finish()
    }
}
