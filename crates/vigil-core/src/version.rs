//! Version management for persisted-state migrations.
//!
//! The persisted ledger snapshot carries a schema version so that a format
//! change is detected on load and the cache discarded rather than misread.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Semantic version following semver conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version {
    /// Major version - breaking changes
    pub major: u32,
    /// Minor version - new features, backwards compatible
    pub minor: u32,
    /// Patch version - bug fixes, backwards compatible
    pub patch: u32,
}

impl Version {
    /// Creates a new version.
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Checks whether data written at `written` can be read by this version.
    ///
    /// Compatibility requires an equal major version; minor and patch
    /// differences are readable.
    #[must_use]
    pub fn can_read(&self, written: &Self) -> bool {
        self.major == written.major
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('.');
        let (Some(major), Some(minor), Some(patch), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(VersionParseError::InvalidFormat(s.to_string()));
        };
        Ok(Self {
            major: major.parse().map_err(VersionParseError::InvalidNumber)?,
            minor: minor.parse().map_err(VersionParseError::InvalidNumber)?,
            patch: patch.parse().map_err(VersionParseError::InvalidNumber)?,
        })
    }
}

/// Error returned when parsing a version string fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionParseError {
    /// Wrong number of segments (expected "major.minor.patch").
    #[error("invalid version format: {0} (expected major.minor.patch)")]
    InvalidFormat(String),
    /// A numeric segment could not be parsed.
    #[error("invalid version number: {0}")]
    InvalidNumber(std::num::ParseIntError),
}
