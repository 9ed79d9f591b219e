//! Engine configuration.

use serde::{Deserialize, Serialize};

fn default_request_ttl_secs() -> u64 {
    // Operator-visible: how long a request may wait for a decision.
    30 * 60
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_poll_interval_secs() -> u64 {
    15
}

fn default_event_capacity() -> usize {
    1024
}

/// Configuration for the reconciliation engine.
///
/// All fields have defaults, so an empty TOML table is a valid config.
///
/// # Example
///
/// ```
/// use vigil_approval::config::SyncConfig;
///
/// let config = SyncConfig::from_toml_str("poll_interval_secs = 30").unwrap();
/// assert_eq!(config.poll_interval_secs, 30);
/// assert_eq!(config.request_ttl_secs, 1800);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Time-to-live for an undecided request, in seconds.
    #[serde(default = "default_request_ttl_secs")]
    pub request_ttl_secs: u64,

    /// Interval between expiry sweeps, in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Interval between pull-fallback polls of the authority, in seconds.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Capacity of the outbound event channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            request_ttl_secs: default_request_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl SyncConfig {
    /// Parse a config from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the TOML is malformed or a field fails
    /// validation.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when any interval or capacity is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "request_ttl_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "sweep_interval_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "poll_interval_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "event_capacity",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Request time-to-live as a chrono duration.
    #[must_use]
    pub fn request_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.request_ttl_secs).unwrap_or(i64::MAX))
    }

    /// Sweep interval as a std duration.
    #[must_use]
    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs)
    }

    /// Poll interval as a std duration.
    #[must_use]
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_secs)
    }
}

/// Errors from configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A field value failed validation.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// The TOML input could not be parsed.
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}
