//! # TaskGate Configuration System
//!
//! Configuration management for the invocation layer. All tunables live in an
//! explicit, validated configuration tree instead of scattered environment
//! lookups at call sites.
//!
//! ## Architecture
//!
//! - **Layered Loading**: compiled defaults, then optional TOML files, then
//!   `TASKGATE__*` environment variables
//! - **Environment Awareness**: development/test/production overlays
//! - **Explicit Validation**: invalid values fail loading instead of being
//!   silently clamped
//!
//! ## Usage
//!
//! ```rust,no_run
//! use taskgate_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load configuration (environment auto-detected)
//! let manager = ConfigManager::load()?;
//!
//! // Access configuration values
//! let queue = &manager.config().queue.default_queue;
//! let stale = manager.config().timing.default_stale_time_limit();
//! # Ok(())
//! # }
//! ```

pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub use loader::ConfigManager;

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("Invalid configuration value for '{field}' ({value}): {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Root configuration structure for the invocation layer
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GateConfig {
    /// Queue routing settings
    pub queue: QueueSettings,

    /// Global timing defaults used by the time policy
    pub timing: TimingConfig,

    /// Unique-task deduplication settings
    pub dedup: DedupConfig,

    /// Execution mode settings
    pub execution: ExecutionConfig,

    /// Lifecycle event channel settings
    pub events: EventsConfig,
}

/// Queue routing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueSettings {
    /// Queue used when neither the task definition nor the invocation names one
    pub default_queue: String,
}

/// Global timing defaults
///
/// Every field is optional. `None` means the installation has no global
/// default and per-task settings are the only source.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimingConfig {
    /// Fallback hard time limit applied when a task defines none
    pub default_task_time_limit_seconds: Option<u64>,

    /// Fallback stale time limit applied when a task defines none
    pub default_stale_time_limit_seconds: Option<u64>,

    /// Expected worst-case queue waiting time, used to derive stale limits
    pub default_max_queue_waiting_time_seconds: Option<u64>,
}

impl TimingConfig {
    /// Get default task time limit as Duration
    pub fn default_task_time_limit(&self) -> Option<Duration> {
        self.default_task_time_limit_seconds.map(Duration::from_secs)
    }

    /// Get default stale time limit as Duration
    pub fn default_stale_time_limit(&self) -> Option<Duration> {
        self.default_stale_time_limit_seconds.map(Duration::from_secs)
    }

    /// Get default max queue waiting time as Duration
    pub fn default_max_queue_waiting_time(&self) -> Option<Duration> {
        self.default_max_queue_waiting_time_seconds
            .map(Duration::from_secs)
    }
}

/// Unique-task deduplication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DedupConfig {
    /// Prefix baked into every dedup cache key, isolating installations
    /// that share one cache backend
    pub key_prefix: String,
}

/// Execution mode configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutionConfig {
    /// Run every invocation inline instead of dispatching to the queue.
    /// Test-environment switch; uniqueness reservation is skipped here.
    pub always_eager: bool,
}

/// Lifecycle event channel configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventsConfig {
    /// Broadcast channel capacity; slow subscribers observe Lagged past this
    pub channel_capacity: usize,
}

impl GateConfig {
    /// Validate configuration values that serde cannot express
    pub fn validate(&self) -> ConfigResult<()> {
        if self.queue.default_queue.is_empty() {
            return Err(ConfigError::invalid_value(
                "queue.default_queue",
                "\"\"",
                "default queue name must not be empty",
            ));
        }

        if self.dedup.key_prefix.is_empty() {
            return Err(ConfigError::invalid_value(
                "dedup.key_prefix",
                "\"\"",
                "dedup key prefix must not be empty",
            ));
        }

        if self.events.channel_capacity == 0 {
            return Err(ConfigError::invalid_value(
                "events.channel_capacity",
                "0",
                "event channel capacity must be at least 1",
            ));
        }

        Ok(())
    }
}

impl Default for GateConfig {
    /// Safe fallback configuration used when no file or environment
    /// overrides are present
    fn default() -> Self {
        Self {
            queue: QueueSettings {
                default_queue: crate::constants::system::DEFAULT_QUEUE.to_string(),
            },
            timing: TimingConfig {
                default_task_time_limit_seconds: None,
                default_stale_time_limit_seconds: None,
                default_max_queue_waiting_time_seconds: None,
            },
            dedup: DedupConfig {
                key_prefix: "taskgate".to_string(),
            },
            execution: ExecutionConfig { always_eager: false },
            events: EventsConfig {
                channel_capacity: crate::constants::system::DEFAULT_EVENT_CHANNEL_CAPACITY,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = GateConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.queue.default_queue, "default");
        assert_eq!(config.dedup.key_prefix, "taskgate");
        assert!(!config.execution.always_eager);
    }

    #[test]
    fn timing_accessors_convert_seconds() {
        let timing = TimingConfig {
            default_task_time_limit_seconds: Some(60),
            default_stale_time_limit_seconds: None,
            default_max_queue_waiting_time_seconds: Some(100),
        };

        assert_eq!(timing.default_task_time_limit(), Some(Duration::from_secs(60)));
        assert_eq!(timing.default_stale_time_limit(), None);
        assert_eq!(
            timing.default_max_queue_waiting_time(),
            Some(Duration::from_secs(100))
        );
    }

    #[test]
    fn validation_rejects_empty_queue_name() {
        let mut config = GateConfig::default();
        config.queue.default_queue = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_zero_channel_capacity() {
        let mut config = GateConfig::default();
        config.events.channel_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_round_trips_through_serde() {
        let config = GateConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let restored: GateConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.queue.default_queue, config.queue.default_queue);
        assert_eq!(
            restored.events.channel_capacity,
            config.events.channel_capacity
        );
    }
}
