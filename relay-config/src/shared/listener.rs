//! Listener configuration for the notification channel subscription.

use std::time::Duration;

use serde::Deserialize;

use crate::shared::ValidationError;

/// Configuration for the notification channel subscription.
///
/// The backoff bounds apply to the driver-side reconnect loop that keeps the
/// subscription alive across session losses. The idle timeout controls how
/// long the processor waits without traffic before probing the connection.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenerConfig {
    /// Name of the notification channel to subscribe to.
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Minimum reconnect backoff in milliseconds after a session loss.
    ///
    /// Default: 5000 (5 seconds)
    #[serde(default = "default_min_backoff_ms")]
    pub min_backoff_ms: u64,

    /// Maximum reconnect backoff in milliseconds after repeated failures.
    ///
    /// Default: 600000 (10 minutes)
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Maximum duration in milliseconds the processor waits without any
    /// notification before probing the connection for liveness.
    ///
    /// Default: 90000 (90 seconds)
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
}

impl ListenerConfig {
    /// Default subscription channel name.
    pub const DEFAULT_CHANNEL: &'static str = "events";

    /// Default minimum reconnect backoff: 5 seconds.
    pub const DEFAULT_MIN_BACKOFF_MS: u64 = 5_000;

    /// Default maximum reconnect backoff: 10 minutes.
    pub const DEFAULT_MAX_BACKOFF_MS: u64 = 600_000;

    /// Default idle timeout: 90 seconds.
    pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 90_000;

    /// Validates the listener configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.channel.is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "channel".to_string(),
                constraint: "must not be empty".to_string(),
            });
        }

        if self.min_backoff_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "min_backoff_ms".to_string(),
                constraint: "must be greater than zero".to_string(),
            });
        }

        if self.min_backoff_ms > self.max_backoff_ms {
            return Err(ValidationError::InvalidFieldValue {
                field: "min_backoff_ms".to_string(),
                constraint: "must be <= max_backoff_ms".to_string(),
            });
        }

        if self.idle_timeout_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "idle_timeout_ms".to_string(),
                constraint: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    /// Minimum reconnect backoff as a [`Duration`].
    pub fn min_backoff(&self) -> Duration {
        Duration::from_millis(self.min_backoff_ms)
    }

    /// Maximum reconnect backoff as a [`Duration`].
    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    /// Idle timeout as a [`Duration`].
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            min_backoff_ms: default_min_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
        }
    }
}

fn default_channel() -> String {
    ListenerConfig::DEFAULT_CHANNEL.to_string()
}

fn default_min_backoff_ms() -> u64 {
    ListenerConfig::DEFAULT_MIN_BACKOFF_MS
}

fn default_max_backoff_ms() -> u64 {
    ListenerConfig::DEFAULT_MAX_BACKOFF_MS
}

fn default_idle_timeout_ms() -> u64 {
    ListenerConfig::DEFAULT_IDLE_TIMEOUT_MS
}
