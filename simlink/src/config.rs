//! Client configuration.
//!
//! Durations are serialized as whole milliseconds so config files stay
//! readable.
//!
//! ```json
//! {
//!   "client_name": "cockpit-panel",
//!   "retry_backoff": 1000,
//!   "tick_interval": 1
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::provider::Priority;

/// Longest tick interval the loop accepts; it must not busy-spin but must
/// stay responsive.
const MAX_TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Settings for a [`SimClient`](crate::client::SimClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Name the session is opened under.
    pub client_name: String,
    /// Wait between failed connection attempts.
    #[serde(with = "duration_ms")]
    pub retry_backoff: Duration,
    /// Wait between loop ticks while connected.
    #[serde(with = "duration_ms")]
    pub tick_interval: Duration,
    /// Group priority transmitted events are sent with.
    pub event_priority: Priority,
    /// Maximum number of events queued for the loop thread.
    pub event_queue_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_name: "simlink".to_string(),
            retry_backoff: Duration::from_secs(1),
            tick_interval: Duration::from_millis(1),
            event_priority: Priority::STANDARD,
            event_queue_capacity: 256,
        }
    }
}

impl ClientConfig {
    /// Creates a config with defaults and the given client name.
    ///
    /// Defaults: 1s retry backoff, 1ms tick, standard event priority.
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
            ..Self::default()
        }
    }

    /// Sets the wait between failed connection attempts.
    #[must_use]
    pub fn with_retry_backoff(mut self, retry_backoff: Duration) -> Self {
        self.retry_backoff = retry_backoff;
        self
    }

    /// Sets the wait between loop ticks.
    #[must_use]
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Sets the priority events are transmitted with.
    #[must_use]
    pub fn with_event_priority(mut self, event_priority: Priority) -> Self {
        self.event_priority = event_priority;
        self
    }

    /// Sets the event queue capacity.
    #[must_use]
    pub fn with_event_queue_capacity(mut self, capacity: usize) -> Self {
        self.event_queue_capacity = capacity;
        self
    }

    /// Parses and validates a JSON config document.
    ///
    /// Missing keys take their default values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the JSON is malformed or a value is invalid.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, the JSON is
    /// malformed or a value is invalid.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json_str(&json)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if:
    /// - the client name is empty
    /// - the retry backoff is zero
    /// - the tick interval is zero or not below 10ms
    /// - the event queue capacity is zero
    pub fn validate(&self) -> Result<()> {
        if self.client_name.trim().is_empty() {
            return Err(invalid("client_name", "must not be empty".to_string()));
        }

        if self.retry_backoff.is_zero() {
            return Err(invalid("retry_backoff", "must be non-zero".to_string()));
        }

        if self.tick_interval.is_zero() || self.tick_interval >= MAX_TICK_INTERVAL {
            return Err(invalid(
                "tick_interval",
                format!(
                    "{:?} must be non-zero and below {:?}",
                    self.tick_interval, MAX_TICK_INTERVAL
                ),
            ));
        }

        if self.event_queue_capacity == 0 {
            return Err(invalid("event_queue_capacity", "must be non-zero".to_string()));
        }

        Ok(())
    }
}

fn invalid(field: &'static str, reason: String) -> crate::error::SimlinkError {
    ConfigError::Invalid { field, reason }.into()
}

/// Serde support for Duration fields as whole milliseconds.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[allow(clippy::cast_possible_truncation)] // durations beyond u64 millis are not configurable
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
