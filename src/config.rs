//! Connection configuration.
//!
//! Settings are supplied programmatically by the embedding application. The
//! struct is serde-friendly so applications that keep their settings in YAML
//! can hand the relevant section to [`ConnectionConfig::from_yaml_str`].

use crate::{PtpError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Smallest read that can hold a complete container header.
pub const MIN_INITIAL_READ: usize = 12;

/// Default receive limit, large enough for RAW and movie downloads.
pub const DEFAULT_MAX_CONTAINER_SIZE: usize = 512 * 1024 * 1024;

/// Tunables for a camera connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Timeout applied to each individual transport read or write.
    #[serde(with = "duration_ms")]
    pub default_timeout: Duration,
    /// Size of the first read of every container, used to learn its length.
    pub initial_read_size: usize,
    /// Largest container accepted from the camera, header included.
    pub max_container_size: usize,
    /// Delay between script status polls.
    #[serde(with = "duration_ms")]
    pub poll_interval: Duration,
    /// Overall limit for blocking script submissions.
    #[serde(with = "duration_ms")]
    pub script_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(5),
            initial_read_size: 512,
            max_container_size: DEFAULT_MAX_CONTAINER_SIZE,
            poll_interval: Duration::from_millis(50),
            script_timeout: Duration::from_secs(30),
        }
    }
}

impl ConnectionConfig {
    /// Check the values are usable.
    pub fn validate(&self) -> Result<()> {
        if self.initial_read_size < MIN_INITIAL_READ {
            return Err(PtpError::Config {
                details: format!(
                    "initial_read_size must be at least {} bytes, got {}",
                    MIN_INITIAL_READ, self.initial_read_size
                ),
            });
        }
        if self.max_container_size < self.initial_read_size {
            return Err(PtpError::Config {
                details: format!(
                    "max_container_size ({}) is smaller than initial_read_size ({})",
                    self.max_container_size, self.initial_read_size
                ),
            });
        }
        if self.poll_interval.is_zero() {
            return Err(PtpError::Config { details: "poll_interval must be non-zero".to_string() });
        }
        Ok(())
    }

    /// Parse and validate a configuration from a YAML document.
    ///
    /// Missing keys fall back to [`ConnectionConfig::default`].
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: ConnectionConfig = serde_yaml_ng::from_str(yaml)
            .map_err(|e| PtpError::Config { details: format!("YAML parse failed: {}", e) })?;
        config.validate()?;
        Ok(config)
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
