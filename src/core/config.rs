//! Handler settings and how they are loaded.

use crate::connection::RetryPolicy;
use crate::error::{InterestError, Result};
use config::{Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Settings for an [`InterestHandler`](crate::core::InterestHandler).
///
/// Every field has a default, so a partial file or a handful of environment
/// variables is enough.
///
/// # Examples
///
/// ```rust,no_run
/// use registry_interest::core::HandlerConfig;
///
/// # fn example() -> registry_interest::error::Result<()> {
/// // RIQ_RETRY_WAIT_MS=1000 -> retry_wait_ms = 1000
/// let config = HandlerConfig::load(Some("config/interest.yaml"), Some("RIQ"))?;
/// assert!(config.stream_buffer > 0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HandlerConfig {
    /// Delay between reconnect attempts, in milliseconds.
    pub retry_wait_ms: u64,
    /// Consecutive failures after which reconnecting stops. Unset retries forever.
    pub max_reconnect_attempts: Option<u32>,
    /// Notifications buffered per subscriber before the registry stream is paused.
    pub stream_buffer: usize,
    /// Channel generations an internal observer may fall behind.
    pub channel_history: usize,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            retry_wait_ms: 500,
            max_reconnect_attempts: None,
            stream_buffer: 256,
            channel_history: 16,
        }
    }
}

impl HandlerConfig {
    /// Load settings from an optional file and optional environment overrides.
    ///
    /// The file format is picked from its extension (YAML, TOML or JSON,
    /// depending on enabled features). Environment variables are matched as
    /// `<PREFIX>_<FIELD>`, e.g. `RIQ_STREAM_BUFFER`, and take precedence over
    /// the file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file is missing or cannot be parsed
    /// - A value has the wrong type
    /// - The result fails [`HandlerConfig::validate`]
    pub fn load(file: Option<impl AsRef<Path>>, env_prefix: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            builder = builder.add_source(File::from(path.as_ref()).required(true));
        }

        if let Some(prefix) = env_prefix {
            builder = builder.add_source(
                Environment::with_prefix(prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let loaded: HandlerConfig = builder.build()?.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject settings the handler cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.stream_buffer == 0 {
            return Err(InterestError::InvalidConfig {
                field: "stream_buffer",
                reason: "must be greater than zero",
            });
        }
        if self.channel_history == 0 {
            return Err(InterestError::InvalidConfig {
                field: "channel_history",
                reason: "must be greater than zero",
            });
        }
        if self.max_reconnect_attempts == Some(0) {
            return Err(InterestError::InvalidConfig {
                field: "max_reconnect_attempts",
                reason: "must allow at least one attempt",
            });
        }
        Ok(())
    }

    /// Delay between reconnect attempts.
    pub fn retry_wait(&self) -> Duration {
        Duration::from_millis(self.retry_wait_ms)
    }

    /// Reconnect policy described by these settings.
    pub fn retry_policy(&self) -> RetryPolicy {
        let policy = RetryPolicy::fixed(self.retry_wait());
        match self.max_reconnect_attempts {
            Some(max) => policy.with_max_attempts(max),
            None => policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = HandlerConfig::default();
        assert_eq!(config.retry_wait(), Duration::from_millis(500));
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_without_sources_yields_defaults() {
        let config = HandlerConfig::load(None::<&Path>, None).unwrap();
        assert_eq!(config, HandlerConfig::default());
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_load_partial_toml_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("interest.toml");
        fs::write(&path, "retry_wait_ms = 1000\nmax_reconnect_attempts = 5\n").unwrap();

        let config = HandlerConfig::load(Some(&path), None).unwrap();
        assert_eq!(config.retry_wait_ms, 1000);
        assert_eq!(config.max_reconnect_attempts, Some(5));
        assert_eq!(config.stream_buffer, 256);
        assert_eq!(
            config.retry_policy(),
            RetryPolicy::fixed(Duration::from_secs(1)).with_max_attempts(5)
        );
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn test_invalid_file_value_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("interest.yaml");
        fs::write(&path, "stream_buffer: 0\n").unwrap();

        let result = HandlerConfig::load(Some(&path), None);
        assert!(matches!(
            result,
            Err(InterestError::InvalidConfig {
                field: "stream_buffer",
                ..
            })
        ));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = HandlerConfig::load(Some("/nonexistent/interest.yaml"), None);
        assert!(matches!(result, Err(InterestError::Config(_))));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let config = HandlerConfig {
            max_reconnect_attempts: Some(0),
            ..HandlerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
