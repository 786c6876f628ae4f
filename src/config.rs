//! Delivery configuration.
//!
//! Every field has a serde default so a configuration file only needs to name
//! the values it changes:
//!
//! ```toml
//! write_key = "my-key"
//! flush_count = 100
//! flush_interval_ms = 5000
//! ```

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tunables for batching and retrying event delivery.
///
/// The configuration is fixed once the [`Client`](crate::Client) has been
/// built, since the worker owns a copy from then on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Credential sent as the HTTP Basic user name
    #[serde(default)]
    pub write_key: String,

    /// Base URL of the collector. Batches are posted to `{host}/v1/batch`.
    ///
    /// Default: `https://api.segment.io`
    #[serde(default = "defaults::host")]
    pub host: String,

    /// Number of additional attempts of a failing batch before its events
    /// are reported as failed.
    ///
    /// Default: 5
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Delay between attempts of a failing batch (in milliseconds)
    ///
    /// Default: 1000 (1 second)
    #[serde(default = "defaults::retry_interval_ms")]
    pub retry_interval_ms: u64,

    /// Maximum number of events sent in one batch
    ///
    /// Default: 250
    #[serde(default = "defaults::flush_count")]
    pub flush_count: usize,

    /// Upper bound on the serialized envelope (in bytes)
    ///
    /// A single event that is larger than this on its own is still sent.
    ///
    /// Default: 512000 (500 KiB)
    #[serde(default = "defaults::flush_size")]
    pub flush_size: usize,

    /// How long an event may wait for more company before its batch is sent
    /// (in milliseconds)
    ///
    /// Default: 10000 (10 seconds)
    #[serde(default = "defaults::flush_interval_ms")]
    pub flush_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            write_key: String::new(),
            host: defaults::host(),
            max_retries: defaults::max_retries(),
            retry_interval_ms: defaults::retry_interval_ms(),
            flush_count: defaults::flush_count(),
            flush_size: defaults::flush_size(),
            flush_interval_ms: defaults::flush_interval_ms(),
        }
    }
}

impl Config {
    /// Create a configuration with default values and the given write key.
    #[must_use]
    pub fn new(write_key: impl Into<String>) -> Self {
        Self {
            write_key: write_key.into(),
            ..Self::default()
        }
    }

    /// Parse a configuration from TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid TOML, does not match the
    /// schema, or fails [`Config::validate`].
    pub fn from_toml(document: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or its contents are invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let document = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml(&document)
    }

    /// Check that the batching bounds can be satisfied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "host",
                reason: "must not be empty".to_string(),
            });
        }

        if self.flush_count == 0 {
            return Err(ConfigError::Invalid {
                field: "flush_count",
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.flush_size == 0 {
            return Err(ConfigError::Invalid {
                field: "flush_size",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    /// URL every batch is posted to.
    #[must_use]
    pub fn batch_url(&self) -> String {
        format!("{}/v1/batch", self.host.trim_end_matches('/'))
    }

    #[must_use]
    pub const fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    #[must_use]
    pub const fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

mod defaults {
    pub fn host() -> String {
        "https://api.segment.io".to_string()
    }

    pub const fn max_retries() -> u32 {
        5
    }

    pub const fn retry_interval_ms() -> u64 {
        1000
    }

    pub const fn flush_count() -> usize {
        250
    }

    pub const fn flush_size() -> usize {
        500 * 1024
    }

    pub const fn flush_interval_ms() -> u64 {
        10_000
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.host, "https://api.segment.io");
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_interval(), Duration::from_secs(1));
        assert_eq!(config.flush_count, 250);
        assert_eq!(config.flush_size, 512_000);
        assert_eq!(config.flush_interval(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml(
            r#"
            write_key = "abc"
            flush_count = 10
            retry_interval_ms = 50
            "#,
        )
        .expect("valid config");

        assert_eq!(
            config,
            Config {
                write_key: "abc".to_string(),
                flush_count: 10,
                retry_interval_ms: 50,
                ..Config::default()
            }
        );
    }

    #[test]
    fn test_validate_rejects_zero_bounds() {
        let err = Config::from_toml("flush_count = 0").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "flush_count",
                ..
            }
        ));

        let err = Config::from_toml("flush_size = 0").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "flush_size",
                ..
            }
        ));

        let err = Config::from_toml(r#"host = "  ""#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "host", .. }));
    }

    #[test]
    fn test_parse_error() {
        let err = Config::from_toml("flush_count = \"lots\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "host = \"http://localhost:8080/\"").expect("write config");

        let config = Config::from_file(file.path()).expect("valid config");
        assert_eq!(config.batch_url(), "http://localhost:8080/v1/batch");

        let err = Config::from_file("/nonexistent/beacon.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
