//! Typed error handling for event delivery.
//!
//! Delivery failures are scoped to the batch currently in flight. Transport
//! and status failures are retried according to the configured policy, while
//! an envelope that cannot be encoded is failed immediately.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Failure raised by a [`Transport`](crate::Transport) before any response was read.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The collector could not be reached.
    #[error("{0}")]
    Connect(String),

    /// The request did not complete in time.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Any other failure building or performing the request.
    #[error("Request failed: {0}")]
    Request(String),
}

/// Outcome of a failed delivery attempt for one batch.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The collector answered with a non-2xx status.
    #[error("Unexpected HTTP status {status}")]
    Status { status: u16, body: String },

    /// The request never produced a response.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The envelope could not be serialized. Retrying cannot help.
    #[error("Failed to encode envelope: {0}")]
    Encode(#[from] serde_json::Error),
}

impl DeliveryError {
    /// Returns `true` if another attempt of the same batch may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Status { .. } | Self::Transport(_))
    }
}

/// Errors loading or validating a [`Config`](crate::Config).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid TOML for this schema.
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is outside of its accepted range.
    #[error("Invalid configuration for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Errors constructing a [`Client`](crate::Client).
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The default transport could not be created.
    #[error("Failed to create transport: {0}")]
    Transport(#[from] TransportError),

    /// Built without the `http` feature and no transport was supplied.
    #[error("No transport configured")]
    MissingTransport,

    /// The delivery worker thread could not be started.
    #[error("Failed to spawn delivery worker: {0}")]
    Spawn(#[source] io::Error),
}
