//! Outbound transport abstraction.
//!
//! The delivery worker builds a complete [`Request`] for every attempt and
//! hands it to a [`Transport`]. Backends only move bytes; authentication,
//! headers, and status interpretation all happen before and after the call.

#[cfg(feature = "http")]
mod http;
mod recording;

use std::collections::BTreeMap;

#[cfg(feature = "http")]
pub use http::HttpTransport;
pub use recording::{RecordingTransport, Reply};

use crate::error::TransportError;

/// One HTTP request carrying an encoded envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

/// What the collector answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Synchronous delivery of a single request.
///
/// Called only from the delivery worker thread, one request at a time. A call
/// is never cancelled, so implementations should bound it with a timeout.
pub trait Transport: Send + Sync {
    /// Send `request` and return the collector's response.
    ///
    /// Any non-2xx response is treated as a failed attempt by the caller, so
    /// implementations should return it as `Ok` rather than mapping it.
    ///
    /// # Errors
    ///
    /// Returns an error if no response could be obtained.
    fn deliver(&self, request: &Request) -> Result<Response, TransportError>;
}
