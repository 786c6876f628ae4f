use std::time::Duration;

use reqwest::{
    Method,
    blocking::Client,
    header::{HeaderMap, HeaderName, HeaderValue},
};

use super::{Request, Response, Transport};
use crate::error::TransportError;

const fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Blocking HTTP(S) transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build a transport whose requests time out after 30 seconds.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeout(default_timeout())
    }

    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| TransportError::Request(err.to_string()))?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn deliver(&self, request: &Request) -> Result<Response, TransportError> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|err| TransportError::Request(err.to_string()))?;

        let mut headers = HeaderMap::with_capacity(request.headers.len());
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| TransportError::Request(format!("header {name}: {err}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|err| TransportError::Request(format!("header {name}: {err}")))?;
            headers.insert(name, value);
        }

        let response = self
            .client
            .request(method, &request.url)
            .headers(headers)
            .body(request.body.clone())
            .send()
            .map_err(classify)?;

        let status = response.status().as_u16();
        // The body is informational only; an unreadable one is not a failed attempt.
        let body = response.text().unwrap_or_default();

        Ok(Response { status, body })
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Request(err.to_string())
    }
}
