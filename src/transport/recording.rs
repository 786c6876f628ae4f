use std::{collections::VecDeque, time::Duration};

use parking_lot::Mutex;
use serde_json::Value;

use super::{Request, Response, Transport};
use crate::error::TransportError;

/// A scripted answer from [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Respond with this status code and an empty body
    Status(u16),
    /// Fail as if the collector could not be reached
    Refuse(String),
}

/// In-memory transport that records every request it is given.
///
/// Replies are taken from the script in order, then the fallback reply is used
/// for every request after that. Used by the tests and by `beacon --dry-run`.
#[derive(Debug)]
pub struct RecordingTransport {
    script: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    delay: Option<Duration>,
    requests: Mutex<Vec<Request>>,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new(Reply::Status(200))
    }
}

impl RecordingTransport {
    #[must_use]
    pub fn new(fallback: Reply) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request succeeds with `200 OK`.
    #[must_use]
    pub fn ok() -> Self {
        Self::default()
    }

    /// Every request is refused before reaching the collector.
    #[must_use]
    pub fn refusing() -> Self {
        Self::new(Reply::Refuse("Connection refused".to_string()))
    }

    /// Answer the first requests with `replies` before using the fallback.
    #[must_use]
    pub fn with_script(self, replies: impl IntoIterator<Item = Reply>) -> Self {
        self.script.lock().extend(replies);
        self
    }

    /// Sleep for `delay` inside every call, simulating a slow collector.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of delivery attempts so far.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.requests.lock().len()
    }

    #[must_use]
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    /// The `batch` array of every request body, in the order they were sent.
    #[must_use]
    pub fn batches(&self) -> Vec<Vec<Value>> {
        self.requests
            .lock()
            .iter()
            .filter_map(|request| {
                let mut body: Value = serde_json::from_slice(&request.body).ok()?;
                match body.get_mut("batch")?.take() {
                    Value::Array(events) => Some(events),
                    _ => None,
                }
            })
            .collect()
    }
}

impl Transport for RecordingTransport {
    fn deliver(&self, request: &Request) -> Result<Response, TransportError> {
        self.requests.lock().push(request.clone());

        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        let reply = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match reply {
            Reply::Status(status) => Ok(Response {
                status,
                body: String::new(),
            }),
            Reply::Refuse(reason) => Err(TransportError::Connect(reason)),
        }
    }
}
