//! Shared fixtures for the delivery tests.
#![allow(dead_code)]

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use beacon::{
    Client, Config, Event, EventBuilder, EventHandler, HandlerResult, RecordingTransport, Request,
    Response, Transport, TransportError,
};
use parking_lot::{Condvar, Mutex};
use serde_json::json;

/// What a handler was told about one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seen {
    Delivered(u64),
    Failed(u64, String),
}

/// Records every outcome and lets a test block until enough have arrived.
#[derive(Default)]
pub struct Collector {
    seen: Mutex<Vec<Seen>>,
    arrived: Condvar,
}

impl Collector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().clone()
    }

    pub fn delivered(&self) -> Vec<u64> {
        self.seen
            .lock()
            .iter()
            .filter_map(|seen| match seen {
                Seen::Delivered(n) => Some(*n),
                Seen::Failed(..) => None,
            })
            .collect()
    }

    /// Wait until at least `count` outcomes were recorded, or `timeout` passes.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut seen = self.seen.lock();

        while seen.len() < count {
            if self.arrived.wait_until(&mut seen, deadline).timed_out() {
                return seen.len() >= count;
            }
        }

        true
    }

    fn record(&self, seen: Seen) {
        self.seen.lock().push(seen);
        self.arrived.notify_all();
    }
}

impl EventHandler for Collector {
    fn on_success(&self, event: &Event) -> HandlerResult {
        self.record(Seen::Delivered(number(event)));
        Ok(())
    }

    fn on_failure(&self, event: &Event, reason: &str) -> HandlerResult {
        self.record(Seen::Failed(number(event), reason.to_string()));
        Ok(())
    }
}

/// Transport that holds every call until the gate is opened.
pub struct Gate {
    inner: RecordingTransport,
    state: Mutex<GateState>,
    changed: Condvar,
}

#[derive(Default)]
struct GateState {
    open: bool,
    entered: usize,
}

impl Gate {
    pub fn closed(inner: RecordingTransport) -> Arc<Self> {
        Arc::new(Self {
            inner,
            state: Mutex::new(GateState::default()),
            changed: Condvar::new(),
        })
    }

    pub fn open(&self) {
        self.state.lock().open = true;
        self.changed.notify_all();
    }

    /// Block until the worker is inside a delivery call.
    pub fn wait_entered(&self) {
        let mut state = self.state.lock();
        while state.entered == 0 {
            self.changed.wait(&mut state);
        }
    }

    pub fn recorded(&self) -> &RecordingTransport {
        &self.inner
    }
}

impl Transport for Gate {
    fn deliver(&self, request: &Request) -> Result<Response, TransportError> {
        let mut state = self.state.lock();
        state.entered += 1;
        self.changed.notify_all();

        while !state.open {
            self.changed.wait(&mut state);
        }
        drop(state);

        self.inner.deliver(request)
    }
}

/// A configuration that never flushes on its own within a test's lifetime.
pub fn config() -> Config {
    Config {
        write_key: "test-key".to_string(),
        host: "http://collector.test".to_string(),
        retry_interval_ms: 10,
        flush_interval_ms: 60_000,
        ..Config::default()
    }
}

pub fn client(config: Config, transport: Arc<dyn Transport>, handler: Arc<Collector>) -> Client {
    Client::builder(config)
        .transport(transport)
        .handler(handler)
        .build()
        .expect("client should start")
}

/// A track event carrying `n` so its position can be checked after delivery.
pub fn numbered(n: u64) -> Event {
    EventBuilder::track("Numbered")
        .user_id("user-1")
        .properties(json!({ "n": n }))
        .build()
}

pub fn number(event: &Event) -> u64 {
    event
        .get("properties")
        .and_then(|properties| properties.get("n"))
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(u64::MAX)
}

/// The numbers of every event in every recorded batch.
pub fn delivered_batches(transport: &RecordingTransport) -> Vec<Vec<u64>> {
    transport
        .batches()
        .iter()
        .map(|batch| {
            batch
                .iter()
                .filter_map(|event| event.get("properties")?.get("n")?.as_u64())
                .collect()
        })
        .collect()
}
