//! The public handle: ingest, lifecycle control, and teardown.

use std::{
    sync::Arc,
    thread::{self, JoinHandle},
    time::Instant,
};

use serde_json::{Map, Value};

use crate::{
    config::Config,
    envelope::Envelope,
    error::ClientError,
    event::{Event, EventBuilder, timestamp},
    internal,
    notify::EventHandler,
    queue::Shared,
    transport::Transport,
    worker::Worker,
};

/// Configures and starts a [`Client`].
#[must_use]
pub struct ClientBuilder {
    config: Config,
    transport: Option<Arc<dyn Transport>>,
    handler: Option<Arc<dyn EventHandler>>,
    envelope: Envelope,
}

impl ClientBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            transport: None,
            handler: None,
            envelope: Envelope::default(),
        }
    }

    /// Deliver through `transport` instead of the default HTTP backend.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Replace the default library/OS context sent with every batch.
    pub fn context(mut self, context: Option<Map<String, Value>>) -> Self {
        self.envelope = Envelope::new(context, self.envelope.integrations().cloned());
        self
    }

    pub fn integrations(mut self, integrations: Option<Map<String, Value>>) -> Self {
        self.envelope = Envelope::new(self.envelope.context().cloned(), integrations);
        self
    }

    /// Validate the configuration and start the delivery worker.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, no transport could be
    /// created, or the worker thread fails to start.
    pub fn build(self) -> Result<Client, ClientError> {
        self.config.validate()?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport()?,
        };

        let shared = Arc::new(Shared::new(self.handler));
        let worker = Worker::new(shared.clone(), transport, self.envelope, &self.config);

        let handle = thread::Builder::new()
            .name("beacon-delivery".to_string())
            .spawn(move || worker.run())
            .map_err(ClientError::Spawn)?;

        internal!(level = DEBUG, "Client started for {}", self.config.batch_url());

        Ok(Client {
            shared,
            config: self.config,
            worker: Some(handle),
        })
    }
}

#[cfg(feature = "http")]
fn default_transport() -> Result<Arc<dyn Transport>, ClientError> {
    Ok(Arc::new(crate::transport::HttpTransport::new()?))
}

#[cfg(not(feature = "http"))]
fn default_transport() -> Result<Arc<dyn Transport>, ClientError> {
    Err(ClientError::MissingTransport)
}

/// Handle to a running delivery engine.
///
/// Any number of threads may submit events through a shared reference; none
/// of them ever waits on the network. Dropping the client drains everything
/// still queued, the same as [`Client::shutdown`].
pub struct Client {
    shared: Arc<Shared>,
    config: Config,
    worker: Option<JoinHandle<()>>,
}

impl Client {
    pub fn builder(config: Config) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Queue `event` for delivery.
    pub fn enqueue(&self, mut event: Event) {
        // Stamped now so the size measured while batching matches what is sent.
        event.stamp(&timestamp());

        let mut state = self.shared.state.lock();
        state.enqueue(event, Instant::now(), self.config.flush_interval());
        self.shared.work.notify_one();
    }

    pub fn track(&self, user_id: &str, event: &str, properties: Value) {
        self.enqueue(
            EventBuilder::track(event)
                .user_id(user_id)
                .properties(properties)
                .build(),
        );
    }

    pub fn identify(&self, user_id: &str, traits: Value) {
        self.enqueue(EventBuilder::identify(user_id).traits(traits).build());
    }

    pub fn page(&self, user_id: &str, name: &str, properties: Value) {
        self.enqueue(
            EventBuilder::page(name)
                .user_id(user_id)
                .properties(properties)
                .build(),
        );
    }

    pub fn screen(&self, user_id: &str, name: &str, properties: Value) {
        self.enqueue(
            EventBuilder::screen(name)
                .user_id(user_id)
                .properties(properties)
                .build(),
        );
    }

    pub fn alias(&self, previous_id: &str, user_id: &str) {
        self.enqueue(EventBuilder::alias(previous_id, user_id).build());
    }

    pub fn group(&self, user_id: &str, group_id: &str, traits: Value) {
        self.enqueue(
            EventBuilder::group(group_id)
                .user_id(user_id)
                .traits(traits)
                .build(),
        );
    }

    /// Ask the worker to send what it has now rather than on schedule.
    ///
    /// Returns immediately. A batch waiting out a retry backoff is resent
    /// without waiting for the rest of it.
    pub fn flush(&self) {
        let mut state = self.shared.state.lock();
        state.need_flush = true;
        self.shared.work.notify_one();
    }

    /// Block until every queued event has been delivered or given up on, and
    /// its outcome reported.
    ///
    /// Must not be called from an [`EventHandler`], which runs on the worker
    /// this waits for.
    pub fn flush_wait(&self) {
        let mut state = self.shared.state.lock();
        state.waiters += 1;

        while !state.is_drained() {
            state.need_flush = true;
            self.shared.work.notify_one();
            self.shared.drained.wait(&mut state);
        }

        state.waiters -= 1;
    }

    /// Discard every event that has not yet been taken into a batch.
    ///
    /// Discarded events are never reported to the handler. A batch already
    /// being sent or retried is unaffected.
    pub fn scrub(&self) {
        let mut state = self.shared.state.lock();
        let discarded = state.queue.len();
        state.queue.clear();

        self.shared.drained.notify_all();
        self.shared.work.notify_one();

        internal!(level = DEBUG, "Scrubbed {} queued events", discarded);
    }

    /// Replace the handler notified of outcomes. Batches settled from now on
    /// report to the new handler.
    pub fn set_handler(&self, handler: Option<Arc<dyn EventHandler>>) {
        self.shared.state.lock().handler = handler;
    }

    /// Number of events queued, in flight, or awaiting their report.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.state.lock().pending()
    }

    /// Drain everything still queued, then stop the worker.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };

        self.flush_wait();

        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            self.shared.work.notify_one();
        }

        if handle.join().is_err() {
            internal!(level = ERROR, "Delivery worker panicked");
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.stop();
    }
}
