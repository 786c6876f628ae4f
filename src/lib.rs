//! In-process batching and delivery of analytics events.
//!
//! Events are queued by any number of threads and uploaded in bounded batches
//! by a single background worker, which retries failed batches and reports the
//! outcome of every event to an optional [`EventHandler`].
//!
//! ```no_run
//! use beacon::{Client, Config};
//! use serde_json::json;
//!
//! let client = Client::builder(Config::new("write-key")).build()?;
//! client.track("user-1", "Signed Up", json!({ "plan": "free" }));
//! client.shutdown();
//! # Ok::<(), beacon::ClientError>(())
//! ```

pub mod logging;

mod client;
mod config;
mod envelope;
mod error;
mod event;
mod notify;
mod queue;
mod schedule;
pub mod transport;
mod worker;

pub use tracing;

pub use client::{Client, ClientBuilder};
pub use config::Config;
pub use envelope::{Envelope, default_context};
pub use error::{ClientError, ConfigError, DeliveryError, TransportError};
pub use event::{Event, EventBuilder, EventType, timestamp};
pub use notify::{EventHandler, HandlerResult};
pub use schedule::{RetryPolicy, WakeSchedule};
#[cfg(feature = "http")]
pub use transport::HttpTransport;
pub use transport::{RecordingTransport, Reply, Request, Response, Transport};
