//! Wire body shared by every batch.

use std::io;

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::event::Event;

/// Context describing this library and the host it runs on.
#[must_use]
pub fn default_context() -> Map<String, Value> {
    let mut context = Map::new();
    context.insert(
        "library".to_string(),
        json!({
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        }),
    );
    context.insert("os".to_string(), json!({ "name": std::env::consts::OS }));
    context
}

/// Context and integrations attached to every batch.
///
/// An envelope is the pair of these with the batch itself:
///
/// ```json
/// { "batch": [ ... ], "context": { ... }, "integrations": { ... } }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    context: Option<Map<String, Value>>,
    integrations: Option<Map<String, Value>>,
}

#[derive(Serialize)]
struct Body<'a> {
    batch: &'a [Event],
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    integrations: Option<&'a Map<String, Value>>,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            context: Some(default_context()),
            integrations: None,
        }
    }
}

impl Envelope {
    #[must_use]
    pub const fn new(
        context: Option<Map<String, Value>>,
        integrations: Option<Map<String, Value>>,
    ) -> Self {
        Self {
            context,
            integrations,
        }
    }

    #[must_use]
    pub const fn context(&self) -> Option<&Map<String, Value>> {
        self.context.as_ref()
    }

    #[must_use]
    pub const fn integrations(&self) -> Option<&Map<String, Value>> {
        self.integrations.as_ref()
    }

    /// Serialize `batch` wrapped in this envelope.
    ///
    /// # Errors
    ///
    /// Returns an error if any event cannot be represented as JSON.
    pub fn encode(&self, batch: &[Event]) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.body(batch))
    }

    /// Size in bytes of [`Envelope::encode`] for `batch`, without allocating it.
    ///
    /// A batch that cannot be encoded measures as `usize::MAX`, so it is only
    /// ever sent on its own and then fails without being retried.
    #[must_use]
    pub fn encoded_len(&self, batch: &[Event]) -> usize {
        let mut counter = ByteCounter(0);
        match serde_json::to_writer(&mut counter, &self.body(batch)) {
            Ok(()) => counter.0,
            Err(_) => usize::MAX,
        }
    }

    /// `{library.name}/{library.version}` from the context, when present.
    #[must_use]
    pub fn user_agent(&self) -> Option<String> {
        let library = self.context.as_ref()?.get("library")?;
        let name = library.get("name")?.as_str()?;
        let version = library.get("version")?.as_str()?;
        Some(format!("{name}/{version}"))
    }

    const fn body<'a>(&'a self, batch: &'a [Event]) -> Body<'a> {
        Body {
            batch,
            context: self.context.as_ref(),
            integrations: self.integrations.as_ref(),
        }
    }
}

struct ByteCounter(usize);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 = self.0.saturating_add(buf.len());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
