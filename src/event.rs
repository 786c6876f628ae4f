//! Structured analytics events.

use std::fmt;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Current UTC time as ISO-8601 with millisecond precision.
///
/// The output is always the same width (`2024-01-01T00:00:00.000Z`), which
/// keeps an envelope's size stable when events are restamped before a retry.
#[must_use]
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Well-known event kinds understood by the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Track,
    Identify,
    Page,
    Screen,
    Alias,
    Group,
}

impl EventType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Track => "track",
            Self::Identify => "identify",
            Self::Page => "page",
            Self::Screen => "screen",
            Self::Alias => "alias",
            Self::Group => "group",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded action, serialized as a single JSON object.
///
/// Apart from `sentAt`, which is rewritten before every delivery attempt, an
/// event is not modified once it has been queued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    kind: String,

    #[serde(default = "timestamp")]
    timestamp: String,

    #[serde(rename = "sentAt", default, skip_serializing_if = "Option::is_none")]
    sent_at: Option<String>,

    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl Event {
    /// Create an event of the given kind, timestamped now.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            timestamp: timestamp(),
            sent_at: None,
            fields: Map::new(),
        }
    }

    /// Interpret an arbitrary JSON object as an event.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not an object or has no string `type`.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    #[must_use]
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// When the event was last handed to the transport, if ever.
    #[must_use]
    pub fn sent_at(&self) -> Option<&str> {
        self.sent_at.as_deref()
    }

    /// Look up any other top-level field, such as `userId` or `properties`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub(crate) fn stamp(&mut self, sent_at: &str) {
        self.sent_at = Some(sent_at.to_string());
    }
}

/// Fluent construction of [`Event`]s.
///
/// String setters given an empty string remove the field, and object setters
/// given anything other than a JSON object remove it, so optional values can
/// be passed straight through.
///
/// ```
/// use beacon::EventBuilder;
/// use serde_json::json;
///
/// let event = EventBuilder::track("Signed Up")
///     .user_id("user-1")
///     .properties(json!({ "plan": "pro" }))
///     .build();
///
/// assert_eq!(event.kind(), "track");
/// assert_eq!(event.get("event"), Some(&json!("Signed Up")));
/// ```
#[derive(Debug, Clone)]
#[must_use]
pub struct EventBuilder {
    event: Event,
}

impl EventBuilder {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            event: Event::new(kind),
        }
    }

    pub fn track(event: &str) -> Self {
        Self::new(EventType::Track.as_str()).string("event", event)
    }

    pub fn identify(user_id: &str) -> Self {
        Self::new(EventType::Identify.as_str()).user_id(user_id)
    }

    pub fn page(name: &str) -> Self {
        Self::new(EventType::Page.as_str()).string("name", name)
    }

    pub fn screen(name: &str) -> Self {
        Self::new(EventType::Screen.as_str()).string("name", name)
    }

    pub fn alias(previous_id: &str, user_id: &str) -> Self {
        Self::new(EventType::Alias.as_str())
            .string("previousId", previous_id)
            .user_id(user_id)
    }

    pub fn group(group_id: &str) -> Self {
        Self::new(EventType::Group.as_str()).string("groupId", group_id)
    }

    pub fn user_id(self, user_id: &str) -> Self {
        self.string("userId", user_id)
    }

    pub fn anonymous_id(self, anonymous_id: &str) -> Self {
        self.string("anonymousId", anonymous_id)
    }

    pub fn properties(self, properties: Value) -> Self {
        self.object("properties", properties)
    }

    pub fn traits(self, traits: Value) -> Self {
        self.object("traits", traits)
    }

    /// Per-event context, merged by the collector over the client's default.
    pub fn context(self, context: Value) -> Self {
        self.object("context", context)
    }

    pub fn integrations(self, integrations: Value) -> Self {
        self.object("integrations", integrations)
    }

    /// Override the time the event happened, in ISO-8601.
    pub fn timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.event.timestamp = timestamp.into();
        self
    }

    /// Set any other field verbatim.
    pub fn field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.event.fields.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn build(self) -> Event {
        self.event
    }

    fn string(mut self, key: &str, value: &str) -> Self {
        if value.is_empty() {
            self.event.fields.remove(key);
        } else {
            self.event
                .fields
                .insert(key.to_string(), Value::String(value.to_string()));
        }
        self
    }

    fn object(mut self, key: &str, value: Value) -> Self {
        if value.is_object() {
            self.event.fields.insert(key.to_string(), value);
        } else {
            self.event.fields.remove(key);
        }
        self
    }
}
