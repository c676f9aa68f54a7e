//! Event type definitions.

use compact_str::CompactString;
use serde_json::{Map, Value};
use std::sync::Arc;
use telepath_sdk::objects::{EventPayload, PublishBody, SessionSignal, parse_magnitude};
use time::OffsetDateTime;
use tokio::time::Instant;

/// A producer's request to publish on a channel, before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublishRequest {
    /// `None` when the producer sent no kind, or sent one that is not a string.
    pub kind: Option<CompactString>,
    /// `None` when absent or not numeric.
    pub magnitude: Option<f64>,
    pub extra: Map<String, Value>,
}

impl PublishRequest {
    pub fn new(kind: impl Into<CompactString>) -> Self {
        Self {
            kind: Some(kind.into()),
            ..Self::default()
        }
    }

    pub fn with_magnitude(mut self, magnitude: f64) -> Self {
        self.magnitude = Some(magnitude);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

impl From<PublishBody> for PublishRequest {
    fn from(body: PublishBody) -> Self {
        Self {
            kind: body.kind_str().map(CompactString::from),
            magnitude: body.magnitude.as_ref().and_then(parse_magnitude),
            extra: body.extra,
        }
    }
}

/// An accepted, immutable channel event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: CompactString,
    pub magnitude: f64,
    /// Monotonic acceptance time; TTL is judged against this.
    pub arrival: Instant,
    /// Wall-clock acceptance time, reported to clients.
    pub received_at: OffsetDateTime,
    /// Attributes from the channel's extra-field schema.
    pub extra: Map<String, Value>,
}

impl Event {
    /// Wire form of this event on `channel`.
    pub fn to_payload(&self, channel: &str) -> EventPayload {
        let millis = self.received_at.unix_timestamp_nanos() / 1_000_000;
        EventPayload {
            channel: channel.to_string(),
            kind: self.kind.to_string(),
            magnitude: self.magnitude,
            received_at: i64::try_from(millis).unwrap_or(i64::MAX),
            extra: self.extra.clone(),
        }
    }
}

/// A frame queued for a channel subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelFrame {
    /// A serialized [`EventPayload`], shared by every recipient of one publish.
    Event(Arc<str>),
    /// Liveness pulse with no content.
    Heartbeat,
}

/// A frame queued for a session connection.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionFrame {
    Signal(SessionSignal),
    /// Payload text from the other role, forwarded verbatim.
    Relay(Arc<str>),
    /// Liveness pulse with no content.
    Heartbeat,
    /// A newer connection took over this role; the connection should close.
    Superseded,
}
