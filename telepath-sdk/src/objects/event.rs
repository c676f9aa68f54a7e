//! Channel event objects.
//!
//! Producers send a [`PublishBody`] to `POST /channels/{id}/events` (or the
//! same fields as query parameters to `GET /channels/{id}/publish`).
//! Subscribers and pollers receive [`EventPayload`] objects.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// An accepted event as delivered to subscribers and pollers.
///
/// ```json
/// {"channel":"zener","kind":"circle","magnitude":0.0,"received_at":1760400000000}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    /// Channel the event was published on.
    pub channel: String,
    /// Symbol from the channel's valid set.
    pub kind: String,
    /// Numeric intensity, `0.0` when the producer sent none.
    pub magnitude: f64,
    /// Acceptance time as unix milliseconds.
    pub received_at: i64,
    /// Channel-specific optional attributes (for example calendar fields).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

/// Producer request body.
///
/// `kind` and `magnitude` are kept as raw JSON values so that a wrongly
/// typed field is judged by the relay (invalid symbol, default magnitude)
/// instead of failing deserialization. Every other top-level field lands in
/// `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublishBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnitude: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PublishBody {
    /// Create a body carrying only a kind.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(Value::String(kind.into())),
            ..Self::default()
        }
    }

    /// Set the magnitude.
    pub fn with_magnitude(mut self, magnitude: f64) -> Self {
        self.magnitude = Some(Value::from(magnitude));
        self
    }

    /// Attach a channel-specific attribute.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Build a body from query parameters. All values arrive as strings.
    pub fn from_query(mut params: HashMap<String, String>) -> Self {
        let kind = params.remove("kind").map(Value::String);
        let magnitude = params.remove("magnitude").map(Value::String);
        let extra = params
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        Self {
            kind,
            magnitude,
            extra,
        }
    }

    /// The kind, if it was sent as a string.
    pub fn kind_str(&self) -> Option<&str> {
        self.kind.as_ref().and_then(Value::as_str)
    }
}

/// Interpret a loosely-typed magnitude.
///
/// Numbers and numeric strings are accepted; anything else, including
/// non-finite values, yields `None`.
pub fn parse_magnitude(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|m| m.is_finite())
}

/// Response of `GET /channels/{id}/latest`.
///
/// ```json
/// {"status":"fresh","event":{ ... }}
/// {"status":"none"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LatestResponse {
    /// The cached event is still within the channel TTL.
    Fresh { event: EventPayload },
    /// Nothing published yet, or the cached event has gone stale.
    None,
}

impl LatestResponse {
    pub fn into_event(self) -> Option<EventPayload> {
        match self {
            LatestResponse::Fresh { event } => Some(event),
            LatestResponse::None => None,
        }
    }
}
