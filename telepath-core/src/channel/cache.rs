//! Last-known-event cache.

use crate::events::Event;
use std::time::Duration;
use tokio::time::Instant;

/// Holds at most one event: the most recent accepted publish.
///
/// The cache is never cleared. Staleness is decided at read time by
/// comparing the event's age against the channel TTL.
#[derive(Debug, Default)]
pub struct EventCache {
    latest: Option<Event>,
}

impl EventCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached event.
    pub fn store(&mut self, event: Event) {
        self.latest = Some(event);
    }

    /// The cached event if it arrived less than `ttl` before `now`.
    pub fn fresh(&self, now: Instant, ttl: Duration) -> Option<&Event> {
        self.latest
            .as_ref()
            .filter(|event| now.saturating_duration_since(event.arrival) < ttl)
    }
}
