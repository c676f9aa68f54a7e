//! Broadcast channels.
//!
//! A [`BroadcastChannel`] owns one channel's [`EventCache`] and
//! [`SubscriberSet`]. It is plain synchronous state; the
//! [`ChannelActor`] owns it and serializes every operation, and
//! [`ChannelHandle`] is how the rest of the process talks to the actor.

mod actor;
mod cache;
mod subscribers;

pub use actor::{ChannelActor, ChannelError, ChannelHandle, ChannelStats, PeekLatest, Subscription};
pub use cache::EventCache;
pub use subscribers::{SubscriberSet, SubscriptionId};

use crate::config::{CatchUp, ChannelConfig};
use crate::events::{ChannelFrame, Event, PublishRequest, SubscriberSender};
use compact_str::CompactString;
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Reasons a publish is rejected. Nothing is mutated when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// The kind was missing or not in the channel's valid symbol set.
    #[error("invalid symbol: {}", .0.as_deref().unwrap_or("<missing>"))]
    InvalidSymbol(Option<CompactString>),
}

/// Outcome of an accepted publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishReceipt {
    /// Subscribers the event was written to.
    pub delivered: usize,
    /// Subscribers removed because their write failed.
    pub pruned: usize,
}

/// State of one broadcast channel.
#[derive(Debug)]
pub struct BroadcastChannel {
    config: ChannelConfig,
    cache: EventCache,
    subscribers: SubscriberSet,
}

impl BroadcastChannel {
    pub fn new(config: ChannelConfig) -> Self {
        Self {
            config,
            cache: EventCache::new(),
            subscribers: SubscriberSet::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Validate `request`, cache the resulting event and fan it out.
    ///
    /// Subscribers whose write fails are removed before this returns.
    pub fn publish(
        &mut self,
        request: PublishRequest,
        now: Instant,
    ) -> Result<PublishReceipt, PublishError> {
        let kind = match request.kind {
            Some(kind) if self.config.accepts(&kind) => kind,
            other => return Err(PublishError::InvalidSymbol(other)),
        };

        let mut extra = request.extra;
        extra.retain(|key, _| self.config.carries(key));

        let event = Event {
            kind,
            magnitude: request.magnitude.filter(|m| m.is_finite()).unwrap_or(0.0),
            arrival: now,
            received_at: OffsetDateTime::now_utc(),
            extra,
        };
        let frame = self.encode(&event);
        self.cache.store(event);

        let Some(frame) = frame else {
            return Ok(PublishReceipt {
                delivered: 0,
                pruned: 0,
            });
        };
        let pruned = self.subscribers.broadcast(&frame);
        Ok(PublishReceipt {
            delivered: self.subscribers.len(),
            pruned,
        })
    }

    /// Add a subscriber.
    ///
    /// With [`CatchUp::Immediate`] a fresh cached event is written to the
    /// new subscriber before this returns. [`CatchUp::Silent`] channels
    /// never replay the cache.
    pub fn subscribe(&mut self, sender: SubscriberSender, now: Instant) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.subscribers.add(id, sender);

        if self.config.catch_up == CatchUp::Immediate {
            let catch_up = self
                .cache
                .fresh(now, self.config.ttl)
                .and_then(|event| self.encode(event));
            if let Some(frame) = catch_up {
                debug!(channel = %self.config.id, subscription = %id, "Sending catch-up event");
                self.subscribers.send_to(id, frame);
            }
        }
        id
    }

    /// Remove a subscriber. Safe to call for one that is already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.remove(id)
    }

    /// The cached event if it is still within the TTL.
    pub fn peek_latest(&self, now: Instant) -> Option<&Event> {
        self.cache.fresh(now, self.config.ttl)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn encode(&self, event: &Event) -> Option<ChannelFrame> {
        match serde_json::to_string(&event.to_payload(&self.config.id)) {
            Ok(json) => Some(ChannelFrame::Event(Arc::from(json))),
            Err(e) => {
                warn!(channel = %self.config.id, error = %e, "Failed to serialize event");
                None
            }
        }
    }
}
