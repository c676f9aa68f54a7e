//! Dynamic set of subscriber connections for one channel.

use crate::events::{ChannelFrame, SubscriberSender};
use std::fmt;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

/// Identifies one subscription within its channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Active subscribers in insertion order.
///
/// The set is small in practice, so entries live in a `Vec` and lookups
/// are linear.
#[derive(Debug, Default)]
pub struct SubscriberSet {
    entries: Vec<(SubscriptionId, SubscriberSender)>,
}

impl SubscriberSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: SubscriptionId, sender: SubscriberSender) {
        self.entries.push((id, sender));
    }

    /// Remove a subscriber. Returns `false` if it was already gone.
    pub fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write one frame to a single subscriber, pruning it on failure.
    pub fn send_to(&mut self, id: SubscriptionId, frame: ChannelFrame) -> bool {
        let Some(index) = self.entries.iter().position(|(entry, _)| *entry == id) else {
            return false;
        };
        match self.entries[index].1.try_send(frame) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(subscription = %id, reason = write_failure(&e), "Pruning subscriber");
                self.entries.remove(index);
                false
            }
        }
    }

    /// Write `frame` to every subscriber and prune the ones whose write
    /// fails. Returns the number of subscribers removed.
    pub fn broadcast(&mut self, frame: &ChannelFrame) -> usize {
        let mut failed = Vec::new();
        for (id, sender) in &self.entries {
            if let Err(e) = sender.try_send(frame.clone()) {
                tracing::debug!(subscription = %id, reason = write_failure(&e), "Pruning subscriber");
                failed.push(*id);
            }
        }
        if !failed.is_empty() {
            self.entries.retain(|(id, _)| !failed.contains(id));
        }
        failed.len()
    }
}

fn write_failure<T>(err: &TrySendError<T>) -> &'static str {
    match err {
        TrySendError::Full(_) => "queue full",
        TrySendError::Closed(_) => "connection closed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::subscriber_channel;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn frame(text: &str) -> ChannelFrame {
        ChannelFrame::Event(Arc::from(text))
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut set = SubscriberSet::new();
        let (tx, _rx) = subscriber_channel();
        let id = SubscriptionId::new();
        set.add(id, tx);

        assert!(set.remove(id));
        assert!(!set.remove(id));
        assert!(set.is_empty());
    }

    #[test]
    fn test_broadcast_reaches_every_subscriber() {
        let mut set = SubscriberSet::new();
        let (tx1, mut rx1) = subscriber_channel();
        let (tx2, mut rx2) = subscriber_channel();
        set.add(SubscriptionId::new(), tx1);
        set.add(SubscriptionId::new(), tx2);

        assert_eq!(set.broadcast(&frame("a")), 0);
        assert_eq!(rx1.try_recv().unwrap(), frame("a"));
        assert_eq!(rx2.try_recv().unwrap(), frame("a"));
    }

    #[test]
    fn test_broadcast_prunes_closed_subscriber() {
        let mut set = SubscriberSet::new();
        let (live_tx, mut live_rx) = subscriber_channel();
        let (dead_tx, dead_rx) = subscriber_channel();
        let live = SubscriptionId::new();
        let dead = SubscriptionId::new();
        set.add(live, live_tx);
        set.add(dead, dead_tx);
        drop(dead_rx);

        assert_eq!(set.broadcast(&frame("a")), 1);
        assert_eq!(set.len(), 1);
        assert_eq!(live_rx.try_recv().unwrap(), frame("a"));
        assert!(!set.remove(dead));
        assert!(set.remove(live));
    }

    #[test]
    fn test_broadcast_prunes_full_subscriber() {
        let mut set = SubscriberSet::new();
        let (tx, _rx) = mpsc::channel(1);
        let id = SubscriptionId::new();
        set.add(id, tx);

        assert_eq!(set.broadcast(&frame("a")), 0);
        assert_eq!(set.broadcast(&frame("b")), 1);
        assert!(set.is_empty());
        assert!(!set.remove(id));
    }

    #[test]
    fn test_send_to_unknown_subscriber() {
        let mut set = SubscriberSet::new();
        assert!(!set.send_to(SubscriptionId::new(), ChannelFrame::Heartbeat));
    }
}
