//! Queue factories for subscriber and peer connections.

use super::types::{ChannelFrame, SessionFrame};
use tokio::sync::mpsc;

/// Buffer size of actor command queues.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Buffer size of a single connection's outbound queue.
///
/// A connection whose queue is full counts as a failed write and is
/// pruned, so this bounds how far a stalled client may fall behind.
pub const OUTBOUND_BUFFER: usize = 64;

/// Outbound queue of one channel subscriber.
pub type SubscriberSender = mpsc::Sender<ChannelFrame>;
pub type SubscriberReceiver = mpsc::Receiver<ChannelFrame>;

/// Outbound queue of one session connection.
pub type PeerSender = mpsc::Sender<SessionFrame>;
pub type PeerReceiver = mpsc::Receiver<SessionFrame>;

pub fn subscriber_channel() -> (SubscriberSender, SubscriberReceiver) {
    mpsc::channel(OUTBOUND_BUFFER)
}

pub fn peer_channel() -> (PeerSender, PeerReceiver) {
    mpsc::channel(OUTBOUND_BUFFER)
}
