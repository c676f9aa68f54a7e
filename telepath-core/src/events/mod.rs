//! Event and frame types flowing through the relay.
//!
//! # Flow
//!
//! 1. A producer request becomes a [`PublishRequest`].
//! 2. The channel actor validates it into an [`Event`] and caches it.
//! 3. The event is serialized once and fanned out as a [`ChannelFrame`].
//! 4. Session connections exchange [`SessionFrame`]s with their actor.

pub mod channels;
pub mod types;

pub use channels::{
    DEFAULT_CHANNEL_BUFFER, OUTBOUND_BUFFER, PeerReceiver, PeerSender, SubscriberReceiver,
    SubscriberSender, peer_channel, subscriber_channel,
};
pub use types::{ChannelFrame, Event, PublishRequest, SessionFrame};
