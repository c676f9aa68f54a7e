//! Channel actor and its handle.

use super::{BroadcastChannel, PublishError, PublishReceipt, SubscriptionId};
use crate::config::ChannelConfig;
use crate::events::{
    ChannelFrame, DEFAULT_CHANNEL_BUFFER, PublishRequest, SubscriberReceiver, SubscriberSender,
    subscriber_channel,
};
use crate::heartbeat::HeartbeatTimer;
use compact_str::CompactString;
use futures_util::Stream;
use kanau::processor::Processor;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use telepath_sdk::objects::EventPayload;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info};

/// Errors returned by [`ChannelHandle`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error(transparent)]
    Publish(#[from] PublishError),

    /// The channel actor has stopped (process shutdown).
    #[error("channel closed")]
    Closed,
}

/// Point-in-time numbers for the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelStats {
    pub subscribers: usize,
    pub fresh: bool,
}

/// Request for the cached event, used with [`Processor`].
#[derive(Debug, Clone, Copy)]
pub struct PeekLatest;

enum ChannelCommand {
    Publish {
        request: PublishRequest,
        reply: oneshot::Sender<Result<PublishReceipt, PublishError>>,
    },
    Subscribe {
        sender: SubscriberSender,
        reply: oneshot::Sender<SubscriptionId>,
    },
    Unsubscribe {
        id: SubscriptionId,
    },
    PeekLatest {
        reply: oneshot::Sender<Option<EventPayload>>,
    },
    Stats {
        reply: oneshot::Sender<ChannelStats>,
    },
}

/// The single task that owns a [`BroadcastChannel`].
///
/// Commands are applied one at a time in arrival order, so no two
/// operations on the same channel ever interleave.
pub struct ChannelActor {
    channel: BroadcastChannel,
    command_rx: mpsc::Receiver<ChannelCommand>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ChannelActor {
    /// Create an actor and the handle used to reach it.
    ///
    /// The actor does nothing until [`run`](ChannelActor::run) is spawned.
    pub fn new(
        config: ChannelConfig,
        heartbeat_interval: Duration,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (Self, ChannelHandle) {
        let (command_tx, command_rx) = mpsc::channel(DEFAULT_CHANNEL_BUFFER);
        let handle = ChannelHandle {
            id: config.id.clone(),
            command_tx,
            heartbeat_interval,
        };
        let actor = Self {
            channel: BroadcastChannel::new(config),
            command_rx,
            shutdown_rx,
        };
        (actor, handle)
    }

    /// Process commands until shutdown is signaled or every handle is gone.
    ///
    /// Dropping the actor closes every subscriber queue, which ends the
    /// corresponding push streams.
    pub async fn run(mut self) {
        info!(channel = %self.channel.id(), "Channel started");

        loop {
            tokio::select! {
                biased;

                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        info!(channel = %self.channel.id(), "Channel received shutdown signal");
                        break;
                    }
                }

                Some(command) = self.command_rx.recv() => {
                    self.apply(command);
                }

                else => break,
            }
        }

        info!(
            channel = %self.channel.id(),
            subscribers = self.channel.subscriber_count(),
            "Channel shutdown complete"
        );
    }

    fn apply(&mut self, command: ChannelCommand) {
        let now = Instant::now();
        match command {
            ChannelCommand::Publish { request, reply } => {
                let result = self.channel.publish(request, now);
                match &result {
                    Ok(receipt) => debug!(
                        channel = %self.channel.id(),
                        delivered = receipt.delivered,
                        pruned = receipt.pruned,
                        "Event published"
                    ),
                    Err(e) => debug!(channel = %self.channel.id(), error = %e, "Publish rejected"),
                }
                let _ = reply.send(result);
            }
            ChannelCommand::Subscribe { sender, reply } => {
                let id = self.channel.subscribe(sender, now);
                debug!(
                    channel = %self.channel.id(),
                    subscription = %id,
                    subscribers = self.channel.subscriber_count(),
                    "Subscriber added"
                );
                if reply.send(id).is_err() {
                    // The caller went away before learning its id.
                    self.channel.unsubscribe(id);
                }
            }
            ChannelCommand::Unsubscribe { id } => {
                if self.channel.unsubscribe(id) {
                    debug!(
                        channel = %self.channel.id(),
                        subscription = %id,
                        subscribers = self.channel.subscriber_count(),
                        "Subscriber removed"
                    );
                }
            }
            ChannelCommand::PeekLatest { reply } => {
                let id = self.channel.id();
                let latest = self.channel.peek_latest(now).map(|e| e.to_payload(id));
                let _ = reply.send(latest);
            }
            ChannelCommand::Stats { reply } => {
                let _ = reply.send(ChannelStats {
                    subscribers: self.channel.subscriber_count(),
                    fresh: self.channel.peek_latest(now).is_some(),
                });
            }
        }
    }
}

/// Cloneable handle to a [`ChannelActor`].
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    id: CompactString,
    command_tx: mpsc::Sender<ChannelCommand>,
    heartbeat_interval: Duration,
}

impl ChannelHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Publish an event. Resolves once fan-out has been attempted.
    pub async fn publish(&self, request: PublishRequest) -> Result<PublishReceipt, ChannelError> {
        let result = self
            .request(|reply| ChannelCommand::Publish { request, reply })
            .await?;
        Ok(result?)
    }

    /// Open a subscription with its own heartbeat.
    ///
    /// A fresh cached event (on immediate catch-up channels) is already
    /// queued on the returned subscription.
    pub async fn subscribe(&self) -> Result<Subscription, ChannelError> {
        let (sender, receiver) = subscriber_channel();
        let heartbeat_sender = sender.clone();
        let id = self
            .request(|reply| ChannelCommand::Subscribe { sender, reply })
            .await?;

        let channel = self.clone();
        let heartbeat = HeartbeatTimer::start(
            self.heartbeat_interval,
            &heartbeat_sender,
            ChannelFrame::Heartbeat,
            move || channel.unsubscribe(id),
        );
        // Only the actor keeps a strong sender, so the queue closes as soon
        // as the subscriber leaves the set.
        drop(heartbeat_sender);

        Ok(Subscription {
            id,
            receiver,
            heartbeat,
            channel: self.clone(),
        })
    }

    /// Ask the actor to drop a subscriber. Never blocks.
    ///
    /// If the command queue is full the request is dropped; the subscriber's
    /// queue is closed by then, so the next publish prunes it anyway.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        if self
            .command_tx
            .try_send(ChannelCommand::Unsubscribe { id })
            .is_err()
        {
            debug!(channel = %self.id, subscription = %id, "Deferring unsubscribe to next publish");
        }
    }

    /// The cached event if it is still within the TTL.
    pub async fn peek_latest(&self) -> Result<Option<EventPayload>, ChannelError> {
        self.request(|reply| ChannelCommand::PeekLatest { reply })
            .await
    }

    pub async fn stats(&self) -> Result<ChannelStats, ChannelError> {
        self.request(|reply| ChannelCommand::Stats { reply }).await
    }

    async fn request<R>(
        &self,
        build: impl FnOnce(oneshot::Sender<R>) -> ChannelCommand,
    ) -> Result<R, ChannelError> {
        let (reply, response) = oneshot::channel();
        self.command_tx
            .send(build(reply))
            .await
            .map_err(|_| ChannelError::Closed)?;
        response.await.map_err(|_| ChannelError::Closed)
    }
}

impl Processor<PublishRequest> for ChannelHandle {
    type Output = PublishReceipt;
    type Error = ChannelError;
    #[tracing::instrument(skip_all, err, name = "Channel:Publish", fields(channel = %self.id))]
    async fn process(&self, request: PublishRequest) -> Result<PublishReceipt, ChannelError> {
        self.publish(request).await
    }
}

impl Processor<PeekLatest> for ChannelHandle {
    type Output = Option<EventPayload>;
    type Error = ChannelError;
    async fn process(&self, _query: PeekLatest) -> Result<Option<EventPayload>, ChannelError> {
        self.peek_latest().await
    }
}

/// A live subscription to one channel.
///
/// Yields [`ChannelFrame`]s until the subscriber is removed from the
/// channel or the channel shuts down. Dropping it cancels the heartbeat
/// first and then removes the subscriber.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    receiver: SubscriberReceiver,
    heartbeat: HeartbeatTimer,
    channel: ChannelHandle,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next frame. `None` once the subscription has ended.
    pub async fn recv(&mut self) -> Option<ChannelFrame> {
        self.receiver.recv().await
    }
}

impl Stream for Subscription {
    type Item = ChannelFrame;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.heartbeat.cancel();
        self.channel.unsubscribe(self.id);
    }
}
