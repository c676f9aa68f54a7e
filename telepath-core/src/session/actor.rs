//! Session actor, its handle, and per-connection links.

use super::{ConnectionId, PairedSession, RelayOutcome, SessionError};
use crate::config::SessionConfig;
use crate::events::{DEFAULT_CHANNEL_BUFFER, PeerReceiver, PeerSender, SessionFrame, peer_channel};
use crate::heartbeat::HeartbeatTimer;
use crate::notification::{Notification, NotificationSink};
use compact_str::CompactString;
use futures_util::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use telepath_sdk::objects::Role;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

/// Which role slots are occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub producer_connected: bool,
    pub consumer_connected: bool,
}

enum SessionCommand {
    Connect {
        role: Role,
        sender: PeerSender,
        reply: oneshot::Sender<ConnectionId>,
    },
    Relay {
        role: Role,
        connection: ConnectionId,
        payload: String,
    },
    Disconnect {
        role: Role,
        connection: ConnectionId,
    },
    Stats {
        reply: oneshot::Sender<SessionStats>,
    },
}

/// The single task that owns a [`PairedSession`].
pub struct SessionActor {
    session: PairedSession,
    sink: Arc<dyn NotificationSink>,
    command_rx: mpsc::Receiver<SessionCommand>,
    shutdown_rx: watch::Receiver<bool>,
}

impl SessionActor {
    pub fn new(
        config: SessionConfig,
        heartbeat_interval: Duration,
        sink: Arc<dyn NotificationSink>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (Self, SessionHandle) {
        let (command_tx, command_rx) = mpsc::channel(DEFAULT_CHANNEL_BUFFER);
        let handle = SessionHandle {
            id: config.id.clone(),
            command_tx,
            heartbeat_interval,
        };
        let actor = Self {
            session: PairedSession::new(config),
            sink,
            command_rx,
            shutdown_rx,
        };
        (actor, handle)
    }

    pub async fn run(mut self) {
        info!(session = %self.session.id(), "Session started");

        loop {
            tokio::select! {
                biased;

                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        info!(session = %self.session.id(), "Session received shutdown signal");
                        break;
                    }
                }

                Some(command) = self.command_rx.recv() => {
                    self.apply(command);
                }

                else => break,
            }
        }

        info!(session = %self.session.id(), "Session shutdown complete");
    }

    fn apply(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Connect {
                role,
                sender,
                reply,
            } => {
                let connection = self.session.connect(role, sender);
                info!(session = %self.session.id(), %role, %connection, "Connection joined");
                if reply.send(connection).is_err() {
                    self.session.disconnect(role, connection);
                }
            }
            SessionCommand::Relay {
                role,
                connection,
                payload,
            } => match self.session.relay(role, connection, &payload) {
                Ok(outcome) => self.after_relay(role, outcome),
                Err(SessionError::NotCurrent) => {
                    debug!(session = %self.session.id(), %role, %connection, "Ignoring message from superseded connection");
                }
                Err(e) => {
                    warn!(session = %self.session.id(), %role, error = %e, "Dropping message");
                }
            },
            SessionCommand::Disconnect { role, connection } => {
                if self.session.disconnect(role, connection) {
                    info!(session = %self.session.id(), %role, %connection, "Connection left");
                }
            }
            SessionCommand::Stats { reply } => {
                let _ = reply.send(SessionStats {
                    producer_connected: self.session.is_connected(Role::Producer),
                    consumer_connected: self.session.is_connected(Role::Consumer),
                });
            }
        }
    }

    fn after_relay(&self, role: Role, outcome: RelayOutcome) {
        if !outcome.delivered {
            debug!(session = %self.session.id(), %role, "No peer to relay to");
        }
        if !outcome.terminal {
            return;
        }
        let Some(artifact) = outcome.artifact else {
            warn!(session = %self.session.id(), %role, "Terminal message carried no artifact");
            return;
        };

        let notification = Notification {
            session: self.session.id().into(),
            artifact,
        };
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            let session = notification.session.clone();
            if let Err(e) = sink.notify(notification).await {
                warn!(%session, error = %e, "Failed to deliver notification");
            }
        });
    }
}

/// Cloneable handle to a [`SessionActor`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: CompactString,
    command_tx: mpsc::Sender<SessionCommand>,
    heartbeat_interval: Duration,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Take the `role` slot, superseding whoever holds it.
    pub async fn connect(&self, role: Role) -> Result<SessionLink, SessionError> {
        let (sender, receiver) = peer_channel();
        let heartbeat_sender = sender.clone();
        let (reply, response) = oneshot::channel();
        self.command_tx
            .send(SessionCommand::Connect {
                role,
                sender,
                reply,
            })
            .await
            .map_err(|_| SessionError::Closed)?;
        let connection = response.await.map_err(|_| SessionError::Closed)?;

        let session = self.clone();
        let heartbeat = HeartbeatTimer::start(
            self.heartbeat_interval,
            &heartbeat_sender,
            SessionFrame::Heartbeat,
            move || session.disconnect(role, connection),
        );
        drop(heartbeat_sender);

        Ok(SessionLink {
            role,
            connection,
            receiver,
            heartbeat,
            session: self.clone(),
        })
    }

    /// Never blocks. A dropped request is harmless: the link's queue is
    /// closed, so the next write to it prunes the slot.
    pub fn disconnect(&self, role: Role, connection: ConnectionId) {
        if self
            .command_tx
            .try_send(SessionCommand::Disconnect { role, connection })
            .is_err()
        {
            debug!(session = %self.id, %role, %connection, "Deferring disconnect to next write");
        }
    }

    pub async fn stats(&self) -> Result<SessionStats, SessionError> {
        let (reply, response) = oneshot::channel();
        self.command_tx
            .send(SessionCommand::Stats { reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        response.await.map_err(|_| SessionError::Closed)
    }
}

/// One connection's hold on a role slot.
///
/// Yields [`SessionFrame`]s addressed to this connection. Ends after a
/// [`SessionFrame::Superseded`] frame or when the session shuts down.
/// Dropping the link cancels its heartbeat and then releases the slot, if
/// it still holds it.
#[derive(Debug)]
pub struct SessionLink {
    role: Role,
    connection: ConnectionId,
    receiver: PeerReceiver,
    heartbeat: HeartbeatTimer,
    session: SessionHandle,
}

impl SessionLink {
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub async fn recv(&mut self) -> Option<SessionFrame> {
        self.receiver.recv().await
    }

    /// Hand an inbound text message to the session.
    ///
    /// Validation happens in the session; malformed messages and messages
    /// from a superseded link are dropped there.
    pub async fn relay(&self, payload: impl Into<String>) -> Result<(), SessionError> {
        self.session
            .command_tx
            .send(SessionCommand::Relay {
                role: self.role,
                connection: self.connection,
                payload: payload.into(),
            })
            .await
            .map_err(|_| SessionError::Closed)
    }
}

impl Stream for SessionLink {
    type Item = SessionFrame;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl Drop for SessionLink {
    fn drop(&mut self) {
        self.heartbeat.cancel();
        self.session.disconnect(self.role, self.connection);
    }
}
