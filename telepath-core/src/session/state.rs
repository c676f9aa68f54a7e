//! Paired-role session state machine.

use crate::config::SessionConfig;
use crate::events::{PeerSender, SessionFrame};
use crate::notification::Artifact;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use telepath_sdk::objects::{Role, SessionSignal};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Identifies one connection holding (or having held) a role slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The payload is not a JSON object, or its `type` is a reserved
    /// signal name. It was dropped.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// The sending connection no longer holds its role slot.
    #[error("connection no longer holds its role")]
    NotCurrent,

    /// The session actor has stopped (process shutdown).
    #[error("session closed")]
    Closed,
}

/// Outcome of a relayed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOutcome {
    /// Whether the opposite role was connected and the write succeeded.
    pub delivered: bool,
    /// Whether the message carried the session's terminal `type`.
    pub terminal: bool,
    /// Artifact of a terminal message, if it had one.
    pub artifact: Option<Artifact>,
}

#[derive(Debug)]
struct Peer {
    id: ConnectionId,
    sender: PeerSender,
}

/// Role slots of one paired session.
///
/// Each slot is either empty or holds exactly one connection. A newer
/// connection in a role replaces the current one, which is told it was
/// superseded and loses its queue. The session has no terminal state and
/// can be reused across any number of connect/disconnect cycles.
#[derive(Debug)]
pub struct PairedSession {
    config: SessionConfig,
    producer: Option<Peer>,
    consumer: Option<Peer>,
}

impl PairedSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            producer: None,
            consumer: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn is_connected(&self, role: Role) -> bool {
        self.slot(role).is_some()
    }

    /// Whether `connection` currently holds the `role` slot.
    pub fn is_current(&self, role: Role, connection: ConnectionId) -> bool {
        self.slot(role).as_ref().is_some_and(|peer| peer.id == connection)
    }

    /// Place a connection in `role`, superseding any prior holder.
    pub fn connect(&mut self, role: Role, sender: PeerSender) -> ConnectionId {
        let id = ConnectionId::new();
        if let Some(old) = self.slot_mut(role).replace(Peer { id, sender }) {
            debug!(session = %self.config.id, %role, connection = %old.id, "Superseding connection");
            let _ = old.sender.try_send(SessionFrame::Superseded);
        }

        self.deliver(role, SessionFrame::Signal(SessionSignal::Ready { role }));

        let peer = role.opposite();
        if self.is_connected(peer) {
            self.deliver(role, SessionFrame::Signal(SessionSignal::PeerReady { peer }));
            self.deliver(peer, SessionFrame::Signal(SessionSignal::PeerReady { peer: role }));
        }
        id
    }

    /// Forward `payload` from `role` to the opposite role, verbatim.
    ///
    /// Payloads whose `type` names a relay signal are rejected so peers
    /// never see a forged `ready` or `peer-disconnected`.
    pub fn relay(
        &mut self,
        role: Role,
        connection: ConnectionId,
        payload: &str,
    ) -> Result<RelayOutcome, SessionError> {
        if !self.is_current(role, connection) {
            return Err(SessionError::NotCurrent);
        }

        let value: Value =
            serde_json::from_str(payload).map_err(|e| SessionError::Malformed(e.to_string()))?;
        let Value::Object(fields) = value else {
            return Err(SessionError::Malformed(
                "payload is not a JSON object".to_string(),
            ));
        };

        let kind = fields.get("type").and_then(Value::as_str);
        let reserved = kind.filter(|t| SessionSignal::RESERVED_TYPES.iter().any(|r| r == t));
        if let Some(reserved) = reserved {
            return Err(SessionError::Malformed(format!(
                "type `{reserved}` is reserved for relay signals"
            )));
        }

        let delivered = self.deliver(role.opposite(), SessionFrame::Relay(Arc::from(payload)));

        let terminal = kind.is_some_and(|t| t == self.config.terminal_type.as_str());
        let artifact = if terminal {
            fields
                .get(self.config.artifact_field.as_str())
                .and_then(Value::as_str)
                .map(Artifact::new)
        } else {
            None
        };

        Ok(RelayOutcome {
            delivered,
            terminal,
            artifact,
        })
    }

    /// Empty `role` if `connection` still holds it.
    ///
    /// Returns `false` for a superseded or already removed connection,
    /// which leaves the slot untouched.
    pub fn disconnect(&mut self, role: Role, connection: ConnectionId) -> bool {
        if !self.is_current(role, connection) {
            return false;
        }
        *self.slot_mut(role) = None;
        self.deliver(
            role.opposite(),
            SessionFrame::Signal(SessionSignal::PeerDisconnected { peer: role }),
        );
        true
    }

    /// Write a frame to the holder of `role`.
    ///
    /// A failed write empties the slot and tells the other side its peer
    /// left. That notice is not retried: if it fails too, the other slot is
    /// emptied as well.
    fn deliver(&mut self, role: Role, frame: SessionFrame) -> bool {
        let Some(peer) = self.slot(role) else {
            return false;
        };
        if peer.sender.try_send(frame).is_ok() {
            return true;
        }

        debug!(session = %self.config.id, %role, connection = %peer.id, "Pruning connection");
        *self.slot_mut(role) = None;

        let other = role.opposite();
        if let Some(peer) = self.slot(other) {
            let notice = SessionFrame::Signal(SessionSignal::PeerDisconnected { peer: role });
            if peer.sender.try_send(notice).is_err() {
                *self.slot_mut(other) = None;
            }
        }
        false
    }

    fn slot(&self, role: Role) -> &Option<Peer> {
        match role {
            Role::Producer => &self.producer,
            Role::Consumer => &self.consumer,
        }
    }

    fn slot_mut(&mut self, role: Role) -> &mut Option<Peer> {
        match role {
            Role::Producer => &mut self.producer,
            Role::Consumer => &mut self.consumer,
        }
    }
}
