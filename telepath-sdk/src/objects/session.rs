//! Paired session message types.
//!
//! `GET /sessions/{id}/ws?role=producer|consumer` upgrades to a WebSocket.
//!
//! # Protocol
//!
//! 1. On connect the server sends [`SessionSignal::Ready`].
//! 2. When both roles are connected, each side receives
//!    [`SessionSignal::PeerReady`].
//! 3. Every text frame a client sends is relayed verbatim to the other
//!    role. Payloads must be JSON objects; a `type` field is the only part
//!    the relay inspects. A payload whose `type` is one of
//!    [`SessionSignal::RESERVED_TYPES`] is dropped, so every frame with
//!    such a `type` comes from the relay itself.
//! 4. When the other role leaves, the remaining side receives
//!    [`SessionSignal::PeerDisconnected`].
//! 5. A newer connection in the same role replaces the current one, which
//!    is closed with [`WsCloseCode::SUPERSEDED`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// The two sides of a paired session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Producer,
    Consumer,
}

impl Role {
    /// The role on the other side of the session.
    pub fn opposite(self) -> Role {
        match self {
            Role::Producer => Role::Consumer,
            Role::Consumer => Role::Producer,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Producer => "producer",
            Role::Consumer => "consumer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Control messages generated by the relay itself.
///
/// Serialized as an internally-tagged JSON object so clients can dispatch
/// on `"type"` alongside relayed payloads:
///
/// ```json
/// {"type":"ready","role":"producer"}
/// {"type":"peer-ready","peer":"consumer"}
/// {"type":"peer-disconnected","peer":"consumer"}
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SessionSignal {
    /// Sent to a connection once it holds its role slot.
    Ready { role: Role },
    /// Both roles are now connected.
    PeerReady { peer: Role },
    /// The other role left.
    PeerDisconnected { peer: Role },
}

impl SessionSignal {
    /// `type` values only the relay may send. Client payloads using them
    /// are dropped.
    pub const RESERVED_TYPES: [&'static str; 3] = ["ready", "peer-ready", "peer-disconnected"];
}

/// Well-known WebSocket close codes used by session connections.
///
/// Codes in the 4000–4999 range are reserved for application use by
/// [RFC 6455 §7.4.2](https://www.rfc-editor.org/rfc/rfc6455#section-7.4.2).
pub struct WsCloseCode;

impl WsCloseCode {
    /// The relay is shutting down or lost the session actor.
    pub const GOING_AWAY: u16 = 1001;

    /// A newer connection took over this role.
    pub const SUPERSEDED: u16 = 4009;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_signal_wire_format() {
        let ready = serde_json::to_value(SessionSignal::Ready {
            role: Role::Producer,
        })
        .unwrap();
        assert_eq!(ready, json!({"type": "ready", "role": "producer"}));

        let peer = serde_json::to_value(SessionSignal::PeerDisconnected {
            peer: Role::Consumer,
        })
        .unwrap();
        assert_eq!(peer, json!({"type": "peer-disconnected", "peer": "consumer"}));
    }

    #[test]
    fn test_role_parsing() {
        let role: Role = serde_json::from_value(json!("consumer")).unwrap();
        assert_eq!(role, Role::Consumer);
        assert!(serde_json::from_value::<Role>(json!("audience")).is_err());
        assert_eq!(Role::Producer.opposite(), Role::Consumer);
    }
}
