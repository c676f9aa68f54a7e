//! Paired sessions: exactly two roles, producer and consumer, relaying
//! opaque JSON messages to each other.

mod actor;
mod state;

pub use actor::{SessionActor, SessionHandle, SessionLink, SessionStats};
pub use state::{ConnectionId, PairedSession, RelayOutcome, SessionError};
