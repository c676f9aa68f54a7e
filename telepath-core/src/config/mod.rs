//! Runtime configuration types for the relay engine.
//!
//! These are the validated values the engine runs with. Parsing the TOML
//! file and applying CLI overrides happens in the server crate.

mod channel;
mod config_store;
mod notification;
mod session;

pub use channel::{CatchUp, ChannelConfig, DEFAULT_TTL, LONG_HOLD_TTL};
pub use config_store::{ConfigStore, ConfigWatcher};
pub use notification::NotificationConfig;
pub use session::{DEFAULT_ARTIFACT_FIELD, DEFAULT_TERMINAL_TYPE, SessionConfig};

use crate::heartbeat::DEFAULT_HEARTBEAT_INTERVAL;
use std::time::Duration;

/// Everything the [`Registry`](crate::Registry) needs to build its actors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Interval between liveness frames on every long-lived connection.
    pub heartbeat_interval: Duration,
    pub channels: Vec<ChannelConfig>,
    pub sessions: Vec<SessionConfig>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            channels: Vec::new(),
            sessions: Vec::new(),
        }
    }
}
