//! Application state shared across all request handlers.

use std::sync::Arc;
use telepath_core::Registry;
use telepath_core::config::{ConfigStore, NotificationConfig};

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Every channel and session actor, keyed by identifier.
    pub registry: Arc<Registry>,
    /// Notification settings (can be reloaded via SIGHUP).
    pub notification: ConfigStore<Option<NotificationConfig>>,
}

impl AppState {
    pub fn new(
        registry: Arc<Registry>,
        notification: ConfigStore<Option<NotificationConfig>>,
    ) -> Self {
        Self {
            registry,
            notification,
        }
    }
}
