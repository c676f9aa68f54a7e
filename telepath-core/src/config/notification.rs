//! Notification sink configuration.

use url::Url;

/// Credentials and endpoint of the external push-messaging service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationConfig {
    pub endpoint: Url,
    /// Application token.
    pub token: String,
    /// Recipient key.
    pub user: String,
    /// Title shown on the delivered notification.
    pub title: String,
}
