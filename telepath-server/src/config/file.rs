//! TOML file configuration structures.
//!
//! These structs directly map to the `telepath-config.toml` file format.

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use url::Url;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
    #[serde(default)]
    pub sessions: Vec<SessionConfig>,
    /// Push-messaging endpoint for terminal session artifacts.
    #[serde(default)]
    pub notification: Option<NotificationConfig>,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
    /// Seconds between heartbeats on every long-lived connection.
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
            heartbeat_secs: default_heartbeat_secs(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))
}

fn default_heartbeat_secs() -> u64 {
    25
}

/// One `[[channels]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub id: String,
    /// Valid symbol set; publishes with any other kind are rejected.
    pub symbols: Vec<String>,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default)]
    pub catch_up: CatchUpMode,
    /// Optional request attributes carried into the event.
    #[serde(default)]
    pub extra_fields: Vec<String>,
}

fn default_ttl_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatchUpMode {
    #[default]
    Immediate,
    Silent,
}

/// One `[[sessions]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub id: String,
    /// Value of the `type` field that marks the terminal message.
    #[serde(default = "default_terminal_type")]
    pub terminal_type: String,
    /// Field of the terminal message holding the artifact.
    #[serde(default = "default_artifact_field")]
    pub artifact_field: String,
}

fn default_terminal_type() -> String {
    "final".to_string()
}

fn default_artifact_field() -> String {
    "artifact".to_string()
}

/// `[notification]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub endpoint: Url,
    /// Application token. May be left out and supplied on the command line.
    #[serde(default)]
    pub token: Option<String>,
    pub user: String,
    #[serde(default = "default_title")]
    pub title: String,
}

fn default_title() -> String {
    "Telepath".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parsing() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"
heartbeat_secs = 15

[[channels]]
id = "zener"
symbols = ["circle", "cross", "waves", "square", "star"]

[[channels]]
id = "oracle"
symbols = ["yes", "no"]
ttl_secs = 600
catch_up = "silent"
extra_fields = ["day", "month"]

[[sessions]]
id = "sketch"

[notification]
endpoint = "https://push.example.com/1/messages.json"
token = "app-token"
user = "user-key"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert_eq!(config.server.heartbeat_secs, 15);
        assert_eq!(config.channels.len(), 2);
        assert_eq!(config.channels[0].ttl_secs, 60);
        assert_eq!(config.channels[0].catch_up, CatchUpMode::Immediate);
        assert_eq!(config.channels[1].catch_up, CatchUpMode::Silent);
        assert_eq!(config.channels[1].extra_fields, vec!["day", "month"]);
        assert_eq!(config.sessions[0].terminal_type, "final");
        assert_eq!(config.sessions[0].artifact_field, "artifact");

        let notification = config.notification.unwrap();
        assert_eq!(notification.token.as_deref(), Some("app-token"));
        assert_eq!(notification.title, "Telepath");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.listen.port(), 8080);
        assert_eq!(config.server.heartbeat_secs, 25);
        assert!(config.channels.is_empty());
        assert!(config.notification.is_none());
    }

    #[test]
    fn test_unknown_catch_up_mode_is_rejected() {
        let toml_str = r#"
[[channels]]
id = "zener"
symbols = ["circle"]
catch_up = "replay"
"#;
        assert!(toml::from_str::<FileConfig>(toml_str).is_err());
    }
}
