//! Configuration module for telepath-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables.

pub mod file;

use crate::config::file::{
    CatchUpMode, ChannelConfig as FileChannelConfig, FileConfig,
    NotificationConfig as FileNotificationConfig, SessionConfig as FileSessionConfig,
};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use telepath_core::config::{
    CatchUp, ChannelConfig, NotificationConfig, RelayConfig, SessionConfig,
};
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Settings that only the HTTP layer uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub listen: SocketAddr,
}

/// Loaded configuration result containing all parts.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub server: ServerSettings,
    pub relay: RelayConfig,
    pub notification: Option<NotificationConfig>,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
    listen_override: Option<SocketAddr>,
    notify_token_override: Option<String>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(
        config_path: impl AsRef<Path>,
        listen_override: Option<SocketAddr>,
        notify_token_override: Option<String>,
    ) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
            notify_token_override,
        }
    }

    /// Read the TOML file, apply CLI overrides, validate, and convert.
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        self.load_str(&config_content)
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }

    fn load_str(&self, config_content: &str) -> Result<LoadedConfig, ConfigError> {
        let mut file_config: FileConfig = toml::from_str(config_content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }
        if let (Some(token), Some(notification)) = (
            self.notify_token_override.as_ref(),
            file_config.notification.as_mut(),
        ) {
            notification.token = Some(token.clone());
        }

        validate(&file_config)?;
        Ok(build_loaded_config(file_config))
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    if config.server.heartbeat_secs == 0 {
        return Err(ConfigError::ValidationError(
            "server.heartbeat_secs must be greater than zero".to_string(),
        ));
    }

    let mut channel_ids = HashSet::new();
    for channel in &config.channels {
        if !channel_ids.insert(channel.id.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate channel id {}",
                channel.id
            )));
        }
        if channel.symbols.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "channel {} has no symbols",
                channel.id
            )));
        }
        if channel.ttl_secs == 0 {
            return Err(ConfigError::ValidationError(format!(
                "channel {} has a zero ttl_secs",
                channel.id
            )));
        }
    }

    let mut session_ids = HashSet::new();
    for session in &config.sessions {
        if !session_ids.insert(session.id.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate session id {}",
                session.id
            )));
        }
        if session.terminal_type.is_empty() || session.artifact_field.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "session {} needs a terminal_type and an artifact_field",
                session.id
            )));
        }
    }

    let token_missing = config
        .notification
        .as_ref()
        .is_some_and(|n| n.token.as_deref().is_none_or(str::is_empty));
    if token_missing {
        return Err(ConfigError::ValidationError(
            "notification.token is not set (use --notify-token or TELEPATH_NOTIFY_TOKEN)"
                .to_string(),
        ));
    }

    Ok(())
}

fn build_loaded_config(file_config: FileConfig) -> LoadedConfig {
    LoadedConfig {
        server: ServerSettings {
            listen: file_config.server.listen,
        },
        relay: RelayConfig {
            heartbeat_interval: Duration::from_secs(file_config.server.heartbeat_secs),
            channels: file_config
                .channels
                .into_iter()
                .map(convert_channel)
                .collect(),
            sessions: file_config
                .sessions
                .into_iter()
                .map(convert_session)
                .collect(),
        },
        notification: file_config.notification.and_then(convert_notification),
    }
}

fn convert_channel(c: FileChannelConfig) -> ChannelConfig {
    let catch_up = match c.catch_up {
        CatchUpMode::Immediate => CatchUp::Immediate,
        CatchUpMode::Silent => CatchUp::Silent,
    };
    ChannelConfig::new(c.id, c.symbols)
        .with_ttl(Duration::from_secs(c.ttl_secs))
        .with_catch_up(catch_up)
        .with_extra_fields(c.extra_fields)
}

fn convert_session(s: FileSessionConfig) -> SessionConfig {
    SessionConfig::new(s.id)
        .with_terminal_type(s.terminal_type)
        .with_artifact_field(s.artifact_field)
}

fn convert_notification(n: FileNotificationConfig) -> Option<NotificationConfig> {
    Some(NotificationConfig {
        endpoint: n.endpoint,
        token: n.token?,
        user: n.user,
        title: n.title,
    })
}
