//! Owner of every channel and session actor.

use crate::channel::{ChannelActor, ChannelHandle};
use crate::config::RelayConfig;
use crate::notification::NotificationSink;
use crate::session::{SessionActor, SessionHandle};
use compact_str::CompactString;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use telepath_sdk::objects::{ChannelStatus, SessionStatus};
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("duplicate channel id: {0}")]
    DuplicateChannel(CompactString),

    #[error("duplicate session id: {0}")]
    DuplicateSession(CompactString),

    #[error("channel {0} has an empty symbol set")]
    EmptySymbols(CompactString),

    #[error("channel {0} has a zero TTL")]
    ZeroTtl(CompactString),
}

/// Status of every channel and session, in identifier order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryStatus {
    pub uptime: Duration,
    pub channels: Vec<ChannelStatus>,
    pub sessions: Vec<SessionStatus>,
}

/// The fixed set of channels and sessions named by configuration.
///
/// Built once at startup; identifiers never appear or disappear afterwards.
pub struct Registry {
    channels: BTreeMap<CompactString, ChannelHandle>,
    sessions: BTreeMap<CompactString, SessionHandle>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    started_at: Instant,
}

impl Registry {
    /// Validate `config` and spawn one actor per channel and session.
    pub fn spawn(
        config: &RelayConfig,
        sink: Arc<dyn NotificationSink>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<Self, RegistryError> {
        let mut channels = BTreeMap::new();
        let mut actors = Vec::new();
        for channel in &config.channels {
            if channel.symbols.is_empty() {
                return Err(RegistryError::EmptySymbols(channel.id.clone()));
            }
            if channel.ttl.is_zero() {
                return Err(RegistryError::ZeroTtl(channel.id.clone()));
            }
            if channels.contains_key(&channel.id) {
                return Err(RegistryError::DuplicateChannel(channel.id.clone()));
            }
            let (actor, handle) = ChannelActor::new(
                channel.clone(),
                config.heartbeat_interval,
                shutdown_rx.clone(),
            );
            channels.insert(channel.id.clone(), handle);
            actors.push(actor);
        }

        let mut sessions = BTreeMap::new();
        let mut session_actors = Vec::new();
        for session in &config.sessions {
            if sessions.contains_key(&session.id) {
                return Err(RegistryError::DuplicateSession(session.id.clone()));
            }
            let (actor, handle) = SessionActor::new(
                session.clone(),
                config.heartbeat_interval,
                Arc::clone(&sink),
                shutdown_rx.clone(),
            );
            sessions.insert(session.id.clone(), handle);
            session_actors.push(actor);
        }

        // Nothing is spawned until the whole configuration validated.
        let mut tasks: Vec<JoinHandle<()>> = actors
            .into_iter()
            .map(|actor| tokio::spawn(actor.run()))
            .collect();
        tasks.extend(
            session_actors
                .into_iter()
                .map(|actor| tokio::spawn(actor.run())),
        );

        info!(
            channels = channels.len(),
            sessions = sessions.len(),
            "Registry started"
        );

        Ok(Self {
            channels,
            sessions,
            tasks: Mutex::new(tasks),
            started_at: Instant::now(),
        })
    }

    pub fn channel(&self, id: &str) -> Option<&ChannelHandle> {
        self.channels.get(id)
    }

    pub fn session(&self, id: &str) -> Option<&SessionHandle> {
        self.sessions.get(id)
    }

    pub fn channel_ids(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(CompactString::as_str)
    }

    pub fn session_ids(&self) -> impl Iterator<Item = &str> {
        self.sessions.keys().map(CompactString::as_str)
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Collect stats from every actor.
    ///
    /// An actor that has already stopped reports as empty.
    pub async fn status(&self) -> RegistryStatus {
        let mut channels = Vec::with_capacity(self.channels.len());
        for (id, handle) in &self.channels {
            let stats = handle.stats().await.ok();
            channels.push(ChannelStatus {
                id: id.to_string(),
                subscribers: stats.map_or(0, |s| s.subscribers),
                fresh: stats.is_some_and(|s| s.fresh),
            });
        }

        let mut sessions = Vec::with_capacity(self.sessions.len());
        for (id, handle) in &self.sessions {
            let stats = handle.stats().await.ok();
            sessions.push(SessionStatus {
                id: id.to_string(),
                producer_connected: stats.is_some_and(|s| s.producer_connected),
                consumer_connected: stats.is_some_and(|s| s.consumer_connected),
            });
        }

        RegistryStatus {
            uptime: self.uptime(),
            channels,
            sessions,
        }
    }

    /// Wait for every actor to stop. Call after signaling shutdown.
    pub async fn join(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock().await);
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Actor task ended abnormally");
            }
        }
        info!("All relay actors stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChannelConfig, SessionConfig};
    use crate::events::PublishRequest;
    use crate::notification::LogNotificationSink;
    use telepath_sdk::objects::Role;

    fn config() -> RelayConfig {
        RelayConfig {
            channels: vec![
                ChannelConfig::new("zener", ["circle", "cross"]),
                ChannelConfig::new("oracle", ["yes", "no"]).with_ttl(crate::config::LONG_HOLD_TTL),
            ],
            sessions: vec![SessionConfig::new("sketch")],
            ..RelayConfig::default()
        }
    }

    fn spawn(config: &RelayConfig) -> Result<(Registry, watch::Sender<bool>), RegistryError> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let registry = Registry::spawn(config, Arc::new(LogNotificationSink), shutdown_rx)?;
        Ok((registry, shutdown_tx))
    }

    #[tokio::test]
    async fn test_lookup_by_id() {
        let (registry, _shutdown) = spawn(&config()).unwrap();
        assert_eq!(
            registry.channel_ids().collect::<Vec<_>>(),
            vec!["oracle", "zener"]
        );
        assert_eq!(registry.session_ids().collect::<Vec<_>>(), vec!["sketch"]);
        assert!(registry.channel("zener").is_some());
        assert!(registry.channel("sketch").is_none());
        assert!(registry.session("sketch").is_some());
        assert!(registry.session("zener").is_none());
    }

    #[tokio::test]
    async fn test_rejects_invalid_config() {
        let mut duplicate = config();
        duplicate
            .channels
            .push(ChannelConfig::new("zener", ["star"]));
        assert_eq!(
            spawn(&duplicate).err(),
            Some(RegistryError::DuplicateChannel("zener".into()))
        );

        let mut empty = config();
        empty
            .channels
            .push(ChannelConfig::new("blank", Vec::<&str>::new()));
        assert_eq!(
            spawn(&empty).err(),
            Some(RegistryError::EmptySymbols("blank".into()))
        );

        let mut zero = config();
        zero.channels[0].ttl = Duration::ZERO;
        assert_eq!(
            spawn(&zero).err(),
            Some(RegistryError::ZeroTtl("zener".into()))
        );

        let mut sessions = config();
        sessions.sessions.push(SessionConfig::new("sketch"));
        assert_eq!(
            spawn(&sessions).err(),
            Some(RegistryError::DuplicateSession("sketch".into()))
        );
    }

    #[tokio::test]
    async fn test_status_reflects_activity() {
        let (registry, _shutdown) = spawn(&config()).unwrap();
        let zener = registry.channel("zener").unwrap();
        let _subscription = zener.subscribe().await.unwrap();
        zener.publish(PublishRequest::new("cross")).await.unwrap();
        let _producer = registry
            .session("sketch")
            .unwrap()
            .connect(Role::Producer)
            .await
            .unwrap();

        let status = registry.status().await;
        assert_eq!(
            status.channels,
            vec![
                ChannelStatus {
                    id: "oracle".into(),
                    subscribers: 0,
                    fresh: false,
                },
                ChannelStatus {
                    id: "zener".into(),
                    subscribers: 1,
                    fresh: true,
                },
            ]
        );
        assert_eq!(
            status.sessions,
            vec![SessionStatus {
                id: "sketch".into(),
                producer_connected: true,
                consumer_connected: false,
            }]
        );
    }

    #[tokio::test]
    async fn test_join_after_shutdown() {
        let (registry, shutdown) = spawn(&config()).unwrap();
        shutdown.send(true).unwrap();
        registry.join().await;

        let status = registry.status().await;
        assert!(status.channels.iter().all(|c| c.subscribers == 0 && !c.fresh));
    }
}
