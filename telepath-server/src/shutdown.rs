//! Signal handling for graceful shutdown and config reload.

use crate::config::{ConfigLoader, LoadedConfig};
use std::sync::Arc;
use telepath_core::config::{ConfigStore, NotificationConfig};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::{Notify, watch};

/// Creates a future that completes when a shutdown signal is received.
///
/// Listens for SIGTERM and SIGINT (Ctrl+C).
pub async fn shutdown_signal() {
    let (mut sigterm, mut sigint) =
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!(error = %e, "Failed to install signal handlers, waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT, initiating graceful shutdown");
        }
    }
}

/// Wait for a shutdown signal, then tell every relay actor to stop.
///
/// Actors closing their queues is what ends open SSE and WebSocket
/// streams, so graceful shutdown of the HTTP server can complete.
pub async fn shutdown_relay(shutdown_tx: watch::Sender<bool>) {
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);
}

/// Spawns a task that listens for SIGHUP and reloads the configuration.
///
/// Only the notification settings are applied live. Changes to the
/// listen address or to the channel and session sets are reported as
/// needing a restart.
///
/// Returns a Notify that can be used to signal when shutdown is complete.
pub fn spawn_config_reload_handler(
    config_loader: Arc<ConfigLoader>,
    notification_store: ConfigStore<Option<NotificationConfig>>,
    running: LoadedConfig,
) -> Arc<Notify> {
    let shutdown_notify = Arc::new(Notify::new());
    let shutdown_notify_clone = shutdown_notify.clone();

    tokio::spawn(async move {
        let mut sighup = match signal(SignalKind::hangup()) {
            Ok(sighup) => sighup,
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGHUP handler, config reload disabled");
                return;
            }
        };

        loop {
            tokio::select! {
                _ = sighup.recv() => {
                    tracing::info!("Received SIGHUP, reloading configuration");
                    match config_loader.reload() {
                        Ok(loaded_config) => {
                            apply_reload(&notification_store, &running, loaded_config).await;
                        }
                        Err(e) => {
                            tracing::error!("Failed to reload configuration: {}", e);
                        }
                    }
                }
                _ = shutdown_notify_clone.notified() => {
                    tracing::debug!("Config reload handler shutting down");
                    break;
                }
            }
        }
    });

    shutdown_notify
}

async fn apply_reload(
    notification_store: &ConfigStore<Option<NotificationConfig>>,
    running: &LoadedConfig,
    loaded_config: LoadedConfig,
) {
    if loaded_config.server != running.server {
        tracing::warn!("Listen address changed; restart to apply");
    }
    if loaded_config.relay != running.relay {
        tracing::warn!("Channel or session configuration changed; restart to apply");
    }
    if running.notification.is_none() && loaded_config.notification.is_some() {
        tracing::warn!("Notification endpoint added; restart to enable it");
    }

    notification_store.update(loaded_config.notification).await;
    tracing::info!(
        version = notification_store.version(),
        "Configuration reloaded successfully"
    );
}
