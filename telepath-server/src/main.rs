//! Telepath Server
//!
//! A real-time event relay: broadcast channels with a short-lived cache
//! and paired producer/consumer sessions.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::ConfigLoader;
use server::{build_router, run_server};
use shutdown::{shutdown_relay, spawn_config_reload_handler};
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use telepath_core::Registry;
use telepath_core::config::ConfigStore;
use telepath_core::notification::{HttpNotificationSink, LogNotificationSink, NotificationSink};
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Telepath - real-time event relay
#[derive(Parser, Debug)]
#[command(name = "telepath-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./telepath-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Token for the notification endpoint, overriding the config file
    #[arg(long, env = "TELEPATH_NOTIFY_TOKEN", hide_env_values = true)]
    notify_token: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    tracing::info!("Starting telepath-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = Arc::new(ConfigLoader::new(
        &args.config,
        args.listen,
        args.notify_token,
    ));
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;

    let listen_addr = loaded_config.server.listen;
    tracing::info!("Configuration loaded from {:?}", args.config);

    // Notification settings are the only part that follows SIGHUP reloads
    let notification_store = ConfigStore::new(loaded_config.notification.clone());
    let sink: Arc<dyn NotificationSink> = if loaded_config.notification.is_some() {
        Arc::new(HttpNotificationSink::new(notification_store.clone()))
    } else {
        tracing::info!("No notification endpoint configured, terminal artifacts are only logged");
        Arc::new(LogNotificationSink)
    };

    // Spawn every channel and session actor
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let registry = Arc::new(
        Registry::spawn(&loaded_config.relay, sink, shutdown_rx).map_err(|e| {
            tracing::error!("Invalid relay configuration: {}", e);
            e
        })?,
    );

    // Create application state
    let state = AppState::new(Arc::clone(&registry), notification_store.clone());

    // Spawn config reload handler (listens for SIGHUP)
    let reload_notify =
        spawn_config_reload_handler(config_loader, notification_store, loaded_config);

    // Build the router
    let router = build_router(state);

    // Run the server
    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr, shutdown_relay(shutdown_tx)).await;

    // Signal the config reload handler to stop
    reload_notify.notify_one();

    // Wait for the relay actors to wind down
    tracing::info!("Stopping relay actors...");
    registry.join().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
