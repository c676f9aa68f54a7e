//! Relay status endpoint.

use axum::{Json, extract::State};
use telepath_sdk::objects::StatusResponse;

use crate::state::AppState;

/// `GET /status` - uptime, per-channel subscribers and freshness, and
/// per-session slot occupancy.
///
/// `notifications_configured` follows the current notification settings,
/// including SIGHUP reloads.
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let status = state.registry.status().await;
    let notifications_configured = state.notification.read().await.is_some();
    Json(StatusResponse {
        uptime_secs: status.uptime.as_secs(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        notifications_configured,
        channels: status.channels,
        sessions: status.sessions,
    })
}
