//! Liveness objects.

use serde::{Deserialize, Serialize};

/// `GET /health` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// `GET /status` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Seconds since the relay started.
    pub uptime_secs: u64,
    pub version: String,
    /// Whether a push endpoint receives terminal artifacts.
    pub notifications_configured: bool,
    pub channels: Vec<ChannelStatus>,
    pub sessions: Vec<SessionStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStatus {
    pub id: String,
    /// Current subscriber count.
    pub subscribers: usize,
    /// Whether the cached event is still within the TTL.
    pub fresh: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub id: String,
    pub producer_connected: bool,
    pub consumer_connected: bool,
}
