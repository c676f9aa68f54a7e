//! Clients for the Telepath relay.
//!
//! Gated behind the `client` cargo feature so downstream crates that only
//! need the shared types do not pull in `reqwest` or `tokio-tungstenite`.

mod http;
mod session;

pub use http::RelayClient;
pub use session::{SessionClient, SessionMessage};

use reqwest::StatusCode;

/// Errors produced by the SDK clients.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure (DNS, TLS, connection reset, …).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// WebSocket handshake or framing failure.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The server returned a non-2xx status code.
    #[error("api error: status {status}, body: {body}")]
    Api { status: StatusCode, body: String },

    /// Response body could not be deserialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The base URL could not be joined with the endpoint path.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// The base URL scheme has no WebSocket counterpart.
    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),
}
