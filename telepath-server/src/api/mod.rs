//! HTTP API handlers.
//!
//! # Endpoints
//!
//! - `POST /channels/{channel_id}/events`  – publish an event (JSON body)
//! - `GET  /channels/{channel_id}/publish` – publish an event (query parameters)
//! - `GET  /channels/{channel_id}/stream`  – Server-Sent Events subscription
//! - `GET  /channels/{channel_id}/latest`  – poll the cached event
//! - `GET  /sessions/{session_id}/ws`      – paired session WebSocket
//! - `GET  /status`                        – relay status

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use telepath_sdk::objects::{ErrorBody, ErrorTag};

pub mod channels;
pub mod sessions;
pub mod status;

fn error_response(status: StatusCode, tag: ErrorTag) -> Response {
    (status, Json(ErrorBody::from(tag))).into_response()
}
