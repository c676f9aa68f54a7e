//! Broadcast channel endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event as SseEvent, Sse},
    },
    routing::{get, post},
};
use futures_util::{Stream, StreamExt};
use kanau::processor::Processor;
use std::collections::HashMap;
use std::convert::Infallible;
use telepath_core::channel::{ChannelError, ChannelHandle, PeekLatest, PublishError};
use telepath_core::events::{ChannelFrame, PublishRequest};
use telepath_sdk::objects::{ErrorTag, LatestResponse, PublishBody};

use super::error_response;
use crate::state::AppState;

/// SSE event name carrying an [`EventPayload`](telepath_sdk::objects::EventPayload).
pub const SSE_EVENT_NAME: &str = "event";

/// Build the channel API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/channels/{channel_id}/events", post(publish_event))
        .route("/channels/{channel_id}/publish", get(publish_event_query))
        .route("/channels/{channel_id}/stream", get(stream_events))
        .route("/channels/{channel_id}/latest", get(get_latest))
}

/// `POST /channels/{channel_id}/events` - publish from a JSON body.
///
/// A body that is not a JSON object carries no kind, so it is rejected
/// as an invalid symbol.
async fn publish_event(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    body: Result<Json<PublishBody>, JsonRejection>,
) -> Result<StatusCode, ChannelApiError> {
    let channel = lookup(&state, &channel_id)?;
    let Json(body) = body.map_err(|e| {
        tracing::debug!(channel = %channel_id, error = %e, "Unreadable publish body");
        ChannelApiError::InvalidSymbol
    })?;
    publish(channel, body).await
}

/// `GET /channels/{channel_id}/publish?kind=..` - publish for GET-only clients.
async fn publish_event_query(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<StatusCode, ChannelApiError> {
    let channel = lookup(&state, &channel_id)?;
    publish(channel, PublishBody::from_query(params)).await
}

async fn publish(channel: &ChannelHandle, body: PublishBody) -> Result<StatusCode, ChannelApiError> {
    channel.process(PublishRequest::from(body)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /channels/{channel_id}/stream` - Server-Sent Events subscription.
///
/// Events are sent as SSE events named `event`; heartbeats as `: heartbeat`
/// comment lines. The stream ends when the channel shuts down.
async fn stream_events(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ChannelApiError> {
    let channel = lookup(&state, &channel_id)?;
    let subscription = channel.subscribe().await?;
    tracing::debug!(channel = %channel_id, subscription = %subscription.id(), "SSE subscriber connected");

    let stream = subscription.map(|frame| {
        Ok(match frame {
            ChannelFrame::Event(json) => SseEvent::default().event(SSE_EVENT_NAME).data(&*json),
            ChannelFrame::Heartbeat => SseEvent::default().comment("heartbeat"),
        })
    });
    Ok(Sse::new(stream))
}

/// `GET /channels/{channel_id}/latest` - the cached event while it is fresh.
async fn get_latest(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
) -> Result<Json<LatestResponse>, ChannelApiError> {
    let channel = lookup(&state, &channel_id)?;
    let latest = match channel.process(PeekLatest).await? {
        Some(event) => LatestResponse::Fresh { event },
        None => LatestResponse::None,
    };
    Ok(Json(latest))
}

fn lookup<'a>(state: &'a AppState, channel_id: &str) -> Result<&'a ChannelHandle, ChannelApiError> {
    state
        .registry
        .channel(channel_id)
        .ok_or(ChannelApiError::UnknownChannel)
}

// ---------------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------------

/// Errors that can occur in channel API handlers.
#[derive(Debug)]
pub(crate) enum ChannelApiError {
    /// No channel with this identifier is configured.
    UnknownChannel,
    /// The kind is absent or outside the channel's symbol set.
    InvalidSymbol,
    /// The channel actor has stopped.
    Unavailable,
}

impl From<ChannelError> for ChannelApiError {
    fn from(e: ChannelError) -> Self {
        match e {
            ChannelError::Publish(PublishError::InvalidSymbol(_)) => Self::InvalidSymbol,
            ChannelError::Closed => Self::Unavailable,
        }
    }
}

impl IntoResponse for ChannelApiError {
    fn into_response(self) -> Response {
        match self {
            ChannelApiError::UnknownChannel => {
                error_response(StatusCode::NOT_FOUND, ErrorTag::UnknownChannel)
            }
            ChannelApiError::InvalidSymbol => {
                error_response(StatusCode::BAD_REQUEST, ErrorTag::InvalidSymbol)
            }
            ChannelApiError::Unavailable => {
                error_response(StatusCode::SERVICE_UNAVAILABLE, ErrorTag::Unavailable)
            }
        }
    }
}
