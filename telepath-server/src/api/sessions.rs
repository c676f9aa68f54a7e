//! Paired session WebSocket endpoint.

use axum::{
    Router,
    body::Bytes,
    extract::{
        Path, Query, State,
        rejection::QueryRejection,
        ws::{
            CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade,
            rejection::WebSocketUpgradeRejection,
        },
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use telepath_core::events::SessionFrame;
use telepath_core::session::{SessionHandle, SessionLink};
use telepath_sdk::objects::{ErrorTag, Role, WsCloseCode};

use super::error_response;
use crate::state::AppState;

/// Build the session API router.
pub fn router() -> Router<AppState> {
    Router::new().route("/sessions/{session_id}/ws", get(session_ws))
}

#[derive(Debug, Deserialize)]
struct RoleQuery {
    role: Role,
}

/// `GET /sessions/{session_id}/ws?role=producer|consumer`
///
/// Upgrades to a WebSocket holding one role of the session. Text frames
/// from the client are relayed to the other role. The server sends
/// session signals, relayed messages, and a ping every heartbeat
/// interval. A connection superseded by a newer one in the same role is
/// closed with [`WsCloseCode::SUPERSEDED`].
async fn session_ws(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    query: Result<Query<RoleQuery>, QueryRejection>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, SessionApiError> {
    let session = state
        .registry
        .session(&session_id)
        .cloned()
        .ok_or(SessionApiError::UnknownSession)?;
    let Query(RoleQuery { role }) = query.map_err(|_| SessionApiError::InvalidRole)?;
    let ws = ws.map_err(SessionApiError::NotUpgradable)?;

    Ok(ws.on_upgrade(move |socket| handle_session_ws(socket, session, role)))
}

/// Drives one WebSocket connection for its whole life.
async fn handle_session_ws(mut socket: WebSocket, session: SessionHandle, role: Role) {
    let mut link = match session.connect(role).await {
        Ok(link) => link,
        Err(e) => {
            tracing::warn!(session = %session.id(), %role, error = %e, "WS: session unavailable");
            close(&mut socket, WsCloseCode::GOING_AWAY, "session unavailable").await;
            return;
        }
    };

    loop {
        tokio::select! {
            frame = link.recv() => {
                match frame {
                    Some(SessionFrame::Superseded) => {
                        tracing::debug!(session = %session.id(), %role, "WS: connection superseded");
                        close(&mut socket, WsCloseCode::SUPERSEDED, "superseded").await;
                        return;
                    }
                    Some(frame) => {
                        if send_frame(&mut socket, frame).await.is_err() {
                            break;
                        }
                    }
                    None => {
                        close(&mut socket, WsCloseCode::GOING_AWAY, "connection released").await;
                        break;
                    }
                }
            }

            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if relay(&link, text).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        tracing::debug!(session = %session.id(), %role, "WS: ignoring binary frame");
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Ok(_)) => {
                    }
                    Some(Err(e)) => {
                        tracing::debug!(session = %session.id(), %role, error = %e, "WS: receive failed");
                        break;
                    }
                }
            }
        }
    }
}

async fn relay(link: &SessionLink, text: Utf8Bytes) -> Result<(), ()> {
    link.relay(text.as_str()).await.map_err(|_| ())
}

/// Write one outbound frame. Returns `Err(())` if the client is gone.
async fn send_frame(socket: &mut WebSocket, frame: SessionFrame) -> Result<(), ()> {
    let message = match frame {
        SessionFrame::Signal(signal) => {
            let json = serde_json::to_string(&signal).map_err(|_| ())?;
            Message::Text(json.into())
        }
        SessionFrame::Relay(text) => Message::Text(Utf8Bytes::from(&*text)),
        SessionFrame::Heartbeat => Message::Ping(Bytes::new()),
        SessionFrame::Superseded => return Err(()),
    };
    socket.send(message).await.map_err(|_| ())
}

async fn close(socket: &mut WebSocket, code: u16, reason: &'static str) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await;
}

// ---------------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------------

/// Errors returned before the WebSocket upgrade.
#[derive(Debug)]
pub(crate) enum SessionApiError {
    /// No session with this identifier is configured.
    UnknownSession,
    /// `role` is missing or is neither `producer` nor `consumer`.
    InvalidRole,
    /// The request is not a valid WebSocket upgrade.
    NotUpgradable(WebSocketUpgradeRejection),
}

impl IntoResponse for SessionApiError {
    fn into_response(self) -> Response {
        match self {
            SessionApiError::UnknownSession => {
                error_response(StatusCode::NOT_FOUND, ErrorTag::UnknownSession)
            }
            SessionApiError::InvalidRole => {
                error_response(StatusCode::BAD_REQUEST, ErrorTag::InvalidRole)
            }
            SessionApiError::NotUpgradable(rejection) => rejection.into_response(),
        }
    }
}
