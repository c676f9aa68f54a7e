//! Axum server setup and router configuration.

use crate::api;
use crate::state::AppState;
use axum::{Json, Router, response::IntoResponse, routing::get};
use std::future::Future;
use std::net::SocketAddr;
use telepath_sdk::objects::HealthResponse;
use tokio::net::TcpListener;

/// Build the main application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        .route("/status", get(api::status::get_status))
        .merge(api::channels::router())
        .merge(api::sessions::router())
        // Add state to all routes
        .with_state(state)
}

/// Simple health check - returns OK if the server is running.
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Run the server with graceful shutdown support.
///
/// `shutdown` must also stop the relay actors, otherwise open streams
/// keep graceful shutdown waiting.
pub async fn run_server(
    router: Router,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::time::Duration;
    use telepath_core::Registry;
    use telepath_core::config::{
        CatchUp, ChannelConfig, ConfigStore, NotificationConfig, RelayConfig, SessionConfig,
    };
    use telepath_core::notification::LogNotificationSink;
    use telepath_sdk::client::{RelayClient, SessionClient, SessionMessage};
    use telepath_sdk::objects::{
        EventPayload, LatestResponse, PublishBody, Role, SessionSignal, StatusResponse,
    };
    use tokio::sync::watch;
    use tower::ServiceExt;
    use url::Url;

    fn test_router() -> (Router, watch::Sender<bool>) {
        let config = RelayConfig {
            channels: vec![
                ChannelConfig::new("zener", ["circle", "cross", "waves", "square", "star"]),
                ChannelConfig::new("calendar", ["birthday"])
                    .with_ttl(Duration::from_secs(600))
                    .with_catch_up(CatchUp::Silent)
                    .with_extra_fields(["day", "month"]),
            ],
            sessions: vec![SessionConfig::new("sketch")],
            ..RelayConfig::default()
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let registry = Registry::spawn(&config, Arc::new(LogNotificationSink), shutdown_rx).unwrap();
        let state = AppState::new(Arc::new(registry), ConfigStore::new(None));
        (build_router(state), shutdown_tx)
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let (router, _shutdown) = test_router();
        let (status, body) = send(&router, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        let health: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(health["status"], "healthy");
    }

    #[tokio::test]
    async fn test_publish_then_latest() {
        let (router, _shutdown) = test_router();
        let (status, body) = send(
            &router,
            post_json("/channels/zener/events", json!({"kind": "circle", "magnitude": 3})),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_empty());

        let (status, body) = send(&router, get("/channels/zener/latest")).await;
        assert_eq!(status, StatusCode::OK);
        let latest: LatestResponse = serde_json::from_slice(&body).unwrap();
        let event: EventPayload = latest.into_event().unwrap();
        assert_eq!(event.kind, "circle");
        assert_eq!(event.magnitude, 3.0);
        assert_eq!(event.channel, "zener");
    }

    #[tokio::test]
    async fn test_publish_via_query_carries_extra_fields() {
        let (router, _shutdown) = test_router();
        let (status, _) = send(
            &router,
            get("/channels/calendar/publish?kind=birthday&day=14&month=10&colour=red"),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, body) = send(&router, get("/channels/calendar/latest")).await;
        let event = serde_json::from_slice::<LatestResponse>(&body)
            .unwrap()
            .into_event()
            .unwrap();
        assert_eq!(event.extra.get("day"), Some(&json!("14")));
        assert_eq!(event.extra.get("month"), Some(&json!("10")));
        assert!(!event.extra.contains_key("colour"));
        assert_eq!(event.magnitude, 0.0);
    }

    #[tokio::test]
    async fn test_invalid_symbol_is_rejected() {
        let (router, _shutdown) = test_router();
        let (status, body) = send(
            &router,
            post_json("/channels/zener/events", json!({"kind": "triangle"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            serde_json::from_slice::<Value>(&body).unwrap(),
            json!({"error": "invalid_symbol"})
        );

        let request = Request::post("/channels/zener/events")
            .header("content-type", "application/json")
            .body(Body::from("not json"))
            .unwrap();
        let (status, _) = send(&router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = send(&router, get("/channels/zener/latest")).await;
        assert_eq!(
            serde_json::from_slice::<Value>(&body).unwrap(),
            json!({"status": "none"})
        );
    }

    #[tokio::test]
    async fn test_unknown_identifiers_are_not_found() {
        let (router, _shutdown) = test_router();
        let (status, body) = send(
            &router,
            post_json("/channels/tarot/events", json!({"kind": "circle"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            serde_json::from_slice::<Value>(&body).unwrap(),
            json!({"error": "unknown_channel"})
        );

        let (status, _) = send(&router, get("/channels/sketch/stream")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&router, get("/sessions/zener/ws?role=producer")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            serde_json::from_slice::<Value>(&body).unwrap(),
            json!({"error": "unknown_session"})
        );
    }

    #[tokio::test]
    async fn test_session_requires_valid_role() {
        let (router, _shutdown) = test_router();
        let (status, body) = send(&router, get("/sessions/sketch/ws?role=viewer")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            serde_json::from_slice::<Value>(&body).unwrap(),
            json!({"error": "invalid_role"})
        );
    }

    #[tokio::test]
    async fn test_stream_is_event_stream() {
        let (router, _shutdown) = test_router();
        let response = router.oneshot(get("/channels/zener/stream")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"].to_str().unwrap(),
            "text/event-stream"
        );
    }

    #[tokio::test]
    async fn test_status_lists_channels_and_sessions() {
        let (router, _shutdown) = test_router();
        send(
            &router,
            post_json("/channels/zener/events", json!({"kind": "star"})),
        )
        .await;

        let (status, body) = send(&router, get("/status")).await;
        assert_eq!(status, StatusCode::OK);
        let status: StatusResponse = serde_json::from_slice(&body).unwrap();
        let ids: Vec<_> = status.channels.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["calendar", "zener"]);
        assert!(status.channels[1].fresh);
        assert!(!status.channels[0].fresh);
        assert_eq!(status.sessions.len(), 1);
        assert!(!status.sessions[0].producer_connected);
        assert!(!status.notifications_configured);
    }

    #[tokio::test]
    async fn test_status_follows_notification_reload() {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let registry =
            Registry::spawn(&RelayConfig::default(), Arc::new(LogNotificationSink), shutdown_rx)
                .unwrap();
        let notification = ConfigStore::new(None);
        let router = build_router(AppState::new(Arc::new(registry), notification.clone()));

        notification
            .update(Some(NotificationConfig {
                endpoint: Url::parse("http://127.0.0.1:9/push").unwrap(),
                token: "token".to_string(),
                user: "user".to_string(),
                title: "Telepath".to_string(),
            }))
            .await;

        let (_, body) = send(&router, get("/status")).await;
        let status: StatusResponse = serde_json::from_slice(&body).unwrap();
        assert!(status.notifications_configured);
        drop(shutdown_tx);
    }

    async fn spawn_server() -> (Url, watch::Sender<bool>) {
        let (router, shutdown) = test_router();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        (Url::parse(&format!("http://{addr}")).unwrap(), shutdown)
    }

    async fn next_signal(client: &mut SessionClient) -> SessionSignal {
        match client.next().await {
            Some(Ok(SessionMessage::Signal(signal))) => signal,
            other => panic!("expected a signal, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_relay_client_round_trip() {
        let (base, _shutdown) = spawn_server().await;
        let client = RelayClient::new(base);

        client
            .publish("zener", &PublishBody::new("waves").with_magnitude(0.5))
            .await
            .unwrap();
        let event = client.latest("zener").await.unwrap().into_event().unwrap();
        assert_eq!(event.kind, "waves");
        assert_eq!(event.magnitude, 0.5);

        assert!(client.publish("zener", &PublishBody::new("moon")).await.is_err());

        let status = client.status().await.unwrap();
        assert_eq!(status.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_session_over_websocket() {
        let (base, _shutdown) = spawn_server().await;

        let mut producer = SessionClient::connect(&base, "sketch", Role::Producer)
            .await
            .unwrap();
        assert_eq!(
            next_signal(&mut producer).await,
            SessionSignal::Ready {
                role: Role::Producer
            }
        );

        let mut consumer = SessionClient::connect(&base, "sketch", Role::Consumer)
            .await
            .unwrap();
        assert_eq!(
            next_signal(&mut producer).await,
            SessionSignal::PeerReady {
                peer: Role::Consumer
            }
        );
        assert_eq!(
            next_signal(&mut consumer).await,
            SessionSignal::Ready {
                role: Role::Consumer
            }
        );
        assert_eq!(
            next_signal(&mut consumer).await,
            SessionSignal::PeerReady {
                peer: Role::Producer
            }
        );

        let stroke = json!({"type": "stroke", "points": [[0, 0], [3, 4]]});
        producer.send(&stroke).await.unwrap();
        assert_eq!(
            consumer.next().await.unwrap().unwrap(),
            SessionMessage::Payload(stroke)
        );

        // A second producer takes over; the first one is closed.
        let mut replacement = SessionClient::connect(&base, "sketch", Role::Producer)
            .await
            .unwrap();
        assert!(producer.next().await.is_none());
        assert_eq!(
            next_signal(&mut replacement).await,
            SessionSignal::Ready {
                role: Role::Producer
            }
        );
        assert_eq!(
            next_signal(&mut consumer).await,
            SessionSignal::PeerReady {
                peer: Role::Producer
            }
        );

        replacement.close().await.unwrap();
        assert_eq!(
            next_signal(&mut consumer).await,
            SessionSignal::PeerDisconnected {
                peer: Role::Producer
            }
        );
    }
}
