//! Notification sink for terminal session messages.
//!
//! When a paired session relays a terminal message, its artifact is handed
//! to a [`NotificationSink`]. Delivery is fire-and-forget: the session
//! never waits for it, failures are logged by the caller, and nothing is
//! retried.

use crate::config::{ConfigStore, NotificationConfig};
use async_trait::async_trait;
use compact_str::CompactString;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Opaque encoded blob carried by a terminal message.
///
/// Usually a data URL such as `data:image/png;base64,iVBOR...`, but the
/// relay makes no assumption about the encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact(String);

impl Artifact {
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split a base64 data URL into its media type and data.
    ///
    /// Anything that is not a base64 data URL is returned whole with no
    /// media type.
    pub fn media_type_and_data(&self) -> (Option<&str>, &str) {
        self.0
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(','))
            .and_then(|(header, data)| {
                header
                    .strip_suffix(";base64")
                    .map(|media| (Some(media).filter(|m| !m.is_empty()), data))
            })
            .unwrap_or((None, self.0.as_str()))
    }

    /// Size of the encoded artifact in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One notification request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Session the terminal message was relayed on.
    pub session: CompactString,
    pub artifact: Artifact,
}

/// Errors that can occur while delivering a notification.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// No notification endpoint is configured.
    #[error("notification sink is not configured")]
    NotConfigured,

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The endpoint answered with a non-2xx status
    #[error("notification delivery failed with status {status}: {body}")]
    DeliveryFailed { status: u16, body: String },

    /// Payload serialization error
    #[error("payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Destination for terminal-message artifacts.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), NotificationError>;
}

/// Sink that only records the notification in the log.
///
/// Used when no push endpoint is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        info!(
            session = %notification.session,
            artifact_bytes = notification.artifact.len(),
            "Terminal message received (no notification endpoint configured)"
        );
        Ok(())
    }
}

/// Request body sent to the push-messaging endpoint.
#[derive(Debug, Serialize)]
struct PushMessage<'a> {
    token: &'a str,
    user: &'a str,
    title: &'a str,
    message: String,
    attachment_base64: &'a str,
    attachment_type: &'a str,
}

/// Sink that POSTs the artifact to an external push-messaging API.
///
/// Credentials are read from a [`ConfigStore`] on every call, so a config
/// reload takes effect for the next notification.
pub struct HttpNotificationSink {
    config: ConfigStore<Option<NotificationConfig>>,
    http_client: reqwest::Client,
}

impl HttpNotificationSink {
    pub fn new(config: ConfigStore<Option<NotificationConfig>>) -> Self {
        Self {
            config,
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }
}

#[async_trait]
impl NotificationSink for HttpNotificationSink {
    async fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        let Some(config) = self.config.snapshot().await else {
            return Err(NotificationError::NotConfigured);
        };

        let (media_type, data) = notification.artifact.media_type_and_data();
        let message = PushMessage {
            token: &config.token,
            user: &config.user,
            title: &config.title,
            message: format!("New artifact from session {}", notification.session),
            attachment_base64: data,
            attachment_type: media_type.unwrap_or("application/octet-stream"),
        };
        let body = serde_json::to_string(&message)?;

        let response = self
            .http_client
            .post(config.endpoint.clone())
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            info!(session = %notification.session, "Notification delivered");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(NotificationError::DeliveryFailed {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[test]
    fn test_data_url_is_split() {
        let artifact = Artifact::new("data:image/png;base64,iVBORw0KGgo=");
        assert_eq!(
            artifact.media_type_and_data(),
            (Some("image/png"), "iVBORw0KGgo=")
        );
    }

    #[test]
    fn test_plain_artifact_is_passed_whole() {
        let artifact = Artifact::new("iVBORw0KGgo=");
        assert_eq!(artifact.media_type_and_data(), (None, "iVBORw0KGgo="));

        let not_base64 = Artifact::new("data:text/plain,hello");
        assert_eq!(
            not_base64.media_type_and_data(),
            (None, "data:text/plain,hello")
        );
    }

    /// Loopback push endpoint that records request bodies and answers
    /// with `status`.
    async fn push_endpoint(
        status: axum::http::StatusCode,
    ) -> (Url, tokio::sync::mpsc::UnboundedReceiver<serde_json::Value>) {
        use axum::{Json, Router, extract::State, routing::post};

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let router = Router::new()
            .route(
                "/push",
                post(
                    move |State(tx): State<tokio::sync::mpsc::UnboundedSender<serde_json::Value>>,
                          Json(body): Json<serde_json::Value>| async move {
                        let _ = tx.send(body);
                        (status, "endpoint reply")
                    },
                ),
            )
            .with_state(tx);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        (Url::parse(&format!("http://{addr}/push")).unwrap(), rx)
    }

    fn http_sink(endpoint: Url) -> HttpNotificationSink {
        HttpNotificationSink::new(ConfigStore::new(Some(NotificationConfig {
            endpoint,
            token: "app-token".to_string(),
            user: "user-key".to_string(),
            title: "Telepath".to_string(),
        })))
    }

    #[tokio::test]
    async fn test_http_sink_posts_split_attachment() {
        let (endpoint, mut bodies) = push_endpoint(axum::http::StatusCode::OK).await;
        let sink = http_sink(endpoint);

        sink.notify(Notification {
            session: "sketch".into(),
            artifact: Artifact::new("data:image/png;base64,iVBORw0KGgo="),
        })
        .await
        .unwrap();

        let body = bodies.recv().await.unwrap();
        assert_eq!(body["token"], "app-token");
        assert_eq!(body["user"], "user-key");
        assert_eq!(body["title"], "Telepath");
        assert_eq!(body["attachment_base64"], "iVBORw0KGgo=");
        assert_eq!(body["attachment_type"], "image/png");
        assert!(body["message"].as_str().unwrap().contains("sketch"));
    }

    #[tokio::test]
    async fn test_http_sink_defaults_attachment_type() {
        let (endpoint, mut bodies) = push_endpoint(axum::http::StatusCode::OK).await;
        http_sink(endpoint)
            .notify(Notification {
                session: "sketch".into(),
                artifact: Artifact::new("AAAA"),
            })
            .await
            .unwrap();

        let body = bodies.recv().await.unwrap();
        assert_eq!(body["attachment_base64"], "AAAA");
        assert_eq!(body["attachment_type"], "application/octet-stream");
    }

    #[tokio::test]
    async fn test_http_sink_reports_error_status() {
        let (endpoint, _bodies) =
            push_endpoint(axum::http::StatusCode::INTERNAL_SERVER_ERROR).await;
        let result = http_sink(endpoint)
            .notify(Notification {
                session: "sketch".into(),
                artifact: Artifact::new("AAAA"),
            })
            .await;

        match result {
            Err(NotificationError::DeliveryFailed { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "endpoint reply");
            }
            other => panic!("expected DeliveryFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_http_sink_requires_config() {
        let sink = HttpNotificationSink::new(ConfigStore::new(None));
        let result = sink
            .notify(Notification {
                session: "sketch".into(),
                artifact: Artifact::new("x"),
            })
            .await;
        assert!(matches!(result, Err(NotificationError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_log_sink_succeeds() {
        let result = LogNotificationSink
            .notify(Notification {
                session: "sketch".into(),
                artifact: Artifact::new("x"),
            })
            .await;
        assert!(result.is_ok());
    }
}
