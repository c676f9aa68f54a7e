//! WebSocket client for paired sessions.

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use super::ClientError;
use crate::objects::{Role, SessionSignal};

/// A frame received on a session connection.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionMessage {
    /// A relay-generated signal.
    Signal(SessionSignal),
    /// A payload relayed from the other role.
    Payload(Value),
}

/// One role's connection to a paired session.
pub struct SessionClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl SessionClient {
    /// Connect to `session` as `role`.
    ///
    /// `base_url` is the relay's HTTP root; `http` maps to `ws` and `https`
    /// to `wss`.
    pub async fn connect(base_url: &Url, session: &str, role: Role) -> Result<Self, ClientError> {
        let mut url = base_url.join(&format!(
            "/sessions/{}/ws",
            urlencoding::encode(session)
        ))?;
        url.query_pairs_mut().append_pair("role", role.as_str());

        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => return Err(ClientError::UnsupportedScheme(other.to_string())),
        };
        url.set_scheme(scheme)
            .map_err(|_| ClientError::UnsupportedScheme(scheme.to_string()))?;

        let (stream, _response) = connect_async(url.as_str()).await?;
        Ok(Self { stream })
    }

    /// Send a payload to the other role.
    pub async fn send(&mut self, payload: &Value) -> Result<(), ClientError> {
        let json = serde_json::to_string(payload)?;
        self.stream.send(Message::Text(json.into())).await?;
        Ok(())
    }

    /// Wait for the next signal or relayed payload.
    ///
    /// Returns `None` once the server closes the connection.
    pub async fn next(&mut self) -> Option<Result<SessionMessage, ClientError>> {
        while let Some(frame) = self.stream.next().await {
            match frame {
                Ok(Message::Text(text)) => return Some(decode(&text)),
                Ok(Message::Close(_)) => return None,
                Ok(_) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
        None
    }

    /// Close the connection with a normal close frame.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.stream.close(None).await?;
        Ok(())
    }
}

fn decode(text: &str) -> Result<SessionMessage, ClientError> {
    let value: Value = serde_json::from_str(text)?;
    let is_signal = value
        .get("type")
        .and_then(Value::as_str)
        .is_some_and(|t| SessionSignal::RESERVED_TYPES.iter().any(|r| *r == t));

    if is_signal {
        if let Ok(signal) = serde_json::from_value::<SessionSignal>(value.clone()) {
            return Ok(SessionMessage::Signal(signal));
        }
    }
    Ok(SessionMessage::Payload(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_signal_and_payload() {
        let signal = decode(r#"{"type":"peer-ready","peer":"producer"}"#).unwrap();
        assert_eq!(
            signal,
            SessionMessage::Signal(SessionSignal::PeerReady {
                peer: Role::Producer
            })
        );

        let payload = decode(r#"{"type":"stroke","x":1}"#).unwrap();
        assert_eq!(payload, SessionMessage::Payload(json!({"type": "stroke", "x": 1})));
    }
}
