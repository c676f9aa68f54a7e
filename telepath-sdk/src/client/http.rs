//! HTTP client for channel ingress, polling and status.

use reqwest::Client;
use url::Url;

use super::ClientError;
use crate::objects::{LatestResponse, PublishBody, StatusResponse};

/// Typed HTTP client for the relay's channel and status endpoints.
#[derive(Debug, Clone)]
pub struct RelayClient {
    http: Client,
    base_url: Url,
}

impl RelayClient {
    /// Create a new `RelayClient` rooted at `base_url`.
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    /// `POST /channels/{channel}/events` - publish an event.
    ///
    /// The relay answers with an empty body, so there is nothing to return.
    pub async fn publish(&self, channel: &str, body: &PublishBody) -> Result<(), ClientError> {
        let url = self.channel_url(channel, "events")?;
        let resp = self.http.post(url).json(body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api { status, body });
        }
        Ok(())
    }

    /// `GET /channels/{channel}/latest` - poll the cached event.
    pub async fn latest(&self, channel: &str) -> Result<LatestResponse, ClientError> {
        let url = self.channel_url(channel, "latest")?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }

    /// `GET /status` - relay uptime and per-identifier occupancy.
    pub async fn status(&self) -> Result<StatusResponse, ClientError> {
        let url = self.base_url.join("/status")?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }

    fn channel_url(&self, channel: &str, action: &str) -> Result<Url, ClientError> {
        let path = format!("/channels/{}/{action}", urlencoding::encode(channel));
        Ok(self.base_url.join(&path)?)
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api { status, body });
    }
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(ClientError::Json)
}
