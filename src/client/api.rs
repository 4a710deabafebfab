//! Viewer HTTP client for the camwatch API.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::alerts::AlertSnapshotSource;
use super::error::ClientError;
use super::peer::SignalingClient;
use crate::models::{Alert, IceCandidate, SessionDescription};

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Bearer-authenticated client for the signaling and alert endpoints.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, req: reqwest::RequestBuilder, token: Option<&str>) -> reqwest::RequestBuilder {
        match token.or(self.token.as_deref()) {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

/// Turn a non-success response into `ClientError::Status` carrying the server's message.
async fn check(res: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let text = res.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("request failed").to_string());
    Err(ClientError::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl SignalingClient for ApiClient {
    async fn exchange_offer(
        &self,
        camera_id: &str,
        offer: &SessionDescription,
    ) -> Result<SessionDescription, ClientError> {
        let req = self
            .client
            .post(self.url(&format!("/cameras/{}/webrtc/offer", camera_id)))
            .json(offer);
        let res = check(self.authorize(req, None).send().await?).await?;
        debug!(camera_id, "received answer");
        Ok(res.json().await?)
    }

    async fn send_ice_candidate(&self, camera_id: &str, candidate: &IceCandidate) -> Result<(), ClientError> {
        let req = self
            .client
            .post(self.url(&format!("/cameras/{}/webrtc/ice", camera_id)))
            .json(candidate);
        check(self.authorize(req, None).send().await?).await?;
        Ok(())
    }
}

#[async_trait]
impl AlertSnapshotSource for ApiClient {
    async fn recent_alerts(&self, token: &str, camera_id: &str) -> Result<Vec<Alert>, ClientError> {
        let req = self
            .client
            .get(self.url("/alerts/recent"))
            .query(&[("cameraId", camera_id)]);
        let res = check(self.authorize(req, Some(token)).send().await?).await?;
        Ok(res.json().await?)
    }
}
