//! HTTP client for the media server that terminates viewer peer connections.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use super::MediaGateway;
use crate::error::{AppError, AppResult};
use crate::models::{CameraRecord, IceCandidate, SdpType, SessionDescription};

/// Talks to `POST {base}/streams/{camera_id}/offer` and `.../ice`.
#[derive(Clone)]
pub struct HttpMediaGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMediaGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("media client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn stream_url(&self, camera_id: &str, action: &str) -> String {
        format!("{}/streams/{}/{}", self.base_url, camera_id, action)
    }
}

fn unreachable(camera_id: &str, e: reqwest::Error) -> AppError {
    AppError::UpstreamUnavailable(format!("media source for camera {} unreachable: {}", camera_id, e))
}

#[async_trait]
impl MediaGateway for HttpMediaGateway {
    async fn exchange_offer(
        &self,
        camera: &CameraRecord,
        offer: &SessionDescription,
    ) -> AppResult<SessionDescription> {
        let url = self.stream_url(&camera.id, "offer");
        let res = self
            .client
            .post(&url)
            .json(offer)
            .send()
            .await
            .map_err(|e| unreachable(&camera.id, e))?;

        let status = res.status();
        debug!(camera_id = %camera.id, status = %status, "media source answered offer");
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY {
            let body = res.text().await.unwrap_or_default();
            return Err(AppError::BadPayload(format!("offer rejected by media source: {}", body)));
        }
        if !status.is_success() {
            return Err(AppError::UpstreamUnavailable(format!(
                "media source returned {}",
                status
            )));
        }

        let answer: SessionDescription = res
            .json()
            .await
            .map_err(|e| unreachable(&camera.id, e))?;
        if answer.sdp_type != SdpType::Answer || answer.sdp.is_empty() {
            return Err(AppError::UpstreamUnavailable(
                "media source returned an invalid answer".to_string(),
            ));
        }
        Ok(answer)
    }

    async fn add_ice_candidate(&self, camera: &CameraRecord, candidate: &IceCandidate) -> AppResult<()> {
        let url = self.stream_url(&camera.id, "ice");
        let res = self
            .client
            .post(&url)
            .json(candidate)
            .send()
            .await
            .map_err(|e| unreachable(&camera.id, e))?;
        if !res.status().is_success() {
            return Err(AppError::UpstreamUnavailable(format!(
                "media source returned {}",
                res.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::StatusCode as HttpStatus;
    use axum::response::{IntoResponse, Response};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    fn camera(id: &str) -> CameraRecord {
        CameraRecord {
            id: id.into(),
            name: "Door".into(),
            location: "Front".into(),
            is_streaming: true,
        }
    }

    fn candidate() -> IceCandidate {
        IceCandidate {
            candidate: "candidate:1 1 udp 1 10.0.0.2 5000 typ host".into(),
            sdp_mid: Some("0".into()),
            sdp_mline_index: Some(0),
            username_fragment: None,
        }
    }

    /// Media source whose behaviour is picked by the camera id in the path.
    async fn media_offer(Path(id): Path<String>, Json(offer): Json<SessionDescription>) -> Response {
        match id.as_str() {
            "ok" => Json(SessionDescription::answer(format!("answer-to:{}", offer.sdp))).into_response(),
            "bad" => (HttpStatus::BAD_REQUEST, "malformed sdp").into_response(),
            "unprocessable" => (HttpStatus::UNPROCESSABLE_ENTITY, "no video track").into_response(),
            "busy" => HttpStatus::SERVICE_UNAVAILABLE.into_response(),
            "echo" => Json(json!({ "type": "offer", "sdp": offer.sdp })).into_response(),
            "blank" => Json(json!({ "type": "answer", "sdp": "" })).into_response(),
            _ => (HttpStatus::OK, "not json").into_response(),
        }
    }

    async fn media_ice(Path(id): Path<String>, Json(_): Json<IceCandidate>) -> HttpStatus {
        if id == "ok" {
            HttpStatus::NO_CONTENT
        } else {
            HttpStatus::INTERNAL_SERVER_ERROR
        }
    }

    async fn fake_media_source() -> HttpMediaGateway {
        let app = Router::new()
            .route("/streams/:id/offer", post(media_offer))
            .route("/streams/:id/ice", post(media_ice));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        HttpMediaGateway::new(format!("http://{addr}/"), Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn stream_url_strips_trailing_slash() {
        let gw = HttpMediaGateway::new("http://media:8889/", Duration::from_secs(1)).unwrap();
        assert_eq!(gw.stream_url("cam-1", "offer"), "http://media:8889/streams/cam-1/offer");
    }

    #[tokio::test]
    async fn unreachable_source_maps_to_upstream_unavailable() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let gw = HttpMediaGateway::new(format!("http://127.0.0.1:{port}"), Duration::from_millis(500))
            .unwrap();
        let err = gw
            .exchange_offer(&camera("cam-1"), &SessionDescription::offer("v=0"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn answer_is_returned_from_media_source() {
        let gw = fake_media_source().await;
        let answer = gw
            .exchange_offer(&camera("ok"), &SessionDescription::offer("v=0 offer"))
            .await
            .unwrap();
        assert_eq!(answer, SessionDescription::answer("answer-to:v=0 offer"));
    }

    #[tokio::test]
    async fn rejected_offer_maps_to_bad_payload() {
        let gw = fake_media_source().await;
        for id in ["bad", "unprocessable"] {
            let err = gw
                .exchange_offer(&camera(id), &SessionDescription::offer("v=0"))
                .await
                .unwrap_err();
            assert!(matches!(&err, AppError::BadPayload(msg) if msg.starts_with("offer rejected")), "{id}: {err:?}");
        }
    }

    #[tokio::test]
    async fn other_failures_map_to_upstream_unavailable() {
        let gw = fake_media_source().await;
        let err = gw
            .exchange_offer(&camera("busy"), &SessionDescription::offer("v=0"))
            .await
            .unwrap_err();
        assert!(matches!(&err, AppError::UpstreamUnavailable(msg) if msg.contains("503")), "{err:?}");

        let err = gw
            .exchange_offer(&camera("garbled"), &SessionDescription::offer("v=0"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn invalid_answer_is_a_bad_gateway() {
        let gw = fake_media_source().await;
        for id in ["echo", "blank"] {
            let err = gw
                .exchange_offer(&camera(id), &SessionDescription::offer("v=0"))
                .await
                .unwrap_err();
            assert!(matches!(&err, AppError::UpstreamUnavailable(msg) if msg.contains("invalid answer")), "{id}: {err:?}");
            assert_eq!(err.into_response().status(), HttpStatus::BAD_GATEWAY);
        }
    }

    #[tokio::test]
    async fn ice_candidate_forwarding() {
        let gw = fake_media_source().await;
        gw.add_ice_candidate(&camera("ok"), &candidate()).await.unwrap();
        let err = gw.add_ice_candidate(&camera("broken"), &candidate()).await.unwrap_err();
        assert!(matches!(err, AppError::UpstreamUnavailable(_)));
    }
}
