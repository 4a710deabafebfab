//! Signaling relay: carries SDP offers/answers and ICE candidates between a viewer and the media
//! source bound to a camera. Holds no per-session state, so any instance can serve any call.

mod gateway;

pub use gateway::HttpMediaGateway;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{CameraRecord, IceCandidate, SdpType, SessionDescription};
use crate::repositories::CameraDirectory;

/// The media server side of a negotiation.
#[async_trait]
pub trait MediaGateway: Send + Sync {
    async fn exchange_offer(
        &self,
        camera: &CameraRecord,
        offer: &SessionDescription,
    ) -> AppResult<SessionDescription>;

    async fn add_ice_candidate(&self, camera: &CameraRecord, candidate: &IceCandidate) -> AppResult<()>;
}

#[derive(Clone)]
pub struct SignalingRelay {
    cameras: Arc<dyn CameraDirectory>,
    gateway: Arc<dyn MediaGateway>,
}

impl SignalingRelay {
    pub fn new(cameras: Arc<dyn CameraDirectory>, gateway: Arc<dyn MediaGateway>) -> Self {
        Self { cameras, gateway }
    }

    async fn camera(&self, camera_id: &str) -> AppResult<CameraRecord> {
        self.cameras
            .find_camera(camera_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Camera not found".to_string()))
    }

    /// Forward a viewer's offer to the camera's media source and return its answer.
    pub async fn exchange_offer(
        &self,
        camera_id: &str,
        offer: SessionDescription,
    ) -> AppResult<SessionDescription> {
        let camera = self.camera(camera_id).await?;

        if offer.sdp_type != SdpType::Offer {
            return Err(AppError::BadPayload("expected an SDP offer".to_string()));
        }
        offer.validate()?;

        let answer = self.gateway.exchange_offer(&camera, &offer).await?;
        info!(camera_id = %camera_id, "webrtc offer answered");
        Ok(answer)
    }

    /// Forward one ICE candidate. Best effort: candidates are redundant, so an upstream failure is
    /// logged and the viewer still gets an ack.
    pub async fn relay_ice_candidate(&self, camera_id: &str, candidate: IceCandidate) -> AppResult<()> {
        let camera = self.camera(camera_id).await?;
        if let Err(e) = self.gateway.add_ice_candidate(&camera, &candidate).await {
            warn!(camera_id = %camera_id, error = %e, "failed to relay ice candidate");
        }
        Ok(())
    }
}
