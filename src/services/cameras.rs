//! Camera status: streaming toggle and the `camera-stats` events it produces.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::error::{AppError, AppResult};
use crate::models::{CameraRecord, CameraStats};
use crate::realtime::BroadcastHub;
use crate::repositories::CameraDirectory;

#[derive(Clone)]
pub struct CameraService {
    cameras: Arc<dyn CameraDirectory>,
    hub: Arc<BroadcastHub>,
}

impl CameraService {
    pub fn new(cameras: Arc<dyn CameraDirectory>, hub: Arc<BroadcastHub>) -> Self {
        Self { cameras, hub }
    }

    /// Aggregate counts for the whole registry.
    pub async fn stats(&self) -> AppResult<CameraStats> {
        Ok(CameraStats::aggregate(self.cameras.camera_counts().await?))
    }

    /// Mark a camera as streaming or not. Already in the requested state: no change, no event.
    #[instrument(skip(self))]
    pub async fn set_streaming(&self, camera_id: &str, streaming: bool) -> AppResult<CameraRecord> {
        let camera = self
            .cameras
            .find_camera(camera_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Camera not found".to_string()))?;
        if camera.is_streaming == streaming {
            return Ok(camera);
        }

        let updated = self
            .cameras
            .set_streaming(camera_id, streaming)
            .await?
            .ok_or_else(|| AppError::NotFound("Camera not found".to_string()))?;
        info!(camera_id = %camera_id, streaming, "camera stream toggled");

        let counts = self.cameras.camera_counts().await?;
        self.hub
            .broadcast_camera_stats(&CameraStats::scoped(camera_id, streaming, counts));
        Ok(updated)
    }
}
