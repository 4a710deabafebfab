//! Ports to the camera registry and alert store, which live outside the transport core.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{Alert, CameraCounts, CameraRecord, NewAlert};

/// Read side of the camera registry, plus the streaming toggle.
#[async_trait]
pub trait CameraDirectory: Send + Sync {
    async fn find_camera(&self, id: &str) -> AppResult<Option<CameraRecord>>;

    async fn camera_counts(&self) -> AppResult<CameraCounts>;

    /// Set the streaming flag. `None` when the camera does not exist.
    async fn set_streaming(&self, id: &str, streaming: bool) -> AppResult<Option<CameraRecord>>;
}

#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn insert_alert(&self, camera: &CameraRecord, alert: NewAlert) -> AppResult<Alert>;

    /// Newest first, optionally restricted to one camera.
    async fn recent_alerts(&self, camera_id: Option<&str>, limit: usize) -> AppResult<Vec<Alert>>;
}
