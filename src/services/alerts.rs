//! Alert ingest and queries: persist a detection, then push it to every dashboard.

use std::sync::Arc;

use tracing::{info, instrument};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{Alert, NewAlert};
use crate::realtime::BroadcastHub;
use crate::repositories::{AlertStore, CameraDirectory};

/// Alerts primed into the socket snapshot and returned by default from the recent query.
pub const RECENT_ALERTS_LIMIT: usize = 10;
/// Upper bound for the recent-alerts query.
pub const MAX_ALERTS_PAGE: usize = 100;

#[derive(Clone)]
pub struct AlertService {
    cameras: Arc<dyn CameraDirectory>,
    alerts: Arc<dyn AlertStore>,
    hub: Arc<BroadcastHub>,
}

impl AlertService {
    pub fn new(
        cameras: Arc<dyn CameraDirectory>,
        alerts: Arc<dyn AlertStore>,
        hub: Arc<BroadcastHub>,
    ) -> Self {
        Self { cameras, alerts, hub }
    }

    /// Store a detection and broadcast it. Delivery problems stay inside the hub.
    #[instrument(skip(self, input), fields(camera_id = %input.camera_id))]
    pub async fn create_alert(&self, input: NewAlert) -> AppResult<Alert> {
        input.validate()?;
        let camera = self
            .cameras
            .find_camera(&input.camera_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Camera not found".to_string()))?;

        let alert = self.alerts.insert_alert(&camera, input).await?;
        let delivered = self.hub.broadcast_alert(&alert);
        info!(alert_id = %alert.id, delivered, "alert created");
        Ok(alert)
    }

    /// Newest first; `limit` defaults to 10 and is capped at 100.
    pub async fn recent(&self, camera_id: Option<&str>, limit: Option<usize>) -> AppResult<Vec<Alert>> {
        let limit = limit
            .filter(|n| *n > 0)
            .unwrap_or(RECENT_ALERTS_LIMIT)
            .min(MAX_ALERTS_PAGE);
        self.alerts.recent_alerts(camera_id, limit).await
    }
}
