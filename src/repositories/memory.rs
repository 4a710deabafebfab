//! In-process registry and alert store for local runs and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{AlertStore, CameraDirectory};
use crate::error::AppResult;
use crate::models::{Alert, CameraCounts, CameraRecord, CameraSummary, NewAlert};

/// Keeps at most this many alerts; older ones are dropped.
const MAX_STORED_ALERTS: usize = 1000;

#[derive(Default)]
pub struct MemoryStore {
    cameras: RwLock<HashMap<String, CameraRecord>>,
    /// Oldest first.
    alerts: RwLock<Vec<Alert>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cameras(cameras: impl IntoIterator<Item = CameraRecord>) -> Self {
        let store = Self::new();
        for camera in cameras {
            store.add_camera(camera);
        }
        store
    }

    pub fn add_camera(&self, camera: CameraRecord) {
        self.cameras.write().insert(camera.id.clone(), camera);
    }

    /// Append an already-built alert (e.g. seeded history).
    pub fn push_alert(&self, alert: Alert) {
        let mut alerts = self.alerts.write();
        alerts.push(alert);
        if alerts.len() > MAX_STORED_ALERTS {
            let excess = alerts.len() - MAX_STORED_ALERTS;
            alerts.drain(..excess);
        }
    }
}

#[async_trait]
impl CameraDirectory for MemoryStore {
    async fn find_camera(&self, id: &str) -> AppResult<Option<CameraRecord>> {
        Ok(self.cameras.read().get(id).cloned())
    }

    async fn camera_counts(&self) -> AppResult<CameraCounts> {
        let cameras = self.cameras.read();
        Ok(CameraCounts {
            total_cameras: cameras.len() as i64,
            streaming_cameras: cameras.values().filter(|c| c.is_streaming).count() as i64,
        })
    }

    async fn set_streaming(&self, id: &str, streaming: bool) -> AppResult<Option<CameraRecord>> {
        let mut cameras = self.cameras.write();
        Ok(cameras.get_mut(id).map(|camera| {
            camera.is_streaming = streaming;
            camera.clone()
        }))
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn insert_alert(&self, camera: &CameraRecord, alert: NewAlert) -> AppResult<Alert> {
        let stored = Alert {
            id: Uuid::new_v4().to_string(),
            camera_id: camera.id.clone(),
            description: alert.description,
            thumbnail_url: alert.thumbnail_url,
            metadata: alert.metadata,
            timestamp: Utc::now(),
            camera: Some(CameraSummary {
                id: camera.id.clone(),
                name: camera.name.clone(),
                location: camera.location.clone(),
            }),
        };
        self.push_alert(stored.clone());
        Ok(stored)
    }

    async fn recent_alerts(&self, camera_id: Option<&str>, limit: usize) -> AppResult<Vec<Alert>> {
        let alerts = self.alerts.read();
        Ok(alerts
            .iter()
            .rev()
            .filter(|a| camera_id.map_or(true, |id| a.camera_id == id))
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera(id: &str, streaming: bool) -> CameraRecord {
        CameraRecord {
            id: id.to_string(),
            name: format!("Camera {id}"),
            location: "Lobby".to_string(),
            is_streaming: streaming,
        }
    }

    fn new_alert(camera_id: &str) -> NewAlert {
        NewAlert {
            camera_id: camera_id.to_string(),
            description: None,
            thumbnail_url: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn counts_and_toggle() {
        let store = MemoryStore::with_cameras([camera("cam-1", false), camera("cam-2", true)]);
        assert_eq!(
            store.camera_counts().await.unwrap(),
            CameraCounts { total_cameras: 2, streaming_cameras: 1 }
        );
        let updated = store.set_streaming("cam-1", true).await.unwrap().unwrap();
        assert!(updated.is_streaming);
        assert_eq!(store.camera_counts().await.unwrap().streaming_cameras, 2);
        assert!(store.set_streaming("missing", true).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn recent_alerts_newest_first_and_filtered() {
        let cam1 = camera("cam-1", true);
        let cam2 = camera("cam-2", true);
        let store = MemoryStore::with_cameras([cam1.clone(), cam2.clone()]);
        let first = store.insert_alert(&cam1, new_alert("cam-1")).await.unwrap();
        store.insert_alert(&cam2, new_alert("cam-2")).await.unwrap();
        let third = store.insert_alert(&cam1, new_alert("cam-1")).await.unwrap();

        let all = store.recent_alerts(None, 10).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, third.id);

        let cam1_only = store.recent_alerts(Some("cam-1"), 10).await.unwrap();
        assert_eq!(
            cam1_only.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(),
            vec![third.id.as_str(), first.id.as_str()]
        );

        assert_eq!(store.recent_alerts(None, 1).await.unwrap().len(), 1);
    }
}
