//! Camera registry views consumed by the transport core.

use serde::{Deserialize, Serialize};

/// The slice of a registry camera the transport cares about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraRecord {
    pub id: String,
    pub name: String,
    pub location: String,
    pub is_streaming: bool,
}

/// Aggregate counts across the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraCounts {
    pub total_cameras: i64,
    pub streaming_cameras: i64,
}

/// `camera-stats` payload, optionally scoped to the camera that changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_streaming: Option<bool>,
    pub total_cameras: i64,
    pub streaming_cameras: i64,
}

impl CameraStats {
    pub fn aggregate(counts: CameraCounts) -> Self {
        Self {
            camera_id: None,
            is_streaming: None,
            total_cameras: counts.total_cameras,
            streaming_cameras: counts.streaming_cameras,
        }
    }

    pub fn scoped(camera_id: impl Into<String>, is_streaming: bool, counts: CameraCounts) -> Self {
        Self {
            camera_id: Some(camera_id.into()),
            is_streaming: Some(is_streaming),
            ..Self::aggregate(counts)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_stats_omit_camera_fields() {
        let stats = CameraStats::aggregate(CameraCounts {
            total_cameras: 3,
            streaming_cameras: 1,
        });
        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value, serde_json::json!({ "totalCameras": 3, "streamingCameras": 1 }));
    }

    #[test]
    fn scoped_stats_carry_camera() {
        let stats = CameraStats::scoped("cam-1", true, CameraCounts::default());
        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["cameraId"], "cam-1");
        assert_eq!(value["isStreaming"], true);
    }
}
