//! Push envelope shared by every message sent over the event socket.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event discriminators in use today. Subscribers ignore names they do not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Alert,
    CameraStats,
    RecentAlerts,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Alert => "alert",
            EventKind::CameraStats => "camera-stats",
            EventKind::RecentAlerts => "recent-alerts",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "alert" => Some(EventKind::Alert),
            "camera-stats" => Some(EventKind::CameraStats),
            "recent-alerts" => Some(EventKind::RecentAlerts),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event sent over WebSocket to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    /// Build an envelope stamped with the current time.
    pub fn new(event: &str, payload: impl Serialize) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event: event.to_string(),
            payload: serde_json::to_value(payload)?,
            timestamp: Utc::now(),
        })
    }

    pub fn kind(&self) -> Option<EventKind> {
        EventKind::from_name(&self.event)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Advisory client → server message. Unknown shapes are accepted and ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
}
