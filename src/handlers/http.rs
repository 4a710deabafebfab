//! HTTP handlers: alert ingest and query, stream toggle, health.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::auth::JwtSecret;
use crate::error::AppError;
use crate::middleware::auth::{require_app_key, AuthUser};
use crate::models::{Alert, CameraRecord, NewAlert};
use crate::realtime::BroadcastHub;
use crate::repositories::{AlertStore, CameraDirectory};
use crate::services::{AlertService, CameraService};
use crate::signaling::{MediaGateway, SignalingRelay};

/// Shared application state for HTTP and socket handlers.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<BroadcastHub>,
    pub relay: SignalingRelay,
    pub alert_service: AlertService,
    pub camera_service: CameraService,
    pub jwt_secret: JwtSecret,
    pub ingest_key: String,
}

impl AppState {
    pub fn new(
        hub: Arc<BroadcastHub>,
        cameras: Arc<dyn CameraDirectory>,
        alerts: Arc<dyn AlertStore>,
        gateway: Arc<dyn MediaGateway>,
        jwt_secret: JwtSecret,
        ingest_key: String,
    ) -> Self {
        Self {
            relay: SignalingRelay::new(cameras.clone(), gateway),
            alert_service: AlertService::new(cameras.clone(), alerts, hub.clone()),
            camera_service: CameraService::new(cameras, hub.clone()),
            hub,
            jwt_secret,
            ingest_key,
        }
    }

    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }
    pub fn jwt_secret(&self) -> &JwtSecret {
        &self.jwt_secret
    }
}

/// POST /api/alerts: detection worker reports a face. Requires `x-app-key`.
pub async fn create_alert(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<NewAlert>, JsonRejection>,
) -> Result<(StatusCode, Json<Alert>), AppError> {
    require_app_key(&headers, &state.ingest_key)?;
    let Json(body) = body?;
    let alert = state.alert_service.create_alert(body).await?;
    Ok((StatusCode::CREATED, Json(alert)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentAlertsQuery {
    pub camera_id: Option<String>,
    pub limit: Option<usize>,
}

/// GET /alerts/recent?cameraId=&limit=
pub async fn recent_alerts(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<RecentAlertsQuery>,
) -> Result<Json<Vec<Alert>>, AppError> {
    let camera_id = query.camera_id.as_deref().filter(|id| !id.is_empty());
    let alerts = state.alert_service.recent(camera_id, query.limit).await?;
    Ok(Json(alerts))
}

/// POST /cameras/:id/stream/start
pub async fn start_stream(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<CameraRecord>, AppError> {
    Ok(Json(state.camera_service.set_streaming(&id, true).await?))
}

/// POST /cameras/:id/stream/stop
pub async fn stop_stream(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<CameraRecord>, AppError> {
    Ok(Json(state.camera_service.set_streaming(&id, false).await?))
}

/// GET /health: liveness check.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "camwatch",
            "subscribers": state.hub().len()
        })),
    )
}
