//! WebRTC signaling endpoints.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use tracing::debug;

use crate::error::AppError;
use crate::handlers::http::AppState;
use crate::middleware::AuthUser;
use crate::models::{IceCandidate, SessionDescription};

/// POST /cameras/:id/webrtc/offer: `{sdp, type}` in, answer `{sdp, type}` out.
pub async fn webrtc_offer(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(camera_id): Path<String>,
    body: Result<Json<SessionDescription>, JsonRejection>,
) -> Result<Json<SessionDescription>, AppError> {
    let Json(offer) = body?;
    debug!(camera_id = %camera_id, user = %claims.username, "webrtc offer");
    let answer = state.relay.exchange_offer(&camera_id, offer).await?;
    Ok(Json(answer))
}

/// POST /cameras/:id/webrtc/ice: one candidate, empty success.
pub async fn webrtc_ice(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(camera_id): Path<String>,
    body: Result<Json<IceCandidate>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let Json(candidate) = body?;
    state.relay.relay_ice_candidate(&camera_id, candidate).await?;
    Ok(StatusCode::NO_CONTENT)
}
