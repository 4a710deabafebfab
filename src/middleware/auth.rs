//! Auth extractors: JWT bearer for viewer routes, app key for detection workers.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use tracing::debug;

use crate::auth::Claims;
use crate::error::AppError;
use crate::handlers::http::AppState;

pub const HEADER_APP_KEY: &str = "x-app-key";
const BEARER_PREFIX: &str = "Bearer ";

/// Extractor: authenticated viewer identity from JWT (Bearer token).
#[derive(Clone, Debug)]
pub struct AuthUser(pub Claims);

#[axum::async_trait]
impl axum::extract::FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;
        let claims = state.jwt_secret().validate(token)?;
        Ok(AuthUser(claims))
    }
}

/// Token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Token for socket upgrades: browsers cannot set headers on the handshake, so the
/// `token` query parameter wins over the header.
pub fn socket_token<'a>(headers: &'a HeaderMap, query_token: Option<&'a str>) -> Option<&'a str> {
    query_token
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| bearer_token(headers))
}

/// Require `x-app-key` to match the configured ingest key.
pub fn require_app_key(headers: &HeaderMap, expected: &str) -> Result<(), AppError> {
    let key = headers
        .get(HEADER_APP_KEY)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if key.is_empty() || key != expected {
        debug!("rejected request: invalid or missing x-app-key");
        return Err(AppError::Unauthorized(
            "invalid or missing x-app-key".to_string(),
        ));
    }
    Ok(())
}
