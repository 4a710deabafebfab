//! Real-time transport for a camera monitoring dashboard.
//!
//! Server side: a WebRTC signaling relay between viewers and camera media sources, and a
//! broadcast hub pushing alert and camera-status events to every connected dashboard socket.
//! Client side (`client`): the viewer state machines consuming both.

pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod realtime;
pub mod repositories;
pub mod services;
pub mod signaling;

pub use config::Config;
pub use error::AppError;
pub use handlers::http::AppState;
pub use realtime::BroadcastHub;
pub use signaling::SignalingRelay;

use axum::routing::{get, post};
use handlers::http;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build the API router (ws, signaling, alerts, health). Used by main and by integration tests.
pub fn create_app(state: AppState) -> axum::Router {
    let camera_routes = axum::Router::new()
        .route("/:id/webrtc/offer", post(handlers::webrtc_offer))
        .route("/:id/webrtc/ice", post(handlers::webrtc_ice))
        .route("/:id/stream/start", post(http::start_stream))
        .route("/:id/stream/stop", post(http::stop_stream));

    axum::Router::new()
        .route("/ws", get(handlers::ws_handler))
        .route("/api/alerts", post(http::create_alert))
        .route("/alerts/recent", get(http::recent_alerts))
        .route("/health", get(http::health))
        .nest("/cameras", camera_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
