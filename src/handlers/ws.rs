//! Event socket: authenticate, upgrade, register with the hub, prime with a snapshot, stream events.

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::auth::Claims;
use crate::error::{AppError, AppResult};
use crate::handlers::http::AppState;
use crate::middleware::auth::socket_token;
use crate::models::{ClientMessage, EventKind};
use crate::realtime::{hub::send_to, subscriber_channel, ConnectionId, SubscriberSender};

#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
    /// Comma-separated camera ids the dashboard is showing. Informational: every subscriber
    /// receives every event and filters client-side.
    pub cameras: Option<String>,
}

/// GET /ws?token=...&cameras=id1,id2: the credential is checked before any upgrade happens.
pub async fn ws_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<WsParams>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, AppError> {
    let token = socket_token(&headers, params.token.as_deref())
        .ok_or_else(|| AppError::Unauthorized("missing token".to_string()))?;
    let claims = state.jwt_secret().validate(token)?;

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };

    let camera_count = params
        .cameras
        .as_deref()
        .map(|list| list.split(',').filter(|id| !id.trim().is_empty()).count())
        .unwrap_or(0);

    Ok(ws.on_upgrade(move |socket| handle_socket(state, socket, claims, camera_count)))
}

async fn handle_socket(state: AppState, socket: WebSocket, claims: Claims, camera_count: usize) {
    let connection_id = ConnectionId::new();
    info!(connection_id = %connection_id, user = %claims.username, camera_count, "ws connected");

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = subscriber_channel();

    state.hub().register(connection_id, tx.clone());

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    let snapshot_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = send_initial_snapshot(&snapshot_state, connection_id, &tx).await {
            error!(connection_id = %connection_id, error = %e, "failed to send initial snapshot");
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Ping) => debug!(connection_id = %connection_id, "client ping"),
                Err(_) => debug!(connection_id = %connection_id, "ignoring client message"),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    state.hub().unregister(&connection_id);
    send_task.abort();
    info!(connection_id = %connection_id, "ws disconnected");
}

/// Aggregate camera counts, then the latest alerts when there are any.
async fn send_initial_snapshot(
    state: &AppState,
    connection_id: ConnectionId,
    tx: &SubscriberSender,
) -> AppResult<()> {
    let (stats, recent) = tokio::try_join!(
        state.camera_service.stats(),
        state.alert_service.recent(None, None)
    )?;

    if !send_to(tx, EventKind::CameraStats, &stats) {
        warn!(connection_id = %connection_id, "camera-stats snapshot not delivered");
        return Ok(());
    }
    if !recent.is_empty() && !send_to(tx, EventKind::RecentAlerts, &recent) {
        warn!(connection_id = %connection_id, "recent-alerts snapshot not delivered");
    }
    Ok(())
}
