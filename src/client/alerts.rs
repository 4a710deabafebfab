//! Alert channel: the dashboard's subscription to pushed alert and camera events.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval};
use tracing::{debug, info, warn};

use super::error::ClientError;
use super::socket::{EventSocket, SocketConnector, SocketEvent};
use crate::models::{Alert, CameraStats, ClientMessage, Envelope, EventKind};

pub const MAX_ALERTS_PER_CAMERA: usize = 10;

const DEFAULT_WS_URL: &str = "ws://localhost:4000/ws";
const SOCKET_FAILED: &str = "WebSocket connection failed";

/// Newest-first alert lists keyed by camera id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertBook {
    by_camera: HashMap<String, Vec<Alert>>,
}

impl AlertBook {
    pub fn get(&self, camera_id: &str) -> &[Alert] {
        self.by_camera
            .get(camera_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.by_camera.is_empty()
    }

    /// Put a pushed alert at the front of its camera's list. A repeated id replaces the old entry.
    pub fn insert_live(&mut self, alert: Alert) {
        let list = self.by_camera.entry(alert.camera_id.clone()).or_default();
        list.retain(|a| a.id != alert.id);
        list.insert(0, alert);
        list.truncate(MAX_ALERTS_PER_CAMERA);
    }

    /// Fold in alerts from a snapshot. Entries already present keep their place at the front;
    /// unseen snapshot entries follow in snapshot order, then the list is capped.
    pub fn merge_snapshot(&mut self, alerts: Vec<Alert>) {
        for alert in alerts {
            let list = self.by_camera.entry(alert.camera_id.clone()).or_default();
            if list.len() >= MAX_ALERTS_PER_CAMERA || list.iter().any(|a| a.id == alert.id) {
                continue;
            }
            list.push(alert);
        }
    }

    /// Drop every camera not in `watched`. Returns true when anything was removed.
    pub fn retain(&mut self, watched: &BTreeSet<String>) -> bool {
        let before = self.by_camera.len();
        self.by_camera.retain(|camera_id, _| watched.contains(camera_id));
        self.by_camera.len() != before
    }

    pub fn clear(&mut self, camera_id: &str) -> bool {
        self.by_camera.remove(camera_id).is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Idle,
    Connecting,
    Open,
    Closed,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertChannelState {
    pub status: ConnectionStatus,
    pub error: Option<String>,
    pub alerts: AlertBook,
    /// Last `camera-stats` payload seen on the socket.
    pub stats: Option<CameraStats>,
}

impl Default for AlertChannelState {
    fn default() -> Self {
        Self {
            status: ConnectionStatus::Idle,
            error: None,
            alerts: AlertBook::default(),
            stats: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AlertChannelConfig {
    pub ws_url: String,
    pub heartbeat_interval: Duration,
}

impl Default for AlertChannelConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            heartbeat_interval: Duration::from_secs(30),
        }
    }
}

/// Fetches the recent alerts for one camera once the socket is open.
#[async_trait]
pub trait AlertSnapshotSource: Send + Sync {
    async fn recent_alerts(&self, token: &str, camera_id: &str) -> Result<Vec<Alert>, ClientError>;
}

enum Command {
    Watch {
        cameras: BTreeSet<String>,
        token: Option<String>,
    },
    Clear(String),
}

/// Handle to the alert channel actor. Dropping it closes the socket.
pub struct AlertChannel {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<AlertChannelState>,
    _task: JoinHandle<()>,
}

impl AlertChannel {
    pub fn spawn(
        config: AlertChannelConfig,
        connector: Arc<dyn SocketConnector>,
        snapshots: Arc<dyn AlertSnapshotSource>,
    ) -> Self {
        let (publish, state) = watch::channel(AlertChannelState::default());
        let (commands, rx) = mpsc::unbounded_channel();
        let worker = ChannelWorker {
            config,
            connector,
            snapshots,
            key: None,
            cameras: BTreeSet::new(),
            state: AlertChannelState::default(),
            socket: None,
            heartbeat: None,
            snapshot_rx: None,
            snapshot_task: None,
            publish,
        };
        let task = tokio::spawn(worker.run(rx));
        Self {
            commands,
            state,
            _task: task,
        }
    }

    /// Set the watched cameras and credential. A changed set or token reopens the socket; an
    /// identical one leaves it alone.
    pub fn watch<I, S>(&self, cameras: I, token: Option<String>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cameras = cameras.into_iter().map(Into::into).collect();
        let _ = self.commands.send(Command::Watch { cameras, token });
    }

    /// Forget one camera's alerts. The socket is untouched.
    pub fn clear(&self, camera_id: impl Into<String>) {
        let _ = self.commands.send(Command::Clear(camera_id.into()));
    }

    pub fn state(&self) -> AlertChannelState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AlertChannelState> {
        self.state.clone()
    }
}

struct ChannelWorker {
    config: AlertChannelConfig,
    connector: Arc<dyn SocketConnector>,
    snapshots: Arc<dyn AlertSnapshotSource>,
    /// Token and camera set the current socket was opened for.
    key: Option<(String, BTreeSet<String>)>,
    cameras: BTreeSet<String>,
    state: AlertChannelState,
    socket: Option<EventSocket>,
    heartbeat: Option<Interval>,
    snapshot_rx: Option<mpsc::UnboundedReceiver<Vec<Alert>>>,
    snapshot_task: Option<JoinHandle<()>>,
    publish: watch::Sender<AlertChannelState>,
}

impl ChannelWorker {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(Command::Watch { cameras, token }) => self.reconfigure(cameras, token),
                    Some(Command::Clear(camera_id)) => {
                        self.state.alerts.clear(&camera_id);
                    }
                    None => break,
                },
                event = next_socket_event(&mut self.socket) => self.on_socket_event(event),
                _ = next_tick(&mut self.heartbeat) => self.send_ping(),
                batch = next_batch(&mut self.snapshot_rx) => match batch {
                    Some(alerts) => self.merge_snapshot(alerts),
                    None => self.snapshot_rx = None,
                },
            }
            let state = &self.state;
            self.publish.send_if_modified(|current| {
                if current == state {
                    return false;
                }
                *current = state.clone();
                true
            });
        }
        self.teardown();
        debug!("alert channel ended");
    }

    fn reconfigure(&mut self, cameras: BTreeSet<String>, token: Option<String>) {
        // Removed cameras go first, before any event from the next socket can land.
        self.state.alerts.retain(&cameras);
        self.cameras = cameras;

        let key = match token {
            Some(token) if !self.cameras.is_empty() => Some((token, self.cameras.clone())),
            _ => None,
        };
        if key.is_some() && key == self.key {
            return;
        }

        self.teardown();
        self.key = key;
        self.state.error = None;

        let Some((token, cameras)) = self.key.clone() else {
            self.state.status = ConnectionStatus::Idle;
            return;
        };

        let joined = cameras.iter().map(String::as_str).collect::<Vec<_>>().join(",");
        let url = match reqwest::Url::parse_with_params(
            &self.config.ws_url,
            &[("token", token.as_str()), ("cameras", joined.as_str())],
        ) {
            Ok(url) => url,
            Err(e) => {
                warn!(url = %self.config.ws_url, error = %e, "invalid socket url");
                self.fail();
                return;
            }
        };

        info!(cameras = cameras.len(), "opening alert socket");
        self.socket = Some(self.connector.open(url.as_str()));
        self.state.status = ConnectionStatus::Connecting;
    }

    fn on_socket_event(&mut self, event: Option<SocketEvent>) {
        match event {
            Some(SocketEvent::Opened) => {
                self.state.status = ConnectionStatus::Open;
                let period = self.config.heartbeat_interval;
                self.heartbeat = Some(tokio::time::interval_at(Instant::now() + period, period));
                self.fetch_snapshots();
            }
            Some(SocketEvent::Message(text)) => self.on_message(&text),
            Some(SocketEvent::Error(e)) => {
                warn!(error = %e, "alert socket error");
                self.fail();
            }
            Some(SocketEvent::Closed) | None => {
                debug!("alert socket closed");
                self.teardown();
                self.state.status = ConnectionStatus::Closed;
            }
        }
    }

    fn fail(&mut self) {
        self.teardown();
        self.state.status = ConnectionStatus::Error;
        self.state.error = Some(SOCKET_FAILED.to_string());
    }

    fn on_message(&mut self, text: &str) {
        let envelope: Envelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "failed to parse socket message");
                return;
            }
        };
        let Some(kind) = envelope.kind() else {
            debug!(event = %envelope.event, "ignoring unknown event");
            return;
        };
        match kind {
            EventKind::Alert => match serde_json::from_value::<Alert>(envelope.payload) {
                Ok(alert) if self.cameras.contains(&alert.camera_id) => {
                    self.state.alerts.insert_live(alert)
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "failed to parse alert payload"),
            },
            EventKind::RecentAlerts => match serde_json::from_value::<Vec<Alert>>(envelope.payload) {
                Ok(alerts) => self.merge_snapshot(alerts),
                Err(e) => warn!(error = %e, "failed to parse recent alerts"),
            },
            EventKind::CameraStats => match serde_json::from_value::<CameraStats>(envelope.payload) {
                Ok(stats) => self.state.stats = Some(stats),
                Err(e) => warn!(error = %e, "failed to parse camera stats"),
            },
        }
    }

    fn merge_snapshot(&mut self, alerts: Vec<Alert>) {
        let watched = alerts
            .into_iter()
            .filter(|a| self.cameras.contains(&a.camera_id))
            .collect();
        self.state.alerts.merge_snapshot(watched);
    }

    fn fetch_snapshots(&mut self) {
        let Some((token, cameras)) = self.key.clone() else {
            return;
        };
        let source = self.snapshots.clone();
        let (tx, rx) = mpsc::unbounded_channel();
        self.snapshot_rx = Some(rx);
        self.snapshot_task = Some(tokio::spawn(async move {
            for camera_id in cameras {
                match source.recent_alerts(&token, &camera_id).await {
                    Ok(alerts) => {
                        if tx.send(alerts).is_err() {
                            return;
                        }
                    }
                    Err(e) => warn!(camera_id = %camera_id, error = %e, "failed to load recent alerts"),
                }
            }
        }));
    }

    fn send_ping(&mut self) {
        if self.state.status != ConnectionStatus::Open {
            return;
        }
        let (Some(socket), Ok(ping)) = (&self.socket, serde_json::to_string(&ClientMessage::Ping))
        else {
            return;
        };
        socket.send(ping);
    }

    /// Drop the socket and everything hanging off it. Nothing it emits afterwards is seen.
    fn teardown(&mut self) {
        self.socket = None;
        self.heartbeat = None;
        self.snapshot_rx = None;
        if let Some(task) = self.snapshot_task.take() {
            task.abort();
        }
    }
}

async fn next_socket_event(socket: &mut Option<EventSocket>) -> Option<SocketEvent> {
    match socket {
        Some(socket) => socket.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn next_batch(rx: &mut Option<mpsc::UnboundedReceiver<Vec<Alert>>>) -> Option<Vec<Alert>> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
