//! Peer session: one receive-only video peer connection per camera tile.
//!
//! The session runs as a small actor. Commands (`start`, `stop`) and peer connection events are
//! fed through a single transition function, [`PeerState::next`]. Teardown drops the
//! connection's event receiver before closing it, so nothing the connection emits afterwards
//! (a late answer, a trailing ICE candidate, the `closed` callback) can reach the state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use super::error::ClientError;
use crate::models::{IceCandidate, SessionDescription};

const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";
const CONNECTION_LOST: &str = "Connection lost";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Idle,
    Connecting,
    Playing,
    Stopped,
    Error,
}

/// `RTCPeerConnection.connectionState` as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Tagged inputs to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerInput {
    Start,
    Negotiated,
    Transport(TransportState),
    Failed(String),
    Stop,
}

impl PeerState {
    /// Next state for `input`, or `None` when the input is ignored in this state.
    pub fn next(self, input: &PeerInput) -> Option<PeerState> {
        use PeerState::*;
        match (self, input) {
            (Connecting | Playing, PeerInput::Start) => None,
            (_, PeerInput::Start) => Some(Connecting),
            (Connecting, PeerInput::Negotiated) => Some(Playing),
            (Connecting, PeerInput::Transport(TransportState::Connected)) => Some(Playing),
            (
                Connecting | Playing,
                PeerInput::Transport(TransportState::Failed | TransportState::Disconnected),
            ) => Some(Error),
            (Connecting | Playing, PeerInput::Transport(TransportState::Closed)) => Some(Stopped),
            (Connecting | Playing, PeerInput::Failed(_)) => Some(Error),
            (_, PeerInput::Stop) => Some(Stopped),
            _ => None,
        }
    }

    pub fn is_active(self) -> bool {
        matches!(self, PeerState::Connecting | PeerState::Playing)
    }
}

/// What the owner of a tile sees.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerSnapshot {
    pub camera_id: String,
    pub state: PeerState,
    pub error: Option<String>,
}

// ---- Media ----

pub trait MediaTrack: Send + Sync {
    fn stop(&self);
}

#[derive(Clone, Default)]
pub struct MediaStream {
    pub tracks: Vec<Arc<dyn MediaTrack>>,
}

impl MediaStream {
    pub fn new(tracks: Vec<Arc<dyn MediaTrack>>) -> Self {
        Self { tracks }
    }
}

/// Where received video is attached for rendering.
#[derive(Clone, Default)]
pub struct VideoSink {
    stream: Arc<Mutex<Option<MediaStream>>>,
}

impl VideoSink {
    pub fn attach(&self, stream: MediaStream) {
        *self.stream.lock() = Some(stream);
    }

    pub fn current(&self) -> Option<MediaStream> {
        self.stream.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.stream.lock().is_none()
    }

    /// Stop every track and clear the sink.
    fn release(&self) {
        if let Some(stream) = self.stream.lock().take() {
            for track in &stream.tracks {
                track.stop();
            }
        }
    }
}

// ---- Peer connection port ----

pub enum PeerConnectionEvent {
    Track(MediaStream),
    IceCandidate(IceCandidate),
    StateChange(TransportState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfferOptions {
    pub receive_video: bool,
    pub receive_audio: bool,
}

impl OfferOptions {
    pub fn receive_only_video() -> Self {
        Self {
            receive_video: true,
            receive_audio: false,
        }
    }
}

#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn create_offer(&self, options: OfferOptions) -> Result<SessionDescription, ClientError>;
    async fn set_local_description(&self, description: SessionDescription) -> Result<(), ClientError>;
    async fn set_remote_description(&self, description: SessionDescription) -> Result<(), ClientError>;
    /// Stop emitting events. Always called before `close`.
    fn detach(&self);
    fn close(&self);
}

/// The viewer's half of the signaling relay.
#[async_trait]
pub trait SignalingClient: Send + Sync {
    async fn exchange_offer(
        &self,
        camera_id: &str,
        offer: &SessionDescription,
    ) -> Result<SessionDescription, ClientError>;

    async fn send_ice_candidate(&self, camera_id: &str, candidate: &IceCandidate) -> Result<(), ClientError>;
}

/// Creates peer connections together with their event stream.
pub trait PeerConnector: Send + Sync {
    fn create(
        &self,
        config: &PeerConfig,
    ) -> Result<(Arc<dyn PeerConnection>, mpsc::UnboundedReceiver<PeerConnectionEvent>), ClientError>;
}

#[derive(Debug, Clone)]
pub struct PeerConfig {
    pub ice_servers: Vec<String>,
    pub negotiation_timeout: Duration,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![DEFAULT_STUN_SERVER.to_string()],
            negotiation_timeout: Duration::from_secs(15),
        }
    }
}

// ---- Session handle ----

enum Command {
    Start(oneshot::Sender<Result<(), ClientError>>),
    Stop,
}

/// Handle to a running peer session. Dropping it tears the session down.
pub struct PeerSession {
    camera_id: String,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<PeerSnapshot>,
    sink: VideoSink,
}

impl PeerSession {
    pub fn spawn(
        camera_id: impl Into<String>,
        connector: Arc<dyn PeerConnector>,
        signaling: Arc<dyn SignalingClient>,
        config: PeerConfig,
    ) -> Self {
        let camera_id = camera_id.into();
        let sink = VideoSink::default();
        let (publish, state) = watch::channel(PeerSnapshot {
            camera_id: camera_id.clone(),
            state: PeerState::Idle,
            error: None,
        });
        let (commands, rx) = mpsc::unbounded_channel();
        let worker = PeerWorker {
            camera_id: camera_id.clone(),
            connector,
            signaling,
            config,
            state: PeerState::Idle,
            error: None,
            connection: None,
            events: None,
            negotiation: None,
            pending: None,
            sink: sink.clone(),
            publish,
        };
        tokio::spawn(worker.run(rx));
        Self {
            camera_id,
            commands,
            state,
            sink,
        }
    }

    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }

    /// Negotiate and start playing. Returns once the answer is applied; a no-op when the
    /// session is already connecting or playing.
    pub async fn start(&self) -> Result<(), ClientError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Start(reply))
            .map_err(|_| ClientError::Closed)?;
        rx.await.map_err(|_| ClientError::Closed)?
    }

    /// Tear down and move to `stopped`, whatever the current state.
    pub fn stop(&self) {
        let _ = self.commands.send(Command::Stop);
    }

    pub fn snapshot(&self) -> PeerSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PeerSnapshot> {
        self.state.clone()
    }

    pub fn video_sink(&self) -> &VideoSink {
        &self.sink
    }
}

// ---- Actor ----

struct PeerWorker {
    camera_id: String,
    connector: Arc<dyn PeerConnector>,
    signaling: Arc<dyn SignalingClient>,
    config: PeerConfig,
    state: PeerState,
    error: Option<String>,
    connection: Option<Arc<dyn PeerConnection>>,
    events: Option<mpsc::UnboundedReceiver<PeerConnectionEvent>>,
    negotiation: Option<BoxFuture<'static, Result<(), ClientError>>>,
    pending: Option<oneshot::Sender<Result<(), ClientError>>>,
    sink: VideoSink,
    publish: watch::Sender<PeerSnapshot>,
}

impl PeerWorker {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(Command::Start(reply)) => self.start(reply),
                    Some(Command::Stop) => self.apply(PeerInput::Stop),
                    None => {
                        // Handle dropped: release everything, even mid-negotiation.
                        self.apply(PeerInput::Stop);
                        break;
                    }
                },
                result = poll_negotiation(&mut self.negotiation) => {
                    self.negotiation = None;
                    self.on_negotiated(result);
                }
                event = next_event(&mut self.events) => match event {
                    Some(event) => self.on_connection_event(event),
                    None => self.events = None,
                },
            }
        }
        debug!(camera_id = %self.camera_id, "peer session ended");
    }

    fn start(&mut self, reply: oneshot::Sender<Result<(), ClientError>>) {
        if self.state.is_active() {
            let _ = reply.send(Ok(()));
            return;
        }
        self.apply(PeerInput::Start);

        let (connection, events) = match self.connector.create(&self.config) {
            Ok(parts) => parts,
            Err(e) => {
                self.apply(PeerInput::Failed(e.to_string()));
                let _ = reply.send(Err(e));
                return;
            }
        };
        self.connection = Some(connection.clone());
        self.events = Some(events);
        self.pending = Some(reply);

        let signaling = self.signaling.clone();
        let camera_id = self.camera_id.clone();
        let timeout = self.config.negotiation_timeout;
        self.negotiation = Some(Box::pin(async move {
            match tokio::time::timeout(timeout, negotiate(connection, signaling, camera_id)).await {
                Ok(result) => result,
                Err(_) => Err(ClientError::NegotiationTimeout),
            }
        }));
        info!(camera_id = %self.camera_id, "negotiating");
    }

    fn on_negotiated(&mut self, result: Result<(), ClientError>) {
        let reply = self.pending.take();
        let outcome = match result {
            Ok(()) => {
                self.apply(PeerInput::Negotiated);
                Ok(())
            }
            Err(e) => {
                warn!(camera_id = %self.camera_id, error = %e, "failed to start stream");
                self.apply(PeerInput::Failed(e.to_string()));
                Err(e)
            }
        };
        if let Some(reply) = reply {
            let _ = reply.send(outcome);
        }
    }

    fn on_connection_event(&mut self, event: PeerConnectionEvent) {
        match event {
            PeerConnectionEvent::Track(stream) => self.sink.attach(stream),
            PeerConnectionEvent::IceCandidate(candidate) => {
                let signaling = self.signaling.clone();
                let camera_id = self.camera_id.clone();
                tokio::spawn(async move {
                    if let Err(e) = signaling.send_ice_candidate(&camera_id, &candidate).await {
                        warn!(camera_id = %camera_id, error = %e, "failed to send ICE candidate");
                    }
                });
            }
            PeerConnectionEvent::StateChange(state) => {
                debug!(camera_id = %self.camera_id, ?state, "transport state");
                self.apply(PeerInput::Transport(state));
            }
        }
    }

    /// The single transition function. Entering `stopped` or `error` tears down before the new
    /// state is published.
    fn apply(&mut self, input: PeerInput) {
        let Some(next) = self.state.next(&input) else {
            return;
        };

        match next {
            PeerState::Connecting => self.error = None,
            PeerState::Error => {
                self.error = Some(match &input {
                    PeerInput::Failed(msg) => msg.clone(),
                    _ => CONNECTION_LOST.to_string(),
                });
            }
            _ => {}
        }

        if matches!(next, PeerState::Stopped | PeerState::Error) {
            self.teardown();
            if let Some(reply) = self.pending.take() {
                let err = match next {
                    PeerState::Error => ClientError::TransportFailure(CONNECTION_LOST.to_string()),
                    _ => ClientError::Cancelled,
                };
                let _ = reply.send(Err(err));
            }
        }

        self.state = next;
        self.publish.send_replace(PeerSnapshot {
            camera_id: self.camera_id.clone(),
            state: self.state,
            error: self.error.clone(),
        });
    }

    /// Detach, close, release tracks, clear the sink. Safe with nothing established.
    fn teardown(&mut self) {
        self.negotiation = None;
        self.events = None;
        if let Some(connection) = self.connection.take() {
            connection.detach();
            connection.close();
        }
        self.sink.release();
    }
}

async fn negotiate(
    connection: Arc<dyn PeerConnection>,
    signaling: Arc<dyn SignalingClient>,
    camera_id: String,
) -> Result<(), ClientError> {
    let offer = connection
        .create_offer(OfferOptions::receive_only_video())
        .await?;
    connection.set_local_description(offer.clone()).await?;
    let answer = signaling.exchange_offer(&camera_id, &offer).await?;
    connection.set_remote_description(answer).await?;
    Ok(())
}

async fn poll_negotiation(
    negotiation: &mut Option<BoxFuture<'static, Result<(), ClientError>>>,
) -> Result<(), ClientError> {
    match negotiation {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

async fn next_event(
    events: &mut Option<mpsc::UnboundedReceiver<PeerConnectionEvent>>,
) -> Option<PeerConnectionEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Notify;

    // ---- transition table ----

    #[test]
    fn idle_never_jumps_to_playing() {
        for input in [
            PeerInput::Negotiated,
            PeerInput::Transport(TransportState::Connected),
        ] {
            assert_eq!(PeerState::Idle.next(&input), None);
        }
        assert_eq!(PeerState::Idle.next(&PeerInput::Start), Some(PeerState::Connecting));
    }

    #[test]
    fn start_ignored_while_active() {
        assert_eq!(PeerState::Connecting.next(&PeerInput::Start), None);
        assert_eq!(PeerState::Playing.next(&PeerInput::Start), None);
        assert_eq!(PeerState::Error.next(&PeerInput::Start), Some(PeerState::Connecting));
        assert_eq!(PeerState::Stopped.next(&PeerInput::Start), Some(PeerState::Connecting));
    }

    #[test]
    fn transport_outcomes() {
        let failed = PeerInput::Transport(TransportState::Failed);
        let lost = PeerInput::Transport(TransportState::Disconnected);
        let closed = PeerInput::Transport(TransportState::Closed);
        for state in [PeerState::Connecting, PeerState::Playing] {
            assert_eq!(state.next(&failed), Some(PeerState::Error));
            assert_eq!(state.next(&lost), Some(PeerState::Error));
            assert_eq!(state.next(&closed), Some(PeerState::Stopped));
        }
        assert_eq!(PeerState::Stopped.next(&failed), None);
    }

    #[test]
    fn stop_from_anywhere() {
        for state in [
            PeerState::Idle,
            PeerState::Connecting,
            PeerState::Playing,
            PeerState::Stopped,
            PeerState::Error,
        ] {
            assert_eq!(state.next(&PeerInput::Stop), Some(PeerState::Stopped));
        }
    }

    // ---- fakes ----

    struct FakeTrack {
        stopped: AtomicBool,
    }

    impl MediaTrack for FakeTrack {
        fn stop(&self) {
            self.stopped.store(true, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct FakeConnection {
        detached: AtomicBool,
        closed: AtomicBool,
        closed_after_detach: AtomicBool,
        remote: Mutex<Option<SessionDescription>>,
    }

    #[async_trait]
    impl PeerConnection for FakeConnection {
        async fn create_offer(&self, options: OfferOptions) -> Result<SessionDescription, ClientError> {
            assert_eq!(options, OfferOptions::receive_only_video());
            Ok(SessionDescription::offer("v=0 recvonly"))
        }
        async fn set_local_description(&self, _d: SessionDescription) -> Result<(), ClientError> {
            Ok(())
        }
        async fn set_remote_description(&self, d: SessionDescription) -> Result<(), ClientError> {
            *self.remote.lock() = Some(d);
            Ok(())
        }
        fn detach(&self) {
            self.detached.store(true, Ordering::SeqCst);
        }
        fn close(&self) {
            let detached = self.detached.load(Ordering::SeqCst);
            self.closed_after_detach.store(detached, Ordering::SeqCst);
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct FakeConnector {
        created: Mutex<Vec<(Arc<FakeConnection>, mpsc::UnboundedSender<PeerConnectionEvent>)>>,
    }

    impl FakeConnector {
        fn count(&self) -> usize {
            self.created.lock().len()
        }
        fn last(&self) -> (Arc<FakeConnection>, mpsc::UnboundedSender<PeerConnectionEvent>) {
            self.created.lock().last().cloned().unwrap()
        }
    }

    impl PeerConnector for FakeConnector {
        fn create(
            &self,
            _config: &PeerConfig,
        ) -> Result<(Arc<dyn PeerConnection>, mpsc::UnboundedReceiver<PeerConnectionEvent>), ClientError> {
            let connection = Arc::new(FakeConnection::default());
            let (tx, rx) = mpsc::unbounded_channel();
            self.created.lock().push((connection.clone(), tx));
            Ok((connection, rx))
        }
    }

    /// Answers immediately unless `hold` is set, in which case it waits for `release`.
    #[derive(Default)]
    struct FakeSignaling {
        hold: bool,
        fail: bool,
        release: Notify,
        offers: AtomicUsize,
        candidates: AtomicUsize,
    }

    #[async_trait]
    impl SignalingClient for FakeSignaling {
        async fn exchange_offer(
            &self,
            _camera_id: &str,
            _offer: &SessionDescription,
        ) -> Result<SessionDescription, ClientError> {
            self.offers.fetch_add(1, Ordering::SeqCst);
            if self.hold {
                self.release.notified().await;
            }
            if self.fail {
                return Err(ClientError::Status {
                    status: 502,
                    message: "media source down".into(),
                });
            }
            Ok(SessionDescription::answer("v=0 answer"))
        }
        async fn send_ice_candidate(&self, _camera_id: &str, _c: &IceCandidate) -> Result<(), ClientError> {
            self.candidates.fetch_add(1, Ordering::SeqCst);
            Err(ClientError::Socket("dropped".into()))
        }
    }

    fn session(signaling: Arc<FakeSignaling>) -> (PeerSession, Arc<FakeConnector>) {
        let connector = Arc::new(FakeConnector::default());
        let session = PeerSession::spawn("cam-1", connector.clone(), signaling, PeerConfig::default());
        (session, connector)
    }

    async fn wait_state(session: &PeerSession, state: PeerState) -> PeerSnapshot {
        let mut rx = session.subscribe();
        let snap = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| s.state == state))
            .await
            .expect("timed out waiting for state")
            .expect("session ended")
            .clone();
        snap
    }

    fn track() -> Arc<FakeTrack> {
        Arc::new(FakeTrack {
            stopped: AtomicBool::new(false),
        })
    }

    // ---- session behaviour ----

    #[tokio::test]
    async fn start_negotiates_and_plays() {
        let (session, connector) = session(Arc::new(FakeSignaling::default()));
        session.start().await.unwrap();

        assert_eq!(session.snapshot().state, PeerState::Playing);
        let (connection, _) = connector.last();
        assert_eq!(
            connection.remote.lock().clone(),
            Some(SessionDescription::answer("v=0 answer"))
        );
    }

    #[tokio::test]
    async fn second_start_while_connecting_is_a_noop() {
        let signaling = Arc::new(FakeSignaling {
            hold: true,
            ..Default::default()
        });
        let (session, connector) = session(signaling.clone());
        let session = Arc::new(session);

        let first = tokio::spawn({
            let session = session.clone();
            async move { session.start().await }
        });
        wait_state(&session, PeerState::Connecting).await;
        session.start().await.unwrap();

        signaling.release.notify_one();
        first.await.unwrap().unwrap();
        assert_eq!(connector.count(), 1);
        assert_eq!(signaling.offers.load(Ordering::SeqCst), 1);

        session.start().await.unwrap();
        assert_eq!(connector.count(), 1, "already playing");
    }

    #[tokio::test]
    async fn failure_while_connecting_tears_down_in_the_same_transition() {
        let signaling = Arc::new(FakeSignaling {
            hold: true,
            ..Default::default()
        });
        let (session, connector) = session(signaling);
        let session = Arc::new(session);
        let start = tokio::spawn({
            let session = session.clone();
            async move { session.start().await }
        });
        wait_state(&session, PeerState::Connecting).await;

        let (connection, events) = connector.last();
        let video = track();
        events
            .send(PeerConnectionEvent::Track(MediaStream::new(vec![video.clone()])))
            .unwrap();
        events
            .send(PeerConnectionEvent::StateChange(TransportState::Failed))
            .unwrap();

        let snap = wait_state(&session, PeerState::Error).await;
        assert_eq!(snap.error.as_deref(), Some("Connection lost"));
        assert!(session.video_sink().is_empty());
        assert!(video.stopped.load(Ordering::SeqCst));
        assert!(connection.closed.load(Ordering::SeqCst));
        assert!(connection.closed_after_detach.load(Ordering::SeqCst));

        let err = start.await.unwrap().unwrap_err();
        assert!(matches!(err, ClientError::TransportFailure(_)));

        // Late event from the torn-down connection has nowhere to go.
        assert!(events
            .send(PeerConnectionEvent::StateChange(TransportState::Connected))
            .is_err());
        assert_eq!(session.snapshot().state, PeerState::Error);
    }

    #[tokio::test]
    async fn stop_while_connecting_cancels_negotiation() {
        let signaling = Arc::new(FakeSignaling {
            hold: true,
            ..Default::default()
        });
        let (session, connector) = session(signaling.clone());
        let session = Arc::new(session);
        let start = tokio::spawn({
            let session = session.clone();
            async move { session.start().await }
        });
        wait_state(&session, PeerState::Connecting).await;

        session.stop();
        wait_state(&session, PeerState::Stopped).await;
        assert!(matches!(start.await.unwrap(), Err(ClientError::Cancelled)));

        // The answer arriving now is ignored.
        signaling.release.notify_one();
        tokio::task::yield_now().await;
        let (connection, _) = connector.last();
        assert!(connection.closed.load(Ordering::SeqCst));
        assert!(connection.remote.lock().is_none());
        assert_eq!(session.snapshot().state, PeerState::Stopped);
    }

    #[tokio::test]
    async fn stop_from_idle_and_playing_clears_sink() {
        let (session, connector) = session(Arc::new(FakeSignaling::default()));
        session.stop();
        assert!(wait_state(&session, PeerState::Stopped).await.error.is_none());

        session.start().await.unwrap();
        let (_, events) = connector.last();
        let video = track();
        events
            .send(PeerConnectionEvent::Track(MediaStream::new(vec![video.clone()])))
            .unwrap();
        let mut rx = session.subscribe();
        // Track attachment is not a state change; poll the sink.
        for _ in 0..100 {
            if !session.video_sink().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(!session.video_sink().is_empty());

        session.stop();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| s.state == PeerState::Stopped))
            .await
            .unwrap()
            .unwrap();
        assert!(session.video_sink().is_empty());
        assert!(video.stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn start_error_is_recorded_and_returned_then_retry_works() {
        let signaling = Arc::new(FakeSignaling {
            fail: true,
            ..Default::default()
        });
        let (session, connector) = session(signaling);
        let err = session.start().await.unwrap_err();
        assert_eq!(err.status(), Some(502));

        let snap = session.snapshot();
        assert_eq!(snap.state, PeerState::Error);
        assert!(snap.error.unwrap().contains("media source down"));
        assert!(connector.last().0.closed.load(Ordering::SeqCst));

        // Retry from a clean error state starts a fresh negotiation.
        let _ = session.start().await;
        assert_eq!(connector.count(), 2);
    }

    #[tokio::test]
    async fn ice_send_failure_does_not_abort_negotiation() {
        let signaling = Arc::new(FakeSignaling {
            hold: true,
            ..Default::default()
        });
        let (session, connector) = session(signaling.clone());
        let session = Arc::new(session);
        let start = tokio::spawn({
            let session = session.clone();
            async move { session.start().await }
        });
        wait_state(&session, PeerState::Connecting).await;
        let (_, events) = connector.last();
        for i in 0..3 {
            events
                .send(PeerConnectionEvent::IceCandidate(IceCandidate {
                    candidate: format!("candidate:{i}"),
                    sdp_mid: Some("0".into()),
                    sdp_mline_index: Some(0),
                    username_fragment: None,
                }))
                .unwrap();
        }
        for _ in 0..100 {
            if signaling.candidates.load(Ordering::SeqCst) == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(signaling.candidates.load(Ordering::SeqCst), 3);

        signaling.release.notify_one();
        start.await.unwrap().unwrap();
        assert_eq!(session.snapshot().state, PeerState::Playing);
    }

    #[tokio::test]
    async fn dropping_the_handle_while_connecting_releases_everything() {
        let signaling = Arc::new(FakeSignaling {
            hold: true,
            ..Default::default()
        });
        let (session, connector) = session(signaling);
        // Fire start without awaiting its reply.
        let (reply, _rx) = oneshot::channel();
        session.commands.send(Command::Start(reply)).unwrap();
        wait_state(&session, PeerState::Connecting).await;
        let (connection, _) = connector.last();

        drop(session);
        for _ in 0..100 {
            if connection.closed.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(connection.detached.load(Ordering::SeqCst));
        assert!(connection.closed.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn negotiation_times_out() {
        let signaling = Arc::new(FakeSignaling {
            hold: true,
            ..Default::default()
        });
        let (session, _) = session(signaling);
        let err = session.start().await.unwrap_err();
        assert!(matches!(err, ClientError::NegotiationTimeout));
        let snap = session.snapshot();
        assert_eq!(snap.state, PeerState::Error);
        assert_eq!(snap.error.as_deref(), Some("Negotiation timed out"));
    }
}
