//! Viewer side: per-tile peer sessions and the dashboard alert channel.

pub mod alerts;
pub mod api;
pub mod error;
pub mod peer;
pub mod socket;

pub use alerts::{
    AlertBook, AlertChannel, AlertChannelConfig, AlertChannelState, AlertSnapshotSource,
    ConnectionStatus, MAX_ALERTS_PER_CAMERA,
};
pub use api::ApiClient;
pub use error::ClientError;
pub use peer::{
    MediaStream, MediaTrack, OfferOptions, PeerConfig, PeerConnection, PeerConnectionEvent,
    PeerConnector, PeerInput, PeerSession, PeerSnapshot, PeerState, SignalingClient,
    TransportState, VideoSink,
};
pub use socket::{EventSocket, SocketConnector, SocketEvent, WsConnector};
