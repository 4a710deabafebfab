//! Viewer-side error type.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response from the API, with the server's `error` message.
    #[error("{message} ({status})")]
    Status { status: u16, message: String },

    #[error("Negotiation timed out")]
    NegotiationTimeout,

    /// Peer connection dropped after being established.
    #[error("{0}")]
    TransportFailure(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Socket error: {0}")]
    Socket(String),

    #[error("Session closed")]
    Closed,
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
