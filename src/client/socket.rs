//! Dashboard event socket transport.

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

/// Lifecycle and data events surfaced by an [`EventSocket`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Opened,
    Message(String),
    Error(String),
    Closed,
}

/// One open (or opening) socket. Dropping it closes the connection and silences its events.
pub struct EventSocket {
    outgoing: mpsc::UnboundedSender<String>,
    incoming: mpsc::UnboundedReceiver<SocketEvent>,
    pump: Option<JoinHandle<()>>,
}

impl EventSocket {
    /// Assemble a socket from channel halves. `pump` is aborted on drop.
    pub fn new(
        outgoing: mpsc::UnboundedSender<String>,
        incoming: mpsc::UnboundedReceiver<SocketEvent>,
        pump: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            outgoing,
            incoming,
            pump,
        }
    }

    /// Queue a text frame. Returns false once the socket is gone.
    pub fn send(&self, text: impl Into<String>) -> bool {
        self.outgoing.send(text.into()).is_ok()
    }

    pub async fn recv(&mut self) -> Option<SocketEvent> {
        self.incoming.recv().await
    }
}

impl Drop for EventSocket {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

pub trait SocketConnector: Send + Sync {
    fn open(&self, url: &str) -> EventSocket;
}

/// tokio-tungstenite backed connector.
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

impl SocketConnector for WsConnector {
    fn open(&self, url: &str) -> EventSocket {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let pump = tokio::spawn(pump(url.to_string(), out_rx, in_tx));
        EventSocket::new(out_tx, in_rx, Some(pump))
    }
}

async fn pump(
    url: String,
    mut outgoing: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<SocketEvent>,
) {
    let stream = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((stream, _)) => stream,
        Err(e) => {
            debug!(error = %e, "socket connect failed");
            let _ = events.send(SocketEvent::Error(e.to_string()));
            let _ = events.send(SocketEvent::Closed);
            return;
        }
    };
    let _ = events.send(SocketEvent::Opened);
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            text = outgoing.recv() => match text {
                Some(text) => {
                    if let Err(e) = write.send(Message::Text(text.into())).await {
                        let _ = events.send(SocketEvent::Error(e.to_string()));
                        break;
                    }
                }
                None => {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
            },
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(SocketEvent::Message(text.to_string()));
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let _ = events.send(SocketEvent::Error(e.to_string()));
                    break;
                }
            },
        }
    }
    let _ = events.send(SocketEvent::Closed);
}
