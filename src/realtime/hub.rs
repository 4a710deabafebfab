//! Broadcast hub: registry of open event sockets and fan-out of push envelopes.

use std::fmt;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{Alert, CameraStats, Envelope, EventKind};

/// Opaque identity of one subscriber socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_simple())
    }
}

/// Frames a subscriber may have queued before it counts as stalled and is dropped.
pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 256;

/// Outbound queue of one socket; its writer task owns the receiving half.
pub type SubscriberSender = mpsc::Sender<String>;

/// Bounded queue for one subscriber socket.
pub fn subscriber_channel() -> (SubscriberSender, mpsc::Receiver<String>) {
    mpsc::channel(SUBSCRIBER_QUEUE_CAPACITY)
}

/// Process-wide set of subscriber sockets. Created once at startup and shared through `AppState`.
///
/// Delivery is a non-blocking `try_send` onto the subscriber's bounded queue. A socket whose queue
/// is full is treated like a closed one, so a stalled peer never holds up the broadcaster or the
/// other subscribers and never grows memory without limit.
#[derive(Default)]
pub struct BroadcastHub {
    subscribers: DashMap<ConnectionId, SubscriberSender>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber. Returns `false` if the id was already registered.
    pub fn register(&self, id: ConnectionId, sender: SubscriberSender) -> bool {
        let mut inserted = false;
        self.subscribers.entry(id).or_insert_with(|| {
            inserted = true;
            sender
        });
        if inserted {
            debug!(connection_id = %id, client_count = self.len(), "subscriber registered");
        }
        inserted
    }

    /// Remove a subscriber. No-op for unknown ids.
    pub fn unregister(&self, id: &ConnectionId) -> bool {
        let removed = self.subscribers.remove(id).is_some();
        if removed {
            debug!(connection_id = %id, client_count = self.len(), "subscriber unregistered");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.subscribers.contains_key(id)
    }

    /// Wrap `payload` in an envelope and deliver it to every open subscriber.
    ///
    /// Never fails: a closed or failing socket is logged, skipped and pruned after the pass.
    /// Returns how many subscribers accepted the message.
    pub fn broadcast(&self, event: &str, payload: impl Serialize) -> usize {
        let serialized = match Envelope::new(event, payload).and_then(|env| env.to_json()) {
            Ok(s) => s,
            Err(e) => {
                warn!(event = %event, error = %e, "failed to serialize broadcast payload");
                return 0;
            }
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        for entry in self.subscribers.iter() {
            let sender = entry.value();
            if sender.is_closed() {
                debug!(connection_id = %entry.key(), "skipping closed subscriber");
                dead.push(*entry.key());
                continue;
            }
            match sender.try_send(serialized.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(connection_id = %entry.key(), event = %event, "subscriber queue full, dropping");
                    dead.push(*entry.key());
                }
                Err(TrySendError::Closed(_)) => {
                    warn!(connection_id = %entry.key(), event = %event, "failed to deliver broadcast");
                    dead.push(*entry.key());
                }
            }
        }

        for id in &dead {
            self.unregister(id);
        }

        info!(event = %event, delivered, pruned = dead.len(), "broadcast");
        delivered
    }

    pub fn broadcast_alert(&self, alert: &Alert) -> usize {
        self.broadcast(EventKind::Alert.as_str(), alert)
    }

    pub fn broadcast_camera_stats(&self, stats: &CameraStats) -> usize {
        self.broadcast(EventKind::CameraStats.as_str(), stats)
    }
}

/// Send one envelope to a single subscriber queue (used for the connect-time snapshot).
pub fn send_to(sender: &SubscriberSender, event: EventKind, payload: impl Serialize) -> bool {
    let serialized = match Envelope::new(event.as_str(), payload).and_then(|env| env.to_json()) {
        Ok(s) => s,
        Err(e) => {
            warn!(event = %event, error = %e, "failed to serialize event");
            return false;
        }
    };
    sender.try_send(serialized).is_ok()
}
