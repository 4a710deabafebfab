//! Server-side realtime fan-out.

pub mod hub;

pub use hub::{subscriber_channel, BroadcastHub, ConnectionId, SubscriberSender, SUBSCRIBER_QUEUE_CAPACITY};
