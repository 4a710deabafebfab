//! HTTP, signaling and WebSocket request handlers.

pub mod http;
pub mod signaling;
pub mod ws;

pub use http::*;
pub use signaling::*;
pub use ws::*;
