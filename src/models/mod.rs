//! Data models for alerts, cameras, push events, and signaling.

pub mod alert;
pub mod camera;
pub mod event;
pub mod signaling;

pub use alert::*;
pub use camera::*;
pub use event::*;
pub use signaling::*;
