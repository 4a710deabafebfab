//! Business logic: alert ingest/query and camera status events.

pub mod alerts;
pub mod cameras;

pub use alerts::AlertService;
pub use cameras::CameraService;
