//! Request authentication helpers shared by HTTP and socket handlers.

pub mod auth;

pub use auth::AuthUser;
