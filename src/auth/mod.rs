//! Authentication: bearer token verification.

mod jwt;

pub use jwt::{Claims, JwtSecret};
