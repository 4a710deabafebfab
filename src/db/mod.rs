//! Database layer: pool and Postgres adapters for the registry ports.

mod pool;
mod repositories;

pub use pool::{create_pool, DbPool};
pub use repositories::PgStore;
