//! Redis connector and utilities
//!
//! Redis backs the durable job queues; this module provides connection
//! management and health checks.

mod connector;
mod health;

pub use connector::{connect, connect_with_retry};
pub use health::check_health;

// Re-export redis types for convenience
pub use redis::aio::ConnectionManager;
pub use redis::{AsyncCommands, Client, RedisResult};
