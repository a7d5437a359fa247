//! Redis test infrastructure
//!
//! Provides a `TestRedis` helper that creates a Redis container for testing.

use redis::aio::MultiplexedConnection;
use redis::Client;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::redis::Redis;

/// Test Redis wrapper that ensures proper cleanup
///
/// The container is stopped and removed when this struct is dropped.
pub struct TestRedis {
    #[allow(dead_code)]
    container: ContainerAsync<Redis>,
    connection: MultiplexedConnection,
    pub connection_string: String,
}

impl TestRedis {
    /// Create a new test Redis instance (Redis 8 Alpine).
    pub async fn new() -> Self {
        let redis_image = Redis::default().with_tag("8-alpine");

        let container = redis_image
            .start()
            .await
            .expect("Failed to start Redis container");

        let host_port = container
            .get_host_port_ipv4(6379)
            .await
            .expect("Failed to get Redis port");

        let connection_string = format!("redis://127.0.0.1:{}", host_port);

        let client =
            Client::open(connection_string.clone()).expect("Failed to create Redis client");

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .expect("Failed to connect to Redis");

        tracing::info!(port = host_port, "Test Redis ready (Redis 8-alpine)");

        Self {
            container,
            connection,
            connection_string,
        }
    }

    /// Get a cloned connection (useful for passing to services).
    pub fn connection(&self) -> MultiplexedConnection {
        self.connection.clone()
    }

    /// Build a `ConnectionManager` for components that require one.
    pub async fn connection_manager(&self) -> redis::aio::ConnectionManager {
        let client = Client::open(self.connection_string.clone())
            .expect("Failed to create Redis client");
        redis::aio::ConnectionManager::new(client)
            .await
            .expect("Failed to create Redis connection manager")
    }
}
