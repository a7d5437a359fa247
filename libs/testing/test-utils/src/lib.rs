//! Shared test utilities for the portal crates
//!
//! - `TestDatabase`: PostgreSQL container with migrations applied
//!   (feature: "postgres")
//! - `TestRedis`: Redis container (feature: "redis")
//! - `TestDataBuilder`: deterministic test data generation
//! - `assertions`: assertion helpers
//!
//! # Usage
//!
//! ```rust,ignore
//! use test_utils::{TestDatabase, TestDataBuilder};
//!
//! #[tokio::test]
//! async fn my_test() {
//!     let db = TestDatabase::new().await;
//!     let builder = TestDataBuilder::from_test_name("my_test");
//!     let recipient = builder.user_id();
//! }
//! ```

use uuid::Uuid;

#[cfg(feature = "postgres")]
mod postgres;

#[cfg(feature = "redis")]
mod redis;

#[cfg(feature = "postgres")]
pub use postgres::TestDatabase;

#[cfg(feature = "redis")]
pub use redis::TestRedis;

/// Builder for deterministic test data.
///
/// Seeding from the test name keeps tests reproducible while avoiding
/// collisions between tests sharing a database.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Create from a test name (seed = hash of the name).
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// Deterministic user id (the portal keys users by bigint).
    pub fn user_id(&self) -> i64 {
        (self.seed % (i64::MAX as u64)) as i64
    }

    /// A second user id distinct from `user_id()`.
    pub fn other_user_id(&self) -> i64 {
        self.user_id().wrapping_add(1)
    }

    /// Deterministic UUID derived from the seed.
    pub fn uuid(&self) -> Uuid {
        let bytes = self.seed.to_le_bytes();
        let mut uuid_bytes = [0u8; 16];
        uuid_bytes[..8].copy_from_slice(&bytes);
        uuid_bytes[8..16].copy_from_slice(&bytes);
        Uuid::from_bytes(uuid_bytes)
    }

    /// Unique name like `test-queue-12345-main`.
    pub fn name(&self, prefix: &str, suffix: &str) -> String {
        format!("test-{}-{}-{}", prefix, self.seed, suffix)
    }
}

/// Test assertion helpers
pub mod assertions {
    /// Assert that an optional value is Some, with context.
    pub fn assert_some<T>(value: Option<T>, context: &str) -> T {
        value.unwrap_or_else(|| panic!("{}: expected Some, got None", context))
    }
}
