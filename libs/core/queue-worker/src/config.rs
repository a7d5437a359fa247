//! Worker configuration.

use uuid::Uuid;

/// Configuration for a queue worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Queue name this worker consumes.
    pub queue_name: String,

    /// Unique consumer ID within the consumer group.
    pub consumer_id: String,

    /// Batch size for reading stream entries.
    pub batch_size: usize,

    /// Poll interval in milliseconds when no messages are available.
    pub poll_interval_ms: u64,

    /// Blocking read timeout in milliseconds (None = non-blocking polling).
    pub block_timeout_ms: Option<u64>,

    /// Maximum concurrent jobs to process.
    pub max_concurrent_jobs: usize,

    /// Idle time in milliseconds before a pending entry owned by another
    /// consumer is considered stalled and claimed back.
    pub claim_idle_ms: u64,

    /// Batch size when promoting due delayed jobs.
    pub promote_batch: usize,

    /// Maximum stream length before approximate trimming.
    pub max_stream_length: i64,
}

impl WorkerConfig {
    pub fn new(queue_name: impl Into<String>) -> Self {
        Self {
            queue_name: queue_name.into(),
            consumer_id: format!("worker-{}", Uuid::new_v4()),
            batch_size: 10,
            // Non-blocking polling by default; more reliable with
            // ConnectionManager than XREADGROUP BLOCK.
            poll_interval_ms: 500,
            block_timeout_ms: None,
            max_concurrent_jobs: 1,
            claim_idle_ms: 30_000,
            promote_batch: 100,
            max_stream_length: 100_000,
        }
    }

    pub fn with_consumer_id(mut self, id: impl Into<String>) -> Self {
        self.consumer_id = id.into();
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_poll_interval_ms(mut self, interval: u64) -> Self {
        self.poll_interval_ms = interval;
        self
    }

    pub fn with_blocking(mut self, timeout_ms: Option<u64>) -> Self {
        self.block_timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_concurrent_jobs(mut self, count: usize) -> Self {
        self.max_concurrent_jobs = count.max(1);
        self
    }

    pub fn with_claim_idle_ms(mut self, idle_ms: u64) -> Self {
        self.claim_idle_ms = idle_ms;
        self
    }

    pub fn with_max_stream_length(mut self, max_length: i64) -> Self {
        self.max_stream_length = max_length;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::new("notifications");
        assert_eq!(config.queue_name, "notifications");
        assert!(config.consumer_id.starts_with("worker-"));
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.max_concurrent_jobs, 1);
        assert!(config.block_timeout_ms.is_none());
    }

    #[test]
    fn test_builder_pattern() {
        let config = WorkerConfig::new("emails")
            .with_consumer_id("worker-1")
            .with_batch_size(20)
            .with_max_concurrent_jobs(4)
            .with_blocking(Some(5000));

        assert_eq!(config.consumer_id, "worker-1");
        assert_eq!(config.batch_size, 20);
        assert_eq!(config.max_concurrent_jobs, 4);
        assert_eq!(config.block_timeout_ms, Some(5000));
    }

    #[test]
    fn test_concurrency_floor() {
        let config = WorkerConfig::new("emails").with_max_concurrent_jobs(0);
        assert_eq!(config.max_concurrent_jobs, 1);
    }
}
