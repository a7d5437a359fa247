//! Queue producer: durable enqueue into a queue's stream.
//!
//! Used by the `QueueManager` for initial enqueues, delayed-job promotion,
//! and operator-driven retries. `send` returns once Redis acknowledges the
//! XADD; callers do not wait for processing.

use crate::error::QueueError;
use crate::job::Job;
use crate::keys::QueueKeys;
use redis::aio::ConnectionManager;
use tracing::debug;

/// Producer for one queue's stream.
#[derive(Clone)]
pub struct QueueProducer {
    redis: ConnectionManager,
    keys: QueueKeys,
    max_length: i64,
}

impl QueueProducer {
    pub fn new(redis: ConnectionManager, keys: QueueKeys) -> Self {
        Self {
            redis,
            keys,
            max_length: 100_000,
        }
    }

    /// Set the maximum stream length (trimmed approximately with MAXLEN ~).
    pub fn with_max_length(mut self, max_length: i64) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn queue(&self) -> &str {
        self.keys.queue()
    }

    /// Append a work ticket for the job to the stream.
    ///
    /// Returns the Redis stream entry id.
    pub async fn send(&self, job: &Job) -> Result<String, QueueError> {
        let mut conn = self.redis.clone();
        let job_json = serde_json::to_string(job)?;

        let entry_id: String = redis::cmd("XADD")
            .arg(self.keys.stream())
            .arg("MAXLEN")
            .arg("~")
            .arg(self.max_length)
            .arg("*")
            .arg("job")
            .arg(&job_json)
            .query_async(&mut conn)
            .await?;

        debug!(
            queue = %self.keys.queue(),
            job_id = %job.id,
            kind = %job.kind,
            entry_id = %entry_id,
            "Enqueued job"
        );

        Ok(entry_id)
    }

    /// Append multiple jobs in one pipeline.
    pub async fn send_batch(&self, jobs: &[Job]) -> Result<Vec<String>, QueueError> {
        if jobs.is_empty() {
            return Ok(vec![]);
        }

        let mut conn = self.redis.clone();
        let mut pipe = redis::pipe();

        for job in jobs {
            let job_json = serde_json::to_string(job)?;
            pipe.cmd("XADD")
                .arg(self.keys.stream())
                .arg("MAXLEN")
                .arg("~")
                .arg(self.max_length)
                .arg("*")
                .arg("job")
                .arg(&job_json);
        }

        let entry_ids: Vec<String> = pipe.query_async(&mut conn).await?;

        debug!(
            queue = %self.keys.queue(),
            count = entry_ids.len(),
            "Enqueued batch of jobs"
        );

        Ok(entry_ids)
    }

    /// Current stream length.
    pub async fn stream_length(&self) -> Result<i64, QueueError> {
        use redis::AsyncCommands;
        let mut conn = self.redis.clone();
        let len: i64 = conn.xlen(self.keys.stream()).await?;
        Ok(len)
    }
}
