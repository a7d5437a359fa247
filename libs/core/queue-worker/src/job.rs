//! Job records, status, options, and backoff policies.

use crate::error::QueueError;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use std::time::Duration;
use uuid::Uuid;

/// Upper bound on a single retry delay.
const MAX_RETRY_DELAY_MS: u64 = 5 * 60 * 1000;

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Enqueued, not yet picked up by a worker.
    Waiting,
    /// Currently being processed.
    Active,
    /// Handler finished without error.
    Completed,
    /// Retry budget exhausted (or permanent error); needs operator retry.
    Failed,
    /// A worker died mid-processing; the entry was claimed back.
    Stalled,
    /// Scheduled for a future run (initial delay or retry backoff).
    Delayed,
    /// Held back because the queue is paused.
    Paused,
}

/// Backoff policy between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackoffPolicy {
    /// Constant delay between attempts.
    Fixed { delay_ms: u64 },
    /// Delay doubles with each attempt: `delay_ms * 2^(attempt-1)`.
    Exponential { delay_ms: u64 },
}

impl BackoffPolicy {
    /// Delay before the next run after `attempt` attempts have been made
    /// (1-based: after the first failure pass `1`).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let ms = match self {
            BackoffPolicy::Fixed { delay_ms } => *delay_ms,
            BackoffPolicy::Exponential { delay_ms } => {
                delay_ms.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
            }
        };
        Duration::from_millis(ms.min(MAX_RETRY_DELAY_MS))
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy::Exponential { delay_ms: 1000 }
    }
}

/// Per-queue default job options.
#[derive(Debug, Clone, Copy)]
pub struct JobDefaults {
    /// Maximum attempts before a job is marked failed.
    pub attempts: u32,
    /// Backoff policy applied between retries.
    pub backoff: BackoffPolicy,
}

impl Default for JobDefaults {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Per-job overrides supplied by the enqueuing caller.
#[derive(Debug, Clone, Default)]
pub struct JobOptions {
    /// Initial delay before the job becomes runnable.
    pub delay_ms: Option<u64>,
    /// Override of the queue's default attempt limit.
    pub attempts: Option<u32>,
    /// Override of the queue's default backoff policy.
    pub backoff: Option<BackoffPolicy>,
    /// Best-effort scheduling hint; higher runs earlier among delayed jobs.
    pub priority: Option<i32>,
}

impl JobOptions {
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_ms = Some(delay.as_millis() as u64);
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = Some(backoff);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// A durable unit of asynchronous work.
///
/// The full record is serialized into the stream entry; mutable state
/// (status, attempts, progress) is tracked authoritatively in the per-job
/// metadata hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier.
    pub id: Uuid,
    /// Owning queue name.
    pub queue: String,
    /// Kind discriminator routed through the handler registry
    /// (e.g. "post:liked").
    pub kind: String,
    /// Opaque structured payload; handlers deserialize to their own types.
    pub payload: serde_json::Value,
    /// Attempts made so far.
    pub attempts: u32,
    /// Attempt limit before the job is marked failed.
    pub max_attempts: u32,
    /// Backoff policy between retries.
    pub backoff: BackoffPolicy,
    /// Scheduling hint carried from `JobOptions`.
    pub priority: i32,
    /// Completion percentage reported by the handler (0-100).
    pub progress: u8,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// When the job was enqueued.
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Build a new job from queue defaults and caller options.
    pub fn new(
        queue: impl Into<String>,
        kind: impl Into<String>,
        payload: serde_json::Value,
        defaults: &JobDefaults,
        options: &JobOptions,
    ) -> Self {
        let status = if options.delay_ms.unwrap_or(0) > 0 {
            JobStatus::Delayed
        } else {
            JobStatus::Waiting
        };

        Self {
            id: Uuid::new_v4(),
            queue: queue.into(),
            kind: kind.into(),
            payload,
            attempts: 0,
            max_attempts: options.attempts.unwrap_or(defaults.attempts).max(1),
            backoff: options.backoff.unwrap_or(defaults.backoff),
            priority: options.priority.unwrap_or(0),
            progress: 0,
            status,
            created_at: Utc::now(),
        }
    }

    /// Deserialize the payload into a handler's typed payload struct.
    ///
    /// A mismatch is a permanent error; retrying cannot fix a malformed
    /// payload.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, QueueError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            QueueError::Serialization(format!(
                "invalid payload for job kind '{}': {}",
                self.kind, e
            ))
        })
    }
}

/// Point-in-time view of a job returned by status queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusView {
    pub status: JobStatus,
    pub progress: u8,
    pub attempts: u32,
    pub timestamp: DateTime<Utc>,
}

/// Per-status job counts for a queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub waiting: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
    pub delayed: u64,
    pub paused: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_status_serialization() {
        assert_eq!(JobStatus::Waiting.to_string(), "waiting");
        assert_eq!(JobStatus::Stalled.as_ref(), "stalled");
        let status: JobStatus = "delayed".parse().unwrap();
        assert_eq!(status, JobStatus::Delayed);
    }

    #[test]
    fn test_exponential_backoff_doubles() {
        let backoff = BackoffPolicy::Exponential { delay_ms: 1000 };
        assert_eq!(backoff.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(backoff.delay_for_attempt(2), Duration::from_millis(2000));
        assert_eq!(backoff.delay_for_attempt(3), Duration::from_millis(4000));
    }

    #[test]
    fn test_backoff_is_capped() {
        let backoff = BackoffPolicy::Exponential { delay_ms: 1000 };
        assert_eq!(
            backoff.delay_for_attempt(30),
            Duration::from_millis(MAX_RETRY_DELAY_MS)
        );
    }

    #[test]
    fn test_fixed_backoff() {
        let backoff = BackoffPolicy::Fixed { delay_ms: 250 };
        assert_eq!(backoff.delay_for_attempt(1), Duration::from_millis(250));
        assert_eq!(backoff.delay_for_attempt(5), Duration::from_millis(250));
    }

    #[test]
    fn test_job_new_applies_defaults_and_overrides() {
        let defaults = JobDefaults::default();

        let job = Job::new(
            "notifications",
            "post:liked",
            json!({"post_id": 1}),
            &defaults,
            &JobOptions::default(),
        );
        assert_eq!(job.max_attempts, 3);
        assert_eq!(job.status, JobStatus::Waiting);
        assert_eq!(job.attempts, 0);

        let job = Job::new(
            "notifications",
            "post:liked",
            json!({}),
            &defaults,
            &JobOptions::default()
                .with_attempts(5)
                .with_delay(Duration::from_secs(10)),
        );
        assert_eq!(job.max_attempts, 5);
        assert_eq!(job.status, JobStatus::Delayed);
    }

    #[test]
    fn test_payload_as_roundtrip() {
        #[derive(Deserialize)]
        struct Payload {
            post_id: i64,
        }

        let defaults = JobDefaults::default();
        let job = Job::new(
            "notifications",
            "post:liked",
            json!({"post_id": 42}),
            &defaults,
            &JobOptions::default(),
        );

        let payload: Payload = job.payload_as().unwrap();
        assert_eq!(payload.post_id, 42);

        #[derive(Debug, Deserialize)]
        struct Wrong {
            #[allow(dead_code)]
            missing_field: String,
        }
        let err = job.payload_as::<Wrong>().unwrap_err();
        assert!(matches!(err, QueueError::Serialization(_)));
    }

    #[test]
    fn test_job_serde_roundtrip() {
        let defaults = JobDefaults::default();
        let job = Job::new(
            "emails",
            "email:weekly:digest",
            json!({"employee_id": 7}),
            &defaults,
            &JobOptions::default(),
        );

        let encoded = serde_json::to_string(&job).unwrap();
        let decoded: Job = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.id, job.id);
        assert_eq!(decoded.kind, "email:weekly:digest");
        assert_eq!(decoded.payload, job.payload);
    }
}
