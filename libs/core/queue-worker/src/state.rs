//! Per-job metadata store and queue-level accounting.
//!
//! The stream carries work tickets; this store owns the authoritative
//! mutable state of each job (status, attempts, progress) in a per-job
//! hash, plus the delayed/completed/failed indexes and the pause flag.

use crate::error::QueueError;
use crate::job::{BackoffPolicy, Job, JobStatus, JobStatusView, QueueStats};
use crate::keys::QueueKeys;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// Job metadata store for one queue.
#[derive(Clone)]
pub struct JobStateStore {
    redis: ConnectionManager,
    keys: QueueKeys,
}

impl JobStateStore {
    pub fn new(redis: ConnectionManager, keys: QueueKeys) -> Self {
        Self { redis, keys }
    }

    pub fn queue(&self) -> &str {
        self.keys.queue()
    }

    /// Write the metadata hash for a newly enqueued job.
    pub async fn record(&self, job: &Job) -> Result<(), QueueError> {
        let mut conn = self.redis.clone();

        let fields: Vec<(&str, String)> = vec![
            ("kind", job.kind.clone()),
            ("payload", serde_json::to_string(&job.payload)?),
            ("status", job.status.to_string()),
            ("attempts", job.attempts.to_string()),
            ("max_attempts", job.max_attempts.to_string()),
            ("backoff", serde_json::to_string(&job.backoff)?),
            ("priority", job.priority.to_string()),
            ("progress", job.progress.to_string()),
            ("created_at", job.created_at.to_rfc3339()),
        ];

        let _: () = conn.hset_multiple(self.keys.job(job.id), &fields).await?;
        Ok(())
    }

    /// Schedule a job to become runnable at `ready_at_ms` (epoch millis).
    pub async fn schedule_delayed(&self, id: Uuid, ready_at_ms: i64) -> Result<(), QueueError> {
        let mut conn = self.redis.clone();
        let _: () = conn
            .hset(self.keys.job(id), "status", JobStatus::Delayed.to_string())
            .await?;
        let _: () = conn
            .zadd(self.keys.delayed(), id.to_string(), ready_at_ms)
            .await?;
        Ok(())
    }

    /// Mark a job active and bump its attempt counter.
    ///
    /// Returns the attempt number now in flight (1-based).
    pub async fn mark_active(&self, id: Uuid) -> Result<u32, QueueError> {
        let mut conn = self.redis.clone();
        let key = self.keys.job(id);
        let attempts: i64 = conn.hincr(&key, "attempts", 1).await?;
        let _: () = conn
            .hset(&key, "status", JobStatus::Active.to_string())
            .await?;
        Ok(attempts.max(0) as u32)
    }

    pub async fn mark_completed(&self, id: Uuid) -> Result<(), QueueError> {
        self.finish(id, JobStatus::Completed, None).await
    }

    pub async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), QueueError> {
        self.finish(id, JobStatus::Failed, Some(error)).await
    }

    async fn finish(
        &self,
        id: Uuid,
        status: JobStatus,
        error: Option<&str>,
    ) -> Result<(), QueueError> {
        let mut conn = self.redis.clone();
        let key = self.keys.job(id);
        let now_ms = Utc::now().timestamp_millis();

        let mut fields: Vec<(&str, String)> = vec![
            ("status", status.to_string()),
            ("finished_at", now_ms.to_string()),
        ];
        if let Some(error) = error {
            fields.push(("error", error.to_string()));
        }

        let _: () = conn.hset_multiple(&key, &fields).await?;

        let index = match status {
            JobStatus::Completed => self.keys.completed(),
            JobStatus::Failed => self.keys.failed(),
            _ => return Ok(()),
        };
        let _: () = conn.zadd(index, id.to_string(), now_ms).await?;
        Ok(())
    }

    /// Mark a claimed entry's job as stalled (a worker died mid-processing).
    pub async fn mark_stalled(&self, id: Uuid) -> Result<(), QueueError> {
        let mut conn = self.redis.clone();
        let _: () = conn
            .hset(self.keys.job(id), "status", JobStatus::Stalled.to_string())
            .await?;
        Ok(())
    }

    /// Schedule a retry after a failed attempt.
    pub async fn schedule_retry(&self, id: Uuid, ready_at_ms: i64) -> Result<(), QueueError> {
        self.schedule_delayed(id, ready_at_ms).await
    }

    /// Load jobs whose delay has elapsed, highest priority first.
    pub async fn due_jobs(&self, limit: usize) -> Result<Vec<Job>, QueueError> {
        let mut conn = self.redis.clone();
        let now_ms = Utc::now().timestamp_millis();

        let ids: Vec<String> = conn
            .zrangebyscore_limit(self.keys.delayed(), 0, now_ms, 0, limit as isize)
            .await?;

        let mut jobs = Vec::with_capacity(ids.len());
        for raw in ids {
            let Ok(id) = raw.parse::<Uuid>() else {
                // Dangling index entry; drop it
                let _: () = conn.zrem(self.keys.delayed(), &raw).await?;
                continue;
            };
            if let Some(job) = self.load(id).await? {
                jobs.push(job);
            } else {
                let _: () = conn.zrem(self.keys.delayed(), &raw).await?;
            }
        }

        jobs.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(jobs)
    }

    /// Remove a promoted job from the delayed index and mark it waiting.
    pub async fn clear_delayed(&self, id: Uuid) -> Result<(), QueueError> {
        let mut conn = self.redis.clone();
        let _: () = conn.zrem(self.keys.delayed(), id.to_string()).await?;
        let _: () = conn
            .hset(self.keys.job(id), "status", JobStatus::Waiting.to_string())
            .await?;
        Ok(())
    }

    /// Reconstruct a job record from its metadata hash.
    pub async fn load(&self, id: Uuid) -> Result<Option<Job>, QueueError> {
        let mut conn = self.redis.clone();
        let map: HashMap<String, String> = conn.hgetall(self.keys.job(id)).await?;

        if map.is_empty() {
            return Ok(None);
        }

        Ok(Some(self.job_from_hash(id, &map)?))
    }

    fn job_from_hash(&self, id: Uuid, map: &HashMap<String, String>) -> Result<Job, QueueError> {
        let field = |name: &str| -> Result<&String, QueueError> {
            map.get(name).ok_or_else(|| {
                QueueError::Serialization(format!(
                    "job hash for {} missing field '{}'",
                    id, name
                ))
            })
        };

        let payload: serde_json::Value = serde_json::from_str(field("payload")?)?;
        let backoff: BackoffPolicy = serde_json::from_str(field("backoff")?)?;
        let status: JobStatus = field("status")?
            .parse()
            .map_err(|_| QueueError::Serialization(format!("invalid status for job {}", id)))?;
        let created_at = DateTime::parse_from_rfc3339(field("created_at")?)
            .map_err(|e| QueueError::Serialization(format!("invalid created_at: {}", e)))?
            .with_timezone(&Utc);

        Ok(Job {
            id,
            queue: self.keys.queue().to_string(),
            kind: field("kind")?.clone(),
            payload,
            attempts: field("attempts")?.parse().unwrap_or(0),
            max_attempts: field("max_attempts")?.parse().unwrap_or(1),
            backoff,
            priority: map.get("priority").and_then(|p| p.parse().ok()).unwrap_or(0),
            progress: map.get("progress").and_then(|p| p.parse().ok()).unwrap_or(0),
            status,
            created_at,
        })
    }

    /// Point-in-time status view; `None` when the job is unknown.
    pub async fn status_view(&self, id: Uuid) -> Result<Option<JobStatusView>, QueueError> {
        let Some(job) = self.load(id).await? else {
            return Ok(None);
        };

        Ok(Some(JobStatusView {
            status: job.status,
            progress: job.progress,
            attempts: job.attempts,
            timestamp: job.created_at,
        }))
    }

    /// Update the handler-reported progress of a job.
    pub async fn set_progress(&self, id: Uuid, progress: u8) -> Result<(), QueueError> {
        let mut conn = self.redis.clone();
        let key = self.keys.job(id);

        let exists: bool = conn.exists(&key).await?;
        if !exists {
            return Err(QueueError::JobNotFound {
                queue: self.keys.queue().to_string(),
                id,
            });
        }

        let _: () = conn
            .hset(&key, "progress", progress.min(100).to_string())
            .await?;
        Ok(())
    }

    /// Per-status counts for the queue.
    ///
    /// Waiting/active come from the consumer group (`lag`/`pending`);
    /// completed/failed/delayed from the index zsets. While the queue is
    /// paused the waiting backlog is reported under `paused`, matching the
    /// status the jobs are effectively in.
    pub async fn stats(&self) -> Result<QueueStats, QueueError> {
        let mut conn = self.redis.clone();

        let (waiting, active) = self.group_counts(&mut conn).await?;
        let completed: u64 = conn.zcard(self.keys.completed()).await.unwrap_or(0);
        let failed: u64 = conn.zcard(self.keys.failed()).await.unwrap_or(0);
        let delayed: u64 = conn.zcard(self.keys.delayed()).await.unwrap_or(0);

        let mut stats = QueueStats {
            waiting,
            active,
            completed,
            failed,
            delayed,
            paused: 0,
        };

        if self.is_paused().await? {
            stats.paused = stats.waiting;
            stats.waiting = 0;
        }

        Ok(stats)
    }

    /// Extract (lag, pending) for our consumer group from XINFO GROUPS.
    async fn group_counts(&self, conn: &mut ConnectionManager) -> Result<(u64, u64), QueueError> {
        let result: redis::RedisResult<redis::Value> = redis::cmd("XINFO")
            .arg("GROUPS")
            .arg(self.keys.stream())
            .query_async(conn)
            .await;

        let value = match result {
            Ok(v) => v,
            // Stream doesn't exist yet (nothing enqueued)
            Err(e) if e.to_string().contains("no such key") => return Ok((0, 0)),
            Err(e) => return Err(QueueError::Redis(e)),
        };

        let group_name = self.keys.group();
        let redis::Value::Array(groups) = value else {
            return Ok((0, 0));
        };

        for group in &groups {
            let pairs = value_pairs(group);
            let name = pairs.get("name").cloned().unwrap_or_default();
            if name != group_name {
                continue;
            }
            let lag = pairs.get("lag").and_then(|v| v.parse().ok()).unwrap_or(0);
            let pending = pairs
                .get("pending")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            return Ok((lag, pending));
        }

        Ok((0, 0))
    }

    pub async fn pause(&self) -> Result<(), QueueError> {
        let mut conn = self.redis.clone();
        let _: () = conn.set(self.keys.paused(), "1").await?;
        Ok(())
    }

    pub async fn resume(&self) -> Result<(), QueueError> {
        let mut conn = self.redis.clone();
        let _: () = conn.del(self.keys.paused()).await?;
        Ok(())
    }

    pub async fn is_paused(&self) -> Result<bool, QueueError> {
        let mut conn = self.redis.clone();
        let paused: bool = conn.exists(self.keys.paused()).await?;
        Ok(paused)
    }

    /// Delete completed/failed job records finished before `cutoff_ms`.
    ///
    /// Waiting, active, and delayed jobs are never touched. Returns the
    /// number of removed records.
    pub async fn clean_finished_before(&self, cutoff_ms: i64) -> Result<u64, QueueError> {
        let mut removed = 0u64;

        for index in [self.keys.completed(), self.keys.failed()] {
            let mut conn = self.redis.clone();
            let ids: Vec<String> = conn.zrangebyscore(&index, 0, cutoff_ms).await?;

            for raw in ids {
                if let Ok(id) = raw.parse::<Uuid>() {
                    let _: () = conn.del(self.keys.job(id)).await?;
                }
                let _: () = conn.zrem(&index, &raw).await?;
                removed += 1;
            }
        }

        debug!(queue = %self.keys.queue(), removed, "Cleaned old job records");
        Ok(removed)
    }

    /// Ids of all jobs currently in the failed set, oldest first.
    pub async fn failed_job_ids(&self) -> Result<Vec<Uuid>, QueueError> {
        let mut conn = self.redis.clone();
        let ids: Vec<String> = conn.zrange(self.keys.failed(), 0, -1).await?;
        Ok(ids.into_iter().filter_map(|s| s.parse().ok()).collect())
    }

    /// Reset a failed job's attempt accounting for an operator retry.
    ///
    /// Returns the refreshed job record ready for re-enqueue, or `None`
    /// if the record no longer exists.
    pub async fn reset_for_retry(&self, id: Uuid) -> Result<Option<Job>, QueueError> {
        let mut conn = self.redis.clone();
        let key = self.keys.job(id);

        let Some(mut job) = self.load(id).await? else {
            return Ok(None);
        };

        let fields: Vec<(&str, String)> = vec![
            ("attempts", "0".to_string()),
            ("status", JobStatus::Waiting.to_string()),
            ("progress", "0".to_string()),
        ];
        let _: () = conn.hset_multiple(&key, &fields).await?;
        let _: () = conn.hdel(&key, &["error", "finished_at"]).await?;
        let _: () = conn.zrem(self.keys.failed(), id.to_string()).await?;

        job.attempts = 0;
        job.status = JobStatus::Waiting;
        job.progress = 0;
        Ok(Some(job))
    }
}

/// Flatten a RESP map-or-pair-array into string key/values.
fn value_pairs(value: &redis::Value) -> HashMap<String, String> {
    let mut pairs = HashMap::new();

    let mut push = |k: &redis::Value, v: &redis::Value| {
        if let Some(key) = value_string(k)
            && let Some(val) = value_string(v)
        {
            pairs.insert(key, val);
        }
    };

    match value {
        redis::Value::Map(entries) => {
            for (k, v) in entries {
                push(k, v);
            }
        }
        redis::Value::Array(items) => {
            let mut iter = items.iter();
            while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
                push(k, v);
            }
        }
        _ => {}
    }

    pairs
}

fn value_string(value: &redis::Value) -> Option<String> {
    match value {
        redis::Value::BulkString(bytes) => Some(String::from_utf8_lossy(bytes).to_string()),
        redis::Value::SimpleString(s) => Some(s.clone()),
        redis::Value::Int(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_pairs_from_flat_array() {
        let value = redis::Value::Array(vec![
            redis::Value::BulkString(b"name".to_vec()),
            redis::Value::BulkString(b"notifications:workers".to_vec()),
            redis::Value::BulkString(b"pending".to_vec()),
            redis::Value::Int(3),
            redis::Value::BulkString(b"lag".to_vec()),
            redis::Value::Int(12),
        ]);

        let pairs = value_pairs(&value);
        assert_eq!(pairs.get("name").unwrap(), "notifications:workers");
        assert_eq!(pairs.get("pending").unwrap(), "3");
        assert_eq!(pairs.get("lag").unwrap(), "12");
    }

    #[test]
    fn test_value_pairs_from_map() {
        let value = redis::Value::Map(vec![(
            redis::Value::SimpleString("lag".to_string()),
            redis::Value::Int(5),
        )]);

        let pairs = value_pairs(&value);
        assert_eq!(pairs.get("lag").unwrap(), "5");
    }

    #[test]
    fn test_value_pairs_ignores_non_collections() {
        assert!(value_pairs(&redis::Value::Nil).is_empty());
        assert!(value_pairs(&redis::Value::Int(1)).is_empty());
    }
}
