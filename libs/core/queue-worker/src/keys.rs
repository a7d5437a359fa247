//! Redis key layout for a queue.
//!
//! Per queue `q`:
//! - `q:jobs`: the stream of runnable work tickets
//! - `q:workers`: the consumer group
//! - `q:job:{id}`: per-job metadata hash (authoritative mutable state)
//! - `q:delayed`: zset of job ids scored by ready-at millis
//! - `q:completed` / `q:failed`: zsets of finished job ids scored by
//!   finish time (retention cleanup + operator retry)
//! - `q:paused`: pause flag

use uuid::Uuid;

/// Key builder for one queue's Redis structures.
#[derive(Debug, Clone)]
pub struct QueueKeys {
    queue: String,
}

impl QueueKeys {
    pub fn new(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn stream(&self) -> String {
        format!("{}:jobs", self.queue)
    }

    pub fn group(&self) -> String {
        format!("{}:workers", self.queue)
    }

    pub fn job(&self, id: Uuid) -> String {
        format!("{}:job:{}", self.queue, id)
    }

    pub fn delayed(&self) -> String {
        format!("{}:delayed", self.queue)
    }

    pub fn completed(&self) -> String {
        format!("{}:completed", self.queue)
    }

    pub fn failed(&self) -> String {
        format!("{}:failed", self.queue)
    }

    pub fn paused(&self) -> String {
        format!("{}:paused", self.queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let keys = QueueKeys::new("notifications");
        assert_eq!(keys.stream(), "notifications:jobs");
        assert_eq!(keys.group(), "notifications:workers");
        assert_eq!(keys.delayed(), "notifications:delayed");
        assert_eq!(keys.completed(), "notifications:completed");
        assert_eq!(keys.failed(), "notifications:failed");
        assert_eq!(keys.paused(), "notifications:paused");

        let id = Uuid::nil();
        assert_eq!(
            keys.job(id),
            format!("notifications:job:{}", Uuid::nil())
        );
    }
}
