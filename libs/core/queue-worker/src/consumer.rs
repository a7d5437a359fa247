//! Queue consumer: reads work tickets from a queue's stream via a
//! consumer group.
//!
//! The consumer group gives at-most-one concurrent execution per stream
//! entry; abandoned entries from dead consumers are claimed back with
//! XAUTOCLAIM.

use crate::config::WorkerConfig;
use crate::error::QueueError;
use crate::job::Job;
use crate::keys::QueueKeys;
use redis::aio::ConnectionManager;
use redis::RedisResult;
use tracing::{debug, info, warn};

/// A job read from the stream together with its entry id.
#[derive(Debug, Clone)]
pub struct DeliveredJob {
    /// Redis stream entry id (e.g. "1234567890123-0").
    pub entry_id: String,
    /// The deserialized job record.
    pub job: Job,
    /// True when the entry was claimed back from another consumer.
    pub reclaimed: bool,
}

type StreamEntries = Vec<(String, Vec<(String, String)>)>;
type StreamReadReply = Vec<(String, StreamEntries)>;

/// Consumer for one queue's stream.
pub struct QueueConsumer {
    redis: ConnectionManager,
    keys: QueueKeys,
    config: WorkerConfig,
}

impl QueueConsumer {
    pub fn new(redis: ConnectionManager, keys: QueueKeys, config: WorkerConfig) -> Self {
        Self {
            redis,
            keys,
            config,
        }
    }

    pub fn consumer_id(&self) -> &str {
        &self.config.consumer_id
    }

    /// Create the consumer group if it does not exist yet.
    pub async fn ensure_group(&self) -> Result<(), QueueError> {
        let mut conn = self.redis.clone();

        let result: RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(self.keys.stream())
            .arg(self.keys.group())
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => {
                info!(
                    stream = %self.keys.stream(),
                    group = %self.keys.group(),
                    "Created consumer group"
                );
                Ok(())
            }
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!(
                    stream = %self.keys.stream(),
                    group = %self.keys.group(),
                    "Consumer group already exists"
                );
                Ok(())
            }
            Err(e) => Err(QueueError::Redis(e)),
        }
    }

    /// Read entries delivered to this consumer but not yet acknowledged.
    pub async fn read_pending(&self) -> Result<Vec<DeliveredJob>, QueueError> {
        self.read_group("0").await
    }

    /// Read entries never delivered to any consumer.
    pub async fn read_new(&self) -> Result<Vec<DeliveredJob>, QueueError> {
        self.read_group(">").await
    }

    async fn read_group(&self, cursor: &str) -> Result<Vec<DeliveredJob>, QueueError> {
        let mut conn = self.redis.clone();

        let mut cmd = redis::cmd("XREADGROUP");
        cmd.arg("GROUP")
            .arg(self.keys.group())
            .arg(&self.config.consumer_id);

        // BLOCK is only meaningful for new entries
        if cursor == ">"
            && let Some(timeout) = self.config.block_timeout_ms
        {
            cmd.arg("BLOCK").arg(timeout);
        }

        cmd.arg("COUNT")
            .arg(self.config.batch_size)
            .arg("STREAMS")
            .arg(self.keys.stream())
            .arg(cursor);

        let result: RedisResult<Option<StreamReadReply>> = cmd.query_async(&mut conn).await;

        match result {
            Ok(Some(streams)) => {
                let mut jobs = Vec::new();
                for (_stream, entries) in streams {
                    jobs.extend(self.parse_entries(entries, false));
                }
                Ok(jobs)
            }
            // No entries (blocking timeout)
            Ok(None) => Ok(vec![]),
            // Consumer group doesn't exist yet
            Err(e) if e.to_string().contains("NOGROUP") => Ok(vec![]),
            Err(e) => Err(QueueError::Redis(e)),
        }
    }

    /// Acknowledge a processed entry.
    pub async fn ack(&self, entry_id: &str) -> Result<(), QueueError> {
        let mut conn = self.redis.clone();

        let _: i64 = redis::cmd("XACK")
            .arg(self.keys.stream())
            .arg(self.keys.group())
            .arg(entry_id)
            .query_async(&mut conn)
            .await?;

        debug!(entry_id = %entry_id, "Acknowledged entry");
        Ok(())
    }

    /// Claim entries abandoned by other consumers (stalled jobs).
    ///
    /// Uses XAUTOCLAIM with the configured idle threshold. Pass
    /// `min_idle_ms = 0` to claim everything on startup, regardless of
    /// idle time.
    pub async fn claim_stalled(&self, min_idle_ms: u64) -> Result<Vec<DeliveredJob>, QueueError> {
        let mut conn = self.redis.clone();
        let mut claimed = Vec::new();
        let mut start_id = "0-0".to_string();

        loop {
            // XAUTOCLAIM returns [next-start-id, [[entry-id, fields], ...], [deleted-ids]]
            let result: RedisResult<redis::Value> = redis::cmd("XAUTOCLAIM")
                .arg(self.keys.stream())
                .arg(self.keys.group())
                .arg(&self.config.consumer_id)
                .arg(min_idle_ms)
                .arg(&start_id)
                .arg("COUNT")
                .arg(self.config.batch_size)
                .query_async(&mut conn)
                .await;

            let value = match result {
                Ok(v) => v,
                Err(e) if e.to_string().contains("NOGROUP") => break,
                Err(e) => return Err(QueueError::Redis(e)),
            };

            let redis::Value::Array(parts) = value else {
                break;
            };
            if parts.len() < 2 {
                break;
            }

            let next = match &parts[0] {
                redis::Value::BulkString(bytes) => String::from_utf8_lossy(bytes).to_string(),
                redis::Value::SimpleString(s) => s.clone(),
                _ => break,
            };

            let entries = Self::parse_raw_entries(&parts[1]);
            if entries.is_empty() && next == "0-0" {
                break;
            }
            claimed.extend(self.parse_entries(entries, true));

            if next == "0-0" {
                break;
            }
            start_id = next;
        }

        if !claimed.is_empty() {
            warn!(
                queue = %self.keys.queue(),
                count = claimed.len(),
                consumer = %self.config.consumer_id,
                "Claimed stalled entries from other consumers"
            );
        }

        Ok(claimed)
    }

    /// Decode entries, skipping anything that is not a valid job ticket.
    fn parse_entries(&self, entries: StreamEntries, reclaimed: bool) -> Vec<DeliveredJob> {
        let mut jobs = Vec::new();

        for (entry_id, fields) in entries {
            let job_json = fields
                .iter()
                .find(|(k, _)| k == "job")
                .map(|(_, v)| v.as_str());

            match job_json {
                Some(json) => match serde_json::from_str::<Job>(json) {
                    Ok(job) => jobs.push(DeliveredJob {
                        entry_id,
                        job,
                        reclaimed,
                    }),
                    Err(e) => {
                        warn!(
                            entry_id = %entry_id,
                            error = %e,
                            "Failed to parse job ticket, skipping"
                        );
                    }
                },
                None => {
                    warn!(
                        entry_id = %entry_id,
                        "Stream entry missing 'job' field, skipping"
                    );
                }
            }
        }

        jobs
    }

    /// Convert the raw XAUTOCLAIM entry array into the typed entry shape.
    fn parse_raw_entries(value: &redis::Value) -> StreamEntries {
        let mut entries = Vec::new();

        let redis::Value::Array(items) = value else {
            return entries;
        };

        for item in items {
            let redis::Value::Array(pair) = item else {
                continue;
            };
            if pair.len() < 2 {
                continue;
            }

            let entry_id = match &pair[0] {
                redis::Value::BulkString(bytes) => String::from_utf8_lossy(bytes).to_string(),
                redis::Value::SimpleString(s) => s.clone(),
                _ => continue,
            };

            let mut fields = Vec::new();
            if let redis::Value::Array(kvs) = &pair[1] {
                let mut iter = kvs.iter();
                while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
                    let key = match k {
                        redis::Value::BulkString(bytes) => {
                            String::from_utf8_lossy(bytes).to_string()
                        }
                        redis::Value::SimpleString(s) => s.clone(),
                        _ => continue,
                    };
                    let value = match v {
                        redis::Value::BulkString(bytes) => {
                            String::from_utf8_lossy(bytes).to_string()
                        }
                        redis::Value::SimpleString(s) => s.clone(),
                        _ => continue,
                    };
                    fields.push((key, value));
                }
            }

            entries.push((entry_id, fields));
        }

        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_raw_entries() {
        let value = redis::Value::Array(vec![redis::Value::Array(vec![
            redis::Value::BulkString(b"1-0".to_vec()),
            redis::Value::Array(vec![
                redis::Value::BulkString(b"job".to_vec()),
                redis::Value::BulkString(b"{}".to_vec()),
            ]),
        ])]);

        let entries = QueueConsumer::parse_raw_entries(&value);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "1-0");
        assert_eq!(entries[0].1, vec![("job".to_string(), "{}".to_string())]);
    }

    #[test]
    fn test_parse_raw_entries_ignores_garbage() {
        let entries = QueueConsumer::parse_raw_entries(&redis::Value::Nil);
        assert!(entries.is_empty());

        let value = redis::Value::Array(vec![redis::Value::Int(42)]);
        assert!(QueueConsumer::parse_raw_entries(&value).is_empty());
    }
}
