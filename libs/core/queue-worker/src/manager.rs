//! Queue manager: owns the fixed set of queues and their admin surface.
//!
//! Built once at process start via `QueueManagerBuilder` (declare queues,
//! register handlers), injected into callers, and torn down with
//! `shutdown()`. Queues are never created at runtime; enqueuing to a name
//! outside the fixed set is a synchronous `UnknownQueue` error.

use crate::config::WorkerConfig;
use crate::error::QueueError;
use crate::job::{Job, JobDefaults, JobOptions, JobStatusView, QueueStats};
use crate::keys::QueueKeys;
use crate::producer::QueueProducer;
use crate::registry::HandlerRegistry;
use crate::state::JobStateStore;
use crate::worker::QueueWorker;
use chrono::Utc;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

struct QueueEntry {
    defaults: JobDefaults,
    registry: Arc<HandlerRegistry>,
    producer: QueueProducer,
    state: JobStateStore,
    worker_config: WorkerConfig,
}

/// Builder for the fixed queue set.
pub struct QueueManagerBuilder {
    redis: ConnectionManager,
    queues: HashMap<String, QueueEntry>,
}

impl QueueManagerBuilder {
    /// Declare a queue with its defaults and handler registry.
    pub fn queue(
        self,
        name: impl Into<String>,
        defaults: JobDefaults,
        registry: HandlerRegistry,
    ) -> Self {
        let name = name.into();
        let config = WorkerConfig::new(&name);
        self.queue_with_config(name, defaults, registry, config)
    }

    /// Declare a queue with an explicit worker configuration.
    pub fn queue_with_config(
        mut self,
        name: impl Into<String>,
        defaults: JobDefaults,
        registry: HandlerRegistry,
        worker_config: WorkerConfig,
    ) -> Self {
        let name = name.into();
        let keys = QueueKeys::new(&name);
        let producer = QueueProducer::new(self.redis.clone(), keys.clone())
            .with_max_length(worker_config.max_stream_length);
        let state = JobStateStore::new(self.redis.clone(), keys);

        self.queues.insert(
            name,
            QueueEntry {
                defaults,
                registry: Arc::new(registry),
                producer,
                state,
                worker_config,
            },
        );
        self
    }

    pub fn build(self) -> QueueManager {
        let (shutdown_tx, _) = watch::channel(false);

        info!(
            queues = ?self.queues.keys().collect::<Vec<_>>(),
            "Queue manager initialized"
        );

        QueueManager {
            redis: self.redis,
            queues: self.queues,
            shutdown_tx,
            workers: Mutex::new(Vec::new()),
        }
    }
}

/// Owner of the fixed queue set: enqueue, status, and admin operations.
pub struct QueueManager {
    redis: ConnectionManager,
    queues: HashMap<String, QueueEntry>,
    shutdown_tx: watch::Sender<bool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl QueueManager {
    pub fn builder(redis: ConnectionManager) -> QueueManagerBuilder {
        QueueManagerBuilder {
            redis,
            queues: HashMap::new(),
        }
    }

    fn entry(&self, queue: &str) -> Result<&QueueEntry, QueueError> {
        self.queues
            .get(queue)
            .ok_or_else(|| QueueError::UnknownQueue(queue.to_string()))
    }

    /// Names of the fixed queue set.
    pub fn queue_names(&self) -> Vec<&str> {
        self.queues.keys().map(|k| k.as_str()).collect()
    }

    /// Enqueue a job durably.
    ///
    /// Returns once the broker acknowledges persistence; processing happens
    /// later on a worker. Fails synchronously with `UnknownQueue` for a
    /// queue name outside the fixed set.
    pub async fn add_job(
        &self,
        queue: &str,
        kind: &str,
        payload: serde_json::Value,
        options: JobOptions,
    ) -> Result<Uuid, QueueError> {
        let entry = self.entry(queue)?;

        let job = Job::new(queue, kind, payload, &entry.defaults, &options);
        entry.state.record(&job).await?;

        match options.delay_ms {
            Some(delay_ms) if delay_ms > 0 => {
                let ready_at = Utc::now().timestamp_millis() + delay_ms as i64;
                entry.state.schedule_delayed(job.id, ready_at).await?;
            }
            _ => {
                entry.producer.send(&job).await?;
            }
        }

        info!(
            queue = %queue,
            kind = %kind,
            job_id = %job.id,
            delayed = options.delay_ms.unwrap_or(0) > 0,
            "Added job to queue"
        );

        Ok(job.id)
    }

    /// Point-in-time job status.
    ///
    /// `None` means "queue or job not found", not an error.
    pub async fn job_status(
        &self,
        queue: &str,
        id: Uuid,
    ) -> Result<Option<JobStatusView>, QueueError> {
        let Ok(entry) = self.entry(queue) else {
            return Ok(None);
        };
        entry.state.status_view(id).await
    }

    /// Update the handler-reported progress of a job.
    ///
    /// Fails with `JobNotFound` if the job is absent.
    pub async fn update_job_progress(
        &self,
        queue: &str,
        id: Uuid,
        progress: u8,
    ) -> Result<(), QueueError> {
        let entry = self.entry(queue)?;
        entry.state.set_progress(id, progress).await
    }

    /// Per-status job counts for a queue.
    pub async fn queue_stats(&self, queue: &str) -> Result<QueueStats, QueueError> {
        let entry = self.entry(queue)?;
        entry.state.stats().await
    }

    /// Stop consumption without losing already-enqueued jobs.
    pub async fn pause_queue(&self, queue: &str) -> Result<(), QueueError> {
        let entry = self.entry(queue)?;
        entry.state.pause().await?;
        info!(queue = %queue, "Queue paused");
        Ok(())
    }

    /// Resume consumption of a paused queue.
    pub async fn resume_queue(&self, queue: &str) -> Result<(), QueueError> {
        let entry = self.entry(queue)?;
        entry.state.resume().await?;
        info!(queue = %queue, "Queue resumed");
        Ok(())
    }

    /// Remove completed/failed job records older than the retention window.
    ///
    /// Waiting, active, and delayed jobs are not touched. Returns the
    /// number of removed records.
    pub async fn clean_old_jobs(&self, queue: &str, days: u32) -> Result<u64, QueueError> {
        let entry = self.entry(queue)?;

        let cutoff_ms = Utc::now().timestamp_millis() - (days as i64) * 24 * 60 * 60 * 1000;
        let removed = entry.state.clean_finished_before(cutoff_ms).await?;

        info!(queue = %queue, days, removed, "Cleaned old jobs");
        Ok(removed)
    }

    /// Re-enqueue every job currently in the failed state, resetting its
    /// attempt accounting. Returns the number of re-enqueued jobs.
    pub async fn retry_failed_jobs(&self, queue: &str) -> Result<u64, QueueError> {
        let entry = self.entry(queue)?;

        let mut retried = 0u64;
        for id in entry.state.failed_job_ids().await? {
            if let Some(job) = entry.state.reset_for_retry(id).await? {
                entry.producer.send(&job).await?;
                retried += 1;
            }
        }

        info!(queue = %queue, retried, "Retried failed jobs");
        Ok(retried)
    }

    /// Spawn one worker task per queue.
    pub async fn start(&self) {
        let mut workers = self.workers.lock().await;

        for (name, entry) in &self.queues {
            let worker = QueueWorker::new(
                self.redis.clone(),
                Arc::clone(&entry.registry),
                entry.worker_config.clone(),
            );
            let shutdown_rx = self.shutdown_tx.subscribe();
            let queue = name.clone();

            workers.push(tokio::spawn(async move {
                if let Err(e) = worker.run(shutdown_rx).await {
                    error!(queue = %queue, error = %e, "Queue worker exited with error");
                }
            }));
        }

        info!(count = workers.len(), "Queue workers started");
    }

    /// Signal workers to stop and wait for them to drain.
    pub async fn shutdown(&self) {
        info!("Shutting down queue manager");
        let _ = self.shutdown_tx.send(true);

        let mut workers = self.workers.lock().await;
        for handle in workers.drain(..) {
            let _ = handle.await;
        }

        info!("Queue manager shut down");
    }
}
