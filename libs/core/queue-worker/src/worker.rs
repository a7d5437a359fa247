//! The per-queue worker loop.
//!
//! Each worker owns one queue: it promotes due delayed jobs, reads work
//! tickets through the consumer group, routes them through the handler
//! registry, and applies the retry/backoff policy on failure. Stalled
//! entries abandoned by dead consumers are periodically claimed back.

use crate::config::WorkerConfig;
use crate::consumer::{DeliveredJob, QueueConsumer};
use crate::error::QueueError;
use crate::job::JobStatus;
use crate::keys::QueueKeys;
use crate::metrics::{self, JobOutcome};
use crate::producer::QueueProducer;
use crate::registry::HandlerRegistry;
use crate::state::JobStateStore;
use chrono::Utc;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

const MAX_BACKOFF_SECS: u64 = 30;

/// Worker processing one queue.
pub struct QueueWorker {
    inner: Arc<WorkerInner>,
}

struct WorkerInner {
    consumer: QueueConsumer,
    producer: QueueProducer,
    state: JobStateStore,
    registry: Arc<HandlerRegistry>,
    config: WorkerConfig,
    semaphore: Semaphore,
}

impl QueueWorker {
    pub fn new(
        redis: ConnectionManager,
        registry: Arc<HandlerRegistry>,
        config: WorkerConfig,
    ) -> Self {
        let keys = QueueKeys::new(&config.queue_name);
        let consumer = QueueConsumer::new(redis.clone(), keys.clone(), config.clone());
        let producer = QueueProducer::new(redis.clone(), keys.clone())
            .with_max_length(config.max_stream_length);
        let state = JobStateStore::new(redis, keys);
        let semaphore = Semaphore::new(config.max_concurrent_jobs);

        Self {
            inner: Arc::new(WorkerInner {
                consumer,
                producer,
                state,
                registry,
                config,
                semaphore,
            }),
        }
    }

    /// Run the worker loop until the shutdown signal flips to `true`.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<(), QueueError> {
        WorkerInner::run(Arc::clone(&self.inner), shutdown).await
    }
}

impl WorkerInner {
    async fn run(
        inner: Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), QueueError> {
        info!(
            queue = %inner.config.queue_name,
            consumer_id = %inner.config.consumer_id,
            handlers = inner.registry.len(),
            max_concurrent_jobs = inner.config.max_concurrent_jobs,
            "Starting queue worker"
        );

        inner.consumer.ensure_group().await?;

        // Take over any entries left pending by previous incarnations of
        // this worker, regardless of idle time.
        match inner.consumer.claim_stalled(0).await {
            Ok(claimed) if !claimed.is_empty() => {
                info!(count = claimed.len(), "Claimed pending entries on startup");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to claim pending entries on startup"),
        }

        let poll_interval = Duration::from_millis(inner.config.poll_interval_ms);
        let claim_interval = Duration::from_millis(inner.config.claim_idle_ms.max(1000) * 2);
        let mut last_claim = std::time::Instant::now();
        let mut consecutive_errors: u32 = 0;

        loop {
            if *shutdown.borrow() {
                info!(queue = %inner.config.queue_name, "Received shutdown signal, stopping worker");
                break;
            }

            // Paused queues keep their backlog; just wait.
            if inner.state.is_paused().await.unwrap_or(false) {
                tokio::select! {
                    _ = shutdown.changed() => {}
                    _ = tokio::time::sleep(poll_interval) => {}
                }
                continue;
            }

            match Self::tick(&inner).await {
                Ok(_) => {
                    if consecutive_errors > 0 {
                        info!("Connection recovered after {} errors", consecutive_errors);
                        consecutive_errors = 0;
                    }
                }
                Err(e) => {
                    consecutive_errors += 1;
                    let err_str = e.to_string();

                    if err_str.contains("NOGROUP") {
                        warn!("Consumer group missing, recreating...");
                        if let Err(create_err) = inner.consumer.ensure_group().await {
                            error!(error = %create_err, "Failed to recreate consumer group");
                        }
                    } else {
                        let backoff_secs =
                            std::cmp::min(2u64.pow(consecutive_errors.min(5)), MAX_BACKOFF_SECS);
                        warn!(
                            error = %e,
                            consecutive_errors,
                            backoff_secs,
                            "Error in worker loop, backing off"
                        );
                        tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                    }

                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            }

            // Periodically claim entries abandoned by crashed workers.
            if last_claim.elapsed() >= claim_interval {
                if let Err(e) = Self::claim_and_process_stalled(&inner).await {
                    debug!(error = %e, "Error claiming stalled entries");
                }
                last_claim = std::time::Instant::now();
            }

            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(queue = %inner.config.queue_name, "Received shutdown signal, stopping worker");
                        break;
                    }
                }
                _ = tokio::time::sleep(poll_interval) => {}
            }
        }

        info!(queue = %inner.config.queue_name, "Queue worker stopped");
        Ok(())
    }

    /// One pass: promote due delayed jobs, then process pending + new
    /// entries.
    async fn tick(inner: &Arc<Self>) -> Result<(), QueueError> {
        inner.promote_due().await?;

        let pending = inner.consumer.read_pending().await?;
        let new = inner.consumer.read_new().await?;

        let deliveries: Vec<DeliveredJob> = pending.into_iter().chain(new).collect();
        if deliveries.is_empty() {
            return Ok(());
        }

        metrics::record_batch_size(&inner.config.queue_name, deliveries.len());
        Self::process_deliveries(inner, deliveries).await;

        Ok(())
    }

    /// Move delayed jobs whose ready time has passed back onto the stream.
    async fn promote_due(&self) -> Result<(), QueueError> {
        let due = self.state.due_jobs(self.config.promote_batch).await?;

        for job in due {
            // XADD first so a crash between the two steps re-promotes
            // rather than losing the job.
            self.producer.send(&job).await?;
            self.state.clear_delayed(job.id).await?;
            debug!(job_id = %job.id, kind = %job.kind, "Promoted delayed job");
        }

        Ok(())
    }

    async fn process_deliveries(inner: &Arc<Self>, deliveries: Vec<DeliveredJob>) {
        if inner.config.max_concurrent_jobs == 1 {
            for delivered in deliveries {
                inner.process_delivery(delivered).await;
            }
            return;
        }

        let mut join_set: JoinSet<()> = JoinSet::new();
        let in_flight = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        for delivered in deliveries {
            let inner = Arc::clone(inner);
            let in_flight = Arc::clone(&in_flight);

            join_set.spawn(async move {
                let _permit = inner
                    .semaphore
                    .acquire()
                    .await
                    .expect("worker semaphore closed");

                let current = in_flight.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
                metrics::set_in_flight(&inner.config.queue_name, current);

                inner.process_delivery(delivered).await;

                let current = in_flight.fetch_sub(1, std::sync::atomic::Ordering::SeqCst) - 1;
                metrics::set_in_flight(&inner.config.queue_name, current);
            });
        }

        while join_set.join_next().await.is_some() {}
    }

    /// Process one delivered work ticket end to end.
    async fn process_delivery(&self, delivered: DeliveredJob) {
        let mut job = delivered.job;

        debug!(
            entry_id = %delivered.entry_id,
            job_id = %job.id,
            kind = %job.kind,
            "Processing job"
        );

        let attempts = match self.state.mark_active(job.id).await {
            Ok(attempts) => attempts,
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Failed to mark job active");
                return;
            }
        };
        job.attempts = attempts;
        job.status = JobStatus::Active;

        let start = std::time::Instant::now();

        match self.registry.dispatch(&job).await {
            Ok(()) => {
                metrics::record_job_processed(&self.config.queue_name, JobOutcome::Completed);
                metrics::record_job_duration(&self.config.queue_name, start.elapsed());

                if let Err(e) = self.state.mark_completed(job.id).await {
                    error!(job_id = %job.id, error = %e, "Failed to mark job completed");
                }
                self.ack(&delivered.entry_id).await;

                debug!(job_id = %job.id, kind = %job.kind, "Job completed");
            }
            Err(e) => {
                let category = e.category();

                if category.should_retry() && attempts < job.max_attempts {
                    let delay = job.backoff.delay_for_attempt(attempts);
                    let ready_at = Utc::now().timestamp_millis() + delay.as_millis() as i64;

                    warn!(
                        job_id = %job.id,
                        kind = %job.kind,
                        attempt = attempts,
                        max_attempts = job.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Job failed, scheduling retry with backoff"
                    );

                    metrics::record_job_processed(&self.config.queue_name, JobOutcome::Retried);

                    if let Err(retry_err) = self.state.schedule_retry(job.id, ready_at).await {
                        error!(job_id = %job.id, error = %retry_err, "Failed to schedule retry");
                    }
                } else {
                    error!(
                        job_id = %job.id,
                        kind = %job.kind,
                        attempts,
                        error_category = ?category,
                        error = %e,
                        "Job failed permanently"
                    );

                    metrics::record_job_processed(&self.config.queue_name, JobOutcome::Failed);

                    if let Err(fail_err) = self.state.mark_failed(job.id, &e.to_string()).await {
                        error!(job_id = %job.id, error = %fail_err, "Failed to mark job failed");
                    }
                }

                // ACK in every branch so a broken entry cannot wedge the
                // group; the retry lives in the delayed index.
                self.ack(&delivered.entry_id).await;
            }
        }
    }

    async fn ack(&self, entry_id: &str) {
        if let Err(e) = self.consumer.ack(entry_id).await {
            error!(entry_id = %entry_id, error = %e, "Failed to ACK entry");
        }
    }

    /// Claim entries abandoned past the idle threshold and re-process them.
    async fn claim_and_process_stalled(inner: &Arc<Self>) -> Result<(), QueueError> {
        let claimed = inner
            .consumer
            .claim_stalled(inner.config.claim_idle_ms)
            .await?;

        if claimed.is_empty() {
            return Ok(());
        }

        for delivered in &claimed {
            warn!(
                job_id = %delivered.job.id,
                kind = %delivered.job.kind,
                entry_id = %delivered.entry_id,
                "Job stalled: worker died mid-processing, re-queuing"
            );
            metrics::record_stalled(&inner.config.queue_name);
            if let Err(e) = inner.state.mark_stalled(delivered.job.id).await {
                debug!(job_id = %delivered.job.id, error = %e, "Failed to mark job stalled");
            }
        }

        Self::process_deliveries(inner, claimed).await;
        Ok(())
    }
}
