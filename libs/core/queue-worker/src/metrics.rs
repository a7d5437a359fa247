//! Prometheus metrics for queue workers.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::time::Duration;
use tracing::info;

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Initialize the Prometheus metrics recorder.
///
/// Call once at startup; subsequent calls are no-ops.
pub fn init_metrics() {
    let _ = PROMETHEUS_HANDLE.get_or_init(|| {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("Failed to install Prometheus recorder");
        info!("Prometheus metrics initialized");
        handle
    });
}

/// Get the Prometheus handle for rendering metrics.
pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

/// Render metrics in Prometheus text format.
pub fn render_metrics() -> String {
    prometheus_handle().map(|h| h.render()).unwrap_or_default()
}

/// Outcome label for processed jobs.
#[derive(Debug, Clone, Copy)]
pub enum JobOutcome {
    Completed,
    Retried,
    Failed,
}

impl JobOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Completed => "completed",
            JobOutcome::Retried => "retried",
            JobOutcome::Failed => "failed",
        }
    }
}

/// Record a processed job with its outcome.
pub fn record_job_processed(queue: &str, outcome: JobOutcome) {
    counter!(
        "queue_jobs_processed_total",
        "queue" => queue.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record a handler execution duration.
pub fn record_job_duration(queue: &str, duration: Duration) {
    histogram!(
        "queue_job_duration_seconds",
        "queue" => queue.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a stalled entry being claimed back.
pub fn record_stalled(queue: &str) {
    counter!(
        "queue_jobs_stalled_total",
        "queue" => queue.to_string()
    )
    .increment(1);
}

/// Record the size of a processed batch.
pub fn record_batch_size(queue: &str, size: usize) {
    histogram!(
        "queue_batch_size",
        "queue" => queue.to_string()
    )
    .record(size as f64);
}

/// Record the number of jobs currently in flight.
pub fn set_in_flight(queue: &str, count: usize) {
    gauge!(
        "queue_jobs_in_flight",
        "queue" => queue.to_string()
    )
    .set(count as f64);
}
