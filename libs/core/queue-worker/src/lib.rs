//! Durable Job Queue Engine
//!
//! A Redis Streams job queue with Bull-style job records, built for the
//! portal's background work (notification fan-out, digest emails).
//!
//! ## Features
//!
//! - **Fixed queue set**: queues are declared once at startup via
//!   `QueueManagerBuilder`; enqueuing to an unknown queue is a typed error
//! - **Per-kind dispatch**: each queue has one processing entry point that
//!   routes on the job's kind discriminator through a `HandlerRegistry`
//! - **Retry with backoff**: failed jobs are re-scheduled with exponential
//!   (or fixed) backoff until `max_attempts`, then marked failed
//! - **Queue administration**: status, stats, pause/resume, retention
//!   cleanup, operator-driven retry of failed jobs
//! - **Stalled-job recovery**: pending entries abandoned by dead consumers
//!   are claimed back and re-processed
//! - **Prometheus metrics** and an axum health/admin router
//!
//! ## Example
//!
//! ```ignore
//! use queue_worker::{HandlerRegistry, JobDefaults, JobOptions, QueueManager};
//!
//! let mut registry = HandlerRegistry::new();
//! registry.register_fn("report:generate", |job| async move {
//!     // ... handle the job ...
//!     Ok(())
//! });
//!
//! let manager = QueueManager::builder(redis)
//!     .queue("reports", JobDefaults::default(), registry)
//!     .build();
//!
//! manager.start().await;
//! manager.add_job("reports", "report:generate", payload, JobOptions::default()).await?;
//! ```

mod config;
mod consumer;
mod error;
mod job;
mod keys;
mod manager;
mod producer;
mod registry;
mod state;
mod worker;

pub mod health;
pub mod metrics;

// Re-export main types
pub use config::WorkerConfig;
pub use consumer::{DeliveredJob, QueueConsumer};
pub use error::{ErrorCategory, QueueError};
pub use job::{BackoffPolicy, Job, JobDefaults, JobOptions, JobStatus, JobStatusView, QueueStats};
pub use keys::QueueKeys;
pub use manager::{QueueManager, QueueManagerBuilder};
pub use producer::QueueProducer;
pub use registry::{FnHandler, HandlerRegistry, JobHandler};
pub use state::JobStateStore;
pub use worker::QueueWorker;
