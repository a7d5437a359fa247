//! Handler registry: kind discriminator → handler dispatch.
//!
//! Each queue has exactly one processing entry point; that entry point
//! routes on the job's kind through a `HandlerRegistry` populated at
//! startup. An unregistered kind is a typed `UnknownJobKind` error,
//! categorized permanent so the job fails fast instead of retrying a
//! deterministic failure.

use crate::error::QueueError;
use crate::job::Job;
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Trait implemented by per-kind job handlers.
///
/// Return `Ok(())` for success. Errors are categorized via
/// `QueueError::category()` to decide between retry and immediate failure.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> Result<(), QueueError>;
}

/// Adapter turning an async closure into a `JobHandler`.
pub struct FnHandler<F> {
    f: F,
}

impl<F> FnHandler<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> JobHandler for FnHandler<F>
where
    F: Fn(Job) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), QueueError>> + Send,
{
    async fn handle(&self, job: &Job) -> Result<(), QueueError> {
        (self.f)(job.clone()).await
    }
}

/// Registry mapping job-kind discriminators to handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a job kind. A later registration for the
    /// same kind replaces the earlier one.
    pub fn register(&mut self, kind: impl Into<String>, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(kind.into(), handler);
    }

    /// Register an async closure as the handler for a job kind.
    pub fn register_fn<F, Fut>(&mut self, kind: impl Into<String>, f: F)
    where
        F: Fn(Job) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), QueueError>> + Send + 'static,
    {
        self.register(kind, Arc::new(FnHandler::new(f)));
    }

    /// Route a job to its handler.
    pub async fn dispatch(&self, job: &Job) -> Result<(), QueueError> {
        let handler = self
            .handlers
            .get(&job.kind)
            .ok_or_else(|| QueueError::UnknownJobKind(job.kind.clone()))?;

        handler.handle(job).await
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    pub fn kinds(&self) -> Vec<&str> {
        self.handlers.keys().map(|k| k.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
