//! Health and admin endpoints for worker processes.
//!
//! Provides axum handlers for:
//! - Liveness probes (`/health`, `/healthz`)
//! - Readiness probes (`/ready`, `/readyz` - Redis PING)
//! - Queue statistics (`/queues/{name}/stats`)
//! - Prometheus metrics (`/metrics`)

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::QueueError;
use crate::manager::QueueManager;
use crate::metrics;

/// Shared state for health endpoints.
#[derive(Clone)]
pub struct HealthState {
    /// Redis connection for readiness checks.
    pub redis: ConnectionManager,
    /// Application name.
    pub app_name: String,
    /// Application version.
    pub app_version: String,
    /// Queue manager for stats endpoints.
    pub manager: Arc<QueueManager>,
}

impl HealthState {
    pub fn new(
        redis: ConnectionManager,
        app_name: impl Into<String>,
        app_version: impl Into<String>,
        manager: Arc<QueueManager>,
    ) -> Self {
        Self {
            redis,
            app_name: app_name.into(),
            app_version: app_version.into(),
            manager,
        }
    }
}

/// Health response for liveness probes.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status (always "healthy" if responding).
    pub status: &'static str,
    /// Application name.
    pub name: String,
    /// Application version.
    pub version: String,
}

/// Liveness probe handler; returns OK whenever the process is running.
pub async fn health_handler(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        name: state.app_name,
        version: state.app_version,
    })
}

/// Readiness probe handler; checks Redis connectivity with PING.
pub async fn ready_handler(
    State(state): State<HealthState>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let mut conn = state.redis.clone();

    let result: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;

    match result {
        Ok(response) if response == "PONG" => Ok((
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "checks": { "redis": "ok" }
            })),
        )),
        Ok(response) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "not_ready",
                "checks": { "redis": format!("unexpected response: {}", response) }
            })),
        )),
        Err(e) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "not_ready",
                "checks": { "redis": format!("error: {}", e) }
            })),
        )),
    }
}

/// Queue statistics handler.
///
/// `GET /queues/{name}/stats`
pub async fn queue_stats_handler(
    State(state): State<HealthState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match state.manager.queue_stats(&name).await {
        Ok(stats) => Ok(Json(json!({
            "queue": name,
            "counts": stats,
        }))),
        Err(QueueError::UnknownQueue(queue)) => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("unknown queue: {}", queue) })),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )),
    }
}

/// Prometheus metrics endpoint handler.
pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::prometheus_handle() {
        Some(handle) => {
            let output = handle.render();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                output,
            )
                .into_response()
        }
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            "Metrics not initialized. Call metrics::init_metrics() at startup.".to_string(),
        )
            .into_response(),
    }
}

/// Create the standard health/admin router for a worker process.
///
/// - `/health`, `/healthz` - liveness
/// - `/ready`, `/readyz` - readiness (Redis PING)
/// - `/queues/{name}/stats` - per-queue job counts
/// - `/metrics` - Prometheus metrics
pub fn health_router(state: HealthState) -> axum::Router {
    use axum::routing::get;

    axum::Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/readyz", get(ready_handler))
        .route("/queues/{name}/stats", get(queue_stats_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "healthy",
            name: "notification-worker".to_string(),
            version: "0.1.0".to_string(),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"healthy\""));
        assert!(json.contains("\"name\":\"notification-worker\""));
    }
}
