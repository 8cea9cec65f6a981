//! Health check handlers

use axum::{extract::State, http::StatusCode, Json};
use replybox_core::QueueStats;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::state::AppState;

/// Basic health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall health status
    pub status: String,
}

/// Detailed health response with component checks
#[derive(Debug, Serialize)]
pub struct DetailedHealthResponse {
    /// Overall health status
    pub status: String,
    /// Individual component health checks
    pub checks: HealthChecks,
}

/// Individual health checks
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub database: ComponentHealth,
    pub queue: QueueHealth,
}

/// Individual component health status
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    /// Component status (healthy/unhealthy)
    pub status: String,
    /// Response latency in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    /// Error message if unhealthy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Broker health with job counts
#[derive(Debug, Serialize)]
pub struct QueueHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<QueueStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Basic health check
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

/// Liveness check (is the process running)
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Readiness check (is the service ready to accept requests)
pub async fn readiness(State(state): State<AppState>) -> Result<StatusCode, StatusCode> {
    state
        .emails
        .ping()
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

    Ok(StatusCode::OK)
}

/// Detailed health check with all dependencies
pub async fn health_detailed(State(state): State<AppState>) -> Json<DetailedHealthResponse> {
    let start = Instant::now();
    let db_check = state.emails.ping().await;
    let db_latency = start.elapsed().as_millis() as u64;

    let database = match db_check {
        Ok(_) => ComponentHealth {
            status: "healthy".to_string(),
            latency_ms: Some(db_latency),
            error: None,
        },
        Err(e) => ComponentHealth {
            status: "unhealthy".to_string(),
            latency_ms: None,
            error: Some(e.to_string()),
        },
    };

    let queue = match state.queue.stats().await {
        Ok(stats) => QueueHealth {
            status: "healthy".to_string(),
            stats: Some(stats),
            error: None,
        },
        Err(e) => QueueHealth {
            status: "unhealthy".to_string(),
            stats: None,
            error: Some(e.to_string()),
        },
    };

    let overall_status = if database.status == "healthy" && queue.status == "healthy" {
        "healthy"
    } else {
        "unhealthy"
    };

    Json(DetailedHealthResponse {
        status: overall_status.to_string(),
        checks: HealthChecks { database, queue },
    })
}
