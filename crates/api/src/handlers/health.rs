use crate::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Liveness check
/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Debug, Serialize)]
pub struct DashboardHealthResponse {
    pub status: String,
    pub error_rate: f64,
    pub avg_duration_ms: f64,
    pub total_executions: u64,
    pub slow_query_count: usize,
}

/// Query-layer health derived from the aggregate error rate:
/// degraded above 5%, unhealthy above 15%.
/// GET /dashboard/health
pub async fn dashboard_health(State(state): State<Arc<AppState>>) -> Json<DashboardHealthResponse> {
    let summary = state.monitor.summary();
    let status = if summary.error_rate > 15.0 {
        "unhealthy"
    } else if summary.error_rate > 5.0 {
        "degraded"
    } else {
        "healthy"
    };
    Json(DashboardHealthResponse {
        status: status.to_string(),
        error_rate: summary.error_rate,
        avg_duration_ms: summary.avg_duration_ms,
        total_executions: summary.total_executions,
        slow_query_count: summary.slow_query_count,
    })
}
