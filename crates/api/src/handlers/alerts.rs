use crate::handlers::dashboard::LimitQuery;
use crate::handlers::ErrorResponse;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use toko_models::Alert;
use toko_monitor::MonitorError;
use uuid::Uuid;

fn monitor_error(e: MonitorError) -> (StatusCode, Json<ErrorResponse>) {
    match e {
        MonitorError::AlertNotFound(_) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("alert_not_found", &e.to_string())),
        ),
        MonitorError::Sink(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("sink_error", &e.to_string())),
        ),
    }
}

/// Alert history, newest first. Default 100.
/// GET /dashboard/alerts/history?limit=N
pub async fn alert_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Json<Vec<Alert>> {
    Json(state.alerts.history(query.limit.unwrap_or(100).min(500)))
}

/// POST /alerts/:id/acknowledge
pub async fn acknowledge_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Alert>, (StatusCode, Json<ErrorResponse>)> {
    state.alerts.acknowledge(id).map(Json).map_err(monitor_error)
}

/// POST /alerts/:id/resolve
pub async fn resolve_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Alert>, (StatusCode, Json<ErrorResponse>)> {
    state.alerts.resolve(id).map(Json).map_err(monitor_error)
}
