//! Read-only dashboard surface for the performance monitor.
//!
//! Pagination defaults are explicit per endpoint and excess limits are
//! clamped silently.

use crate::handlers::ErrorResponse;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use toko_monitor::{MonitorSummary, QueryStatsSnapshot, SlowQueryRecord, TenantActivity};
use uuid::Uuid;

/// Upper bound for any dashboard page size.
const MAX_PAGE: usize = 500;

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

fn clamp(limit: Option<usize>, default: usize) -> usize {
    limit.unwrap_or(default).min(MAX_PAGE)
}

/// Overall snapshot.
/// GET /dashboard/summary
pub async fn summary(State(state): State<Arc<AppState>>) -> Json<MonitorSummary> {
    Json(state.monitor.summary())
}

/// Top patterns by execution count. Default 50.
/// GET /dashboard/queries?limit=N
pub async fn top_queries(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Json<Vec<QueryStatsSnapshot>> {
    let limit = clamp(query.limit, 50);
    let mut stats = state.monitor.get_stats();
    stats.truncate(limit);
    Json(stats)
}

/// Tail of the slow-query ring, newest first. Default 100.
/// GET /dashboard/slow-queries?limit=N
pub async fn slow_queries(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Json<Vec<SlowQueryRecord>> {
    Json(state.monitor.get_slow_queries(clamp(query.limit, 100)))
}

#[derive(Debug, serde::Serialize)]
pub struct TenantPatternStats {
    pub pattern: String,
    pub executions: u64,
    pub avg_duration_ms: f64,
    pub errors: u64,
    pub error_rate: f64,
}

#[derive(Debug, serde::Serialize)]
pub struct TenantBreakdownResponse {
    #[serde(flatten)]
    pub activity: TenantActivity,
    pub patterns: Vec<TenantPatternStats>,
}

/// Per-tenant breakdown for one storefront: the rollup plus every
/// pattern the tenant appears in.
/// GET /dashboard/tenant/:tenant_id
pub async fn tenant_stats(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<TenantBreakdownResponse>, (StatusCode, Json<ErrorResponse>)> {
    let activity = state.monitor.get_tenant_stats(tenant_id).ok_or((
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new(
            "no_tenant_activity",
            "No query activity recorded for this tenant",
        )),
    ))?;

    let patterns = state
        .monitor
        .get_stats()
        .into_iter()
        .filter_map(|snap| {
            snap.per_tenant
                .iter()
                .find(|t| t.tenant_id == tenant_id)
                .map(|t| TenantPatternStats {
                    pattern: snap.pattern.clone(),
                    executions: t.executions,
                    avg_duration_ms: t.avg_duration_ms,
                    errors: t.errors,
                    error_rate: t.error_rate,
                })
        })
        .collect();

    Ok(Json(TenantBreakdownResponse { activity, patterns }))
}

/// Top tenants by recent activity. Default 20.
/// GET /dashboard/tenants?limit=N
pub async fn top_tenants(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Json<Vec<TenantActivity>> {
    Json(state.monitor.tenant_activity(clamp(query.limit, 20)))
}

/// Idempotent reset of stats and the slow-query log.
/// POST /dashboard/clear-stats
pub async fn clear_stats(State(state): State<Arc<AppState>>) -> StatusCode {
    state.monitor.clear();
    tracing::info!("performance stats cleared");
    StatusCode::NO_CONTENT
}
