//! Tenant-scoped demonstration endpoints. Both sit behind the tenant
//! middleware, so the context extension is always present here.

use crate::handlers::{db_error, ErrorResponse};
use crate::AppState;
use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use toko_tenant::TenantContext;

/// Echo the resolved tenant context.
/// GET /api/tenant/context
pub async fn tenant_context(Extension(ctx): Extension<TenantContext>) -> Json<TenantContext> {
    Json(ctx)
}

#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub status: String,
    pub latency_ms: u64,
}

/// Round-trip the tenant's backing store through the monitored
/// connection, so the query shows up on the dashboard like any other.
/// GET /api/tenant/ping
pub async fn tenant_ping(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<TenantContext>,
) -> Result<Json<PingResponse>, (StatusCode, Json<ErrorResponse>)> {
    let started = std::time::Instant::now();
    let token = CancellationToken::new();
    state
        .connection
        .fetch_one(&ctx, &token, "SELECT 1", &[])
        .await
        .map_err(db_error)?;
    Ok(Json(PingResponse {
        status: "ok".to_string(),
        latency_ms: started.elapsed().as_millis() as u64,
    }))
}
