use crate::handlers::ErrorResponse;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use std::sync::Arc;
use toko_database::DatabaseError;

/// Identify the storefront from the configured headers, resolve it, and
/// attach the resulting context to the request. With `require_tenant` on,
/// unidentified requests are rejected before they reach a handler.
pub async fn resolve_tenant(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let tenant_ref = match state.extractor.extract(&headers) {
        Some(r) => r,
        None => {
            if state.config.require_tenant {
                return Err((
                    StatusCode::UNAUTHORIZED,
                    Json(ErrorResponse::new(
                        "missing_tenant",
                        "No storefront identification header present",
                    )),
                ));
            }
            return Ok(next.run(request).await);
        }
    };

    let ctx = state
        .resolver
        .context_for_ref(&tenant_ref)
        .await
        .map_err(|e| match e {
            DatabaseError::NotFound(_) => (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("unknown_storefront", &e.to_string())),
            ),
            other => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::new("resolver_unavailable", &other.to_string())),
            ),
        })?;

    tracing::debug!(
        tenant_id = %ctx.tenant_id,
        tenant_type = %ctx.strategy,
        "tenant resolved for request"
    );
    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}
