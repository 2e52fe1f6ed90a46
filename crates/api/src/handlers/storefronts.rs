//! Storefront Registry Management Handlers
//!
//! Admin endpoints for the tenancy registry:
//! - Create/list/activate/suspend storefronts
//! - Configure dedicated databases for isolated storefronts
//! - Connection self-test and migration advice

use crate::handlers::{db_error, ErrorResponse};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use toko_database::ResolverStats;
use toko_models::{MigrationAdvice, StorefrontRecord, TenancyStrategy};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateStorefrontRequest {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub tenancy_strategy: String, // "shared", "schema" or "isolated"
}

#[derive(Debug, Deserialize)]
pub struct ConfigureDedicatedDbRequest {
    pub host: String,
    pub port: i32,
    pub database_name: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct StorefrontResponse {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub tenancy_strategy: String,
    pub status: String,
    pub custom_domain: Option<String>,
    pub database_host: Option<String>,
    pub database_name: Option<String>,
    pub created_at: String,
}

impl From<StorefrontRecord> for StorefrontResponse {
    fn from(s: StorefrontRecord) -> Self {
        Self {
            id: s.id,
            slug: s.slug,
            name: s.name,
            tenancy_strategy: s.tenancy_strategy,
            status: s.status,
            custom_domain: s.custom_domain,
            database_host: s.database_host,
            database_name: s.database_name,
            created_at: s.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListStorefrontsQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Serialize)]
pub struct MigrationAdviceResponse {
    pub tenant_id: Uuid,
    pub current_strategy: String,
    #[serde(flatten)]
    pub advice: MigrationAdvice,
}

#[derive(Debug, Serialize)]
pub struct ConnectionTestResult {
    pub success: bool,
    pub latency_ms: u64,
    pub error: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a new storefront
/// POST /api/admin/storefronts
pub async fn create_storefront(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateStorefrontRequest>,
) -> Result<Json<StorefrontResponse>, (StatusCode, Json<ErrorResponse>)> {
    if !is_valid_slug(&request.slug) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "invalid_slug",
                "Slug must be lowercase alphanumeric with hyphens, 3-63 characters",
            )),
        ));
    }

    let strategy = TenancyStrategy::from(request.tenancy_strategy.as_str());

    match state
        .resolver
        .create_storefront(&request.slug, &request.name, strategy)
        .await
    {
        Ok(storefront) => Ok(Json(storefront.into())),
        Err(e) => {
            tracing::error!("Failed to create storefront: {}", e);
            Err(db_error(e))
        }
    }
}

/// List storefronts
/// GET /api/admin/storefronts
pub async fn list_storefronts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListStorefrontsQuery>,
) -> Result<Json<Vec<StorefrontResponse>>, (StatusCode, Json<ErrorResponse>)> {
    match state.resolver.list_storefronts(query.include_inactive).await {
        Ok(storefronts) => Ok(Json(storefronts.into_iter().map(Into::into).collect())),
        Err(e) => {
            tracing::error!("Failed to list storefronts: {}", e);
            Err(db_error(e))
        }
    }
}

/// Get one storefront
/// GET /api/admin/storefronts/:tenant_id
pub async fn get_storefront(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<StorefrontResponse>, (StatusCode, Json<ErrorResponse>)> {
    state
        .resolver
        .get_storefront(tenant_id)
        .await
        .map(|s| Json(s.into()))
        .map_err(db_error)
}

/// Configure dedicated database for an isolated storefront
/// POST /api/admin/storefronts/:tenant_id/database
pub async fn configure_dedicated_database(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<Uuid>,
    Json(request): Json<ConfigureDedicatedDbRequest>,
) -> Result<Json<StorefrontResponse>, (StatusCode, Json<ErrorResponse>)> {
    let storefront = state
        .resolver
        .get_storefront(tenant_id)
        .await
        .map_err(db_error)?;

    if storefront.strategy() != TenancyStrategy::Isolated {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "invalid_tenancy_strategy",
                "Storefront must use the isolated strategy to configure a dedicated database",
            )),
        ));
    }

    match state
        .resolver
        .configure_dedicated_database(
            tenant_id,
            &request.host,
            request.port,
            &request.database_name,
            &request.username,
            &request.password,
        )
        .await
    {
        Ok(storefront) => Ok(Json(storefront.into())),
        Err(e) => {
            tracing::error!("Failed to configure dedicated database: {}", e);
            Err(db_error(e))
        }
    }
}

/// Activate a storefront
/// POST /api/admin/storefronts/:tenant_id/activate
pub async fn activate_storefront(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<StorefrontResponse>, (StatusCode, Json<ErrorResponse>)> {
    let storefront = state
        .resolver
        .get_storefront(tenant_id)
        .await
        .map_err(db_error)?;

    // Isolated storefronts need connection details before activation.
    if storefront.strategy() == TenancyStrategy::Isolated && storefront.database_host.is_none() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "database_not_configured",
                "Isolated storefront requires database configuration before activation",
            )),
        ));
    }

    state
        .resolver
        .activate_storefront(tenant_id)
        .await
        .map(|s| Json(s.into()))
        .map_err(db_error)
}

/// Suspend a storefront
/// POST /api/admin/storefronts/:tenant_id/suspend
pub async fn suspend_storefront(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    state
        .resolver
        .suspend_storefront(tenant_id)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(db_error)
}

/// Resolver cache statistics
/// GET /api/admin/storefronts/stats
pub async fn get_resolver_stats(State(state): State<Arc<AppState>>) -> Json<ResolverStats> {
    Json(state.resolver.stats())
}

/// Test a storefront's backing connection
/// POST /api/admin/storefronts/:tenant_id/test-connection
pub async fn test_storefront_connection(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<ConnectionTestResult>, (StatusCode, Json<ErrorResponse>)> {
    let start = std::time::Instant::now();
    let binding = state.resolver.resolve(tenant_id).await.map_err(db_error)?;

    match sqlx::query("SELECT 1").execute(&binding.pool).await {
        Ok(_) => Ok(Json(ConnectionTestResult {
            success: true,
            latency_ms: start.elapsed().as_millis() as u64,
            error: None,
        })),
        Err(e) => Ok(Json(ConnectionTestResult {
            success: false,
            latency_ms: start.elapsed().as_millis() as u64,
            error: Some(e.to_string()),
        })),
    }
}

/// Advisory migration assessment combining store counts with observed
/// query timing from the monitor.
/// GET /api/admin/storefronts/:tenant_id/migration-advice
pub async fn migration_advice(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<MigrationAdviceResponse>, (StatusCode, Json<ErrorResponse>)> {
    let mut usage = state.resolver.fetch_usage(tenant_id).await.map_err(db_error)?;
    if let Some(activity) = state.monitor.get_tenant_stats(tenant_id) {
        usage.avg_query_time_ms = activity.avg_duration_ms;
    }

    let binding = state.resolver.resolve(tenant_id).await.map_err(db_error)?;
    let advice = state
        .resolver
        .assess_migration(tenant_id, &usage)
        .await
        .map_err(db_error)?;

    Ok(Json(MigrationAdviceResponse {
        tenant_id,
        current_strategy: binding.strategy.to_string(),
        advice,
    }))
}

// ============================================================================
// Helpers
// ============================================================================

fn is_valid_slug(slug: &str) -> bool {
    if slug.len() < 3 || slug.len() > 63 {
        return false;
    }

    // Must start with lowercase letter
    if !slug
        .chars()
        .next()
        .map(|c| c.is_ascii_lowercase())
        .unwrap_or(false)
    {
        return false;
    }

    // Must end with lowercase letter or digit
    if !slug
        .chars()
        .last()
        .map(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .unwrap_or(false)
    {
        return false;
    }

    // Only lowercase letters, digits, and hyphens
    slug.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_validation() {
        assert!(is_valid_slug("acme"));
        assert!(is_valid_slug("acme-store-2"));
        assert!(!is_valid_slug("ab"));
        assert!(!is_valid_slug("-acme"));
        assert!(!is_valid_slug("acme-"));
        assert!(!is_valid_slug("Acme"));
        assert!(!is_valid_slug("acme_store"));
    }
}
