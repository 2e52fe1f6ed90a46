use crate::handlers;
use crate::middleware;
use crate::AppState;
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Tenant-scoped routes sit behind the resolving middleware.
    let tenant_routes = Router::new()
        .route("/api/tenant/context", get(handlers::context::tenant_context))
        .route("/api/tenant/ping", get(handlers::context::tenant_ping))
        .route_layer(from_fn_with_state(state.clone(), middleware::resolve_tenant));

    Router::new()
        // Health checks
        .route("/health", get(handlers::health::health_check))
        .route("/dashboard/health", get(handlers::health::dashboard_health))
        // Dashboard - read-only monitor views
        .route("/dashboard/summary", get(handlers::dashboard::summary))
        .route("/dashboard/queries", get(handlers::dashboard::top_queries))
        .route("/dashboard/slow-queries", get(handlers::dashboard::slow_queries))
        .route("/dashboard/tenant/:tenant_id", get(handlers::dashboard::tenant_stats))
        .route("/dashboard/tenants", get(handlers::dashboard::top_tenants))
        .route("/dashboard/clear-stats", post(handlers::dashboard::clear_stats))
        // Alerts
        .route("/dashboard/alerts/history", get(handlers::alerts::alert_history))
        .route("/alerts/:id/acknowledge", post(handlers::alerts::acknowledge_alert))
        .route("/alerts/:id/resolve", post(handlers::alerts::resolve_alert))
        // Storefront registry - platform admin
        .route(
            "/api/admin/storefronts",
            get(handlers::storefronts::list_storefronts)
                .post(handlers::storefronts::create_storefront),
        )
        .route(
            "/api/admin/storefronts/stats",
            get(handlers::storefronts::get_resolver_stats),
        )
        .route(
            "/api/admin/storefronts/:tenant_id",
            get(handlers::storefronts::get_storefront),
        )
        .route(
            "/api/admin/storefronts/:tenant_id/database",
            post(handlers::storefronts::configure_dedicated_database),
        )
        .route(
            "/api/admin/storefronts/:tenant_id/activate",
            post(handlers::storefronts::activate_storefront),
        )
        .route(
            "/api/admin/storefronts/:tenant_id/suspend",
            post(handlers::storefronts::suspend_storefront),
        )
        .route(
            "/api/admin/storefronts/:tenant_id/test-connection",
            post(handlers::storefronts::test_storefront_connection),
        )
        .route(
            "/api/admin/storefronts/:tenant_id/migration-advice",
            get(handlers::storefronts::migration_advice),
        )
        .merge(tenant_routes)
        .with_state(state)
}
