// Toko Platform API Server
// Multi-tenant data-access and observability layer for storefront backends

mod config;
mod handlers;
mod middleware;
mod routes;

use config::Config;
use dotenvy::dotenv;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use toko_database::{Database, MonitoredConnection, TenantResolver};
use toko_monitor::{AlertEngine, AlertSink, LogSink, PerformanceMonitor, WebhookSink};
use toko_tenant::TenantExtractor;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub struct AppState {
    pub config: Config,
    pub resolver: Arc<TenantResolver>,
    pub monitor: Arc<PerformanceMonitor>,
    pub alerts: Arc<AlertEngine>,
    pub connection: MonitoredConnection,
    pub extractor: TenantExtractor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,toko_api=debug,tower_http=debug".to_string()),
        )
        .init();

    tracing::info!("🚀 Starting Toko Platform API Server");
    tracing::info!("📦 Version: {}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::from_env();
    tracing::info!("🔌 Server: {}:{}", config.server_host, config.server_port);

    // Initialize master database
    tracing::info!("🗄️  Connecting to database...");
    let database = Database::new(config.database.clone())
        .await
        .expect("Failed to connect to database");
    database.ping().await.expect("Database ping failed");
    tracing::info!("✅ Database connected");

    // Background task lifecycle
    let shutdown = CancellationToken::new();

    // Tenant resolver with binding/usage caches
    let resolver = Arc::new(
        TenantResolver::new(database.pool().clone(), config.resolver.clone())
            .expect("Failed to initialize tenant resolver"),
    );
    resolver.start_sweepers(&shutdown);
    tracing::info!("🏢 Tenant resolver initialized");

    // Performance monitor
    let monitor = Arc::new(PerformanceMonitor::new(config.monitor.clone()));
    tracing::info!("📊 Performance monitor initialized");

    // Alert engine with configured sinks
    let mut sinks: Vec<Arc<dyn AlertSink>> = vec![Arc::new(LogSink)];
    if let Some(url) = &config.alert_webhook_url {
        sinks.push(Arc::new(WebhookSink::new(url.clone())));
        tracing::info!("📬 Alert webhook sink configured");
    }
    let alerts = Arc::new(AlertEngine::new(
        monitor.clone(),
        config.monitor.clone(),
        sinks,
    ));
    alerts.start(shutdown.clone());
    tracing::info!("🚨 Alert engine started");

    // Monitored connection over the resolver
    let connection = MonitoredConnection::new(resolver.clone(), monitor.clone());
    tracing::info!("🔗 Monitored connection initialized");

    let extractor = TenantExtractor::new(config.tenant_headers.clone());

    let state = Arc::new(AppState {
        config,
        resolver,
        monitor,
        alerts,
        connection,
        extractor,
    });

    // Create router
    let app = routes::create_router(state.clone())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    tracing::info!("📡 Routes configured:");
    tracing::info!("   GET  /health");
    tracing::info!("   GET  /dashboard/summary");
    tracing::info!("   GET  /dashboard/queries");
    tracing::info!("   GET  /dashboard/slow-queries");
    tracing::info!("   GET  /dashboard/tenant/:tenant_id");
    tracing::info!("   GET  /dashboard/tenants");
    tracing::info!("   GET  /dashboard/health");
    tracing::info!("   POST /dashboard/clear-stats");
    tracing::info!("   GET  /dashboard/alerts/history");
    tracing::info!("   POST /alerts/:id/acknowledge");
    tracing::info!("   POST /alerts/:id/resolve");
    tracing::info!("   GET/POST /api/admin/storefronts");
    tracing::info!("   GET  /api/tenant/context");
    tracing::info!("   GET  /api/tenant/ping");

    // Start server
    let addr = format!(
        "{}:{}",
        state.config.server_host, state.config.server_port
    );
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("✅ Server ready at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("🛑 Shutting down");
            shutdown.cancel();
        })
        .await
        .expect("Server error");

    database.close().await;
    Ok(())
}
