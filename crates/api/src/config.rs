use toko_database::{DatabaseConfig, ResolverConfig};
use toko_monitor::MonitorConfig;
use toko_tenant::DEFAULT_TENANT_HEADERS;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database: DatabaseConfig,
    pub resolver: ResolverConfig,
    pub monitor: MonitorConfig,
    /// Reject requests carrying no tenant identification.
    pub require_tenant: bool,
    /// Headers consulted in order to identify the storefront.
    pub tenant_headers: Vec<String>,
    /// Optional webhook URL for alert notifications.
    pub alert_webhook_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            server_host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: std::env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database: DatabaseConfig::from_env(),
            resolver: ResolverConfig::from_env(),
            monitor: MonitorConfig::from_env(),
            require_tenant: std::env::var("REQUIRE_TENANT")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
            tenant_headers: std::env::var("TENANT_HEADERS")
                .map(|v| {
                    v.split(',')
                        .map(|h| h.trim().to_string())
                        .filter(|h| !h.is_empty())
                        .collect()
                })
                .unwrap_or_else(|_| {
                    DEFAULT_TENANT_HEADERS.iter().map(|s| s.to_string()).collect()
                }),
            alert_webhook_url: std::env::var("ALERT_WEBHOOK_URL").ok(),
        }
    }
}
