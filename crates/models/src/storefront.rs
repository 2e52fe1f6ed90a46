use crate::strategy::TenancyStrategy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Storefront registration row from the master database.
///
/// The connection fields are only populated for `isolated` storefronts;
/// `schema_name` only for `schema` storefronts.
#[derive(Debug, Clone, FromRow)]
pub struct StorefrontRecord {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub custom_domain: Option<String>,
    pub tenancy_strategy: String,
    pub schema_name: Option<String>,
    pub database_host: Option<String>,
    pub database_port: Option<i32>,
    pub database_name: Option<String>,
    pub database_user: Option<String>,
    pub database_password_encrypted: Option<String>,
    pub pool_min_connections: Option<i32>,
    pub pool_max_connections: Option<i32>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl StorefrontRecord {
    pub fn strategy(&self) -> TenancyStrategy {
        TenancyStrategy::from(self.tenancy_strategy.as_str())
    }

    pub fn is_active(&self) -> bool {
        self.status == "active"
    }

    /// Schema used for this storefront's tables under the `schema`
    /// strategy. The registry column wins; otherwise the name is derived
    /// from the id in dash-less form so it stays a valid unquoted
    /// identifier.
    pub fn schema(&self) -> String {
        match &self.schema_name {
            Some(s) if !s.is_empty() => s.clone(),
            _ => format!("tenant_{}", self.id.simple()),
        }
    }
}

/// Observed size and load of one storefront, input to migration
/// assessment. Counts come from the storefront's own store; query timing
/// comes from the performance monitor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorefrontUsage {
    pub customer_count: u64,
    pub order_count: u64,
    pub data_size_bytes: u64,
    pub avg_query_time_ms: f64,
    pub queries_per_second: f64,
}

/// Advisory outcome of a migration assessment. Actual migration is
/// operator-driven and out of scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "advice", rename_all = "snake_case")]
pub enum MigrationAdvice {
    None,
    PromoteToSchema { exceeded: Vec<String> },
    PromoteToIsolated { exceeded: Vec<String> },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(strategy: &str, schema_name: Option<&str>) -> StorefrontRecord {
        StorefrontRecord {
            id: Uuid::parse_str("a1a2a3a4-b1b2-c1c2-d1d2-d3d4d5d6d7d8").unwrap(),
            slug: "acme".to_string(),
            name: "Acme".to_string(),
            custom_domain: None,
            tenancy_strategy: strategy.to_string(),
            schema_name: schema_name.map(String::from),
            database_host: None,
            database_port: None,
            database_name: None,
            database_user: None,
            database_password_encrypted: None,
            pool_min_connections: None,
            pool_max_connections: None,
            status: "active".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_schema_prefers_registry_column() {
        let r = record("schema", Some("acme_store"));
        assert_eq!(r.schema(), "acme_store");
    }

    #[test]
    fn test_schema_derived_from_id_has_no_dashes() {
        let r = record("schema", None);
        assert_eq!(r.schema(), "tenant_a1a2a3a4b1b2c1c2d1d2d3d4d5d6d7d8");
    }

    #[test]
    fn test_empty_schema_column_falls_back_to_derived() {
        let r = record("schema", Some(""));
        assert!(r.schema().starts_with("tenant_"));
    }
}
