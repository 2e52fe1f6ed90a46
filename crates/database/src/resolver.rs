//! Tenant resolution and routing.
//!
//! Answers three questions for any storefront id: which tenancy strategy,
//! which connection, which schema (if any). Bindings are cached with a
//! bounded TTL/LRU cache; dedicated pools for `isolated` storefronts are
//! cached separately so a suspended binding does not tear down a pool
//! that is still draining.
//!
//! Registry lookups are bounded by `resolution_timeout`. A missing or
//! non-active storefront is `NotFound` (terminal, never retried); an
//! unreachable registry is `Unavailable` (caller may retry, the resolver
//! itself never loops).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use toko_cache::{spawn_sweeper, CacheStats, TtlCache};
use toko_models::{MigrationAdvice, StorefrontRecord, StorefrontUsage, TenancyStrategy};
use toko_tenant::{TenantContext, TenantRef};
use uuid::Uuid;

use crate::credentials::CredentialCipher;
use crate::error::{DatabaseError, Result};
use crate::monitored::TenantDirectory;

const STOREFRONT_COLUMNS: &str = "id, slug, name, custom_domain, tenancy_strategy, schema_name, \
     database_host, database_port, database_name, database_user, database_password_encrypted, \
     pool_min_connections, pool_max_connections, status, created_at";

/// The resolver's answer for one storefront.
#[derive(Debug, Clone)]
pub struct TenantBinding {
    pub strategy: TenancyStrategy,
    pub pool: PgPool,
    pub schema_name: Option<String>,
}

/// Size/load levels at which a storefront outgrows its isolation tier.
/// The isolated tier kicks in at `isolated_factor` times each threshold.
#[derive(Debug, Clone)]
pub struct MigrationThresholds {
    pub max_customers: u64,
    pub max_orders: u64,
    pub max_data_bytes: u64,
    pub max_avg_query_ms: f64,
    pub max_qps: f64,
    pub isolated_factor: f64,
}

impl Default for MigrationThresholds {
    fn default() -> Self {
        Self {
            max_customers: 10_000,
            max_orders: 50_000,
            max_data_bytes: 5 * 1024 * 1024 * 1024,
            max_avg_query_ms: 250.0,
            max_qps: 50.0,
            isolated_factor: 4.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// TTL for cached bindings.
    pub storefront_ttl: Duration,
    /// TTL for cached usage stats.
    pub stats_ttl: Duration,
    /// Capacity of each cache.
    pub max_entries: usize,
    /// Sweeper interval for expired entries.
    pub cleanup_interval: Duration,
    /// Hard timeout on registry lookups.
    pub resolution_timeout: Duration,
    /// Pool sizing for dedicated storefront databases.
    pub default_max_connections: u32,
    pub default_min_connections: u32,
    /// Base64 AES-256 key for dedicated-DB passwords.
    pub encryption_key: Option<String>,
    pub migration: MigrationThresholds,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            storefront_ttl: Duration::from_secs(3600),
            stats_ttl: Duration::from_secs(900),
            max_entries: 1000,
            cleanup_interval: Duration::from_secs(300),
            resolution_timeout: Duration::from_secs(5),
            default_max_connections: 10,
            default_min_connections: 1,
            encryption_key: None,
            migration: MigrationThresholds::default(),
        }
    }
}

impl ResolverConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        let secs = |name: &str, default: u64| {
            Duration::from_secs(
                std::env::var(name)
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default),
            )
        };
        Self {
            storefront_ttl: secs("CACHE_STOREFRONT_TTL_SECS", d.storefront_ttl.as_secs()),
            stats_ttl: secs("CACHE_STATS_TTL_SECS", d.stats_ttl.as_secs()),
            max_entries: std::env::var("CACHE_MAX_ENTRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(d.max_entries),
            cleanup_interval: secs("CACHE_CLEANUP_INTERVAL_SECS", d.cleanup_interval.as_secs()),
            resolution_timeout: secs("RESOLUTION_TIMEOUT_SECS", d.resolution_timeout.as_secs()),
            default_max_connections: std::env::var("TENANT_DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(d.default_max_connections),
            default_min_connections: std::env::var("TENANT_DB_MIN_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(d.default_min_connections),
            encryption_key: std::env::var("TENANT_DB_ENCRYPTION_KEY").ok(),
            migration: MigrationThresholds::default(),
        }
    }
}

/// Resolver cache counters, exposed on the admin surface.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ResolverStats {
    pub bindings: CacheStats,
    pub usage: CacheStats,
    pub dedicated_pools: u64,
}

pub struct TenantResolver {
    master_pool: PgPool,
    config: ResolverConfig,
    bindings: Arc<TtlCache<Uuid, TenantBinding>>,
    usage: Arc<TtlCache<Uuid, StorefrontUsage>>,
    pools: Cache<Uuid, PgPool>,
    cipher: Option<CredentialCipher>,
}

impl TenantResolver {
    pub fn new(master_pool: PgPool, config: ResolverConfig) -> Result<Self> {
        let cipher = config
            .encryption_key
            .as_deref()
            .map(CredentialCipher::new)
            .transpose()?;
        let pools = Cache::builder()
            .max_capacity(config.max_entries as u64)
            .time_to_live(config.storefront_ttl)
            .build();
        Ok(Self {
            bindings: Arc::new(TtlCache::new(config.max_entries, config.storefront_ttl)),
            usage: Arc::new(TtlCache::new(config.max_entries, config.stats_ttl)),
            pools,
            cipher,
            master_pool,
            config,
        })
    }

    pub fn master_pool(&self) -> &PgPool {
        &self.master_pool
    }

    /// Spawn the expired-entry sweepers for both caches. Tasks exit when
    /// the token is cancelled.
    pub fn start_sweepers(&self, token: &CancellationToken) -> Vec<tokio::task::JoinHandle<()>> {
        vec![
            spawn_sweeper(
                self.bindings.clone(),
                self.config.cleanup_interval,
                token.clone(),
            ),
            spawn_sweeper(
                self.usage.clone(),
                self.config.cleanup_interval,
                token.clone(),
            ),
        ]
    }

    /// Strategy, connection, and schema for a storefront. Safe for
    /// concurrent callers; the cached fast path takes a shared lock only.
    pub async fn resolve(&self, tenant_id: Uuid) -> Result<TenantBinding> {
        if let Some(binding) = self.bindings.get(&tenant_id) {
            return Ok(binding);
        }

        let record = self.get_storefront(tenant_id).await?;
        if !record.is_active() {
            return Err(DatabaseError::NotFound(format!(
                "Storefront {} is not active (status: {})",
                record.slug, record.status
            )));
        }

        let binding = self.binding_for(&record).await?;
        self.bindings.insert(tenant_id, binding.clone());
        Ok(binding)
    }

    /// Context for request-entry code.
    pub async fn context_for(&self, tenant_id: Uuid) -> Result<TenantContext> {
        let binding = self.resolve(tenant_id).await?;
        Ok(TenantContext::new(tenant_id, binding.strategy))
    }

    /// Resolve a header-derived reference (slug, domain, or id) into a
    /// request context.
    pub async fn context_for_ref(&self, tenant_ref: &TenantRef) -> Result<TenantContext> {
        let record = match tenant_ref {
            TenantRef::Id(id) => return self.context_for(*id).await,
            TenantRef::Slug(slug) => self.get_storefront_by_slug(slug).await?,
            TenantRef::Domain(domain) => self.get_storefront_by_domain(domain).await?,
        };
        self.context_for(record.id).await
    }

    async fn binding_for(&self, record: &StorefrontRecord) -> Result<TenantBinding> {
        let binding = match record.strategy() {
            TenancyStrategy::Shared => TenantBinding {
                strategy: TenancyStrategy::Shared,
                pool: self.master_pool.clone(),
                schema_name: None,
            },
            TenancyStrategy::Schema => TenantBinding {
                strategy: TenancyStrategy::Schema,
                pool: self.master_pool.clone(),
                schema_name: Some(record.schema()),
            },
            TenancyStrategy::Isolated => {
                let pool = match self.pools.get(&record.id).await {
                    Some(pool) => pool,
                    None => {
                        let pool = self.create_dedicated_pool(record).await?;
                        self.pools.insert(record.id, pool.clone()).await;
                        pool
                    }
                };
                TenantBinding {
                    strategy: TenancyStrategy::Isolated,
                    pool,
                    schema_name: None,
                }
            }
        };
        Ok(binding)
    }

    async fn with_timeout<T>(
        &self,
        fut: impl std::future::Future<Output = std::result::Result<T, sqlx::Error>>,
    ) -> Result<T> {
        tokio::time::timeout(self.config.resolution_timeout, fut)
            .await
            .map_err(|_| {
                DatabaseError::Unavailable("storefront registry lookup timed out".to_string())
            })?
            .map_err(DatabaseError::from_sqlx)
    }

    pub async fn get_storefront(&self, tenant_id: Uuid) -> Result<StorefrontRecord> {
        let query = format!(
            "SELECT {} FROM storefronts WHERE id = $1",
            STOREFRONT_COLUMNS
        );
        self.with_timeout(
            sqlx::query_as::<_, StorefrontRecord>(&query)
                .bind(tenant_id)
                .fetch_optional(&self.master_pool),
        )
        .await?
        .ok_or_else(|| DatabaseError::not_found("storefront", tenant_id))
    }

    pub async fn get_storefront_by_slug(&self, slug: &str) -> Result<StorefrontRecord> {
        if slug.is_empty() {
            return Err(DatabaseError::invalid("slug", "slug must not be empty"));
        }
        let query = format!(
            "SELECT {} FROM storefronts WHERE slug = $1",
            STOREFRONT_COLUMNS
        );
        self.with_timeout(
            sqlx::query_as::<_, StorefrontRecord>(&query)
                .bind(slug)
                .fetch_optional(&self.master_pool),
        )
        .await?
        .ok_or_else(|| DatabaseError::not_found("storefront", slug))
    }

    pub async fn get_storefront_by_domain(&self, domain: &str) -> Result<StorefrontRecord> {
        let query = format!(
            "SELECT {} FROM storefronts WHERE custom_domain = $1",
            STOREFRONT_COLUMNS
        );
        self.with_timeout(
            sqlx::query_as::<_, StorefrontRecord>(&query)
                .bind(domain)
                .fetch_optional(&self.master_pool),
        )
        .await?
        .ok_or_else(|| DatabaseError::not_found("storefront", domain))
    }

    /// Register a new storefront in `provisioning` state.
    pub async fn create_storefront(
        &self,
        slug: &str,
        name: &str,
        strategy: TenancyStrategy,
    ) -> Result<StorefrontRecord> {
        let query = format!(
            "INSERT INTO storefronts (slug, name, tenancy_strategy, status) \
             VALUES ($1, $2, $3, 'provisioning') RETURNING {}",
            STOREFRONT_COLUMNS
        );
        let record = self
            .with_timeout(
                sqlx::query_as::<_, StorefrontRecord>(&query)
                    .bind(slug)
                    .bind(name)
                    .bind(strategy.as_str())
                    .fetch_one(&self.master_pool),
            )
            .await?;

        tracing::info!(
            tenant_id = %record.id,
            slug = %record.slug,
            tenant_type = %strategy,
            "created storefront"
        );
        Ok(record)
    }

    /// Store encrypted connection details for an `isolated` storefront
    /// and mark it active.
    pub async fn configure_dedicated_database(
        &self,
        tenant_id: Uuid,
        host: &str,
        port: i32,
        database_name: &str,
        username: &str,
        password: &str,
    ) -> Result<StorefrontRecord> {
        let cipher = self.cipher.as_ref().ok_or_else(|| {
            DatabaseError::Configuration(
                "Encryption key not configured. Set TENANT_DB_ENCRYPTION_KEY.".to_string(),
            )
        })?;
        let encrypted_password = cipher.encrypt(password)?;

        let query = format!(
            "UPDATE storefronts \
             SET database_host = $1, database_port = $2, database_name = $3, \
                 database_user = $4, database_password_encrypted = $5, \
                 status = 'active', updated_at = NOW() \
             WHERE id = $6 RETURNING {}",
            STOREFRONT_COLUMNS
        );
        let record = self
            .with_timeout(
                sqlx::query_as::<_, StorefrontRecord>(&query)
                    .bind(host)
                    .bind(port)
                    .bind(database_name)
                    .bind(username)
                    .bind(&encrypted_password)
                    .bind(tenant_id)
                    .fetch_one(&self.master_pool),
            )
            .await?;

        // Pick up the new connection details on the next resolve.
        self.bindings.invalidate(&tenant_id);
        self.pools.invalidate(&tenant_id).await;

        tracing::info!(
            tenant_id = %record.id,
            slug = %record.slug,
            "configured dedicated database {}@{}:{}/{}",
            username,
            host,
            port,
            database_name
        );
        Ok(record)
    }

    pub async fn activate_storefront(&self, tenant_id: Uuid) -> Result<StorefrontRecord> {
        let query = format!(
            "UPDATE storefronts SET status = 'active', updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            STOREFRONT_COLUMNS
        );
        let record = self
            .with_timeout(
                sqlx::query_as::<_, StorefrontRecord>(&query)
                    .bind(tenant_id)
                    .fetch_one(&self.master_pool),
            )
            .await?;

        tracing::info!(tenant_id = %record.id, slug = %record.slug, "activated storefront");
        Ok(record)
    }

    pub async fn suspend_storefront(&self, tenant_id: Uuid) -> Result<()> {
        self.with_timeout(
            sqlx::query(
                "UPDATE storefronts SET status = 'suspended', updated_at = NOW() WHERE id = $1",
            )
            .bind(tenant_id)
            .execute(&self.master_pool),
        )
        .await?;

        self.bindings.invalidate(&tenant_id);
        self.pools.invalidate(&tenant_id).await;

        tracing::info!(tenant_id = %tenant_id, "suspended storefront");
        Ok(())
    }

    pub async fn list_storefronts(&self, include_inactive: bool) -> Result<Vec<StorefrontRecord>> {
        let query = if include_inactive {
            format!(
                "SELECT {} FROM storefronts ORDER BY created_at DESC",
                STOREFRONT_COLUMNS
            )
        } else {
            format!(
                "SELECT {} FROM storefronts WHERE status = 'active' ORDER BY created_at DESC",
                STOREFRONT_COLUMNS
            )
        };
        self.with_timeout(
            sqlx::query_as::<_, StorefrontRecord>(&query).fetch_all(&self.master_pool),
        )
        .await
    }

    /// Counts and sizes from the storefront's own store, cached with the
    /// stats TTL. Query-time figures are the monitor's business; callers
    /// merge them in before an assessment.
    pub async fn fetch_usage(&self, tenant_id: Uuid) -> Result<StorefrontUsage> {
        if let Some(usage) = self.usage.get(&tenant_id) {
            return Ok(usage);
        }

        let binding = self.resolve(tenant_id).await?;
        let (customers_table, orders_table, tenant_filter) =
            match (&binding.strategy, &binding.schema_name) {
                (TenancyStrategy::Schema, Some(schema)) => (
                    format!("{}.customers", schema),
                    format!("{}.orders", schema),
                    None,
                ),
                (TenancyStrategy::Shared, _) => (
                    "customers".to_string(),
                    "orders".to_string(),
                    Some(tenant_id),
                ),
                _ => ("customers".to_string(), "orders".to_string(), None),
            };

        let customer_count = self
            .count_rows(&binding.pool, &customers_table, tenant_filter)
            .await?;
        let order_count = self
            .count_rows(&binding.pool, &orders_table, tenant_filter)
            .await?;

        let data_size_bytes: i64 = match (&binding.strategy, &binding.schema_name) {
            (TenancyStrategy::Isolated, _) => {
                self.with_timeout(
                    sqlx::query_scalar("SELECT pg_database_size(current_database())")
                        .fetch_one(&binding.pool),
                )
                .await?
            }
            (TenancyStrategy::Schema, Some(schema)) => {
                self.with_timeout(
                    sqlx::query_scalar(
                        "SELECT COALESCE(SUM(pg_total_relation_size( \
                         quote_ident(schemaname) || '.' || quote_ident(tablename))), 0)::bigint \
                         FROM pg_tables WHERE schemaname = $1",
                    )
                    .bind(schema)
                    .fetch_one(&binding.pool),
                )
                .await?
            }
            // Shared rows interleave with other tenants; relation size is
            // not attributable to one storefront.
            _ => 0,
        };

        let usage = StorefrontUsage {
            customer_count: customer_count.max(0) as u64,
            order_count: order_count.max(0) as u64,
            data_size_bytes: data_size_bytes.max(0) as u64,
            avg_query_time_ms: 0.0,
            queries_per_second: 0.0,
        };
        self.usage.insert(tenant_id, usage.clone());
        Ok(usage)
    }

    /// Advisory only: whether the storefront has outgrown its tier.
    pub async fn assess_migration(
        &self,
        tenant_id: Uuid,
        usage: &StorefrontUsage,
    ) -> Result<MigrationAdvice> {
        let binding = self.resolve(tenant_id).await?;
        Ok(advise(binding.strategy, usage, &self.config.migration))
    }

    pub fn stats(&self) -> ResolverStats {
        ResolverStats {
            bindings: self.bindings.stats(),
            usage: self.usage.stats(),
            dedicated_pools: self.pools.entry_count(),
        }
    }

    async fn count_rows(
        &self,
        pool: &PgPool,
        table: &str,
        tenant_filter: Option<Uuid>,
    ) -> Result<i64> {
        match tenant_filter {
            Some(tenant_id) => {
                self.with_timeout(
                    sqlx::query_scalar::<_, i64>(&format!(
                        "SELECT COUNT(*) FROM {} WHERE tenant_id = $1",
                        table
                    ))
                    .bind(tenant_id)
                    .fetch_one(pool),
                )
                .await
            }
            None => {
                self.with_timeout(
                    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
                        .fetch_one(pool),
                )
                .await
            }
        }
    }

    async fn create_dedicated_pool(&self, record: &StorefrontRecord) -> Result<PgPool> {
        let missing = |what: &str| {
            DatabaseError::Configuration(format!(
                "Storefront {} is isolated but has no {} configured",
                record.slug, what
            ))
        };

        let host = record.database_host.as_ref().ok_or_else(|| missing("database host"))?;
        let port = record.database_port.unwrap_or(5432) as u16;
        let database = record
            .database_name
            .as_ref()
            .ok_or_else(|| missing("database name"))?;
        let username = record
            .database_user
            .as_ref()
            .ok_or_else(|| missing("database user"))?;
        let encrypted = record
            .database_password_encrypted
            .as_ref()
            .ok_or_else(|| missing("database password"))?;
        let cipher = self.cipher.as_ref().ok_or_else(|| {
            DatabaseError::Configuration(
                "Encryption key not configured. Set TENANT_DB_ENCRYPTION_KEY.".to_string(),
            )
        })?;
        let password = cipher.decrypt(encrypted)?;

        let max_connections = record
            .pool_max_connections
            .map(|c| c as u32)
            .unwrap_or(self.config.default_max_connections);
        let min_connections = record
            .pool_min_connections
            .map(|c| c as u32)
            .unwrap_or(self.config.default_min_connections);

        let options = PgConnectOptions::new()
            .host(host)
            .port(port)
            .database(database)
            .username(username)
            .password(&password);

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .connect_with(options)
            .await
            .map_err(|e| {
                DatabaseError::Unavailable(format!(
                    "Failed to connect to storefront {} database: {}",
                    record.slug, e
                ))
            })?;

        tracing::info!(
            tenant_id = %record.id,
            slug = %record.slug,
            "created dedicated pool ({}:{}/{})",
            host,
            port,
            database
        );
        Ok(pool)
    }
}

#[async_trait]
impl TenantDirectory for TenantResolver {
    async fn get_pool(&self, tenant_id: Uuid) -> Result<PgPool> {
        Ok(self.resolve(tenant_id).await?.pool)
    }

    async fn get_strategy(&self, tenant_id: Uuid) -> Result<TenancyStrategy> {
        Ok(self.resolve(tenant_id).await?.strategy)
    }

    async fn create_context(&self, tenant_id: Uuid) -> Result<TenantContext> {
        self.context_for(tenant_id).await
    }
}

fn exceeded(usage: &StorefrontUsage, t: &MigrationThresholds, factor: f64) -> Vec<String> {
    let mut out = Vec::new();
    if (usage.customer_count as f64) > t.max_customers as f64 * factor {
        out.push("customer_count".to_string());
    }
    if (usage.order_count as f64) > t.max_orders as f64 * factor {
        out.push("order_count".to_string());
    }
    if (usage.data_size_bytes as f64) > t.max_data_bytes as f64 * factor {
        out.push("data_size_bytes".to_string());
    }
    if usage.avg_query_time_ms > t.max_avg_query_ms * factor {
        out.push("avg_query_time_ms".to_string());
    }
    if usage.queries_per_second > t.max_qps * factor {
        out.push("queries_per_second".to_string());
    }
    out
}

/// Pure assessment logic. A storefront already on `isolated` never gets
/// advice; `shared` can be promoted straight to `isolated` when it blows
/// past the higher tier.
pub fn advise(
    strategy: TenancyStrategy,
    usage: &StorefrontUsage,
    thresholds: &MigrationThresholds,
) -> MigrationAdvice {
    match strategy {
        TenancyStrategy::Isolated => MigrationAdvice::None,
        TenancyStrategy::Schema => {
            let ex = exceeded(usage, thresholds, thresholds.isolated_factor);
            if ex.is_empty() {
                MigrationAdvice::None
            } else {
                MigrationAdvice::PromoteToIsolated { exceeded: ex }
            }
        }
        TenancyStrategy::Shared => {
            let ex_isolated = exceeded(usage, thresholds, thresholds.isolated_factor);
            if !ex_isolated.is_empty() {
                return MigrationAdvice::PromoteToIsolated {
                    exceeded: ex_isolated,
                };
            }
            let ex = exceeded(usage, thresholds, 1.0);
            if ex.is_empty() {
                MigrationAdvice::None
            } else {
                MigrationAdvice::PromoteToSchema { exceeded: ex }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> MigrationThresholds {
        MigrationThresholds::default()
    }

    #[test]
    fn test_small_shared_storefront_stays_put() {
        let usage = StorefrontUsage {
            customer_count: 10,
            order_count: 20,
            ..StorefrontUsage::default()
        };
        assert_eq!(
            advise(TenancyStrategy::Shared, &usage, &thresholds()),
            MigrationAdvice::None
        );
    }

    #[test]
    fn test_shared_over_threshold_promotes_to_schema() {
        let usage = StorefrontUsage {
            customer_count: 10_001,
            ..StorefrontUsage::default()
        };
        match advise(TenancyStrategy::Shared, &usage, &thresholds()) {
            MigrationAdvice::PromoteToSchema { exceeded } => {
                assert_eq!(exceeded, vec!["customer_count"]);
            }
            other => panic!("unexpected advice: {:?}", other),
        }
    }

    #[test]
    fn test_shared_far_over_threshold_promotes_to_isolated() {
        let usage = StorefrontUsage {
            order_count: 50_000 * 4 + 1,
            ..StorefrontUsage::default()
        };
        assert!(matches!(
            advise(TenancyStrategy::Shared, &usage, &thresholds()),
            MigrationAdvice::PromoteToIsolated { .. }
        ));
    }

    #[test]
    fn test_schema_promotes_only_at_higher_tier() {
        let moderate = StorefrontUsage {
            customer_count: 20_000,
            ..StorefrontUsage::default()
        };
        assert_eq!(
            advise(TenancyStrategy::Schema, &moderate, &thresholds()),
            MigrationAdvice::None
        );
        let heavy = StorefrontUsage {
            customer_count: 40_001,
            ..StorefrontUsage::default()
        };
        assert!(matches!(
            advise(TenancyStrategy::Schema, &heavy, &thresholds()),
            MigrationAdvice::PromoteToIsolated { .. }
        ));
    }

    #[test]
    fn test_isolated_never_gets_advice() {
        let usage = StorefrontUsage {
            customer_count: u64::MAX / 2,
            queries_per_second: 1e9,
            ..StorefrontUsage::default()
        };
        assert_eq!(
            advise(TenancyStrategy::Isolated, &usage, &thresholds()),
            MigrationAdvice::None
        );
    }

    #[test]
    fn test_multiple_exceeded_thresholds_are_listed() {
        let usage = StorefrontUsage {
            customer_count: 15_000,
            order_count: 60_000,
            avg_query_time_ms: 300.0,
            ..StorefrontUsage::default()
        };
        match advise(TenancyStrategy::Shared, &usage, &thresholds()) {
            MigrationAdvice::PromoteToSchema { exceeded } => {
                assert_eq!(
                    exceeded,
                    vec!["customer_count", "order_count", "avg_query_time_ms"]
                );
            }
            other => panic!("unexpected advice: {:?}", other),
        }
    }

    #[test]
    fn test_config_defaults_match_contract() {
        let c = ResolverConfig::default();
        assert_eq!(c.storefront_ttl, Duration::from_secs(3600));
        assert_eq!(c.stats_ttl, Duration::from_secs(900));
        assert_eq!(c.max_entries, 1000);
        assert_eq!(c.cleanup_interval, Duration::from_secs(300));
        assert_eq!(c.resolution_timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn test_resolve_against_live_registry() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect(&std::env::var("DATABASE_URL").unwrap())
            .await
            .unwrap();
        let resolver = TenantResolver::new(pool, ResolverConfig::default()).unwrap();
        let err = resolver.resolve(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound(_)));
    }
}
