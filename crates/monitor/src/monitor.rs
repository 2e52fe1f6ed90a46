//! Query performance aggregation.
//!
//! `record` is called from every request-serving task and must stay off
//! the latency path: per-pattern aggregates live in hash-sharded maps so
//! writers for different patterns rarely contend, and the slow-query ring
//! takes its own lock only for the enqueue/evict window. No I/O happens
//! inside `record`; it never returns an error.

use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use toko_models::TenancyStrategy;
use uuid::Uuid;

use crate::config::MonitorConfig;
use crate::normalize::normalize_pattern;

const SHARD_COUNT: usize = 16;

/// One completed query execution, as observed by the connection wrapper.
#[derive(Debug, Clone)]
pub struct QuerySample {
    pub sql: String,
    pub duration: Duration,
    pub tenant_id: Uuid,
    pub strategy: TenancyStrategy,
    pub error: Option<String>,
    pub params_digest: String,
}

#[derive(Debug, Clone)]
struct TenantAggregate {
    executions: u64,
    total_duration: Duration,
    errors: u64,
    last_executed: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct PatternAggregate {
    executions: u64,
    total_duration: Duration,
    min: Duration,
    max: Duration,
    error_count: u64,
    last_executed: DateTime<Utc>,
    tenants: HashMap<Uuid, TenantAggregate>,
}

impl PatternAggregate {
    fn new() -> Self {
        Self {
            executions: 0,
            total_duration: Duration::ZERO,
            min: Duration::MAX,
            max: Duration::ZERO,
            error_count: 0,
            last_executed: Utc::now(),
            tenants: HashMap::new(),
        }
    }

    fn apply(&mut self, sample: &QuerySample, now: DateTime<Utc>) {
        self.executions += 1;
        self.total_duration += sample.duration;
        self.min = self.min.min(sample.duration);
        self.max = self.max.max(sample.duration);
        self.last_executed = now;
        if sample.error.is_some() {
            self.error_count += 1;
        }
        // Anonymous operations stay out of the per-tenant breakdown, so
        // the breakdown sum may be less than the total execution count.
        if !sample.tenant_id.is_nil() {
            let tenant = self
                .tenants
                .entry(sample.tenant_id)
                .or_insert_with(|| TenantAggregate {
                    executions: 0,
                    total_duration: Duration::ZERO,
                    errors: 0,
                    last_executed: now,
                });
            tenant.executions += 1;
            tenant.total_duration += sample.duration;
            tenant.last_executed = now;
            if sample.error.is_some() {
                tenant.errors += 1;
            }
        }
    }
}

/// Deep-copied per-pattern view, safe to use without locks.
#[derive(Debug, Clone, Serialize)]
pub struct QueryStatsSnapshot {
    pub pattern: String,
    pub executions: u64,
    pub total_duration_ms: u64,
    pub avg_duration_ms: f64,
    pub min_duration_ms: u64,
    pub max_duration_ms: u64,
    pub error_count: u64,
    pub error_rate: f64,
    pub last_executed: DateTime<Utc>,
    pub per_tenant: Vec<TenantStatsSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TenantStatsSnapshot {
    pub tenant_id: Uuid,
    pub executions: u64,
    pub avg_duration_ms: f64,
    pub errors: u64,
    pub error_rate: f64,
    pub last_executed: DateTime<Utc>,
}

/// Per-tenant activity rollup across every pattern.
#[derive(Debug, Clone, Serialize)]
pub struct TenantActivity {
    pub tenant_id: Uuid,
    pub executions: u64,
    pub errors: u64,
    pub error_rate: f64,
    pub avg_duration_ms: f64,
    pub last_executed: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlowQueryRecord {
    pub pattern: String,
    pub rendered_sql: String,
    pub duration_ms: u64,
    pub tenant_id: Option<Uuid>,
    pub strategy: TenancyStrategy,
    pub timestamp: DateTime<Utc>,
    pub error_text: Option<String>,
    pub params_digest: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorSummary {
    pub total_executions: u64,
    pub total_errors: u64,
    pub error_rate: f64,
    pub avg_duration_ms: f64,
    pub pattern_count: usize,
    pub slow_query_count: usize,
    pub tenant_count: usize,
}

fn rate(errors: u64, executions: u64) -> f64 {
    if executions == 0 {
        return 0.0;
    }
    errors as f64 / executions as f64 * 100.0
}

fn avg_ms(total: Duration, executions: u64) -> f64 {
    if executions == 0 {
        return 0.0;
    }
    total.as_secs_f64() * 1000.0 / executions as f64
}

pub struct PerformanceMonitor {
    config: MonitorConfig,
    shards: Vec<RwLock<HashMap<String, PatternAggregate>>>,
    slow_log: Mutex<VecDeque<SlowQueryRecord>>,
}

impl PerformanceMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| RwLock::new(HashMap::new())).collect(),
            slow_log: Mutex::new(VecDeque::with_capacity(config.max_slow_queries.min(1024))),
            config,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    fn shard_for(&self, pattern: &str) -> &RwLock<HashMap<String, PatternAggregate>> {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        pattern.hash(&mut hasher);
        &self.shards[hasher.finish() as usize % SHARD_COUNT]
    }

    /// Record one sample. Infallible and free of I/O.
    pub fn record(&self, sample: QuerySample) {
        let now = Utc::now();
        let pattern = normalize_pattern(&sample.sql);

        {
            let mut shard = self.shard_for(&pattern).write().expect("stats lock poisoned");
            shard
                .entry(pattern.clone())
                .or_insert_with(PatternAggregate::new)
                .apply(&sample, now);
        }

        if sample.duration >= self.config.slow_query_threshold {
            let record = SlowQueryRecord {
                pattern,
                rendered_sql: sample.sql,
                duration_ms: sample.duration.as_millis() as u64,
                tenant_id: (!sample.tenant_id.is_nil()).then_some(sample.tenant_id),
                strategy: sample.strategy,
                timestamp: now,
                error_text: sample.error,
                params_digest: sample.params_digest,
            };

            if self.config.log_slow_queries {
                tracing::warn!(
                    pattern = %record.pattern,
                    duration_ms = record.duration_ms,
                    tenant_id = ?record.tenant_id,
                    tenant_type = %record.strategy,
                    params_digest = %record.params_digest,
                    "slow query detected"
                );
            }

            let mut log = self.slow_log.lock().expect("slow log lock poisoned");
            if log.len() >= self.config.max_slow_queries {
                log.pop_front();
            }
            log.push_back(record);
        }
    }

    /// All per-pattern snapshots, busiest first.
    pub fn get_stats(&self) -> Vec<QueryStatsSnapshot> {
        let mut out = Vec::new();
        for shard in &self.shards {
            let shard = shard.read().expect("stats lock poisoned");
            for (pattern, agg) in shard.iter() {
                let mut per_tenant: Vec<TenantStatsSnapshot> = agg
                    .tenants
                    .iter()
                    .map(|(id, t)| TenantStatsSnapshot {
                        tenant_id: *id,
                        executions: t.executions,
                        avg_duration_ms: avg_ms(t.total_duration, t.executions),
                        errors: t.errors,
                        error_rate: rate(t.errors, t.executions),
                        last_executed: t.last_executed,
                    })
                    .collect();
                per_tenant.sort_by(|a, b| b.executions.cmp(&a.executions));
                out.push(QueryStatsSnapshot {
                    pattern: pattern.clone(),
                    executions: agg.executions,
                    total_duration_ms: agg.total_duration.as_millis() as u64,
                    avg_duration_ms: avg_ms(agg.total_duration, agg.executions),
                    min_duration_ms: if agg.min == Duration::MAX {
                        0
                    } else {
                        agg.min.as_millis() as u64
                    },
                    max_duration_ms: agg.max.as_millis() as u64,
                    error_count: agg.error_count,
                    error_rate: rate(agg.error_count, agg.executions),
                    last_executed: agg.last_executed,
                    per_tenant,
                });
            }
        }
        out.sort_by(|a, b| b.executions.cmp(&a.executions));
        out
    }

    /// Most recent slow queries, newest first.
    pub fn get_slow_queries(&self, limit: usize) -> Vec<SlowQueryRecord> {
        let log = self.slow_log.lock().expect("slow log lock poisoned");
        log.iter().rev().take(limit).cloned().collect()
    }

    /// Slow-query records observed at or after `cutoff`.
    pub fn slow_queries_since(&self, cutoff: DateTime<Utc>) -> usize {
        let log = self.slow_log.lock().expect("slow log lock poisoned");
        log.iter().filter(|r| r.timestamp >= cutoff).count()
    }

    /// Breakdown for one tenant across all patterns it appears in.
    pub fn get_tenant_stats(&self, tenant_id: Uuid) -> Option<TenantActivity> {
        let mut executions = 0u64;
        let mut errors = 0u64;
        let mut total = Duration::ZERO;
        let mut last: Option<DateTime<Utc>> = None;
        for shard in &self.shards {
            let shard = shard.read().expect("stats lock poisoned");
            for agg in shard.values() {
                if let Some(t) = agg.tenants.get(&tenant_id) {
                    executions += t.executions;
                    errors += t.errors;
                    total += t.total_duration;
                    last = Some(match last {
                        Some(prev) => prev.max(t.last_executed),
                        None => t.last_executed,
                    });
                }
            }
        }
        last.map(|last_executed| TenantActivity {
            tenant_id,
            executions,
            errors,
            error_rate: rate(errors, executions),
            avg_duration_ms: avg_ms(total, executions),
            last_executed,
        })
    }

    /// Rollup of every tenant seen in any breakdown, busiest first.
    pub fn tenant_activity(&self, limit: usize) -> Vec<TenantActivity> {
        let mut by_tenant: HashMap<Uuid, (u64, u64, Duration, DateTime<Utc>)> = HashMap::new();
        for shard in &self.shards {
            let shard = shard.read().expect("stats lock poisoned");
            for agg in shard.values() {
                for (id, t) in &agg.tenants {
                    let entry = by_tenant
                        .entry(*id)
                        .or_insert((0, 0, Duration::ZERO, t.last_executed));
                    entry.0 += t.executions;
                    entry.1 += t.errors;
                    entry.2 += t.total_duration;
                    entry.3 = entry.3.max(t.last_executed);
                }
            }
        }
        let mut out: Vec<TenantActivity> = by_tenant
            .into_iter()
            .map(|(tenant_id, (executions, errors, total, last_executed))| TenantActivity {
                tenant_id,
                executions,
                errors,
                error_rate: rate(errors, executions),
                avg_duration_ms: avg_ms(total, executions),
                last_executed,
            })
            .collect();
        out.sort_by(|a, b| b.executions.cmp(&a.executions));
        out.truncate(limit);
        out
    }

    pub fn summary(&self) -> MonitorSummary {
        let mut total_executions = 0u64;
        let mut total_errors = 0u64;
        let mut total_duration = Duration::ZERO;
        let mut pattern_count = 0usize;
        let mut tenants: std::collections::HashSet<Uuid> = std::collections::HashSet::new();
        for shard in &self.shards {
            let shard = shard.read().expect("stats lock poisoned");
            pattern_count += shard.len();
            for agg in shard.values() {
                total_executions += agg.executions;
                total_errors += agg.error_count;
                total_duration += agg.total_duration;
                tenants.extend(agg.tenants.keys().copied());
            }
        }
        let slow_query_count = self.slow_log.lock().expect("slow log lock poisoned").len();
        MonitorSummary {
            total_executions,
            total_errors,
            error_rate: rate(total_errors, total_executions),
            avg_duration_ms: avg_ms(total_duration, total_executions),
            pattern_count,
            slow_query_count,
            tenant_count: tenants.len(),
        }
    }

    /// Wipe stats and the slow-query log. Not called on the hot path.
    pub fn clear(&self) {
        for shard in &self.shards {
            shard.write().expect("stats lock poisoned").clear();
        }
        self.slow_log.lock().expect("slow log lock poisoned").clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn sample(sql: &str, millis: u64, tenant: Uuid, error: Option<&str>) -> QuerySample {
        QuerySample {
            sql: sql.to_string(),
            duration: Duration::from_millis(millis),
            tenant_id: tenant,
            strategy: TenancyStrategy::Shared,
            error: error.map(String::from),
            params_digest: "deadbeefdeadbeef".to_string(),
        }
    }

    fn monitor_with(threshold_ms: u64, max_slow: usize) -> PerformanceMonitor {
        PerformanceMonitor::new(MonitorConfig {
            slow_query_threshold: Duration::from_millis(threshold_ms),
            max_slow_queries: max_slow,
            log_slow_queries: false,
            ..MonitorConfig::default()
        })
    }

    #[test]
    fn test_record_aggregates_per_pattern() {
        let monitor = monitor_with(500, 10);
        let tenant = Uuid::new_v4();
        monitor.record(sample("SELECT * FROM t WHERE id = 1", 10, tenant, None));
        monitor.record(sample("SELECT * FROM t WHERE id = 2", 30, tenant, Some("boom")));
        monitor.record(sample("SELECT * FROM other", 20, Uuid::nil(), None));

        let stats = monitor.get_stats();
        assert_eq!(stats.len(), 2);
        let t = stats
            .iter()
            .find(|s| s.pattern.contains("FROM t"))
            .unwrap();
        assert_eq!(t.executions, 2);
        assert_eq!(t.error_count, 1);
        assert_eq!(t.min_duration_ms, 10);
        assert_eq!(t.max_duration_ms, 30);
        assert_eq!(t.error_rate, 50.0);
        assert_eq!(t.per_tenant.len(), 1);
        assert_eq!(t.per_tenant[0].executions, 2);
    }

    #[test]
    fn test_anonymous_samples_skip_tenant_breakdown() {
        let monitor = monitor_with(500, 10);
        monitor.record(sample("SELECT 1", 5, Uuid::nil(), None));
        monitor.record(sample("SELECT 1", 5, Uuid::new_v4(), None));
        let stats = monitor.get_stats();
        assert_eq!(stats[0].executions, 2);
        let breakdown_total: u64 = stats[0].per_tenant.iter().map(|t| t.executions).sum();
        assert!(breakdown_total <= stats[0].executions);
        assert_eq!(breakdown_total, 1);
    }

    #[test]
    fn test_slow_ring_is_bounded_and_recent() {
        let monitor = monitor_with(0, 5);
        for i in 0..8 {
            monitor.record(sample(&format!("SELECT {}", i), 10, Uuid::nil(), None));
        }
        let slow = monitor.get_slow_queries(100);
        assert_eq!(slow.len(), 5);
        // Newest first; the oldest three were evicted.
        assert_eq!(slow[0].rendered_sql, "SELECT 7");
        assert_eq!(slow[4].rendered_sql, "SELECT 3");
    }

    #[test]
    fn test_fast_queries_stay_out_of_slow_log() {
        let monitor = monitor_with(500, 10);
        monitor.record(sample("SELECT 1", 10, Uuid::nil(), None));
        assert!(monitor.get_slow_queries(10).is_empty());
        monitor.record(sample("SELECT 1", 500, Uuid::nil(), None));
        assert_eq!(monitor.get_slow_queries(10).len(), 1);
    }

    #[test]
    fn test_concurrent_record_loses_nothing() {
        let monitor = Arc::new(monitor_with(1_000, 10));
        let threads = 32;
        let per_thread = 320;
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let monitor = monitor.clone();
                std::thread::spawn(move || {
                    let tenant = Uuid::new_v4();
                    for _ in 0..per_thread {
                        monitor.record(sample("SELECT * FROM hot WHERE id = 1", 3, tenant, None));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let stats = monitor.get_stats();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].executions, (threads * per_thread) as u64);
        let s = &stats[0];
        let avg = s.avg_duration_ms;
        assert!(s.min_duration_ms as f64 <= avg && avg <= s.max_duration_ms as f64 + 1.0);
        assert_eq!(monitor.summary().total_executions, (threads * per_thread) as u64);
    }

    #[test]
    fn test_tenant_activity_rollup() {
        let monitor = monitor_with(500, 10);
        let busy = Uuid::new_v4();
        let quiet = Uuid::new_v4();
        for _ in 0..5 {
            monitor.record(sample("SELECT * FROM a", 10, busy, None));
        }
        monitor.record(sample("SELECT * FROM b", 10, busy, Some("x")));
        monitor.record(sample("SELECT * FROM a", 10, quiet, None));

        let activity = monitor.tenant_activity(10);
        assert_eq!(activity.len(), 2);
        assert_eq!(activity[0].tenant_id, busy);
        assert_eq!(activity[0].executions, 6);
        assert_eq!(activity[0].errors, 1);

        let one = monitor.get_tenant_stats(busy).unwrap();
        assert_eq!(one.executions, 6);
        assert!(monitor.get_tenant_stats(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_clear_resets_everything() {
        let monitor = monitor_with(0, 10);
        monitor.record(sample("SELECT 1", 10, Uuid::new_v4(), None));
        monitor.clear();
        assert!(monitor.get_stats().is_empty());
        assert!(monitor.get_slow_queries(10).is_empty());
        assert_eq!(monitor.summary().total_executions, 0);
    }

    #[test]
    fn test_zero_executions_zero_rate() {
        assert_eq!(rate(0, 0), 0.0);
        assert_eq!(avg_ms(Duration::ZERO, 0), 0.0);
    }
}
