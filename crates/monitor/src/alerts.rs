//! Threshold evaluation and alert lifecycle.
//!
//! One dedicated task evaluates aggregated monitor state on a fixed tick;
//! an evaluation still in progress at the next tick delays that tick.
//! Every alert key `(kind, pattern?, tenant_id?)` is subject to a
//! cooldown so a saturated threshold does not produce a storm.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use toko_models::{Alert, AlertKind, AlertSeverity};
use uuid::Uuid;

use crate::config::MonitorConfig;
use crate::error::{MonitorError, Result};
use crate::monitor::PerformanceMonitor;
use crate::notify::{format_alert, AlertSink};

type CooldownKey = (AlertKind, Option<String>, Option<Uuid>);

/// Severity ladder for error-rate style metrics.
fn error_rate_severity(rate: f64) -> AlertSeverity {
    if rate >= 25.0 {
        AlertSeverity::Critical
    } else if rate >= 15.0 {
        AlertSeverity::High
    } else {
        AlertSeverity::Medium
    }
}

pub struct AlertEngine {
    monitor: Arc<PerformanceMonitor>,
    config: MonitorConfig,
    history: Mutex<Vec<Alert>>,
    // Lock order when both are needed: cooldowns before history.
    cooldowns: Mutex<HashMap<CooldownKey, Instant>>,
    sinks: Vec<Arc<dyn AlertSink>>,
}

impl AlertEngine {
    pub fn new(
        monitor: Arc<PerformanceMonitor>,
        config: MonitorConfig,
        sinks: Vec<Arc<dyn AlertSink>>,
    ) -> Self {
        Self {
            monitor,
            config,
            history: Mutex::new(Vec::new()),
            cooldowns: Mutex::new(HashMap::new()),
            sinks,
        }
    }

    /// Spawn the evaluator task. It stops when the token is cancelled.
    pub fn start(self: &Arc<Self>, token: CancellationToken) -> tokio::task::JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(engine.config.metrics_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // Skip the immediate first tick.
            ticker.tick().await;
            tracing::info!(
                interval_secs = engine.config.metrics_interval.as_secs(),
                "alert engine started"
            );
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => engine.evaluate_once(),
                }
            }
            tracing::info!("alert engine stopped");
        })
    }

    /// One evaluation pass: slow-query burst, per-pattern error rates,
    /// system health, per-tenant error rates, in that order.
    pub fn evaluate_once(&self) {
        let slow_count = self
            .monitor
            .slow_queries_since(Utc::now() - chrono::Duration::hours(1));
        if slow_count >= self.config.slow_query_alert_count {
            self.raise(Alert::new(
                AlertKind::SlowQuery,
                AlertSeverity::Medium,
                "Slow query burst",
                format!("{} slow queries in the last hour", slow_count),
                slow_count as f64,
                self.config.slow_query_alert_count as f64,
            ));
        }

        for snap in self.monitor.get_stats() {
            if snap.executions == 0 {
                continue;
            }
            if snap.error_rate >= self.config.error_rate_threshold {
                self.raise(
                    Alert::new(
                        AlertKind::HighErrorRate,
                        error_rate_severity(snap.error_rate),
                        "High query error rate",
                        format!(
                            "{:.1}% of {} executions failed",
                            snap.error_rate, snap.executions
                        ),
                        snap.error_rate,
                        self.config.error_rate_threshold,
                    )
                    .for_pattern(snap.pattern),
                );
            }
        }

        let summary = self.monitor.summary();
        if summary.total_executions > 0 && summary.error_rate > self.config.error_rate_threshold {
            self.raise(Alert::new(
                AlertKind::SystemHealth,
                error_rate_severity(summary.error_rate),
                "System error rate elevated",
                format!(
                    "{:.1}% of all executions failed across {} patterns",
                    summary.error_rate, summary.pattern_count
                ),
                summary.error_rate,
                self.config.error_rate_threshold,
            ));
        }
        let latency_threshold_ms = self.config.latency_threshold.as_millis() as f64;
        if summary.total_executions > 0 && summary.avg_duration_ms > latency_threshold_ms {
            self.raise(Alert::new(
                AlertKind::HighLatency,
                AlertSeverity::Medium,
                "Average latency elevated",
                format!("average query latency is {:.0}ms", summary.avg_duration_ms),
                summary.avg_duration_ms,
                latency_threshold_ms,
            ));
        }

        for tenant in self.monitor.tenant_activity(usize::MAX) {
            if tenant.executions == 0 {
                continue;
            }
            if tenant.error_rate > self.config.error_rate_threshold * 2.0 {
                self.raise(
                    Alert::new(
                        AlertKind::TenantIssue,
                        AlertSeverity::High,
                        "Tenant error rate elevated",
                        format!(
                            "{:.1}% of {} executions failed for this tenant",
                            tenant.error_rate, tenant.executions
                        ),
                        tenant.error_rate,
                        self.config.error_rate_threshold * 2.0,
                    )
                    .for_tenant(tenant.tenant_id),
                );
            }
        }
    }

    /// Record and dispatch an alert unless its key is cooling down.
    /// Returns whether the alert was emitted.
    fn raise(&self, alert: Alert) -> bool {
        let key: CooldownKey = (alert.kind, alert.pattern.clone(), alert.tenant_id);
        {
            let mut cooldowns = self.cooldowns.lock().expect("cooldown lock poisoned");
            if let Some(last) = cooldowns.get(&key) {
                if last.elapsed() < self.config.alert_cooldown {
                    return false;
                }
            }
            cooldowns.insert(key, Instant::now());
        }

        tracing::info!(
            kind = alert.kind.as_str(),
            severity = alert.severity.as_str(),
            tenant_id = ?alert.tenant_id,
            "alert raised"
        );

        {
            let mut history = self.history.lock().expect("history lock poisoned");
            history.push(alert.clone());
            if history.len() > self.config.max_alert_history {
                let drop_count = (self.config.max_alert_history / 10).max(1);
                history.drain(0..drop_count);
            }
        }

        self.dispatch(alert);
        true
    }

    fn dispatch(&self, alert: Alert) {
        if self.sinks.is_empty() {
            return;
        }
        let message = format_alert(&alert);
        for sink in &self.sinks {
            let sink = sink.clone();
            let message = message.clone();
            tokio::spawn(async move {
                if let Err(e) = sink.send(&message).await {
                    tracing::error!(sink = sink.name(), error = %e, "alert sink dispatch failed");
                }
            });
        }
    }

    /// History, newest first.
    pub fn history(&self, limit: usize) -> Vec<Alert> {
        let history = self.history.lock().expect("history lock poisoned");
        history.iter().rev().take(limit).cloned().collect()
    }

    /// Monotonic: acknowledging twice is the same as once.
    pub fn acknowledge(&self, id: Uuid) -> Result<Alert> {
        let mut history = self.history.lock().expect("history lock poisoned");
        let alert = history
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(MonitorError::AlertNotFound(id))?;
        alert.acknowledged = true;
        Ok(alert.clone())
    }

    /// Monotonic: the resolution timestamp is set once and kept.
    pub fn resolve(&self, id: Uuid) -> Result<Alert> {
        let mut history = self.history.lock().expect("history lock poisoned");
        let alert = history
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(MonitorError::AlertNotFound(id))?;
        if !alert.resolved {
            alert.resolved = true;
            alert.resolved_at = Some(Utc::now());
        }
        Ok(alert.clone())
    }
}
