use std::time::Duration;

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_f64(name: &str, default: f64) -> f64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Knobs for the performance monitor and alert engine.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Executions at or above this duration land in the slow-query log.
    pub slow_query_threshold: Duration,
    /// Slow-query ring capacity.
    pub max_slow_queries: usize,
    /// Alert evaluation tick.
    pub metrics_interval: Duration,
    /// Slow queries within the last hour that trigger a burst alert.
    pub slow_query_alert_count: usize,
    /// Error-rate alert threshold, percent.
    pub error_rate_threshold: f64,
    /// Average-latency alert threshold.
    pub latency_threshold: Duration,
    /// Minimum gap between two same-keyed alerts.
    pub alert_cooldown: Duration,
    /// Alert history capacity; overflow drops the oldest 10%.
    pub max_alert_history: usize,
    /// Emit a structured warn log for each slow query.
    pub log_slow_queries: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            slow_query_threshold: Duration::from_millis(500),
            max_slow_queries: 1000,
            metrics_interval: Duration::from_secs(60),
            slow_query_alert_count: 10,
            error_rate_threshold: 5.0,
            latency_threshold: Duration::from_secs(1),
            alert_cooldown: Duration::from_secs(300),
            max_alert_history: 1000,
            log_slow_queries: true,
        }
    }
}

impl MonitorConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            slow_query_threshold: Duration::from_millis(env_u64(
                "SLOW_QUERY_THRESHOLD_MS",
                d.slow_query_threshold.as_millis() as u64,
            )),
            max_slow_queries: env_u64("MAX_SLOW_QUERIES", d.max_slow_queries as u64) as usize,
            metrics_interval: Duration::from_secs(env_u64(
                "METRICS_INTERVAL_SECS",
                d.metrics_interval.as_secs(),
            )),
            slow_query_alert_count: env_u64(
                "SLOW_QUERY_ALERT_COUNT",
                d.slow_query_alert_count as u64,
            ) as usize,
            error_rate_threshold: env_f64("ERROR_RATE_THRESHOLD", d.error_rate_threshold),
            latency_threshold: Duration::from_millis(env_u64(
                "LATENCY_THRESHOLD_MS",
                d.latency_threshold.as_millis() as u64,
            )),
            alert_cooldown: Duration::from_secs(env_u64(
                "ALERT_COOLDOWN_SECS",
                d.alert_cooldown.as_secs(),
            )),
            max_alert_history: env_u64("MAX_ALERT_HISTORY", d.max_alert_history as u64) as usize,
            log_slow_queries: std::env::var("LOG_SLOW_QUERIES")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(d.log_slow_queries),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_contract() {
        let c = MonitorConfig::default();
        assert_eq!(c.slow_query_threshold, Duration::from_millis(500));
        assert_eq!(c.max_slow_queries, 1000);
        assert_eq!(c.metrics_interval, Duration::from_secs(60));
        assert_eq!(c.slow_query_alert_count, 10);
        assert_eq!(c.error_rate_threshold, 5.0);
        assert_eq!(c.latency_threshold, Duration::from_secs(1));
        assert_eq!(c.alert_cooldown, Duration::from_secs(300));
        assert_eq!(c.max_alert_history, 1000);
        assert!(c.log_slow_queries);
    }
}
