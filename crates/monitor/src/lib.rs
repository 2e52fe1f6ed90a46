//! Query observability: performance aggregation, slow-query tracking,
//! and threshold-based alerting for the multi-tenant data layer.

pub mod alerts;
pub mod config;
pub mod error;
pub mod monitor;
pub mod normalize;
pub mod notify;

pub use alerts::AlertEngine;
pub use config::MonitorConfig;
pub use error::{MonitorError, Result};
pub use monitor::{
    MonitorSummary, PerformanceMonitor, QuerySample, QueryStatsSnapshot, SlowQueryRecord,
    TenantActivity, TenantStatsSnapshot,
};
pub use normalize::normalize_pattern;
pub use notify::{format_alert, AlertSink, LogSink, WebhookSink};
