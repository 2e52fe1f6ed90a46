//! Alert notification sinks.
//!
//! A sink delivers one formatted message. Dispatch failures are logged by
//! the engine and never block alert recording or the evaluation tick.

use async_trait::async_trait;
use toko_models::{Alert, AlertSeverity};

use crate::error::{MonitorError, Result};

#[async_trait]
pub trait AlertSink: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, message: &str) -> Result<()>;
}

pub fn severity_glyph(severity: AlertSeverity) -> &'static str {
    match severity {
        AlertSeverity::Low => "🔵",
        AlertSeverity::Medium => "🟡",
        AlertSeverity::High => "🟠",
        AlertSeverity::Critical => "🔴",
    }
}

/// Reference message format shared by all sinks.
pub fn format_alert(alert: &Alert) -> String {
    let mut message = format!(
        "{} Alert\nType: {}\nSeverity: {}\nTitle: {}\nDescription: {}\n",
        severity_glyph(alert.severity),
        alert.kind.as_str(),
        alert.severity.as_str(),
        alert.title,
        alert.description,
    );
    if let Some(tenant_id) = alert.tenant_id {
        message.push_str(&format!("Tenant: {}\n", tenant_id));
    }
    if let Some(pattern) = &alert.pattern {
        message.push_str(&format!("Query: {}\n", pattern));
    }
    message.push_str(&format!(
        "Value: {:.2} | Threshold: {:.2}\nTime: {}",
        alert.metric,
        alert.threshold,
        alert.timestamp.format("%Y-%m-%d %H:%M:%S"),
    ));
    message
}

/// Writes alerts to the application log.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, message: &str) -> Result<()> {
        tracing::warn!("{}", message);
        Ok(())
    }
}

/// POSTs alerts as JSON to a configured webhook URL.
pub struct WebhookSink {
    url: String,
    client: reqwest::Client,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AlertSink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, message: &str) -> Result<()> {
        self.client
            .post(&self.url)
            .json(&serde_json::json!({ "text": message }))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| MonitorError::Sink(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toko_models::{AlertKind, AlertSeverity};
    use uuid::Uuid;

    #[test]
    fn test_format_contains_required_fields() {
        let tenant = Uuid::new_v4();
        let alert = toko_models::Alert::new(
            AlertKind::HighErrorRate,
            AlertSeverity::Critical,
            "High error rate detected",
            "26.0% of executions failed",
            26.0,
            5.0,
        )
        .for_tenant(tenant)
        .for_pattern("SELECT * FROM orders WHERE id = :num");

        let message = format_alert(&alert);
        assert!(message.starts_with("🔴"));
        assert!(message.contains("Type: high_error_rate"));
        assert!(message.contains("Severity: critical"));
        assert!(message.contains("Title: High error rate detected"));
        assert!(message.contains(&format!("Tenant: {}", tenant)));
        assert!(message.contains("Query: SELECT * FROM orders WHERE id = :num"));
        assert!(message.contains("Value: 26.00 | Threshold: 5.00"));
        assert!(message.contains("Time: "));
    }

    #[test]
    fn test_optional_fields_omitted() {
        let alert = toko_models::Alert::new(
            AlertKind::SystemHealth,
            AlertSeverity::Medium,
            "t",
            "d",
            1.0,
            2.0,
        );
        let message = format_alert(&alert);
        assert!(!message.contains("Tenant:"));
        assert!(!message.contains("Query:"));
    }
}
