use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    SlowQuery,
    HighErrorRate,
    HighLatency,
    SystemHealth,
    TenantIssue,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SlowQuery => "slow_query",
            Self::HighErrorRate => "high_error_rate",
            Self::HighLatency => "high_latency",
            Self::SystemHealth => "system_health",
            Self::TenantIssue => "tenant_issue",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// One raised alert. Append-only except for the `acknowledged` /
/// `resolved` flags, which only ever flip to true.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub title: String,
    pub description: String,
    pub tenant_id: Option<Uuid>,
    pub pattern: Option<String>,
    pub metric: f64,
    pub threshold: f64,
    pub timestamp: DateTime<Utc>,
    pub acknowledged: bool,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn new(
        kind: AlertKind,
        severity: AlertSeverity,
        title: impl Into<String>,
        description: impl Into<String>,
        metric: f64,
        threshold: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            severity,
            title: title.into(),
            description: description.into(),
            tenant_id: None,
            pattern: None,
            metric,
            threshold,
            timestamp: Utc::now(),
            acknowledged: false,
            resolved: false,
            resolved_at: None,
        }
    }

    pub fn for_tenant(mut self, tenant_id: Uuid) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    pub fn for_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(AlertSeverity::Low < AlertSeverity::Medium);
        assert!(AlertSeverity::Medium < AlertSeverity::High);
        assert!(AlertSeverity::High < AlertSeverity::Critical);
    }

    #[test]
    fn test_alert_serializes_snake_case() {
        let alert = Alert::new(
            AlertKind::HighErrorRate,
            AlertSeverity::Critical,
            "High error rate",
            "26% of executions failed",
            26.0,
            5.0,
        );
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["kind"], "high_error_rate");
        assert_eq!(json["severity"], "critical");
        assert_eq!(json["resolved"], false);
    }
}
