//! Monitor data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::Severity;

/// Telemetry for one completed request, forwarded by the pipeline.
#[derive(Debug, Clone)]
pub struct RequestMetrics {
    pub client_ip: String,
    pub path: String,
    pub method: String,
    pub status: u16,
    pub duration_ms: u64,
}

impl RequestMetrics {
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }
}

/// A single ephemeral security observation tied to a client. Stored with a
/// 24h TTL; a signal, not queryable history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub incident_type: String,
    pub client_ip: String,
    pub severity: Severity,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl Incident {
    pub fn new(
        incident_type: impl Into<String>,
        client_ip: impl Into<String>,
        severity: Severity,
        details: serde_json::Value,
    ) -> Self {
        Self {
            incident_type: incident_type.into(),
            client_ip: client_ip.into(),
            severity,
            details,
            timestamp: Utc::now(),
        }
    }
}

/// An actionable escalation. Lives in the active set until resolved;
/// the record is retained 7 days after resolution. Resolution happens
/// exactly once, never reopened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub alert_type: String,
    pub severity: Severity,
    pub message: String,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn new(
        alert_type: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            alert_type: alert_type.into(),
            severity,
            message: message.into(),
            details,
            timestamp: Utc::now(),
            resolved: false,
            resolved_at: None,
        }
    }
}

/// Outcome of a resolve request.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveOutcome {
    Resolved(Alert),
    AlreadyResolved,
    NotFound,
}

/// Volume for one client IP within the report window.
#[derive(Debug, Clone, Serialize)]
pub struct IpVolume {
    pub client_ip: String,
    pub requests: u64,
    pub errors: u64,
}

/// Snapshot of security metrics over a trailing window. A store failure
/// degrades this to the zeroed default rather than failing the caller.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SecurityMetricsReport {
    pub window_mins: u64,
    pub total_requests: u64,
    pub error_rate_pct: f64,
    pub average_response_time_ms: f64,
    pub top_ips: Vec<IpVolume>,
    pub incident_histogram: std::collections::HashMap<String, u64>,
    pub active_alerts: Vec<Alert>,
}
