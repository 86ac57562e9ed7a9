//! Audit trail data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Category of an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    SecurityEvent,
    RequestLog,
    UserAction,
    SystemEvent,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::SecurityEvent => "security_event",
            EntryType::RequestLog => "request_log",
            EntryType::UserAction => "user_action",
            EntryType::SystemEvent => "system_event",
        }
    }
}

/// Severity of an audit entry. Ordering matters: floors are applied with
/// `max`, and critical entries are exempt from retention cleanup.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// Events that are critical no matter what the caller requested.
const ALWAYS_CRITICAL: &[&str] = &[
    "financial_withdrawal",
    "financial_transfer",
    "security_settings_change",
    "api_key_create",
];

/// Classify an event, enforcing the severity floors.
///
/// `financial_*` is at least high, the fixed critical set is always
/// critical, `auth_*` defaults to medium, everything else defaults to low.
pub fn classify_severity(event: &str, requested: Option<Severity>) -> Severity {
    if ALWAYS_CRITICAL.contains(&event) {
        Severity::Critical
    } else if event.starts_with("financial_") {
        requested.unwrap_or(Severity::High).max(Severity::High)
    } else if event.starts_with("auth_") {
        requested.unwrap_or(Severity::Medium)
    } else {
        requested.unwrap_or(Severity::Low)
    }
}

/// One immutable audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub entry_type: EntryType,
    pub event: String,
    pub user_id: Option<String>,
    pub client_ip: String,
    pub user_agent: String,
    pub details: serde_json::Value,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn new(
        entry_type: EntryType,
        event: impl Into<String>,
        client_ip: impl Into<String>,
        user_agent: impl Into<String>,
        details: serde_json::Value,
        severity: Severity,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            entry_type,
            event: event.into(),
            user_id: None,
            client_ip: client_ip.into(),
            user_agent: user_agent.into(),
            details,
            severity,
            timestamp: Utc::now(),
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// Filter for audit queries. Every field is optional; pagination is
/// 1-based.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditQuery {
    pub entry_type: Option<EntryType>,
    pub event: Option<String>,
    pub user_id: Option<String>,
    pub client_ip: Option<String>,
    pub severity: Option<Severity>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

impl AuditQuery {
    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        if let Some(t) = self.entry_type {
            if entry.entry_type != t {
                return false;
            }
        }
        if let Some(event) = &self.event {
            if &entry.event != event {
                return false;
            }
        }
        if let Some(user_id) = &self.user_id {
            if entry.user_id.as_deref() != Some(user_id.as_str()) {
                return false;
            }
        }
        if let Some(client_ip) = &self.client_ip {
            if &entry.client_ip != client_ip {
                return false;
            }
        }
        if let Some(severity) = self.severity {
            if entry.severity != severity {
                return false;
            }
        }
        if let Some(from) = self.from {
            if entry.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if entry.timestamp > to {
                return false;
            }
        }
        true
    }
}

/// One page of query results.
#[derive(Debug, Clone, Serialize)]
pub struct AuditPage {
    pub entries: Vec<AuditLogEntry>,
    pub total: usize,
}

/// Aggregate statistics over the audit trail.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditStats {
    pub total: usize,
    pub by_type: std::collections::HashMap<String, usize>,
    pub by_severity: std::collections::HashMap<String, usize>,
    /// Top offending IPs by security-event count.
    pub top_ips: Vec<(String, usize)>,
    /// Most recent critical entries, newest first.
    pub recent_critical: Vec<AuditLogEntry>,
}
