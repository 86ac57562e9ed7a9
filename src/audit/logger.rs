//! Dual-sink audit logger.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::{json, Value};

use super::entry::{
    classify_severity, AuditLogEntry, AuditPage, AuditQuery, AuditStats, EntryType, Severity,
};
use super::export::{export, ExportFormat};
use super::notify::AlertNotifier;
use super::sink::{AuditSink, FileSink, StoreSink};
use super::store::AuditStore;
use crate::config::schema::{AuditConfig, AuditLogLevel};
use crate::observability::metrics;
use crate::store::StoreError;

/// Telemetry for one completed request, as recorded by the pipeline.
#[derive(Debug, Clone)]
pub struct RequestAudit {
    pub method: String,
    pub url: String,
    pub client_ip: String,
    pub user_agent: String,
    pub status: u16,
    pub duration_ms: u64,
    pub success: bool,
    /// Response headers, attached only at the `full` log level.
    pub response_headers: Option<Value>,
}

/// Severity-classified, dual-sink audit trail.
///
/// Every entry is written concurrently to the durable store and the daily
/// JSON-lines file; one sink's failure never blocks the other. An event is
/// dropped only when both writes fail, and that is logged.
pub struct AuditLogger {
    store: Arc<dyn AuditStore>,
    store_sink: StoreSink,
    file_sink: FileSink,
    notifier: Arc<dyn AlertNotifier>,
    config: AuditConfig,
}

impl AuditLogger {
    pub fn new(
        store: Arc<dyn AuditStore>,
        notifier: Arc<dyn AlertNotifier>,
        config: AuditConfig,
    ) -> Self {
        Self {
            store_sink: StoreSink::new(store.clone()),
            file_sink: FileSink::new(config.log_dir.clone()),
            store,
            notifier,
            config,
        }
    }

    pub async fn log_security_event(
        &self,
        event: &str,
        client_ip: &str,
        user_agent: &str,
        details: Value,
        severity: Option<Severity>,
    ) {
        let severity = classify_severity(event, severity.or(Some(Severity::Medium)));
        let entry = AuditLogEntry::new(
            EntryType::SecurityEvent,
            event,
            client_ip,
            user_agent,
            details,
            severity,
        );
        self.write(entry).await;
    }

    pub async fn log_request(&self, audit: RequestAudit) {
        if self.config.log_level == AuditLogLevel::Basic && audit.success {
            return;
        }
        let mut details = json!({
            "method": audit.method,
            "url": audit.url,
            "status": audit.status,
            "duration_ms": audit.duration_ms,
            "success": audit.success,
        });
        if self.config.log_level == AuditLogLevel::Full {
            if let Some(headers) = audit.response_headers {
                details["response_headers"] = headers;
            }
        }
        let severity = if audit.success {
            Severity::Low
        } else {
            Severity::Medium
        };
        let entry = AuditLogEntry::new(
            EntryType::RequestLog,
            "request_completed",
            audit.client_ip,
            audit.user_agent,
            details,
            severity,
        );
        self.write(entry).await;
    }

    pub async fn log_user_action(
        &self,
        user_id: &str,
        action: &str,
        client_ip: &str,
        user_agent: &str,
        details: Value,
        severity: Option<Severity>,
    ) {
        let severity = classify_severity(action, severity);
        let entry = AuditLogEntry::new(
            EntryType::UserAction,
            action,
            client_ip,
            user_agent,
            details,
            severity,
        )
        .with_user(user_id);
        self.write(entry).await;
    }

    pub async fn log_system_event(&self, event: &str, details: Value) {
        let severity = classify_severity(event, None);
        let entry = AuditLogEntry::new(
            EntryType::SystemEvent,
            event,
            "internal",
            "internal",
            details,
            severity,
        );
        self.write(entry).await;
    }

    /// Fan out one entry to both sinks concurrently.
    async fn write(&self, entry: AuditLogEntry) {
        if !self.config.enabled {
            return;
        }
        metrics::record_audit_event(entry.severity.as_str());

        // The hook fires regardless of write outcome.
        if entry.severity == Severity::Critical {
            self.notifier.notify(&entry.event, &entry.details);
        }

        let (store_result, file_result) = tokio::join!(
            self.store_sink.append(&entry),
            self.file_sink.append(&entry),
        );

        match (&store_result, &file_result) {
            (Ok(()), Ok(())) => {}
            (Err(e), Ok(())) => {
                metrics::record_store_error();
                tracing::warn!(event = %entry.event, error = %e, "Audit store write failed; day file is the record");
            }
            (Ok(()), Err(e)) => {
                tracing::warn!(event = %entry.event, error = %e, "Audit file write failed; durable store has the record");
            }
            (Err(store_err), Err(file_err)) => {
                metrics::record_store_error();
                tracing::error!(
                    event = %entry.event,
                    store_error = %store_err,
                    file_error = %file_err,
                    "Audit event dropped: both sinks failed"
                );
            }
        }
    }

    pub async fn query(&self, query: &AuditQuery) -> Result<AuditPage, StoreError> {
        self.store.find(query).await
    }

    pub async fn stats(&self) -> Result<AuditStats, StoreError> {
        self.store.stats().await
    }

    pub async fn export(
        &self,
        query: &AuditQuery,
        format: ExportFormat,
    ) -> Result<String, StoreError> {
        let page = self.store.find(query).await?;
        export(&page.entries, format).map_err(|_| StoreError::Corrupt("audit export".to_string()))
    }

    /// Delete non-critical entries older than `days`.
    pub async fn cleanup_old_logs(&self, days: u32) -> Result<usize, StoreError> {
        let cutoff = Utc::now() - Duration::days(i64::from(days));
        self.store.delete_older_than(cutoff, true).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::notify::test_support::RecordingNotifier;
    use crate::audit::store::MemoryAuditStore;
    use async_trait::async_trait;

    /// Durable store that always fails, for last-resort-file coverage.
    struct FailingAuditStore;

    #[async_trait]
    impl AuditStore for FailingAuditStore {
        async fn create(&self, _entry: &AuditLogEntry) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }
        async fn find(&self, _query: &AuditQuery) -> Result<AuditPage, StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }
        async fn count(&self, _query: &AuditQuery) -> Result<usize, StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }
        async fn stats(&self) -> Result<AuditStats, StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }
        async fn delete_older_than(
            &self,
            _cutoff: chrono::DateTime<Utc>,
            _exempt_critical: bool,
        ) -> Result<usize, StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }
    }

    fn logger_with(
        store: Arc<dyn AuditStore>,
        dir: &std::path::Path,
    ) -> (AuditLogger, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let config = AuditConfig {
            log_dir: dir.to_string_lossy().to_string(),
            ..Default::default()
        };
        (AuditLogger::new(store, notifier.clone(), config), notifier)
    }

    #[tokio::test]
    async fn financial_withdrawal_is_critical_and_notifies() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryAuditStore::new());
        let (logger, notifier) = logger_with(store.clone(), dir.path());

        logger
            .log_user_action(
                "user-1",
                "financial_withdrawal",
                "10.0.0.1",
                "curl/8",
                json!({"amount": 100}),
                Some(Severity::Low),
            )
            .await;

        let page = store.find(&AuditQuery::default()).await.unwrap();
        assert_eq!(page.entries[0].severity, Severity::Critical);
        assert_eq!(
            notifier.titles.lock().unwrap().as_slice(),
            ["financial_withdrawal"]
        );
    }

    #[tokio::test]
    async fn file_sink_is_record_of_last_resort() {
        let dir = tempfile::tempdir().unwrap();
        let (logger, _) = logger_with(Arc::new(FailingAuditStore), dir.path());

        logger
            .log_security_event("rate_limit_exceeded", "10.0.0.1", "curl/8", json!({}), None)
            .await;

        let mut lines = 0;
        let mut read_dir = tokio::fs::read_dir(dir.path()).await.unwrap();
        while let Some(file) = read_dir.next_entry().await.unwrap() {
            let content = tokio::fs::read_to_string(file.path()).await.unwrap();
            lines += content.lines().count();
        }
        assert_eq!(lines, 1);
    }

    #[tokio::test]
    async fn basic_level_skips_successful_requests() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryAuditStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let config = AuditConfig {
            log_level: AuditLogLevel::Basic,
            log_dir: dir.path().to_string_lossy().to_string(),
            ..Default::default()
        };
        let logger = AuditLogger::new(store.clone(), notifier, config);

        let mut audit = RequestAudit {
            method: "GET".to_string(),
            url: "/api/items".to_string(),
            client_ip: "10.0.0.1".to_string(),
            user_agent: "curl/8".to_string(),
            status: 200,
            duration_ms: 12,
            success: true,
            response_headers: None,
        };
        logger.log_request(audit.clone()).await;
        audit.status = 500;
        audit.success = false;
        logger.log_request(audit).await;

        let page = store.find(&AuditQuery::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.entries[0].details["status"], 500);
    }

    #[tokio::test]
    async fn cleanup_respects_critical_exemption() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryAuditStore::new());
        let (logger, _) = logger_with(store.clone(), dir.path());

        let mut old_low = AuditLogEntry::new(
            EntryType::SystemEvent,
            "old_event",
            "internal",
            "internal",
            json!({}),
            Severity::Low,
        );
        old_low.timestamp = Utc::now() - Duration::days(365);
        let mut old_critical = old_low.clone();
        old_critical.event = "security_settings_change".to_string();
        old_critical.severity = Severity::Critical;
        store.create(&old_low).await.unwrap();
        store.create(&old_critical).await.unwrap();

        let deleted = logger.cleanup_old_logs(90).await.unwrap();
        assert_eq!(deleted, 1);
        let page = store.find(&AuditQuery::default()).await.unwrap();
        assert_eq!(page.entries[0].severity, Severity::Critical);
    }
}
