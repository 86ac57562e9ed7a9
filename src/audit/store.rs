//! Durable audit store abstraction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::entry::{AuditLogEntry, AuditPage, AuditQuery, AuditStats, EntryType, Severity};
use crate::store::StoreError;

const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 500;
const RECENT_CRITICAL_LIMIT: usize = 10;
const TOP_IP_LIMIT: usize = 10;

/// Create / filtered-find / count / group-by / delete-many over
/// [`AuditLogEntry`]. Entries are immutable once created.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn create(&self, entry: &AuditLogEntry) -> Result<(), StoreError>;

    /// Filtered query with pagination, newest first.
    async fn find(&self, query: &AuditQuery) -> Result<AuditPage, StoreError>;

    async fn count(&self, query: &AuditQuery) -> Result<usize, StoreError>;

    async fn stats(&self) -> Result<AuditStats, StoreError>;

    /// Delete entries older than `cutoff`. Critical entries are exempt when
    /// `exempt_critical` is set. Returns the number deleted.
    async fn delete_older_than(
        &self,
        cutoff: DateTime<Utc>,
        exempt_critical: bool,
    ) -> Result<usize, StoreError>;
}

/// In-process audit store.
#[derive(Default)]
pub struct MemoryAuditStore {
    entries: RwLock<Vec<AuditLogEntry>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn create(&self, entry: &AuditLogEntry) -> Result<(), StoreError> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }

    async fn find(&self, query: &AuditQuery) -> Result<AuditPage, StoreError> {
        let entries = self.entries.read().await;
        let mut matched: Vec<&AuditLogEntry> =
            entries.iter().filter(|e| query.matches(e)).collect();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let total = matched.len();
        let page_size = query
            .page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let page = query.page.unwrap_or(1).max(1);
        let start = (page - 1).saturating_mul(page_size);

        let entries = matched
            .into_iter()
            .skip(start)
            .take(page_size)
            .cloned()
            .collect();
        Ok(AuditPage { entries, total })
    }

    async fn count(&self, query: &AuditQuery) -> Result<usize, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries.iter().filter(|e| query.matches(e)).count())
    }

    async fn stats(&self) -> Result<AuditStats, StoreError> {
        let entries = self.entries.read().await;
        let mut stats = AuditStats {
            total: entries.len(),
            ..Default::default()
        };

        let mut ip_counts: std::collections::HashMap<String, usize> = Default::default();
        for entry in entries.iter() {
            *stats
                .by_type
                .entry(entry.entry_type.as_str().to_string())
                .or_default() += 1;
            *stats
                .by_severity
                .entry(entry.severity.as_str().to_string())
                .or_default() += 1;
            if entry.entry_type == EntryType::SecurityEvent {
                *ip_counts.entry(entry.client_ip.clone()).or_default() += 1;
            }
        }

        let mut top: Vec<(String, usize)> = ip_counts.into_iter().collect();
        top.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        top.truncate(TOP_IP_LIMIT);
        stats.top_ips = top;

        let mut critical: Vec<AuditLogEntry> = entries
            .iter()
            .filter(|e| e.severity == Severity::Critical)
            .cloned()
            .collect();
        critical.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        critical.truncate(RECENT_CRITICAL_LIMIT);
        stats.recent_critical = critical;

        Ok(stats)
    }

    async fn delete_older_than(
        &self,
        cutoff: DateTime<Utc>,
        exempt_critical: bool,
    ) -> Result<usize, StoreError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| {
            e.timestamp >= cutoff || (exempt_critical && e.severity == Severity::Critical)
        });
        Ok(before - entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn entry(event: &str, severity: Severity, age_days: i64) -> AuditLogEntry {
        let mut e = AuditLogEntry::new(
            EntryType::SecurityEvent,
            event,
            "10.0.0.1",
            "test",
            json!({}),
            severity,
        );
        e.timestamp = Utc::now() - Duration::days(age_days);
        e
    }

    #[tokio::test]
    async fn retention_never_deletes_critical() {
        let store = MemoryAuditStore::new();
        store.create(&entry("old_low", Severity::Low, 120)).await.unwrap();
        store.create(&entry("old_critical", Severity::Critical, 400)).await.unwrap();
        store.create(&entry("fresh", Severity::Low, 1)).await.unwrap();

        let cutoff = Utc::now() - Duration::days(90);
        let deleted = store.delete_older_than(cutoff, true).await.unwrap();
        assert_eq!(deleted, 1);

        let remaining = store.find(&AuditQuery::default()).await.unwrap();
        assert_eq!(remaining.total, 2);
        assert!(remaining.entries.iter().any(|e| e.event == "old_critical"));
    }

    #[tokio::test]
    async fn pagination_reports_full_total() {
        let store = MemoryAuditStore::new();
        for i in 0..25 {
            store.create(&entry(&format!("e{i}"), Severity::Low, 0)).await.unwrap();
        }
        let page = store
            .find(&AuditQuery {
                page: Some(2),
                page_size: Some(10),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 25);
        assert_eq!(page.entries.len(), 10);
    }

    #[tokio::test]
    async fn stats_group_by_severity() {
        let store = MemoryAuditStore::new();
        store.create(&entry("a", Severity::Low, 0)).await.unwrap();
        store.create(&entry("b", Severity::Low, 0)).await.unwrap();
        store.create(&entry("c", Severity::Critical, 0)).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_severity["low"], 2);
        assert_eq!(stats.by_severity["critical"], 1);
        assert_eq!(stats.recent_critical.len(), 1);
        assert_eq!(stats.top_ips[0], ("10.0.0.1".to_string(), 3));
    }
}
