//! Audit sinks.
//!
//! Each sink exposes one capability, `append(entry)`. The logger fans out to
//! both sinks concurrently; one sink's failure never blocks the other, and
//! the day file is the record of last resort when the durable store is down.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::entry::AuditLogEntry;
use super::store::AuditStore;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("file sink: {0}")]
    Io(#[from] std::io::Error),

    #[error("store sink: {0}")]
    Store(#[from] StoreError),

    #[error("serialization: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), SinkError>;
}

/// Durable store sink.
pub struct StoreSink {
    store: Arc<dyn AuditStore>,
}

impl StoreSink {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AuditSink for StoreSink {
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), SinkError> {
        self.store.create(entry).await?;
        Ok(())
    }
}

/// Append-only JSON-lines file sink, one file per calendar day.
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the file an entry lands in, derived from its own timestamp.
    pub fn path_for(&self, entry: &AuditLogEntry) -> PathBuf {
        self.dir
            .join(format!("audit-{}.log", entry.timestamp.format("%Y-%m-%d")))
    }
}

#[async_trait]
impl AuditSink for FileSink {
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), SinkError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(entry))
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::entry::{EntryType, Severity};
    use serde_json::json;

    fn entry() -> AuditLogEntry {
        AuditLogEntry::new(
            EntryType::SystemEvent,
            "startup",
            "unknown",
            "internal",
            json!({"component": "test"}),
            Severity::Low,
        )
    }

    #[tokio::test]
    async fn file_sink_appends_one_json_line_per_entry() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path());

        let first = entry();
        sink.append(&first).await.unwrap();
        sink.append(&entry()).await.unwrap();

        let content = tokio::fs::read_to_string(sink.path_for(&first)).await.unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: AuditLogEntry = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.event, "startup");
    }

    #[tokio::test]
    async fn file_name_tracks_calendar_day() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path());
        let mut e = entry();
        e.timestamp = "2026-03-05T12:00:00Z".parse().unwrap();
        assert!(sink
            .path_for(&e)
            .to_string_lossy()
            .ends_with("audit-2026-03-05.log"));
    }
}
