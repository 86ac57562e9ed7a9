//! Audit trail subsystem.
//!
//! # Data Flow
//! ```text
//! log_security_event / log_request / log_user_action / log_system_event
//!     → entry.rs (severity classification, immutable entry)
//!     → logger.rs (fan-out, concurrent dual write)
//!         → sink.rs StoreSink → store.rs (durable, queryable)
//!         → sink.rs FileSink  → audit-YYYY-MM-DD.log (last resort)
//!     → notify.rs (immediate hook for critical entries)
//! ```
//!
//! # Design Decisions
//! - Dual writes are concurrent and non-transactional; partial success is
//!   logged, never retried synchronously
//! - Severity floors are not caller-overridable
//! - Critical entries are exempt from retention cleanup

pub mod entry;
pub mod export;
pub mod logger;
pub mod notify;
pub mod sink;
pub mod store;

pub use entry::{AuditLogEntry, AuditPage, AuditQuery, AuditStats, EntryType, Severity};
pub use export::ExportFormat;
pub use logger::{AuditLogger, RequestAudit};
pub use notify::{AlertNotifier, TracingNotifier};
pub use store::{AuditStore, MemoryAuditStore};
