//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections → Exit
//!
//! Maintenance (maintenance.rs):
//!     Interval tick → sweep limiter windows, monitor records,
//!     expired store entries, audit retention
//! ```
//!
//! # Design Decisions
//! - One shutdown broadcast; every background task subscribes
//! - Maintenance is jittered so replicas do not sweep in lockstep

pub mod maintenance;
pub mod shutdown;
pub mod signals;

pub use maintenance::spawn_maintenance;
pub use shutdown::Shutdown;
