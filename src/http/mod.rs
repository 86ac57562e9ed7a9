//! HTTP serving subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, pipeline layer, graceful shutdown)
//!     → pipeline (security stages)
//!     → application router
//! Admin listener (separate):
//!     → admin router (bearer auth, no pipeline)
//! ```

pub mod server;

pub use server::{serve_admin, GatewayServer};
