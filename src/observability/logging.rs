//! Structured logging bootstrap.
//!
//! `RUST_LOG` wins over the configured level so operators can turn debug
//! logging on without touching the config file.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global tracing subscriber. Call once at startup.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("security_gateway={level},tower_http=info")));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
