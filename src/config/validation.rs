//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows > 0, thresholds > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SecurityConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use crate::config::schema::SecurityConfig;

/// A single semantic validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn err(errors: &mut Vec<ValidationError>, field: &str, message: &str) {
    errors.push(ValidationError {
        field: field.to_string(),
        message: message.to_string(),
    });
}

/// Validate a configuration, collecting every violation.
pub fn validate_config(config: &SecurityConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        err(&mut errors, "listener.bind_address", "not a valid socket address");
    }

    if config.rate_limit.window_ms == 0 {
        err(&mut errors, "rate_limit.window_ms", "must be greater than zero");
    }
    if config.rate_limit.max_requests == 0 {
        err(&mut errors, "rate_limit.max_requests", "must be greater than zero");
    }

    if config.ddos.enabled {
        if config.ddos.threshold == 0 {
            err(&mut errors, "ddos.threshold", "must be greater than zero");
        }
        if config.ddos.ban_duration_ms == 0 {
            err(&mut errors, "ddos.ban_duration_ms", "must be greater than zero");
        }
    }

    if config.input_validation.enabled && config.input_validation.max_body_size == 0 {
        err(&mut errors, "input_validation.max_body_size", "must be greater than zero");
    }

    if config.audit.enabled {
        if config.audit.log_dir.is_empty() {
            err(&mut errors, "audit.log_dir", "must not be empty");
        }
        if config.audit.retention_days == 0 {
            err(&mut errors, "audit.retention_days", "must be at least one day");
        }
    }

    if config.monitoring.enabled && config.monitoring.alert_threshold == 0 {
        err(&mut errors, "monitoring.alert_threshold", "must be greater than zero");
    }

    if config.admin.enabled {
        if config.admin.api_key.is_empty() {
            err(&mut errors, "admin.api_key", "must not be empty when admin is enabled");
        }
        if config.admin.bind_address.parse::<std::net::SocketAddr>().is_err() {
            err(&mut errors, "admin.bind_address", "not a valid socket address");
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<std::net::SocketAddr>().is_err()
    {
        err(&mut errors, "observability.metrics_address", "not a valid socket address");
    }

    if config.maintenance.interval_secs == 0 {
        err(&mut errors, "maintenance.interval_secs", "must be greater than zero");
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
