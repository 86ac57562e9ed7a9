//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.
//! Every field has an explicit default so minimal configs are valid; there
//! are no hidden defaults outside this file.

use serde::{Deserialize, Serialize};

/// Root configuration for the security gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SecurityConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Fixed-window rate limiting.
    pub rate_limit: RateLimitConfig,

    /// DDoS heuristics and automatic bans.
    pub ddos: DdosConfig,

    /// Input validation and sanitization.
    pub input_validation: InputValidationConfig,

    /// Audit trail settings.
    pub audit: AuditConfig,

    /// Telemetry aggregation and alerting.
    pub monitoring: MonitoringConfig,

    /// CORS response headers.
    pub cors: CorsConfig,

    /// Production mode (enables HSTS).
    pub production: bool,

    #[serde(default)]
    pub admin: AdminConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Fixed-window rate limiting configuration.
///
/// These values drive the `general` tier; the `auth` and `api` tiers and the
/// per-endpoint overrides come from the static tables in `limiter::tables`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Window length in milliseconds.
    pub window_ms: u64,

    /// Maximum requests per window for the general tier.
    pub max_requests: u64,

    /// Un-count requests that completed successfully (2xx/3xx).
    pub skip_successful_requests: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            max_requests: 100,
            skip_successful_requests: false,
        }
    }
}

/// DDoS heuristic configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DdosConfig {
    /// Enable the DDoS/ban stage of the pipeline.
    pub enabled: bool,

    /// Requests per minute from one IP before blocking.
    pub threshold: u64,

    /// Ban duration in milliseconds for auto-issued bans.
    pub ban_duration_ms: u64,
}

impl Default for DdosConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 300,
            ban_duration_ms: 15 * 60 * 1000,
        }
    }
}

/// Input validation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InputValidationConfig {
    /// Enable the validation stage of the pipeline.
    pub enabled: bool,

    /// Maximum declared body size in bytes.
    pub max_body_size: usize,

    /// Strip markup tags from string values during sanitization.
    pub sanitize_html: bool,
}

impl Default for InputValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_body_size: 2 * 1024 * 1024, // 2MB
            sanitize_html: true,
        }
    }
}

/// Audit log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditLogLevel {
    /// Only security events and failed requests.
    Basic,
    /// Every request.
    Detailed,
    /// Every request, with response headers in the details.
    Full,
}

/// Audit trail configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Enable audit logging.
    pub enabled: bool,

    /// Verbosity of request logging.
    pub log_level: AuditLogLevel,

    /// Directory for the per-day JSON-lines fallback files.
    pub log_dir: String,

    /// Retention for non-critical entries, in days.
    pub retention_days: u32,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_level: AuditLogLevel::Detailed,
            log_dir: "audit-logs".to_string(),
            retention_days: 90,
        }
    }
}

/// Telemetry and alerting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Enable the security monitor.
    pub enabled: bool,

    /// Incidents per IP per hour before raising an alert.
    pub alert_threshold: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            alert_threshold: 5,
        }
    }
}

/// CORS response header configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Value for Access-Control-Allow-Origin.
    pub allow_origin: String,

    /// Value for Access-Control-Allow-Credentials.
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origin: "*".to_string(),
            allow_credentials: false,
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API listener.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Background maintenance configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Interval between cleanup passes, in seconds.
    pub interval_secs: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self { interval_secs: 300 }
    }
}
