//! Gateway metrics, exposed for Prometheus scrape.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): completed requests by method, status class
//! - `gateway_request_duration_seconds` (histogram): end-to-end latency
//! - `gateway_blocked_total` (counter): requests rejected at the boundary, by reason
//! - `gateway_audit_events_total` (counter): audit entries written, by severity
//! - `gateway_incidents_total` (counter): incidents recorded, by type
//! - `gateway_notifications_total` (counter): alert notifications fired, by title
//! - `gateway_store_errors_total` (counter): counter-store failures absorbed
//! - `gateway_active_alerts` (gauge): alerts currently pending resolution

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(address: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(address)
        .install()
}

pub fn record_request(method: &str, status: u16, duration_ms: u64) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status_class" => format!("{}xx", status / 100),
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds").record(duration_ms as f64 / 1000.0);
}

pub fn record_blocked(reason: &str) {
    counter!("gateway_blocked_total", "reason" => reason.to_string()).increment(1);
}

pub fn record_audit_event(severity: &str) {
    counter!("gateway_audit_events_total", "severity" => severity.to_string()).increment(1);
}

pub fn record_incident(incident_type: &str) {
    counter!("gateway_incidents_total", "type" => incident_type.to_string()).increment(1);
}

pub fn record_notification(title: &str) {
    counter!("gateway_notifications_total", "title" => title.to_string()).increment(1);
}

pub fn record_store_error() {
    counter!("gateway_store_errors_total").increment(1);
}

pub fn gauge_active_alerts(delta: f64) {
    gauge!("gateway_active_alerts").increment(delta);
}
