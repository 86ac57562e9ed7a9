//! Security monitor subsystem.
//!
//! # Data Flow
//! ```text
//! record_request(metrics)
//!     → metrics:{ip}:{minute} bucket (hash_incr, TTL 1h)
//!     → heuristics: error rate / slow response / sensitive path
//!         → record_incident
//!             → incident:{id} (TTL 24h)
//!             → incident_count:{ip} rolling 1h counter
//!             → threshold crossing → one multiple_incidents alert
//!             → always forwarded to the audit trail
//! ```
//!
//! # Design Decisions
//! - The monitor never fails the request path: store errors are swallowed
//!   on the recording side and degrade to zeroed/empty results on reads
//! - An alert is raised only on the increment that returns exactly
//!   alert_threshold, which de-duplicates within the rolling window
//! - Critical alerts invoke the notifier before persistence is attempted

pub mod types;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;

use crate::audit::{AlertNotifier, AuditLogger, Severity};
use crate::config::schema::MonitoringConfig;
use crate::observability::metrics;
use crate::store::{now_ms, CounterStore, StoreError};

pub use types::{
    Alert, Incident, IpVolume, RequestMetrics, ResolveOutcome, SecurityMetricsReport,
};

const BUCKET_TTL: Duration = Duration::from_secs(60 * 60);
const INCIDENT_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const INCIDENT_COUNT_TTL: Duration = Duration::from_secs(60 * 60);
const RESOLVED_ALERT_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Request duration above which a slow_response incident is recorded.
const SLOW_RESPONSE_MS: u64 = 10_000;
/// Trailing window for the error-rate heuristic, in minutes.
const ERROR_RATE_WINDOW_MINS: u64 = 5;
/// Error percentage above which a high_error_rate incident is recorded.
const ERROR_RATE_THRESHOLD_PCT: u64 = 50;
/// Incident-type histogram sample size.
const HISTOGRAM_SAMPLE: usize = 100;
/// Metric buckets older than this are purged by cleanup.
const BUCKET_PURGE_MINS: u64 = 24 * 60;

const SENSITIVE_PATH_PREFIXES: &[&str] = &[
    "/admin",
    "/wp-admin",
    "/phpmyadmin",
    "/config",
    "/backup",
    "/test",
    "/debug",
];
const SENSITIVE_EXTENSIONS: &[&str] = &[".php", ".asp", ".jsp"];

fn is_sensitive_path(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    SENSITIVE_PATH_PREFIXES
        .iter()
        .any(|p| lower == *p || lower.starts_with(&format!("{p}/")))
        || SENSITIVE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Per-client telemetry aggregation, anomaly detection, and incident→alert
/// escalation.
pub struct SecurityMonitor {
    store: Arc<dyn CounterStore>,
    audit: Arc<AuditLogger>,
    notifier: Arc<dyn AlertNotifier>,
    config: MonitoringConfig,
}

impl SecurityMonitor {
    pub fn new(
        store: Arc<dyn CounterStore>,
        audit: Arc<AuditLogger>,
        notifier: Arc<dyn AlertNotifier>,
        config: MonitoringConfig,
    ) -> Self {
        Self {
            store,
            audit,
            notifier,
            config,
        }
    }

    /// Record one completed request and evaluate the anomaly heuristics.
    /// Never fails: store errors are logged and swallowed.
    pub async fn record_request(&self, metrics: RequestMetrics) {
        if !self.config.enabled {
            return;
        }
        let minute = now_ms() / 60_000;
        let key = format!("metrics:{}:{minute}", metrics.client_ip);

        let status_field = format!("status_{}xx", metrics.status / 100);
        for (field, delta) in [
            ("total", 1),
            ("duration_ms", metrics.duration_ms as i64),
            (status_field.as_str(), 1),
        ] {
            if let Err(e) = self.store.hash_incr(&key, field, delta, Some(BUCKET_TTL)).await {
                metrics::record_store_error();
                tracing::debug!(key, error = %e, "Metrics bucket write failed");
                return;
            }
        }

        if metrics.duration_ms > SLOW_RESPONSE_MS {
            self.record_incident(Incident::new(
                "slow_response",
                &metrics.client_ip,
                Severity::Low,
                json!({
                    "path": metrics.path,
                    "duration_ms": metrics.duration_ms,
                }),
            ))
            .await;
        }

        if is_sensitive_path(&metrics.path) {
            self.record_incident(Incident::new(
                "suspicious_endpoint_access",
                &metrics.client_ip,
                Severity::Medium,
                json!({
                    "path": metrics.path,
                    "method": metrics.method,
                }),
            ))
            .await;
        }

        if let Some((total, errors)) = self.trailing_counts(&metrics.client_ip, minute).await {
            if errors * 100 > total * ERROR_RATE_THRESHOLD_PCT {
                self.record_incident(Incident::new(
                    "high_error_rate",
                    &metrics.client_ip,
                    Severity::Medium,
                    json!({
                        "window_mins": ERROR_RATE_WINDOW_MINS,
                        "total": total,
                        "errors": errors,
                    }),
                ))
                .await;
            }
        }
    }

    /// (total, errors) over the trailing error-rate window, or None on a
    /// store error.
    async fn trailing_counts(&self, client_ip: &str, minute: u64) -> Option<(u64, u64)> {
        let mut total = 0u64;
        let mut errors = 0u64;
        let start = minute.saturating_sub(ERROR_RATE_WINDOW_MINS - 1);
        for m in start..=minute {
            let key = format!("metrics:{client_ip}:{m}");
            match self.store.hash_get_all(&key).await {
                Ok(bucket) => {
                    total += bucket.get("total").copied().unwrap_or(0).max(0) as u64;
                    errors += bucket.get("status_4xx").copied().unwrap_or(0).max(0) as u64;
                    errors += bucket.get("status_5xx").copied().unwrap_or(0).max(0) as u64;
                }
                Err(_) => return None,
            }
        }
        Some((total, errors))
    }

    /// Persist an incident, bump the rolling per-IP counter, escalate on
    /// the threshold crossing, and forward to the audit trail.
    pub async fn record_incident(&self, incident: Incident) {
        metrics::record_incident(&incident.incident_type);

        if let Ok(raw) = serde_json::to_string(&incident) {
            let key = format!("incident:{}", uuid::Uuid::new_v4());
            if let Err(e) = self.store.set(&key, &raw, Some(INCIDENT_TTL)).await {
                metrics::record_store_error();
                tracing::warn!(error = %e, "Incident write failed");
            }
        }

        let count_key = format!("incident_count:{}", incident.client_ip);
        match self.store.incr_by(&count_key, 1, Some(INCIDENT_COUNT_TTL)).await {
            // Raise only on the increment that lands exactly on the
            // threshold; later increments in the same window stay quiet.
            Ok(count) if count as u64 == self.config.alert_threshold => {
                self.create_alert(
                    "multiple_incidents",
                    Severity::High,
                    &format!(
                        "{} incidents from {} within the last hour",
                        count, incident.client_ip
                    ),
                    json!({
                        "client_ip": incident.client_ip,
                        "incident_count": count,
                        "latest_type": incident.incident_type,
                    }),
                )
                .await;
            }
            Ok(_) => {}
            Err(e) => {
                metrics::record_store_error();
                tracing::warn!(error = %e, "Incident counter increment failed");
            }
        }

        self.audit
            .log_security_event(
                &incident.incident_type,
                &incident.client_ip,
                "unknown",
                incident.details.clone(),
                Some(incident.severity),
            )
            .await;
    }

    /// Create a pending alert in the active set.
    pub async fn create_alert(
        &self,
        alert_type: &str,
        severity: Severity,
        message: &str,
        details: serde_json::Value,
    ) -> Option<Alert> {
        let alert = Alert::new(alert_type, severity, message, details);

        // The notification hook is independent of persistence success.
        if severity == Severity::Critical {
            self.notifier.notify(alert_type, &alert.details);
        }

        let raw = serde_json::to_string(&alert).ok()?;
        let key = format!("alert:{}", alert.id);
        if let Err(e) = self.store.set(&key, &raw, None).await {
            metrics::record_store_error();
            tracing::error!(alert_type, error = %e, "Alert write failed");
            return None;
        }
        if let Err(e) = self
            .store
            .sorted_add("active_alerts", &alert.id.to_string(), alert.timestamp.timestamp_millis() as f64)
            .await
        {
            tracing::error!(alert_type, error = %e, "Active set update failed");
        }
        metrics::gauge_active_alerts(1.0);
        tracing::warn!(alert_type, severity = severity.as_str(), %alert.id, "Alert raised");
        Some(alert)
    }

    /// Alerts still pending, oldest first. Degrades to empty on store
    /// errors.
    pub async fn active_alerts(&self) -> Vec<Alert> {
        let ids = match self
            .store
            .sorted_range_by_score("active_alerts", 0.0, f64::MAX)
            .await
        {
            Ok(ids) => ids,
            Err(e) => {
                metrics::record_store_error();
                tracing::warn!(error = %e, "Active alert listing degraded to empty");
                return Vec::new();
            }
        };

        let mut alerts = Vec::with_capacity(ids.len());
        for id in ids {
            if let Ok(Some(raw)) = self.store.get(&format!("alert:{id}")).await {
                if let Ok(alert) = serde_json::from_str::<Alert>(&raw) {
                    if !alert.resolved {
                        alerts.push(alert);
                    }
                }
            }
        }
        alerts
    }

    /// Resolve an alert exactly once. The record is kept 7 days.
    pub async fn resolve_alert(&self, id: &str) -> Result<ResolveOutcome, StoreError> {
        let key = format!("alert:{id}");
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(ResolveOutcome::NotFound);
        };
        let mut alert: Alert =
            serde_json::from_str(&raw).map_err(|_| StoreError::Corrupt(key.clone()))?;
        if alert.resolved {
            return Ok(ResolveOutcome::AlreadyResolved);
        }

        alert.resolved = true;
        alert.resolved_at = Some(Utc::now());
        let raw = serde_json::to_string(&alert).map_err(|_| StoreError::Corrupt(key.clone()))?;
        self.store
            .set(&key, &raw, Some(RESOLVED_ALERT_RETENTION))
            .await?;
        self.store.sorted_remove("active_alerts", id).await?;
        metrics::gauge_active_alerts(-1.0);
        tracing::info!(alert_id = id, "Alert resolved");
        Ok(ResolveOutcome::Resolved(alert))
    }

    /// Aggregate metrics over the trailing window. Degrades to the zeroed
    /// default on any store failure.
    pub async fn security_metrics(&self, window_mins: u64) -> SecurityMetricsReport {
        match self.try_security_metrics(window_mins).await {
            Ok(report) => report,
            Err(e) => {
                metrics::record_store_error();
                tracing::warn!(error = %e, "Security metrics degraded to empty");
                SecurityMetricsReport {
                    window_mins,
                    ..Default::default()
                }
            }
        }
    }

    async fn try_security_metrics(
        &self,
        window_mins: u64,
    ) -> Result<SecurityMetricsReport, StoreError> {
        let now_min = now_ms() / 60_000;
        let min_minute = now_min.saturating_sub(window_mins.saturating_sub(1));

        let mut total = 0u64;
        let mut errors = 0u64;
        let mut duration_sum = 0u64;
        let mut per_ip: HashMap<String, (u64, u64)> = HashMap::new();

        for key in self.store.scan_keys("metrics:").await? {
            let Some(rest) = key.strip_prefix("metrics:") else {
                continue;
            };
            let Some((ip, minute)) = rest.rsplit_once(':') else {
                continue;
            };
            let Ok(minute) = minute.parse::<u64>() else {
                continue;
            };
            if minute < min_minute || minute > now_min {
                continue;
            }

            let bucket = self.store.hash_get_all(&key).await?;
            let bucket_total = bucket.get("total").copied().unwrap_or(0).max(0) as u64;
            let bucket_errors = (bucket.get("status_4xx").copied().unwrap_or(0)
                + bucket.get("status_5xx").copied().unwrap_or(0))
            .max(0) as u64;
            total += bucket_total;
            errors += bucket_errors;
            duration_sum += bucket.get("duration_ms").copied().unwrap_or(0).max(0) as u64;

            let slot = per_ip.entry(ip.to_string()).or_default();
            slot.0 += bucket_total;
            slot.1 += bucket_errors;
        }

        let mut top_ips: Vec<IpVolume> = per_ip
            .into_iter()
            .map(|(client_ip, (requests, errs))| IpVolume {
                client_ip,
                requests,
                errors: errs,
            })
            .collect();
        top_ips.sort_by(|a, b| b.requests.cmp(&a.requests).then(a.client_ip.cmp(&b.client_ip)));
        top_ips.truncate(10);

        Ok(SecurityMetricsReport {
            window_mins,
            total_requests: total,
            error_rate_pct: if total > 0 {
                errors as f64 * 100.0 / total as f64
            } else {
                0.0
            },
            average_response_time_ms: if total > 0 {
                duration_sum as f64 / total as f64
            } else {
                0.0
            },
            top_ips,
            incident_histogram: self.incident_histogram().await?,
            active_alerts: self.active_alerts().await,
        })
    }

    /// Incident-type histogram sampled from the most recent raw incidents.
    async fn incident_histogram(&self) -> Result<HashMap<String, u64>, StoreError> {
        let mut incidents = Vec::new();
        for key in self.store.scan_keys("incident:").await? {
            if let Some(raw) = self.store.get(&key).await? {
                if let Ok(incident) = serde_json::from_str::<Incident>(&raw) {
                    incidents.push(incident);
                }
            }
        }
        incidents.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        incidents.truncate(HISTOGRAM_SAMPLE);

        let mut histogram = HashMap::new();
        for incident in incidents {
            *histogram.entry(incident.incident_type).or_default() += 1;
        }
        Ok(histogram)
    }

    /// Periodic maintenance: purge stale buckets, backfill missing incident
    /// TTLs, drop long-resolved alerts. Idempotent and safe under traffic.
    pub async fn cleanup(&self) -> Result<usize, StoreError> {
        let mut removed = 0;
        let now_min = now_ms() / 60_000;

        for key in self.store.scan_keys("metrics:").await? {
            let Some(minute) = key
                .rsplit_once(':')
                .and_then(|(_, m)| m.parse::<u64>().ok())
            else {
                continue;
            };
            if minute + BUCKET_PURGE_MINS < now_min {
                self.store.delete(&key).await?;
                removed += 1;
            }
        }

        for key in self.store.scan_keys("incident:").await? {
            if self.store.ttl(&key).await?.is_none() {
                self.store.expire(&key, INCIDENT_TTL).await?;
            }
        }

        let cutoff = Utc::now() - chrono::Duration::days(7);
        for key in self.store.scan_keys("alert:").await? {
            let Some(raw) = self.store.get(&key).await? else {
                continue;
            };
            let Ok(alert) = serde_json::from_str::<Alert>(&raw) else {
                continue;
            };
            if alert.resolved && alert.resolved_at.is_some_and(|at| at < cutoff) {
                self.store.delete(&key).await?;
                removed += 1;
            }
        }

        // Drop active-set members whose record has expired.
        for id in self
            .store
            .sorted_range_by_score("active_alerts", 0.0, f64::MAX)
            .await?
        {
            if self.store.get(&format!("alert:{id}")).await?.is_none() {
                self.store.sorted_remove("active_alerts", &id).await?;
            }
        }

        Ok(removed)
    }
}
