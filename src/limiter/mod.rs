//! Tiered fixed-window rate limiter.
//!
//! # Data Flow
//! ```text
//! check_ip(ip, path)
//!     → tables.rs (endpoint override, else tier limit)
//!     → CounterStore::incr_by (atomic count + TTL reset)
//!     → LimitDecision { allowed, limit, remaining, reset, retry_after }
//! ```
//!
//! # Design Decisions
//! - Fixed windows: key = (scope, identity, floor(now / window_ms))
//! - Correctness rests entirely on the store's atomic increment
//! - Fail open on store errors: liveness over strict enforcement
//! - The ban list short-circuits counting and is checked by the caller

pub mod tables;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::schema::RateLimitConfig;
use crate::observability::metrics;
use crate::store::{now_ms, CounterStore, StoreError};

pub use tables::{tier_for_path, Tier, WindowLimit};

/// Outcome of one rate limit check.
#[derive(Debug, Clone, Serialize)]
pub struct LimitDecision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    pub reset_at_ms: u64,
    pub retry_after_secs: u64,
}

impl LimitDecision {
    /// Fail-open decision: full quota, as if the window were empty.
    fn open(limit: WindowLimit) -> Self {
        let now = now_ms();
        let window = now / limit.window_ms;
        Self {
            allowed: true,
            limit: limit.max_requests,
            remaining: limit.max_requests,
            reset_at_ms: (window + 1) * limit.window_ms,
            retry_after_secs: 0,
        }
    }
}

/// An active IP ban. Supersedes rate counting while live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ban {
    pub ip: String,
    pub reason: String,
    pub banned_at_ms: u64,
    pub expires_at_ms: u64,
}

/// Approximate usage statistics, reporting only.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UsageReport {
    pub tier_windows: usize,
    pub endpoint_windows: usize,
    pub user_action_windows: usize,
    pub total_counted_requests: u64,
    pub active_bans: usize,
}

pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    fn general_limit(&self) -> WindowLimit {
        WindowLimit {
            window_ms: self.config.window_ms,
            max_requests: self.config.max_requests,
        }
    }

    fn limit_for(&self, path: &str) -> (String, WindowLimit) {
        if let Some((prefix, limit)) = tables::endpoint_override(path) {
            return (format!("endpoint_limit:{prefix}"), limit);
        }
        let tier = tier_for_path(path);
        let limit = match tier {
            Tier::Auth => tables::AUTH_LIMIT,
            Tier::Api => tables::API_LIMIT,
            Tier::General => self.general_limit(),
        };
        (format!("rate_limit:{}", tier.as_str()), limit)
    }

    /// Count one request against a window key, atomically.
    async fn check_window(&self, scope: &str, identity: &str, limit: WindowLimit) -> LimitDecision {
        let now = now_ms();
        let window = now / limit.window_ms;
        let key = format!("{scope}:{identity}:{window}");
        let ttl = Some(Duration::from_millis(limit.window_ms));

        match self.store.incr_by(&key, 1, ttl).await {
            Ok(count) => {
                let count = count.max(0) as u64;
                let reset_at_ms = (window + 1) * limit.window_ms;
                let allowed = count <= limit.max_requests;
                LimitDecision {
                    allowed,
                    limit: limit.max_requests,
                    remaining: limit.max_requests.saturating_sub(count),
                    reset_at_ms,
                    retry_after_secs: if allowed {
                        0
                    } else {
                        (reset_at_ms.saturating_sub(now)).div_ceil(1000)
                    },
                }
            }
            Err(e) => {
                metrics::record_store_error();
                tracing::warn!(scope, identity, error = %e, "Rate limit store error, failing open");
                LimitDecision::open(limit)
            }
        }
    }

    /// Check and count one request from an IP against the path's limit.
    pub async fn check_ip(&self, ip: &str, path: &str) -> LimitDecision {
        let (scope, limit) = self.limit_for(path);
        self.check_window(&scope, ip, limit).await
    }

    /// Check and count one named action for a user.
    pub async fn check_user_action(&self, user_id: &str, action: &str) -> LimitDecision {
        let limit = tables::user_action_limit(action);
        self.check_window(&format!("user_limit:{action}"), user_id, limit)
            .await
    }

    /// Un-count one request (skip_successful_requests). Best effort.
    pub async fn uncount(&self, ip: &str, path: &str) {
        let (scope, limit) = self.limit_for(path);
        let window = now_ms() / limit.window_ms;
        let key = format!("{scope}:{ip}:{window}");
        if let Err(e) = self.store.incr_by(&key, -1, None).await {
            tracing::debug!(key, error = %e, "Failed to un-count successful request");
        }
    }

    /// Whether `skip_successful_requests` is configured.
    pub fn skips_successful(&self) -> bool {
        self.config.skip_successful_requests
    }

    // ── Ban list ─────────────────────────────────────────────────────

    /// Active ban for an IP, if any. Fails open: a store error reads as
    /// not banned.
    pub async fn ban_status(&self, ip: &str) -> Option<Ban> {
        match self.store.get(&format!("banned_ip:{ip}")).await {
            Ok(Some(raw)) => match serde_json::from_str::<Ban>(&raw) {
                Ok(ban) if ban.expires_at_ms > now_ms() => Some(ban),
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!(ip, error = %e, "Corrupt ban record ignored");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                metrics::record_store_error();
                tracing::warn!(ip, error = %e, "Ban check store error, failing open");
                None
            }
        }
    }

    pub async fn ban(&self, ip: &str, reason: &str, duration: Duration) -> Result<Ban, StoreError> {
        let now = now_ms();
        let ban = Ban {
            ip: ip.to_string(),
            reason: reason.to_string(),
            banned_at_ms: now,
            expires_at_ms: now + duration.as_millis() as u64,
        };
        let raw = serde_json::to_string(&ban)
            .map_err(|_| StoreError::Corrupt(format!("banned_ip:{ip}")))?;
        self.store
            .set(&format!("banned_ip:{ip}"), &raw, Some(duration))
            .await?;
        tracing::warn!(ip, reason, expires_at_ms = ban.expires_at_ms, "IP banned");
        Ok(ban)
    }

    pub async fn unban(&self, ip: &str) -> Result<(), StoreError> {
        self.store.delete(&format!("banned_ip:{ip}")).await?;
        tracing::info!(ip, "IP unbanned");
        Ok(())
    }

    pub async fn list_bans(&self) -> Result<Vec<Ban>, StoreError> {
        let now = now_ms();
        let entries = self.store.scan_prefix("banned_ip:").await?;
        Ok(entries
            .iter()
            .filter_map(|(_, raw)| serde_json::from_str::<Ban>(raw).ok())
            .filter(|ban| ban.expires_at_ms > now)
            .collect())
    }

    // ── Admin operations ─────────────────────────────────────────────

    /// Current window status for an IP and path, without counting.
    pub async fn status(&self, ip: &str, path: &str) -> Result<LimitDecision, StoreError> {
        let (scope, limit) = self.limit_for(path);
        let now = now_ms();
        let window = now / limit.window_ms;
        let key = format!("{scope}:{ip}:{window}");
        let count = match self.store.get(&key).await? {
            Some(raw) => raw.parse::<u64>().map_err(|_| StoreError::Corrupt(key))?,
            None => 0,
        };
        let reset_at_ms = (window + 1) * limit.window_ms;
        let allowed = count < limit.max_requests;
        Ok(LimitDecision {
            allowed,
            limit: limit.max_requests,
            remaining: limit.max_requests.saturating_sub(count),
            reset_at_ms,
            retry_after_secs: if allowed {
                0
            } else {
                (reset_at_ms.saturating_sub(now)).div_ceil(1000)
            },
        })
    }

    /// Explicitly reset the current window for an IP and path.
    pub async fn reset(&self, ip: &str, path: &str) -> Result<(), StoreError> {
        let (scope, limit) = self.limit_for(path);
        let window = now_ms() / limit.window_ms;
        self.store
            .delete(&format!("{scope}:{ip}:{window}"))
            .await
    }

    /// Approximate usage across all live windows. O(n) scan, reporting only.
    pub async fn usage(&self) -> Result<UsageReport, StoreError> {
        let mut report = UsageReport::default();
        let sum = |entries: &[(String, String)]| {
            entries
                .iter()
                .filter_map(|(_, v)| v.parse::<u64>().ok())
                .sum::<u64>()
        };

        let tiers = self.store.scan_prefix("rate_limit:").await?;
        report.tier_windows = tiers.len();
        report.total_counted_requests += sum(&tiers);

        let endpoints = self.store.scan_prefix("endpoint_limit:").await?;
        report.endpoint_windows = endpoints.len();
        report.total_counted_requests += sum(&endpoints);

        let actions = self.store.scan_prefix("user_limit:").await?;
        report.user_action_windows = actions.len();
        report.total_counted_requests += sum(&actions);

        report.active_bans = self.list_bans().await?.len();
        Ok(report)
    }

    /// Delete windows older than two generations. Idempotent.
    pub async fn cleanup(&self) -> Result<usize, StoreError> {
        let mut deleted = 0;
        for prefix in ["rate_limit:", "endpoint_limit:", "user_limit:"] {
            let entries = self.store.scan_prefix(prefix).await?;
            for (key, _) in entries {
                let Some((_, window)) = key.rsplit_once(':') else {
                    continue;
                };
                let Ok(window) = window.parse::<u64>() else {
                    continue;
                };
                let Some(window_ms) = self.window_ms_for_key(&key) else {
                    continue;
                };
                let current = now_ms() / window_ms;
                if window + 2 < current {
                    self.store.delete(&key).await?;
                    deleted += 1;
                }
            }
        }
        Ok(deleted)
    }

    /// Window length for a stored key, derived from its scope segment.
    fn window_ms_for_key(&self, key: &str) -> Option<u64> {
        let mut segments = key.splitn(3, ':');
        let namespace = segments.next()?;
        let scope = segments.next()?;
        match namespace {
            "rate_limit" => Some(match scope {
                "auth" => tables::AUTH_LIMIT.window_ms,
                "api" => tables::API_LIMIT.window_ms,
                _ => self.config.window_ms,
            }),
            "endpoint_limit" => tables::endpoint_override(scope).map(|(_, l)| l.window_ms),
            "user_limit" => Some(tables::user_action_limit(scope).window_ms),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, UnavailableStore};

    fn limiter_with(store: Arc<dyn CounterStore>, max_requests: u64) -> RateLimiter {
        RateLimiter::new(
            store,
            RateLimitConfig {
                window_ms: 60_000,
                max_requests,
                skip_successful_requests: false,
            },
        )
    }

    #[tokio::test]
    async fn requests_beyond_max_are_rejected() {
        let limiter = limiter_with(Arc::new(MemoryStore::new()), 3);
        for _ in 0..3 {
            assert!(limiter.check_ip("1.2.3.4", "/page").await.allowed);
        }
        let decision = limiter.check_ip("1.2.3.4", "/page").await;
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        assert!(decision.retry_after_secs >= 1);
        assert!(decision.reset_at_ms > now_ms());

        // Another identity is unaffected.
        assert!(limiter.check_ip("5.6.7.8", "/page").await.allowed);
    }

    #[tokio::test]
    async fn endpoint_override_applies_before_tier() {
        let store = Arc::new(MemoryStore::new());
        let limiter = limiter_with(store, 1000);
        // Login override: 5 per 15 minutes.
        for _ in 0..5 {
            assert!(limiter.check_ip("1.2.3.4", "/api/auth/login").await.allowed);
        }
        assert!(!limiter.check_ip("1.2.3.4", "/api/auth/login").await.allowed);
        // The auth tier itself still has room on other auth paths.
        assert!(limiter.check_ip("1.2.3.4", "/api/auth/session").await.allowed);
    }

    #[tokio::test]
    async fn user_action_limits_use_their_table() {
        let limiter = limiter_with(Arc::new(MemoryStore::new()), 1000);
        for _ in 0..10 {
            assert!(limiter.check_user_action("u1", "challenge_create").await.allowed);
        }
        assert!(!limiter.check_user_action("u1", "challenge_create").await.allowed);
        assert!(limiter.check_user_action("u2", "challenge_create").await.allowed);
    }

    #[tokio::test]
    async fn store_error_fails_open_with_full_quota() {
        let limiter = limiter_with(Arc::new(UnavailableStore), 10);
        let decision = limiter.check_ip("1.2.3.4", "/page").await;
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 10);

        // Ban check also fails open.
        assert!(limiter.ban_status("1.2.3.4").await.is_none());
    }

    #[tokio::test]
    async fn ban_supersedes_and_expires() {
        let limiter = limiter_with(Arc::new(MemoryStore::new()), 10);
        limiter
            .ban("9.9.9.9", "manual", Duration::from_secs(60))
            .await
            .unwrap();
        let ban = limiter.ban_status("9.9.9.9").await.unwrap();
        assert_eq!(ban.reason, "manual");
        assert_eq!(limiter.list_bans().await.unwrap().len(), 1);

        limiter.unban("9.9.9.9").await.unwrap();
        assert!(limiter.ban_status("9.9.9.9").await.is_none());
    }

    #[tokio::test]
    async fn status_reads_without_counting() {
        let limiter = limiter_with(Arc::new(MemoryStore::new()), 10);
        limiter.check_ip("1.2.3.4", "/page").await;
        limiter.check_ip("1.2.3.4", "/page").await;

        let status = limiter.status("1.2.3.4", "/page").await.unwrap();
        assert_eq!(status.remaining, 8);
        // Reading twice does not change the count.
        let again = limiter.status("1.2.3.4", "/page").await.unwrap();
        assert_eq!(again.remaining, 8);
    }

    #[tokio::test]
    async fn reset_clears_current_window() {
        let limiter = limiter_with(Arc::new(MemoryStore::new()), 2);
        limiter.check_ip("1.2.3.4", "/page").await;
        limiter.check_ip("1.2.3.4", "/page").await;
        assert!(!limiter.check_ip("1.2.3.4", "/page").await.allowed);

        limiter.reset("1.2.3.4", "/page").await.unwrap();
        assert!(limiter.check_ip("1.2.3.4", "/page").await.allowed);
    }

    #[tokio::test]
    async fn uncount_returns_quota() {
        let limiter = limiter_with(Arc::new(MemoryStore::new()), 2);
        limiter.check_ip("1.2.3.4", "/page").await;
        limiter.check_ip("1.2.3.4", "/page").await;
        limiter.uncount("1.2.3.4", "/page").await;
        assert!(limiter.check_ip("1.2.3.4", "/page").await.allowed);
    }

    #[tokio::test]
    async fn usage_reports_window_counts() {
        let limiter = limiter_with(Arc::new(MemoryStore::new()), 10);
        limiter.check_ip("1.2.3.4", "/page").await;
        limiter.check_ip("1.2.3.4", "/page").await;
        limiter.check_user_action("u1", "message_send").await;

        let usage = limiter.usage().await.unwrap();
        assert_eq!(usage.tier_windows, 1);
        assert_eq!(usage.user_action_windows, 1);
        assert_eq!(usage.total_counted_requests, 3);
    }
}
