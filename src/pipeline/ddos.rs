//! DDoS and ban gate, the first pipeline stage.
//!
//! Three ways in: an active ban, a per-minute request frequency above the
//! configured threshold (which also issues an automatic ban), or at least
//! three independent request-shape signals at once. All store faults fail
//! open; this stage must never take the gateway down with it.

use std::time::Duration;

use axum::http::HeaderMap;

use crate::config::schema::DdosConfig;
use crate::error::SecurityError;
use crate::limiter::RateLimiter;
use crate::observability::metrics;
use crate::store::{now_ms, CounterStore};

use super::client_ip::{forwarded_hops, header_str};

/// Shape signals required before a request is blocked on heuristics alone.
const SUSPICION_THRESHOLD: usize = 3;
/// Forwarded chains longer than this read as header spoofing.
const MAX_FORWARDED_HOPS: usize = 5;

const BOT_AGENT_MARKERS: &[&str] = &[
    "bot",
    "crawler",
    "spider",
    "scrapy",
    "python-requests",
    "go-http-client",
    "java/",
];

fn bot_like_agent(user_agent: Option<&str>) -> bool {
    match user_agent {
        None => true,
        Some(ua) => {
            let ua = ua.to_ascii_lowercase();
            ua.is_empty() || BOT_AGENT_MARKERS.iter().any(|m| ua.contains(m))
        }
    }
}

fn suspicion_score(headers: &HeaderMap) -> usize {
    let mut score = 0;
    if bot_like_agent(header_str(headers, "user-agent")) {
        score += 1;
    }
    if forwarded_hops(headers) > MAX_FORWARDED_HOPS {
        score += 1;
    }
    if header_str(headers, "accept-language").is_none() {
        score += 1;
    }
    if header_str(headers, "connection")
        .is_some_and(|v| v.eq_ignore_ascii_case("close"))
    {
        score += 1;
    }
    score
}

/// Evaluate the gate for one request. `None` means pass.
pub async fn evaluate(
    store: &dyn CounterStore,
    limiter: &RateLimiter,
    config: &DdosConfig,
    client_ip: &str,
    headers: &HeaderMap,
) -> Option<SecurityError> {
    if let Some(ban) = limiter.ban_status(client_ip).await {
        return Some(SecurityError::Banned {
            reason: ban.reason,
            expires_at_ms: ban.expires_at_ms,
        });
    }
    if !config.enabled {
        return None;
    }

    let minute = now_ms() / 60_000;
    let key = format!("rate_limit:ddos:{client_ip}:{minute}");
    match store.incr_by(&key, 1, Some(Duration::from_secs(60))).await {
        Ok(count) if count.max(0) as u64 > config.threshold => {
            // The ban outlives the minute window, so the cost of the scan
            // is paid once.
            match limiter
                .ban(
                    client_ip,
                    "request frequency over ddos threshold",
                    Duration::from_millis(config.ban_duration_ms),
                )
                .await
            {
                Ok(ban) => {
                    return Some(SecurityError::Banned {
                        reason: ban.reason,
                        expires_at_ms: ban.expires_at_ms,
                    })
                }
                Err(e) => {
                    tracing::warn!(client_ip, error = %e, "Auto-ban write failed; blocking this request only");
                    return Some(SecurityError::DdosBlocked);
                }
            }
        }
        Ok(_) => {}
        Err(e) => {
            metrics::record_store_error();
            tracing::warn!(client_ip, error = %e, "DDoS frequency counter unavailable, failing open");
        }
    }

    if suspicion_score(headers) >= SUSPICION_THRESHOLD {
        return Some(SecurityError::DdosBlocked);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RateLimitConfig;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn fixture(threshold: u64) -> (Arc<MemoryStore>, RateLimiter, DdosConfig) {
        let store = Arc::new(MemoryStore::new());
        let limiter = RateLimiter::new(store.clone(), RateLimitConfig::default());
        let config = DdosConfig {
            enabled: true,
            threshold,
            ban_duration_ms: 60_000,
        };
        (store, limiter, config)
    }

    fn browser_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("user-agent", "Mozilla/5.0".parse().unwrap());
        headers.insert("accept-language", "en-US".parse().unwrap());
        headers
    }

    #[tokio::test]
    async fn normal_browser_traffic_passes() {
        let (store, limiter, config) = fixture(100);
        let verdict =
            evaluate(store.as_ref(), &limiter, &config, "1.2.3.4", &browser_headers()).await;
        assert!(verdict.is_none());
    }

    #[tokio::test]
    async fn frequency_over_threshold_bans_the_ip() {
        let (store, limiter, config) = fixture(3);
        let headers = browser_headers();
        for _ in 0..3 {
            assert!(evaluate(store.as_ref(), &limiter, &config, "1.2.3.4", &headers)
                .await
                .is_none());
        }
        let verdict = evaluate(store.as_ref(), &limiter, &config, "1.2.3.4", &headers).await;
        assert!(matches!(verdict, Some(SecurityError::Banned { .. })));
        // The ban short-circuits before any counting.
        assert!(limiter.ban_status("1.2.3.4").await.is_some());
    }

    #[tokio::test]
    async fn three_shape_signals_block_without_banning() {
        let (store, limiter, config) = fixture(1000);
        let mut headers = HeaderMap::new();
        headers.insert("user-agent", "python-requests/2.31".parse().unwrap());
        headers.insert("connection", "close".parse().unwrap());
        // No accept-language: third signal.
        let verdict = evaluate(store.as_ref(), &limiter, &config, "1.2.3.4", &headers).await;
        assert!(matches!(verdict, Some(SecurityError::DdosBlocked)));
        assert!(limiter.ban_status("1.2.3.4").await.is_none());
    }

    #[tokio::test]
    async fn two_signals_are_not_enough() {
        let (store, limiter, config) = fixture(1000);
        let mut headers = HeaderMap::new();
        headers.insert("user-agent", "python-requests/2.31".parse().unwrap());
        headers.insert("accept-language", "en-US".parse().unwrap());
        headers.insert("connection", "close".parse().unwrap());
        assert!(evaluate(store.as_ref(), &limiter, &config, "1.2.3.4", &headers)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn long_forwarded_chain_is_a_signal() {
        let (store, limiter, config) = fixture(1000);
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            "1.1.1.1, 2.2.2.2, 3.3.3.3, 4.4.4.4, 5.5.5.5, 6.6.6.6".parse().unwrap(),
        );
        headers.insert("connection", "close".parse().unwrap());
        // Missing accept-language completes the score.
        headers.insert("user-agent", "Mozilla/5.0".parse().unwrap());
        let verdict = evaluate(store.as_ref(), &limiter, &config, "1.1.1.1", &headers).await;
        assert!(matches!(verdict, Some(SecurityError::DdosBlocked)));
    }

    #[tokio::test]
    async fn disabled_gate_still_honors_bans() {
        let (store, limiter, mut config) = fixture(1000);
        config.enabled = false;
        limiter
            .ban("6.6.6.6", "manual", Duration::from_secs(60))
            .await
            .unwrap();
        let verdict =
            evaluate(store.as_ref(), &limiter, &config, "6.6.6.6", &browser_headers()).await;
        assert!(matches!(verdict, Some(SecurityError::Banned { .. })));

        let mut bare = HeaderMap::new();
        bare.insert("connection", "close".parse().unwrap());
        assert!(evaluate(store.as_ref(), &limiter, &config, "7.7.7.7", &bare)
            .await
            .is_none());
    }
}
