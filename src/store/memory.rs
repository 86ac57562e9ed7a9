//! In-process counter store.
//!
//! DashMap's per-entry locking provides the atomicity `incr_by` and
//! `hash_incr` promise. Expired entries are dropped lazily on read and swept
//! by `purge_expired` during maintenance.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{CounterStore, StoreError};

#[derive(Debug, Clone)]
enum Value {
    Scalar(String),
    Hash(HashMap<String, i64>),
    Sorted(HashMap<String, f64>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// DashMap-backed implementation of [`CounterStore`].
#[derive(Default)]
pub struct MemoryStore {
    map: DashMap<String, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry. Idempotent; safe concurrently with traffic.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.map.len();
        self.map.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.map.len())
    }

    /// Number of live entries (reporting only).
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn deadline(ttl: Option<Duration>) -> Option<Instant> {
        ttl.map(|t| Instant::now() + t)
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        match self.map.get(key) {
            Some(entry) if !entry.is_expired(now) => match &entry.value {
                Value::Scalar(s) => Ok(Some(s.clone())),
                _ => Err(StoreError::Corrupt(key.to_string())),
            },
            _ => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        self.map.insert(
            key.to_string(),
            Entry {
                value: Value::Scalar(value.to_string()),
                expires_at: Self::deadline(ttl),
            },
        );
        Ok(())
    }

    async fn incr_by(
        &self,
        key: &str,
        delta: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, StoreError> {
        let now = Instant::now();
        let mut entry = self.map.entry(key.to_string()).or_insert(Entry {
            value: Value::Scalar("0".to_string()),
            expires_at: Self::deadline(ttl),
        });

        if entry.is_expired(now) {
            entry.value = Value::Scalar("0".to_string());
            entry.expires_at = Self::deadline(ttl);
        }

        let current = match &entry.value {
            Value::Scalar(s) => s
                .parse::<i64>()
                .map_err(|_| StoreError::Corrupt(key.to_string()))?,
            _ => return Err(StoreError::Corrupt(key.to_string())),
        };
        let next = current + delta;
        entry.value = Value::Scalar(next.to_string());
        entry.expires_at = Self::deadline(ttl).or(entry.expires_at);
        Ok(next)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.map.remove(key);
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError> {
        let now = Instant::now();
        let mut out = Vec::new();
        for item in self.map.iter() {
            if item.key().starts_with(prefix) && !item.is_expired(now) {
                if let Value::Scalar(s) = &item.value {
                    out.push((item.key().clone(), s.clone()));
                }
            }
        }
        Ok(out)
    }

    async fn scan_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let now = Instant::now();
        Ok(self
            .map
            .iter()
            .filter(|item| item.key().starts_with(prefix) && !item.is_expired(now))
            .map(|item| item.key().clone())
            .collect())
    }

    async fn hash_incr(
        &self,
        key: &str,
        field: &str,
        delta: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, StoreError> {
        let now = Instant::now();
        let mut entry = self.map.entry(key.to_string()).or_insert(Entry {
            value: Value::Hash(HashMap::new()),
            expires_at: Self::deadline(ttl),
        });

        if entry.is_expired(now) {
            entry.value = Value::Hash(HashMap::new());
            entry.expires_at = Self::deadline(ttl);
        }

        let hash = match &mut entry.value {
            Value::Hash(h) => h,
            _ => return Err(StoreError::Corrupt(key.to_string())),
        };
        let slot = hash.entry(field.to_string()).or_insert(0);
        *slot += delta;
        let next = *slot;
        entry.expires_at = Self::deadline(ttl).or(entry.expires_at);
        Ok(next)
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, i64>, StoreError> {
        let now = Instant::now();
        match self.map.get(key) {
            Some(entry) if !entry.is_expired(now) => match &entry.value {
                Value::Hash(h) => Ok(h.clone()),
                _ => Err(StoreError::Corrupt(key.to_string())),
            },
            _ => Ok(HashMap::new()),
        }
    }

    async fn sorted_add(&self, key: &str, member: &str, score: f64) -> Result<(), StoreError> {
        let mut entry = self.map.entry(key.to_string()).or_insert(Entry {
            value: Value::Sorted(HashMap::new()),
            expires_at: None,
        });
        match &mut entry.value {
            Value::Sorted(set) => {
                set.insert(member.to_string(), score);
                Ok(())
            }
            _ => Err(StoreError::Corrupt(key.to_string())),
        }
    }

    async fn sorted_remove(&self, key: &str, member: &str) -> Result<(), StoreError> {
        if let Some(mut entry) = self.map.get_mut(key) {
            if let Value::Sorted(set) = &mut entry.value {
                set.remove(member);
            }
        }
        Ok(())
    }

    async fn sorted_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<Vec<String>, StoreError> {
        let now = Instant::now();
        match self.map.get(key) {
            Some(entry) if !entry.is_expired(now) => match &entry.value {
                Value::Sorted(set) => {
                    let mut members: Vec<(String, f64)> = set
                        .iter()
                        .filter(|(_, score)| **score >= min && **score <= max)
                        .map(|(m, s)| (m.clone(), *s))
                        .collect();
                    members.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
                    Ok(members.into_iter().map(|(m, _)| m).collect())
                }
                _ => Err(StoreError::Corrupt(key.to_string())),
            },
            _ => Ok(Vec::new()),
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let now = Instant::now();
        match self.map.get_mut(key) {
            Some(mut entry) if !entry.is_expired(now) => {
                entry.expires_at = Some(now + ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let now = Instant::now();
        match self.map.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                Ok(entry.expires_at.map(|at| at.saturating_duration_since(now)))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn n_increments_store_exactly_n() {
        let store = MemoryStore::new();
        let ttl = Some(Duration::from_secs(60));
        for _ in 0..7 {
            store.incr_by("rate_limit:general:1.2.3.4:100", 1, ttl).await.unwrap();
        }
        let value = store.get("rate_limit:general:1.2.3.4:100").await.unwrap();
        assert_eq!(value.as_deref(), Some("7"));
    }

    #[tokio::test]
    async fn concurrent_increments_do_not_lose_updates() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    store.incr_by("counter", 1, None).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.get("counter").await.unwrap().as_deref(), Some("800"));
    }

    #[tokio::test]
    async fn expired_counter_restarts_at_zero() {
        let store = MemoryStore::new();
        let ttl = Some(Duration::from_millis(10));
        store.incr_by("k", 5, ttl).await.unwrap();
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        let value = store.incr_by("k", 1, ttl).await.unwrap();
        assert_eq!(value, 1);
    }

    #[tokio::test]
    async fn increment_after_expiry_sheds_the_stale_deadline() {
        let store = MemoryStore::new();
        store.incr_by("k", 5, Some(Duration::from_millis(10))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(25)).await;

        // A TTL-less increment on the expired key must leave it readable.
        let value = store.incr_by("k", -1, None).await.unwrap();
        assert_eq!(value, -1);
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("-1"));
        assert_eq!(store.ttl("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn hash_fields_increment_independently() {
        let store = MemoryStore::new();
        store.hash_incr("metrics:ip:0", "total", 1, None).await.unwrap();
        store.hash_incr("metrics:ip:0", "total", 1, None).await.unwrap();
        store.hash_incr("metrics:ip:0", "status_5xx", 1, None).await.unwrap();

        let all = store.hash_get_all("metrics:ip:0").await.unwrap();
        assert_eq!(all["total"], 2);
        assert_eq!(all["status_5xx"], 1);
    }

    #[tokio::test]
    async fn sorted_range_orders_by_score() {
        let store = MemoryStore::new();
        store.sorted_add("active_alerts", "b", 2.0).await.unwrap();
        store.sorted_add("active_alerts", "a", 1.0).await.unwrap();
        store.sorted_add("active_alerts", "c", 3.0).await.unwrap();
        store.sorted_remove("active_alerts", "c").await.unwrap();

        let members = store
            .sorted_range_by_score("active_alerts", 0.0, f64::MAX)
            .await
            .unwrap();
        assert_eq!(members, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn scan_skips_expired_entries() {
        let store = MemoryStore::new();
        store.set("banned_ip:1.1.1.1", "{}", Some(Duration::from_millis(5))).await.unwrap();
        store.set("banned_ip:2.2.2.2", "{}", None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let live = store.scan_prefix("banned_ip:").await.unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].0, "banned_ip:2.2.2.2");

        assert_eq!(store.purge_expired(), 1);
    }

    #[tokio::test]
    async fn expire_backfills_missing_ttl() {
        let store = MemoryStore::new();
        store.set("incident:x", "{}", None).await.unwrap();
        assert_eq!(store.ttl("incident:x").await.unwrap(), None);
        assert!(store.expire("incident:x", Duration::from_secs(60)).await.unwrap());
        assert!(store.ttl("incident:x").await.unwrap().is_some());
        assert!(!store.expire("missing", Duration::from_secs(1)).await.unwrap());
    }
}
