//! Shared counter store abstraction.
//!
//! All counters, bans, incidents, and alerts live behind this narrow
//! interface so the limiter, monitor, and pipeline stay decoupled from the
//! backing technology. Rate-limit correctness depends entirely on the
//! atomicity of `incr_by` and `hash_incr`.
//!
//! Key namespaces:
//! `rate_limit:`, `endpoint_limit:`, `user_limit:`, `banned_ip:`,
//! `metrics:`, `incident:`, `incident_count:`, `alert:`, `active_alerts`.

pub mod memory;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

pub use memory::MemoryStore;

/// Store-level failure. Callers never surface this to clients: enforcement
/// paths fail open, reporting paths degrade to empty results.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt value at {0}")]
    Corrupt(String),
}

/// Narrow shared-store interface over GET / SET-with-TTL / INCR-with-TTL /
/// DEL / prefix-scan / hash-field-increment / sorted-set operations.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Fetch a scalar value.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Set a scalar value, optionally with a TTL.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Atomically increment a counter, (re)setting its TTL, and return the
    /// new value. Initializes missing counters at zero.
    async fn incr_by(&self, key: &str, delta: i64, ttl: Option<Duration>)
        -> Result<i64, StoreError>;

    /// Delete a key of any shape.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// List all live scalar entries whose key starts with `prefix`.
    /// O(n); reporting and cleanup only.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError>;

    /// List all live keys (of any shape) starting with `prefix`.
    /// O(n); reporting and cleanup only.
    async fn scan_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Atomically increment a hash field, (re)setting the hash TTL.
    async fn hash_incr(
        &self,
        key: &str,
        field: &str,
        delta: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, StoreError>;

    /// Fetch all fields of a hash. Missing hashes yield an empty map.
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, i64>, StoreError>;

    /// Add a member to a sorted set with the given score.
    async fn sorted_add(&self, key: &str, member: &str, score: f64) -> Result<(), StoreError>;

    /// Remove a member from a sorted set.
    async fn sorted_remove(&self, key: &str, member: &str) -> Result<(), StoreError>;

    /// Members with `min <= score <= max`, ascending by score.
    async fn sorted_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<Vec<String>, StoreError>;

    /// Set a TTL on an existing key. Returns false if the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Remaining TTL of a key. `Ok(None)` means the key exists without one.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;
}

/// Milliseconds since the Unix epoch, the store-wide time base.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Store where every operation reports [`StoreError::Unavailable`].
///
/// Exercises the fail-open and degrade-to-empty paths in tests.
pub struct UnavailableStore;

impl UnavailableStore {
    fn err<T>() -> Result<T, StoreError> {
        Err(StoreError::Unavailable("store offline".to_string()))
    }
}

#[async_trait]
impl CounterStore for UnavailableStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Self::err()
    }
    async fn set(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> Result<(), StoreError> {
        Self::err()
    }
    async fn incr_by(
        &self,
        _key: &str,
        _delta: i64,
        _ttl: Option<Duration>,
    ) -> Result<i64, StoreError> {
        Self::err()
    }
    async fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Self::err()
    }
    async fn scan_prefix(&self, _prefix: &str) -> Result<Vec<(String, String)>, StoreError> {
        Self::err()
    }
    async fn scan_keys(&self, _prefix: &str) -> Result<Vec<String>, StoreError> {
        Self::err()
    }
    async fn hash_incr(
        &self,
        _key: &str,
        _field: &str,
        _delta: i64,
        _ttl: Option<Duration>,
    ) -> Result<i64, StoreError> {
        Self::err()
    }
    async fn hash_get_all(&self, _key: &str) -> Result<HashMap<String, i64>, StoreError> {
        Self::err()
    }
    async fn sorted_add(&self, _key: &str, _member: &str, _score: f64) -> Result<(), StoreError> {
        Self::err()
    }
    async fn sorted_remove(&self, _key: &str, _member: &str) -> Result<(), StoreError> {
        Self::err()
    }
    async fn sorted_range_by_score(
        &self,
        _key: &str,
        _min: f64,
        _max: f64,
    ) -> Result<Vec<String>, StoreError> {
        Self::err()
    }
    async fn expire(&self, _key: &str, _ttl: Duration) -> Result<bool, StoreError> {
        Self::err()
    }
    async fn ttl(&self, _key: &str) -> Result<Option<Duration>, StoreError> {
        Self::err()
    }
}
