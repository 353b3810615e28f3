//! Read-through cache for list/search provider calls.
//!
//! This module provides:
//! - [`CacheBackend`]: minimal `get`/`put` storage port
//! - [`InMemoryCache`]: process-local backend with optional default TTL
//! - [`CachePolicy`]: per-provider choice between backend TTL, a fixed
//!   deadline, or no caching at all
//! - [`fingerprint`]: deterministic cache keys from an operation namespace
//!   and its normalized arguments
//! - [`ResponseCache`]: the fetch-or-compute wrapper adapters call into
//!
//! There is no single-flight protection: two racing misses for the same key
//! both run their producer and the last store wins. Only idempotent reads
//! are cached, so this converges.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, trace, warn};

use crate::error::{ProviderError, ProviderResult};

/// Storage port used by [`ResponseCache`].
pub trait CacheBackend: Send + Sync {
    /// Returns the value stored under `key`, unless missing or expired.
    fn get(&self, key: &str) -> Option<Value>;

    /// Stores `value` under `key`.
    ///
    /// `expires_at` of `None` leaves expiry to the backend's own policy.
    fn put(&self, key: &str, value: Value, expires_at: Option<DateTime<Utc>>);
}

/// Cache entry containing a serialized value and its expiry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Cached value.
    pub value: Value,
    /// When the entry was stored.
    pub stored_at: DateTime<Utc>,
    /// When the entry expires; `None` never expires.
    pub expires_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    /// Creates a new cache entry.
    pub fn new(value: Value, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            value,
            stored_at: Utc::now(),
            expires_at,
        }
    }

    /// Returns true if the entry has expired.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }
}

/// Process-local [`CacheBackend`].
///
/// The default TTL is fixed at construction and applies to every `put`
/// without an explicit deadline.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    /// Default TTL for entries stored without a deadline.
    default_ttl: Option<Duration>,
    /// Cache entries keyed by fingerprint.
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl InMemoryCache {
    /// Creates a cache whose entries never expire unless given a deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache with the given default TTL.
    pub fn with_default_ttl(ttl: Duration) -> Self {
        Self {
            default_ttl: Some(ttl),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the default TTL.
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    /// Returns the number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.read_entries().is_empty()
    }

    /// Clears all cache entries.
    pub fn clear(&self) {
        let mut entries = self.write_entries();
        let count = entries.len();
        entries.clear();
        debug!(count = count, "Cleared all cache entries");
    }

    /// Removes all expired entries.
    ///
    /// Also runs on every `put`, so keys that are never read again do not
    /// accumulate.
    pub fn evict_expired(&self) -> usize {
        Self::retain_live(&mut self.write_entries())
    }

    fn retain_live(entries: &mut HashMap<String, CacheEntry>) -> usize {
        let before = entries.len();
        entries.retain(|key, entry| {
            let keep = !entry.is_expired();
            if !keep {
                trace!(key = %key, "Evicting expired cache entry");
            }
            keep
        });
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!(evicted = evicted, "Evicted expired cache entries");
        }
        evicted
    }

    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_entries(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CacheBackend for InMemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        self.read_entries()
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone())
    }

    fn put(&self, key: &str, value: Value, expires_at: Option<DateTime<Utc>>) {
        let expires_at = expires_at.or_else(|| {
            self.default_ttl
                .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
                .map(|ttl| Utc::now() + ttl)
        });
        let mut entries = self.write_entries();
        Self::retain_live(&mut entries);
        entries.insert(key.to_string(), CacheEntry::new(value, expires_at));
        debug!(key = %key, expires_at = ?expires_at, "Stored cache entry");
    }
}

/// How list/search results are cached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CachePolicy {
    /// Store with the backend's own TTL.
    #[default]
    Default,
    /// Store until the given instant.
    Until(DateTime<Utc>),
    /// Do not read or write the cache.
    Disabled,
}

/// Normalized arguments of a cached operation.
///
/// Keys are kept sorted and `None` values are skipped, so the construction
/// order of arguments never changes the resulting fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheArgs {
    args: BTreeMap<String, Value>,
}

impl CacheArgs {
    /// Creates an empty argument bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an argument.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.args.insert(name.to_string(), value.into());
        self
    }

    /// Adds an argument when present.
    pub fn with_opt<V: Into<Value>>(self, name: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.with(name, value),
            None => self,
        }
    }

    /// Returns true if no argument was added.
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

/// Derives a stable cache key from a namespace and its arguments.
///
/// The key has the form `"{namespace}:{sha256-hex}"`.
pub fn fingerprint(namespace: &str, args: &CacheArgs) -> String {
    // A map of JSON values always serializes.
    let canonical = serde_json::to_string(&args.args).unwrap_or_default();
    let digest = Sha256::digest(canonical.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    format!("{}:{}", namespace, hex)
}

/// Fetch-or-compute wrapper around a [`CacheBackend`].
#[derive(Clone)]
pub struct ResponseCache {
    backend: Arc<dyn CacheBackend>,
    policy: Arc<Mutex<CachePolicy>>,
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("policy", &self.policy())
            .finish_non_exhaustive()
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(Arc::new(InMemoryCache::new()))
    }
}

impl ResponseCache {
    /// Creates a cache over `backend` with the default policy.
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            policy: Arc::new(Mutex::new(CachePolicy::Default)),
        }
    }

    /// Creates a cache that never stores anything.
    pub fn disabled() -> Self {
        let cache = Self::default();
        cache.set_policy(CachePolicy::Disabled);
        cache
    }

    /// Returns the current policy.
    pub fn policy(&self) -> CachePolicy {
        *self.policy.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replaces the current policy.
    pub fn set_policy(&self, policy: CachePolicy) {
        *self.policy.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = policy;
    }

    /// Returns the cached value for `key` or computes, stores and returns it.
    ///
    /// A cached value that no longer decodes as `T` is treated as a miss.
    pub async fn fetch_or_compute<T, F, Fut>(&self, key: &str, producer: F) -> ProviderResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        let policy = self.policy();
        if policy == CachePolicy::Disabled {
            trace!(key = %key, "Cache disabled, computing");
            return producer().await;
        }

        if let Some(cached) = self.backend.get(key) {
            match serde_json::from_value::<T>(cached) {
                Ok(value) => {
                    debug!(key = %key, "Cache hit");
                    return Ok(value);
                }
                Err(e) => warn!(key = %key, error = %e, "Discarding undecodable cache entry"),
            }
        }

        debug!(key = %key, "Cache miss");
        let value = producer().await?;

        let serialized = serde_json::to_value(&value).map_err(|e| {
            ProviderError::internal(format!("failed to serialize cache value: {}", e))
                .with_source(e)
        })?;
        let expires_at = match policy {
            CachePolicy::Until(at) => Some(at),
            _ => None,
        };
        self.backend.put(key, serialized, expires_at);

        Ok(value)
    }
}
