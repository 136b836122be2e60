//! Cache backends — the raw key/value layer under the cache service.
//!
//! `MokaBackend` is the shipped primary (bounded, with a TTL backstop);
//! `LocalBackend` is the plain-map fallback the service degrades to when a
//! primary backend fails to initialize. Expiry is enforced uniformly by the
//! service's metadata index, so both backends share identical semantics.

use crate::CacheError;
use moka::sync::Cache;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

/// The raw storage operations the cache service needs.
pub trait CacheBackend: Send + Sync {
    /// The backend name (e.g., "moka", "local").
    fn name(&self) -> &str;

    /// Fetch a value by its full namespaced key.
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError>;

    /// Store a value under its full namespaced key.
    fn set(&self, key: &str, value: serde_json::Value) -> Result<(), CacheError>;

    /// Remove a value. Returns whether it was present.
    fn delete(&self, key: &str) -> Result<bool, CacheError>;
}

/// Bounded concurrent cache backend built on moka.
pub struct MokaBackend {
    cache: Cache<String, serde_json::Value>,
}

impl MokaBackend {
    /// Create a backend holding at most `max_entries` values.
    ///
    /// `ttl_backstop` caps how long any value can live regardless of the
    /// service-level expiry; pass the longest TTL the service will issue.
    pub fn new(max_entries: u64, ttl_backstop: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl_backstop)
            .build();
        Self { cache }
    }

    /// Number of live entries.
    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Whether the backend is empty.
    pub fn is_empty(&self) -> bool {
        self.cache.entry_count() == 0
    }
}

impl CacheBackend for MokaBackend {
    fn name(&self) -> &str {
        "moka"
    }

    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError> {
        Ok(self.cache.get(key))
    }

    fn set(&self, key: &str, value: serde_json::Value) -> Result<(), CacheError> {
        self.cache.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.cache.remove(key).is_some())
    }
}

/// Plain in-process map fallback.
pub struct LocalBackend {
    entries: RwLock<HashMap<String, serde_json::Value>>,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheBackend for LocalBackend {
    fn name(&self) -> &str {
        "local"
    }

    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError> {
        Ok(self.entries.read().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: serde_json::Value) -> Result<(), CacheError> {
        self.entries.write().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.write().unwrap().remove(key).is_some())
    }
}
