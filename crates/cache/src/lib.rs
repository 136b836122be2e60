//! TTL cache with cross-domain relevance tagging for Hearthmind.
//!
//! The cache sits in front of every tool invocation: results are stored
//! under a deterministic key, tagged with the domains they may be useful
//! to, and surfaced back through `cross_domain_suggestions`.
//!
//! Entry metadata (domain, expiry, relevance, access counts) lives in a
//! secondary index so cross-domain queries never scan the backend keyspace.
//! Cache failures are never fatal: every backend error is counted and
//! degraded to miss/false semantics, except `get_or_set`, whose producer
//! errors propagate because the caller has no fallback value.

pub mod backend;
pub mod service;

pub use backend::{CacheBackend, LocalBackend, MokaBackend};
pub use service::{CacheService, CacheStats, CacheSuggestion};

use sha2::{Digest, Sha256};

/// Errors from the cache subsystem. These never escape the service API —
/// they are counted in statistics and degraded to miss semantics.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
}

/// Derive a deterministic cache key component from a JSON value.
///
/// Serializes with sorted object keys so logically-equal argument maps
/// produce the same digest.
pub fn hashed_key(value: &serde_json::Value) -> String {
    let canonical = canonical_json(value);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

fn canonical_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|k| {
                    format!(
                        "{}:{}",
                        serde_json::to_string(k).unwrap_or_default(),
                        canonical_json(&map[k])
                    )
                })
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        serde_json::Value::Array(items) => {
            let elems: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", elems.join(","))
        }
        other => other.to_string(),
    }
}
