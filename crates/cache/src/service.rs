//! The cache service — TTL enforcement, statistics, relevance index, and
//! graceful degradation over a raw backend.

use crate::backend::{CacheBackend, LocalBackend, MokaBackend};
use crate::CacheError;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Metadata tracked per entry, independent of where the value lives.
#[derive(Debug, Clone)]
struct EntryMeta {
    domain: String,
    expires_at: DateTime<Utc>,
    cross_domain_relevance: Vec<String>,
    access_count: u64,
    created_at: DateTime<Utc>,
    last_accessed: DateTime<Utc>,
}

/// Cache performance counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub errors: u64,
    /// Hit rate as a percentage over hits + misses.
    pub hit_rate: f64,
    /// Name of the active backend.
    pub backend: String,
    /// Number of tracked entries.
    pub entries: usize,
}

/// A cross-domain suggestion derived from cached data.
#[derive(Debug, Clone, Serialize)]
pub struct CacheSuggestion {
    pub domain: String,
    pub key: String,
    pub value: serde_json::Value,
    pub access_count: u64,
    pub relevance_score: f64,
}

/// The cache service.
///
/// Wraps a backend with TTL enforcement (lazy, on read), a metadata index
/// for cross-domain queries, and operation counters. All operations are
/// non-fatal: backend errors are counted and surfaced as miss/false.
pub struct CacheService {
    backend: Box<dyn CacheBackend>,
    meta: DashMap<String, EntryMeta>,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    errors: AtomicU64,
}

impl CacheService {
    /// Create a service over the default bounded moka backend.
    pub fn new(max_entries: u64, default_ttl: Duration) -> Self {
        // Backstop TTL well past any per-entry expiry the service issues.
        let backstop = default_ttl.saturating_mul(4).max(Duration::from_secs(60));
        Self::from_backend(Box::new(MokaBackend::new(max_entries, backstop)), default_ttl)
    }

    /// Create a service over an externally-initialized backend.
    ///
    /// If initialization failed, the service permanently degrades to the
    /// in-process fallback map for this process lifetime.
    pub fn with_backend(
        backend: Result<Box<dyn CacheBackend>, CacheError>,
        default_ttl: Duration,
    ) -> Self {
        match backend {
            Ok(backend) => Self::from_backend(backend, default_ttl),
            Err(e) => {
                warn!("Cache backend unavailable: {e}. Using local fallback.");
                Self::from_backend(Box::new(LocalBackend::new()), default_ttl)
            }
        }
    }

    fn from_backend(backend: Box<dyn CacheBackend>, default_ttl: Duration) -> Self {
        Self {
            backend,
            meta: DashMap::new(),
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sets: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    fn full_key(domain: &str, key: &str) -> String {
        format!("hearthmind:{domain}:{key}")
    }

    /// Get a value. Returns None on miss, expiry, or backend error.
    pub fn get(&self, key: &str, domain: &str) -> Option<serde_json::Value> {
        let full_key = Self::full_key(domain, key);

        // Lazy expiry: the index is authoritative for TTLs.
        let expired = match self.meta.get(&full_key) {
            Some(meta) => meta.expires_at <= Utc::now(),
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };
        if expired {
            self.meta.remove(&full_key);
            if let Err(e) = self.backend.delete(&full_key) {
                warn!("Cache expiry delete error for {full_key}: {e}");
                self.errors.fetch_add(1, Ordering::Relaxed);
            }
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        match self.backend.get(&full_key) {
            Ok(Some(value)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                if let Some(mut meta) = self.meta.get_mut(&full_key) {
                    meta.access_count += 1;
                    meta.last_accessed = Utc::now();
                }
                Some(value)
            }
            Ok(None) => {
                // Value evicted under us; drop the orphaned metadata.
                self.meta.remove(&full_key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                warn!("Cache get error for {full_key}: {e}");
                self.errors.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a value with an optional TTL override. Returns false on error.
    pub fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        domain: &str,
        ttl: Option<Duration>,
        cross_domain_relevance: Vec<String>,
    ) -> bool {
        let full_key = Self::full_key(domain, key);
        let ttl = ttl.unwrap_or(self.default_ttl);
        let expires_at = Utc::now()
            + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::seconds(3600));

        if let Err(e) = self.backend.set(&full_key, value) {
            warn!("Cache set error for {full_key}: {e}");
            self.errors.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let now = Utc::now();
        self.meta.insert(
            full_key,
            EntryMeta {
                domain: domain.to_string(),
                expires_at,
                cross_domain_relevance,
                access_count: 0,
                created_at: now,
                last_accessed: now,
            },
        );
        self.sets.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Delete a value. Returns false on error.
    pub fn delete(&self, key: &str, domain: &str) -> bool {
        let full_key = Self::full_key(domain, key);
        self.meta.remove(&full_key);
        match self.backend.delete(&full_key) {
            Ok(_) => {
                self.deletes.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                warn!("Cache delete error for {full_key}: {e}");
                self.errors.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Remove all entries for a domain. Returns how many were removed.
    pub fn invalidate_domain(&self, domain: &str) -> usize {
        let keys: Vec<String> = self
            .meta
            .iter()
            .filter(|entry| entry.value().domain == domain)
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for key in keys {
            self.meta.remove(&key);
            match self.backend.delete(&key) {
                Ok(_) => removed += 1,
                Err(e) => {
                    warn!("Cache invalidation error for {key}: {e}");
                    self.errors.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        debug!("Invalidated {removed} cache entries for domain {domain}");
        removed
    }

    /// Get a value, or produce and store it on miss.
    ///
    /// Producer errors propagate: this is the one operation where failure is
    /// not swallowed, since the caller has no fallback value.
    pub async fn get_or_set<F, Fut, E>(
        &self,
        key: &str,
        producer: F,
        domain: &str,
        ttl: Option<Duration>,
        cross_domain_relevance: Vec<String>,
    ) -> Result<serde_json::Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<serde_json::Value, E>>,
    {
        if let Some(value) = self.get(key, domain) {
            return Ok(value);
        }

        let value = producer().await?;
        self.set(key, value.clone(), domain, ttl, cross_domain_relevance);
        Ok(value)
    }

    /// Suggest cached data from other domains relevant to `current_domain`.
    ///
    /// Candidates are unexpired entries tagged relevant to the domain,
    /// pre-ranked by access count; each is re-fetched live, scored, and the
    /// top 5 returned.
    pub fn cross_domain_suggestions(&self, current_domain: &str) -> Vec<CacheSuggestion> {
        let now = Utc::now();

        let mut candidates: Vec<(String, EntryMeta)> = self
            .meta
            .iter()
            .filter(|entry| {
                let meta = entry.value();
                meta.expires_at > now
                    && meta
                        .cross_domain_relevance
                        .iter()
                        .any(|d| d == current_domain)
            })
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        candidates.sort_by(|a, b| b.1.access_count.cmp(&a.1.access_count));
        candidates.truncate(10);

        let mut suggestions: Vec<CacheSuggestion> = candidates
            .into_iter()
            .filter_map(|(key, meta)| {
                let value = self.backend.get(&key).ok().flatten()?;
                Some(CacheSuggestion {
                    domain: meta.domain.clone(),
                    key,
                    value,
                    access_count: meta.access_count,
                    relevance_score: relevance_score(&meta, now),
                })
            })
            .collect();

        suggestions.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        suggestions.truncate(5);
        suggestions
    }

    /// Sweep expired entries out of the index and backend.
    pub fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let expired: Vec<String> = self
            .meta
            .iter()
            .filter(|entry| entry.value().expires_at <= now)
            .map(|entry| entry.key().clone())
            .collect();

        for key in &expired {
            self.meta.remove(key);
            if let Err(e) = self.backend.delete(key) {
                warn!("Cache cleanup delete error for {key}: {e}");
                self.errors.fetch_add(1, Ordering::Relaxed);
            }
        }

        debug!("Cleaned up {} expired cache entries", expired.len());
        expired.len()
    }

    /// Current performance counters.
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        let hit_rate = if lookups > 0 {
            (hits as f64 / lookups as f64) * 100.0
        } else {
            0.0
        };

        CacheStats {
            hits,
            misses,
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            hit_rate: (hit_rate * 100.0).round() / 100.0,
            backend: self.backend.name().to_string(),
            entries: self.meta.len(),
        }
    }
}

/// Score a candidate for cross-domain suggestion ranking.
///
/// base 0.5, plus up to 0.3 for popularity (access count / 10, capped),
/// plus up to 0.2 for recency (decaying linearly to zero over 24 hours).
fn relevance_score(meta: &EntryMeta, now: DateTime<Utc>) -> f64 {
    let base = 0.5;
    let popularity = (meta.access_count as f64 / 10.0).min(0.3);
    let age_hours = (now - meta.created_at).num_seconds() as f64 / 3600.0;
    let recency = (0.2 - (age_hours / 24.0) * 0.2).max(0.0);
    base + popularity + recency
}
