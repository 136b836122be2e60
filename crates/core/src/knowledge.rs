//! KnowledgeStore trait — durable, domain-tagged knowledge records with
//! keyword search.
//!
//! Every domain server writes tool-result summaries, detected patterns, and
//! budget alerts here, and reads them back for cross-domain suggestions.

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single knowledge record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    /// Unique ID (assigned by the store if empty on insert)
    pub id: String,

    /// Owning domain (e.g. "financial", or "system" for operational records)
    pub domain: String,

    /// Short human-readable title
    pub title: String,

    /// The record body (serialized tool result, alert payload, ...)
    pub content: String,

    /// Arbitrary structured metadata
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    /// Keywords for search
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,

    /// How many times this record has been read back
    #[serde(default)]
    pub usage_frequency: u64,

    /// When this record was created
    pub created_at: DateTime<Utc>,

    /// When this record was last accessed
    pub last_accessed: DateTime<Utc>,
}

impl KnowledgeRecord {
    /// Create a new record ready for insertion (id assigned by the store).
    pub fn new(
        domain: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        metadata: serde_json::Map<String, serde_json::Value>,
        keywords: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            domain: domain.into(),
            title: title.into(),
            content: content.into(),
            metadata,
            keywords,
            usage_frequency: 0,
            created_at: now,
            last_accessed: now,
        }
    }
}

/// A query for searching knowledge records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeQuery {
    /// Restrict to these domains (empty = all domains)
    #[serde(default)]
    pub domains: Vec<String>,

    /// Match records containing any of these keywords (empty = no keyword filter)
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Maximum number of results
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

impl KnowledgeQuery {
    pub fn new() -> Self {
        Self {
            domains: Vec::new(),
            keywords: Vec::new(),
            limit: default_limit(),
        }
    }

    pub fn domains(mut self, domains: Vec<String>) -> Self {
        self.domains = domains;
        self
    }

    pub fn keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// The KnowledgeStore trait.
///
/// Implementations: SQLite, in-memory (for testing).
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Store a new knowledge record, returning its ID.
    async fn store(&self, record: KnowledgeRecord) -> std::result::Result<String, StoreError>;

    /// Search records. Results are ordered by usage frequency, most used first.
    async fn search(
        &self,
        query: KnowledgeQuery,
    ) -> std::result::Result<Vec<KnowledgeRecord>, StoreError>;

    /// Get a record by ID.
    async fn get(&self, id: &str) -> std::result::Result<Option<KnowledgeRecord>, StoreError>;

    /// Increment a record's usage frequency and update its last-accessed time.
    async fn touch(&self, id: &str) -> std::result::Result<(), StoreError>;

    /// Total record count.
    async fn count(&self) -> std::result::Result<usize, StoreError>;
}
