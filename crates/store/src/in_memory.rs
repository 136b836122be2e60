//! In-memory backend — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use chrono::Utc;
use hearthmind_core::error::{SessionError, StoreError};
use hearthmind_core::knowledge::{KnowledgeQuery, KnowledgeRecord, KnowledgeStore};
use hearthmind_core::session::{SessionRecord, SessionStore};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// An in-memory store holding records in Vecs.
/// Useful for testing and runs where persistence isn't needed.
pub struct InMemoryStore {
    knowledge: Arc<RwLock<Vec<KnowledgeRecord>>>,
    sessions: Arc<RwLock<Vec<SessionRecord>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            knowledge: Arc::new(RwLock::new(Vec::new())),
            sessions: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn store(&self, mut record: KnowledgeRecord) -> Result<String, StoreError> {
        if record.id.is_empty() {
            record.id = Uuid::new_v4().to_string();
        }
        let id = record.id.clone();
        self.knowledge.write().await.push(record);
        Ok(id)
    }

    async fn search(&self, query: KnowledgeQuery) -> Result<Vec<KnowledgeRecord>, StoreError> {
        let records = self.knowledge.read().await;
        let wanted: Vec<String> = query.keywords.iter().map(|k| k.to_lowercase()).collect();

        let mut results: Vec<KnowledgeRecord> = records
            .iter()
            .filter(|r| {
                let domain_match = query.domains.is_empty() || query.domains.contains(&r.domain);
                let keyword_match = wanted.is_empty()
                    || r.keywords
                        .iter()
                        .any(|k| wanted.contains(&k.to_lowercase()));
                domain_match && keyword_match
            })
            .cloned()
            .collect();

        results.sort_by(|a, b| b.usage_frequency.cmp(&a.usage_frequency));
        results.truncate(query.limit);

        Ok(results)
    }

    async fn get(&self, id: &str) -> Result<Option<KnowledgeRecord>, StoreError> {
        let records = self.knowledge.read().await;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn touch(&self, id: &str) -> Result<(), StoreError> {
        let mut records = self.knowledge.write().await;
        if let Some(record) = records.iter_mut().find(|r| r.id == id) {
            record.usage_frequency += 1;
            record.last_accessed = Utc::now();
        }
        Ok(())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.knowledge.read().await.len())
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn start(
        &self,
        user_id: &str,
        initial_context: serde_json::Map<String, serde_json::Value>,
    ) -> Result<String, SessionError> {
        let session = SessionRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            context: initial_context,
            conversation: Vec::new(),
            active_domains: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
            is_active: true,
        };
        let id = session.id.clone();
        self.sessions.write().await.push(session);
        Ok(id)
    }

    async fn update_context(
        &self,
        session_id: &str,
        update: serde_json::Map<String, serde_json::Value>,
        conversation_entry: Option<serde_json::Value>,
    ) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        for (key, value) in update {
            session.context.insert(key, value);
        }

        if let Some(mut entry) = conversation_entry {
            if let Some(obj) = entry.as_object_mut() {
                obj.insert(
                    "timestamp".into(),
                    serde_json::Value::String(Utc::now().to_rfc3339()),
                );
            }
            session.conversation.push(entry);
        }

        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<SessionRecord>, SessionError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.iter().find(|s| s.id == session_id).cloned())
    }

    async fn end(&self, session_id: &str) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
        session.is_active = false;
        session.ended_at = Some(Utc::now());
        Ok(())
    }
}
