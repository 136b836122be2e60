//! SessionStore trait — user session lifecycle and rolling context.
//!
//! A session groups one user's conversation across domain servers. Servers
//! merge context updates into it and append conversation entries; the
//! pattern detector keys its trigger history by session ID.

use crate::error::SessionError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Unique session ID
    pub id: String,

    /// The user this session belongs to
    pub user_id: String,

    /// Accumulated context data (merged on every update)
    #[serde(default)]
    pub context: serde_json::Map<String, serde_json::Value>,

    /// Conversation entries, oldest first (each stamped with a timestamp)
    #[serde(default)]
    pub conversation: Vec<serde_json::Value>,

    /// Domains this session has touched
    #[serde(default)]
    pub active_domains: Vec<String>,

    /// When the session started
    pub started_at: DateTime<Utc>,

    /// When the session ended (None while active)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,

    /// Whether the session is still active
    pub is_active: bool,
}

/// The SessionStore trait.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Start a new session, returning its ID.
    async fn start(
        &self,
        user_id: &str,
        initial_context: serde_json::Map<String, serde_json::Value>,
    ) -> std::result::Result<String, SessionError>;

    /// Merge a context update into a session and optionally append a
    /// conversation entry (stamped with the current time).
    async fn update_context(
        &self,
        session_id: &str,
        update: serde_json::Map<String, serde_json::Value>,
        conversation_entry: Option<serde_json::Value>,
    ) -> std::result::Result<(), SessionError>;

    /// Get a session by ID.
    async fn get(
        &self,
        session_id: &str,
    ) -> std::result::Result<Option<SessionRecord>, SessionError>;

    /// End a session, marking it inactive.
    async fn end(&self, session_id: &str) -> std::result::Result<(), SessionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_serialization_roundtrip() {
        let session = SessionRecord {
            id: "sess-1".into(),
            user_id: "user-1".into(),
            context: serde_json::Map::new(),
            conversation: vec![serde_json::json!({"role": "user", "text": "hi"})],
            active_domains: vec!["financial".into()],
            started_at: Utc::now(),
            ended_at: None,
            is_active: true,
        };

        let json = serde_json::to_string(&session).unwrap();
        let roundtrip: SessionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(roundtrip.id, "sess-1");
        assert_eq!(roundtrip.conversation.len(), 1);
        assert!(roundtrip.is_active);
    }
}
