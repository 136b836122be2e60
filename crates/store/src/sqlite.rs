//! SQLite backend for knowledge and session storage.
//!
//! One database file with two tables:
//! - `knowledge` — domain-tagged records with JSON metadata/keyword columns
//! - `sessions` — user sessions with JSON context and conversation columns
//!
//! Keyword search matches against the JSON-encoded keyword array with LIKE;
//! results are ordered by usage frequency, mirroring the in-memory backend.

use async_trait::async_trait;
use chrono::Utc;
use hearthmind_core::error::{SessionError, StoreError};
use hearthmind_core::knowledge::{KnowledgeQuery, KnowledgeRecord, KnowledgeStore};
use hearthmind_core::session::{SessionRecord, SessionStore};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// A durable SQLite store for knowledge records and sessions.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SQLite store from a file path.
    ///
    /// The database and all tables are created automatically.
    /// Pass `"sqlite::memory:"` for an ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS knowledge (
                id              TEXT PRIMARY KEY,
                domain          TEXT NOT NULL,
                title           TEXT NOT NULL,
                content         TEXT NOT NULL,
                metadata        TEXT NOT NULL DEFAULT '{}',
                keywords        TEXT NOT NULL DEFAULT '[]',
                usage_frequency INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL,
                last_accessed   TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("knowledge table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_knowledge_domain ON knowledge(domain, usage_frequency DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("knowledge index: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id             TEXT PRIMARY KEY,
                user_id        TEXT NOT NULL,
                context        TEXT NOT NULL DEFAULT '{}',
                conversation   TEXT NOT NULL DEFAULT '[]',
                active_domains TEXT NOT NULL DEFAULT '[]',
                started_at     TEXT NOT NULL,
                ended_at       TEXT,
                is_active      INTEGER NOT NULL DEFAULT 1
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("sessions table: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<KnowledgeRecord, StoreError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?;
        let domain: String = row
            .try_get("domain")
            .map_err(|e| StoreError::QueryFailed(format!("domain column: {e}")))?;
        let title: String = row
            .try_get("title")
            .map_err(|e| StoreError::QueryFailed(format!("title column: {e}")))?;
        let content: String = row
            .try_get("content")
            .map_err(|e| StoreError::QueryFailed(format!("content column: {e}")))?;
        let metadata_json: String = row
            .try_get("metadata")
            .map_err(|e| StoreError::QueryFailed(format!("metadata column: {e}")))?;
        let keywords_json: String = row
            .try_get("keywords")
            .map_err(|e| StoreError::QueryFailed(format!("keywords column: {e}")))?;
        let usage_frequency: i64 = row.try_get("usage_frequency").unwrap_or(0);
        let created_at_str: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;
        let last_accessed_str: String = row
            .try_get("last_accessed")
            .map_err(|e| StoreError::QueryFailed(format!("last_accessed column: {e}")))?;

        Ok(KnowledgeRecord {
            id,
            domain,
            title,
            content,
            metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
            keywords: serde_json::from_str(&keywords_json).unwrap_or_default(),
            usage_frequency: usage_frequency.max(0) as u64,
            created_at: parse_timestamp(&created_at_str),
            last_accessed: parse_timestamp(&last_accessed_str),
        })
    }

    fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<SessionRecord, SessionError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| SessionError::Storage(format!("id column: {e}")))?;
        let user_id: String = row
            .try_get("user_id")
            .map_err(|e| SessionError::Storage(format!("user_id column: {e}")))?;
        let context_json: String = row
            .try_get("context")
            .map_err(|e| SessionError::Storage(format!("context column: {e}")))?;
        let conversation_json: String = row
            .try_get("conversation")
            .map_err(|e| SessionError::Storage(format!("conversation column: {e}")))?;
        let domains_json: String = row
            .try_get("active_domains")
            .map_err(|e| SessionError::Storage(format!("active_domains column: {e}")))?;
        let started_at_str: String = row
            .try_get("started_at")
            .map_err(|e| SessionError::Storage(format!("started_at column: {e}")))?;
        let ended_at_str: Option<String> = row.try_get("ended_at").ok();
        let is_active: i64 = row.try_get("is_active").unwrap_or(1);

        Ok(SessionRecord {
            id,
            user_id,
            context: serde_json::from_str(&context_json).unwrap_or_default(),
            conversation: serde_json::from_str(&conversation_json).unwrap_or_default(),
            active_domains: serde_json::from_str(&domains_json).unwrap_or_default(),
            started_at: parse_timestamp(&started_at_str),
            ended_at: ended_at_str.map(|s| parse_timestamp(&s)),
            is_active: is_active != 0,
        })
    }
}

fn parse_timestamp(s: &str) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl KnowledgeStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn store(&self, mut record: KnowledgeRecord) -> Result<String, StoreError> {
        if record.id.is_empty() {
            record.id = Uuid::new_v4().to_string();
        }
        let id = record.id.clone();
        let metadata_json = serde_json::to_string(&record.metadata)
            .map_err(|e| StoreError::Storage(format!("Metadata serialization: {e}")))?;
        let keywords_json = serde_json::to_string(&record.keywords)
            .map_err(|e| StoreError::Storage(format!("Keywords serialization: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO knowledge (id, domain, title, content, metadata, keywords,
                                   usage_frequency, created_at, last_accessed)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&record.id)
        .bind(&record.domain)
        .bind(&record.title)
        .bind(&record.content)
        .bind(&metadata_json)
        .bind(&keywords_json)
        .bind(record.usage_frequency as i64)
        .bind(record.created_at.to_rfc3339())
        .bind(record.last_accessed.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT failed: {e}")))?;

        debug!("Stored knowledge record {id}");
        Ok(id)
    }

    async fn search(&self, query: KnowledgeQuery) -> Result<Vec<KnowledgeRecord>, StoreError> {
        // Domain filter with positional parameters, keyword filter as LIKE
        // patterns over the JSON-encoded keyword array.
        let mut conditions: Vec<String> = Vec::new();
        let mut param = 1usize;

        let domain_params: Vec<usize> = query
            .domains
            .iter()
            .map(|_| {
                let p = param;
                param += 1;
                p
            })
            .collect();
        if !domain_params.is_empty() {
            let placeholders: Vec<String> =
                domain_params.iter().map(|p| format!("?{p}")).collect();
            conditions.push(format!("domain IN ({})", placeholders.join(", ")));
        }

        let keyword_params: Vec<usize> = query
            .keywords
            .iter()
            .map(|_| {
                let p = param;
                param += 1;
                p
            })
            .collect();
        if !keyword_params.is_empty() {
            let likes: Vec<String> = keyword_params
                .iter()
                .map(|p| format!("keywords LIKE ?{p} ESCAPE '\\'"))
                .collect();
            conditions.push(format!("({})", likes.join(" OR ")));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let sql = format!(
            "SELECT * FROM knowledge {where_clause} ORDER BY usage_frequency DESC LIMIT ?{param}"
        );

        let mut db_query = sqlx::query(&sql);
        for domain in &query.domains {
            db_query = db_query.bind(domain);
        }
        for keyword in &query.keywords {
            let escaped = keyword
                .to_lowercase()
                .replace('%', "\\%")
                .replace('_', "\\_");
            db_query = db_query.bind(format!("%\"{escaped}\"%"));
        }
        db_query = db_query.bind(query.limit as i64);

        let rows = db_query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("knowledge search: {e}")))?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn get(&self, id: &str) -> Result<Option<KnowledgeRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM knowledge WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("GET by ID: {e}")))?;

        match row {
            Some(ref r) => Ok(Some(Self::row_to_record(r)?)),
            None => Ok(None),
        }
    }

    async fn touch(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE knowledge SET usage_frequency = usage_frequency + 1, last_accessed = ?1 WHERE id = ?2",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("touch failed: {e}")))?;
        Ok(())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) as cnt FROM knowledge")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("COUNT: {e}")))?;
        let cnt: i64 = row
            .try_get("cnt")
            .map_err(|e| StoreError::QueryFailed(format!("cnt column: {e}")))?;
        Ok(cnt as usize)
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn start(
        &self,
        user_id: &str,
        initial_context: serde_json::Map<String, serde_json::Value>,
    ) -> Result<String, SessionError> {
        let id = Uuid::new_v4().to_string();
        let context_json = serde_json::to_string(&initial_context)
            .map_err(|e| SessionError::Storage(format!("context serialization: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, context, started_at, is_active)
            VALUES (?1, ?2, ?3, ?4, 1)
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(&context_json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| SessionError::Storage(format!("session INSERT: {e}")))?;

        Ok(id)
    }

    async fn update_context(
        &self,
        session_id: &str,
        update: serde_json::Map<String, serde_json::Value>,
        conversation_entry: Option<serde_json::Value>,
    ) -> Result<(), SessionError> {
        // Read-modify-write: the JSON columns are merged in process.
        let session = SessionStore::get(self, session_id)
            .await?
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        let mut context = session.context;
        for (key, value) in update {
            context.insert(key, value);
        }

        let mut conversation = session.conversation;
        if let Some(mut entry) = conversation_entry {
            if let Some(obj) = entry.as_object_mut() {
                obj.insert(
                    "timestamp".into(),
                    serde_json::Value::String(Utc::now().to_rfc3339()),
                );
            }
            conversation.push(entry);
        }

        let context_json = serde_json::to_string(&context)
            .map_err(|e| SessionError::Storage(format!("context serialization: {e}")))?;
        let conversation_json = serde_json::to_string(&conversation)
            .map_err(|e| SessionError::Storage(format!("conversation serialization: {e}")))?;

        sqlx::query("UPDATE sessions SET context = ?1, conversation = ?2 WHERE id = ?3")
            .bind(&context_json)
            .bind(&conversation_json)
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| SessionError::Storage(format!("session UPDATE: {e}")))?;

        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<SessionRecord>, SessionError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE id = ?1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SessionError::Storage(format!("session GET: {e}")))?;

        match row {
            Some(ref r) => Ok(Some(Self::row_to_session(r)?)),
            None => Ok(None),
        }
    }

    async fn end(&self, session_id: &str) -> Result<(), SessionError> {
        let result = sqlx::query(
            "UPDATE sessions SET is_active = 0, ended_at = ?1 WHERE id = ?2 AND is_active = 1",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(session_id)
        .execute(&self.pool)
        .await
        .map_err(|e| SessionError::Storage(format!("session END: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(SessionError::NotFound(session_id.to_string()));
        }
        Ok(())
    }
}
