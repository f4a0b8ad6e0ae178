//! SQLite conversation store.
//!
//! Uses a single SQLite database file with two tables:
//! - `conversations` — one row per chat session
//! - `messages` — the append-only log; `seq` defines the total order
//!
//! Tool calls on assistant messages are kept as a JSON array in a text column.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use ferrule_core::error::StoreError;
use ferrule_core::message::{
    Conversation, ConversationId, ConversationSummary, Message, MessageToolCall, Role,
};
use ferrule_core::store::ConversationStore;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// A SQLite-backed [`ConversationStore`].
pub struct SqliteConversationStore {
    pool: SqlitePool,
}

impl SqliteConversationStore {
    /// Open a store from a SQLite URL or path.
    ///
    /// The database and all tables are created automatically.
    /// Pass `"sqlite::memory:"` for an ephemeral database (useful for tests).
    pub async fn new(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?;

        // Every connection to :memory: is a separate database
        let max_connections = if url.contains(":memory:") { 1 } else { 4 };
        let store = Self::connect(options, max_connections).await?;
        info!("SQLite conversation store initialized at {url}");
        Ok(store)
    }

    /// Open (or create) the database file at `path`, creating parent directories.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Storage(format!("Cannot create {}: {e}", parent.display()))
            })?;
        }

        let options = SqliteConnectOptions::new().filename(path);
        let store = Self::connect(options, 4).await?;
        info!("SQLite conversation store initialized at {}", path.display());
        Ok(store)
    }

    async fn connect(options: SqliteConnectOptions, max_connections: u32) -> Result<Self, StoreError> {
        let options = options
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Wait for open connections to finish and close the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                id          TEXT PRIMARY KEY NOT NULL,
                created_at  TEXT NOT NULL,
                model       TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("conversations table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                seq              INTEGER PRIMARY KEY AUTOINCREMENT,
                id               TEXT UNIQUE NOT NULL,
                conversation_id  TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                role             TEXT NOT NULL,
                content          TEXT NOT NULL,
                tool_calls       TEXT,
                tool_call_id     TEXT,
                created_at       TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("messages table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, seq)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("messages index: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_conversations_created_at ON conversations(created_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("created_at index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn timestamp(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn parse_timestamp(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    /// Parse a `Message` from a SQLite row.
    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<Message, StoreError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?;
        let role_str: String = row
            .try_get("role")
            .map_err(|e| StoreError::QueryFailed(format!("role column: {e}")))?;
        let content: String = row
            .try_get("content")
            .map_err(|e| StoreError::QueryFailed(format!("content column: {e}")))?;
        let tool_calls_json: Option<String> = row
            .try_get("tool_calls")
            .map_err(|e| StoreError::QueryFailed(format!("tool_calls column: {e}")))?;
        let tool_call_id: Option<String> = row
            .try_get("tool_call_id")
            .map_err(|e| StoreError::QueryFailed(format!("tool_call_id column: {e}")))?;
        let created_at_str: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;

        let role = Role::from_str(&role_str).map_err(StoreError::QueryFailed)?;

        let tool_calls: Vec<MessageToolCall> = match tool_calls_json {
            Some(json) => serde_json::from_str(&json)
                .map_err(|e| StoreError::QueryFailed(format!("tool_calls payload: {e}")))?,
            None => Vec::new(),
        };

        Ok(Message {
            id,
            role,
            content,
            tool_calls,
            tool_call_id,
            created_at: Self::parse_timestamp(&created_at_str),
        })
    }
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn create_conversation(&self, model: Option<&str>) -> Result<ConversationId, StoreError> {
        let id = ConversationId::new();
        sqlx::query("INSERT INTO conversations (id, created_at, model) VALUES (?1, ?2, ?3)")
            .bind(id.as_str())
            .bind(Self::timestamp(&Utc::now()))
            .bind(model)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("INSERT conversation failed: {e}")))?;

        debug!(conversation = %id, "Created conversation");
        Ok(id)
    }

    async fn append_message(
        &self,
        conversation_id: &ConversationId,
        mut message: Message,
    ) -> Result<String, StoreError> {
        if message.id.is_empty() {
            message.id = Uuid::new_v4().to_string();
        }

        let tool_calls_json = if message.tool_calls.is_empty() {
            None
        } else {
            Some(
                serde_json::to_string(&message.tool_calls)
                    .map_err(|e| StoreError::Storage(format!("tool_calls serialization: {e}")))?,
            )
        };

        // Single statement: the existence check and the insert are one atomic write
        let result = sqlx::query(
            r#"
            INSERT INTO messages (id, conversation_id, role, content, tool_calls, tool_call_id, created_at)
            SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7
            WHERE EXISTS (SELECT 1 FROM conversations WHERE id = ?2)
            "#,
        )
        .bind(&message.id)
        .bind(conversation_id.as_str())
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(tool_calls_json.as_deref())
        .bind(message.tool_call_id.as_deref())
        .bind(Self::timestamp(&message.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT message failed: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ConversationNotFound(conversation_id.to_string()));
        }

        debug!(conversation = %conversation_id, role = %message.role, "Appended message");
        Ok(message.id)
    }

    async fn list_messages(&self, conversation_id: &ConversationId) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query("SELECT * FROM messages WHERE conversation_id = ?1 ORDER BY seq ASC")
            .bind(conversation_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("list messages: {e}")))?;

        rows.iter().map(Self::row_to_message).collect()
    }

    async fn get_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<Conversation>, StoreError> {
        let row = sqlx::query("SELECT id, created_at, model FROM conversations WHERE id = ?1")
            .bind(conversation_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("get conversation: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;
        let model: Option<String> = row
            .try_get("model")
            .map_err(|e| StoreError::QueryFailed(format!("model column: {e}")))?;

        let messages = self.list_messages(conversation_id).await?;

        Ok(Some(Conversation {
            id: conversation_id.clone(),
            created_at: Self::parse_timestamp(&created_at),
            model,
            messages,
        }))
    }

    async fn list_conversations(&self, limit: usize) -> Result<Vec<ConversationSummary>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.created_at, c.model, COUNT(m.seq) AS message_count
            FROM conversations c
            LEFT JOIN messages m ON m.conversation_id = c.id
            GROUP BY c.id
            ORDER BY c.created_at DESC, c.rowid DESC
            LIMIT ?1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("list conversations: {e}")))?;

        rows.iter()
            .map(|row| {
                let id: String = row
                    .try_get("id")
                    .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?;
                let created_at: String = row
                    .try_get("created_at")
                    .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;
                let model: Option<String> = row
                    .try_get("model")
                    .map_err(|e| StoreError::QueryFailed(format!("model column: {e}")))?;
                let count: i64 = row
                    .try_get("message_count")
                    .map_err(|e| StoreError::QueryFailed(format!("message_count column: {e}")))?;

                Ok(ConversationSummary {
                    id: ConversationId(id),
                    created_at: Self::parse_timestamp(&created_at),
                    model,
                    message_count: count as usize,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqliteConversationStore {
        SqliteConversationStore::new("sqlite::memory:").await.unwrap()
    }

    fn tool_call(id: &str, command: &str) -> MessageToolCall {
        MessageToolCall {
            id: id.into(),
            name: "run_command".into(),
            arguments: serde_json::json!({ "command": command }).to_string(),
        }
    }

    #[tokio::test]
    async fn create_and_get_empty_conversation() {
        let store = test_store().await;
        let id = store.create_conversation(Some("gemini/gemini-2.0-flash")).await.unwrap();

        let conv = store.get_conversation(&id).await.unwrap().unwrap();
        assert_eq!(conv.id, id);
        assert_eq!(conv.model.as_deref(), Some("gemini/gemini-2.0-flash"));
        assert!(conv.messages.is_empty());
    }

    #[tokio::test]
    async fn messages_round_trip_in_order() {
        let store = test_store().await;
        let id = store.create_conversation(None).await.unwrap();

        let sent = vec![
            Message::user("list files"),
            Message::assistant_with_tool_calls("", vec![tool_call("call_0", "ls")]),
            Message::tool_result("call_0", "Cargo.toml\nsrc\n"),
            Message::assistant("There are two entries."),
        ];
        for msg in &sent {
            store.append_message(&id, msg.clone()).await.unwrap();
        }

        let got = store.list_messages(&id).await.unwrap();
        assert_eq!(got.len(), sent.len());
        for (a, b) in sent.iter().zip(&got) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.role, b.role);
            assert_eq!(a.content, b.content);
            assert_eq!(a.tool_calls, b.tool_calls);
            assert_eq!(a.tool_call_id, b.tool_call_id);
        }
    }

    #[tokio::test]
    async fn append_to_unknown_conversation_fails() {
        let store = test_store().await;
        let err = store
            .append_message(&ConversationId::from("missing"), Message::user("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ConversationNotFound(_)));
    }

    #[tokio::test]
    async fn get_unknown_conversation_is_none() {
        let store = test_store().await;
        assert!(store
            .get_conversation(&ConversationId::from("missing"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn list_conversations_newest_first_with_counts() {
        let store = test_store().await;
        let first = store.create_conversation(None).await.unwrap();
        store.append_message(&first, Message::user("a")).await.unwrap();
        store.append_message(&first, Message::assistant("b")).await.unwrap();
        let second = store.create_conversation(Some("openai/gpt-4o")).await.unwrap();

        let list = store.list_conversations(10).await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, second);
        assert_eq!(list[0].message_count, 0);
        assert_eq!(list[1].id, first);
        assert_eq!(list[1].message_count, 2);

        let limited = store.list_conversations(1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_message_id_is_rejected() {
        let store = test_store().await;
        let id = store.create_conversation(None).await.unwrap();
        let msg = Message::user("once");
        store.append_message(&id, msg.clone()).await.unwrap();
        assert!(store.append_message(&id, msg).await.is_err());
        assert_eq!(store.list_messages(&id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ferrule.db");

        let id = {
            let store = SqliteConversationStore::open(&path).await.unwrap();
            let id = store.create_conversation(None).await.unwrap();
            store.append_message(&id, Message::user("remember me")).await.unwrap();
            store.pool.close().await;
            id
        };

        let store = SqliteConversationStore::open(&path).await.unwrap();
        let messages = store.list_messages(&id).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "remember me");
    }

    #[tokio::test]
    async fn concurrent_appends_to_different_conversations() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(
            SqliteConversationStore::open(&dir.path().join("c.db")).await.unwrap(),
        );
        let a = store.create_conversation(None).await.unwrap();
        let b = store.create_conversation(None).await.unwrap();

        let mut handles = Vec::new();
        for (conv, label) in [(a.clone(), "a"), (b.clone(), "b")] {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..10 {
                    store
                        .append_message(&conv, Message::user(format!("{label}{i}")))
                        .await
                        .unwrap();
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let a_msgs = store.list_messages(&a).await.unwrap();
        let expected: Vec<String> = (0..10).map(|i| format!("a{i}")).collect();
        let got: Vec<String> = a_msgs.into_iter().map(|m| m.content).collect();
        assert_eq!(got, expected);
        assert_eq!(store.list_messages(&b).await.unwrap().len(), 10);
    }
}
