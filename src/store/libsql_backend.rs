//! libSQL backend — durable `ChatStore` implementation.
//!
//! Supports local file and in-memory databases. Timestamps are written as
//! fixed-width RFC 3339 with microseconds so text order equals time order.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::migrations;
use super::traits::ChatStore;
use crate::error::StoreError;
use crate::model::{Chat, ChatId, Message, NewMessage, Role};

/// libSQL chat store.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
/// Writes are serialized so a batch transaction never absorbs another
/// caller's insert.
pub struct LibSqlChatStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    writes: Mutex<()>,
}

impl LibSqlChatStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Query(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db).await?;
        info!(path = %path.display(), "Chat database opened");
        Ok(store)
    }

    /// Create an in-memory database.
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                StoreError::Query(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, StoreError> {
        let conn = db
            .connect()
            .map_err(|e| StoreError::Query(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
            writes: Mutex::new(()),
        })
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn chat_exists(&self, chat_id: ChatId) -> Result<bool, StoreError> {
        let mut rows = self
            .conn()
            .query("SELECT 1 FROM chats WHERE id = ?1", params![chat_id.0])
            .await
            .map_err(|e| StoreError::Query(format!("chat_exists: {e}")))?;
        let row = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("chat_exists: {e}")))?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl ChatStore for LibSqlChatStore {
    async fn create_chat(&self) -> Result<Chat, StoreError> {
        let _writes = self.writes.lock().await;
        let created_at = Utc::now();
        let mut rows = self
            .conn()
            .query(
                "INSERT INTO chats (created_at) VALUES (?1) RETURNING id",
                params![format_timestamp(created_at)],
            )
            .await
            .map_err(|e| StoreError::Query(format!("create_chat: {e}")))?;
        let id = read_returned_id(&mut rows, "create_chat").await?;
        debug!(chat_id = id, "Chat inserted into DB");
        Ok(Chat {
            id: ChatId(id),
            created_at: parse_timestamp(&format_timestamp(created_at)),
        })
    }

    async fn list_chats(&self) -> Result<Vec<Chat>, StoreError> {
        let mut rows = self
            .conn()
            .query("SELECT id, created_at FROM chats ORDER BY created_at ASC, id ASC", ())
            .await
            .map_err(|e| StoreError::Query(format!("list_chats: {e}")))?;

        let mut chats = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("list_chats: {e}")))?
        {
            let id: i64 = row.get(0).map_err(|e| StoreError::Decode(format!("chat id: {e}")))?;
            let created: String = row.get(1).unwrap_or_default();
            chats.push(Chat {
                id: ChatId(id),
                created_at: parse_timestamp(&created),
            });
        }
        Ok(chats)
    }

    async fn list_messages(&self, chat_id: ChatId) -> Result<Vec<Message>, StoreError> {
        if !self.chat_exists(chat_id).await? {
            return Err(StoreError::ChatNotFound(chat_id));
        }

        let mut rows = self
            .conn()
            .query(
                "SELECT id, role, content, timestamp FROM messages
                 WHERE chat_id = ?1 ORDER BY timestamp ASC, id ASC",
                params![chat_id.0],
            )
            .await
            .map_err(|e| StoreError::Query(format!("list_messages: {e}")))?;

        let mut messages = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("list_messages: {e}")))?
        {
            let id: i64 = row
                .get(0)
                .map_err(|e| StoreError::Decode(format!("message id: {e}")))?;
            let role: String = row.get(1).unwrap_or_default();
            let content: String = row.get(2).unwrap_or_default();
            let timestamp: String = row.get(3).unwrap_or_default();
            messages.push(Message::confirmed(
                id,
                chat_id,
                Role::from_db(&role),
                content,
                parse_timestamp(&timestamp),
            ));
        }
        Ok(messages)
    }

    async fn send_message(
        &self,
        chat_id: ChatId,
        message: NewMessage,
    ) -> Result<Message, StoreError> {
        let _writes = self.writes.lock().await;
        if !self.chat_exists(chat_id).await? {
            return Err(StoreError::ChatNotFound(chat_id));
        }
        insert_message(self.conn(), chat_id, message).await
    }

    async fn append_messages(
        &self,
        chat_id: ChatId,
        messages: Vec<NewMessage>,
    ) -> Result<Vec<Message>, StoreError> {
        let _writes = self.writes.lock().await;
        if !self.chat_exists(chat_id).await? {
            return Err(StoreError::ChatNotFound(chat_id));
        }

        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| StoreError::Query(format!("append_messages: {e}")))?;
        let mut stored = Vec::with_capacity(messages.len());
        for message in messages {
            match insert_message(&tx, chat_id, message).await {
                Ok(message) => stored.push(message),
                Err(e) => {
                    if let Err(rollback) = tx.rollback().await {
                        warn!(chat_id = %chat_id, error = %rollback, "Rollback failed");
                    }
                    return Err(e);
                }
            }
        }
        tx.commit()
            .await
            .map_err(|e| StoreError::Query(format!("append_messages commit: {e}")))?;
        Ok(stored)
    }
}

// ── Helper functions ────────────────────────────────────────────────

async fn insert_message(
    conn: &Connection,
    chat_id: ChatId,
    message: NewMessage,
) -> Result<Message, StoreError> {
    let timestamp = parse_timestamp(&format_timestamp(Utc::now()));
    let mut rows = conn
        .query(
            "INSERT INTO messages (chat_id, role, content, timestamp)
             VALUES (?1, ?2, ?3, ?4) RETURNING id",
            params![
                chat_id.0,
                message.role.as_str(),
                message.content.as_str(),
                format_timestamp(timestamp)
            ],
        )
        .await
        .map_err(|e| StoreError::Query(format!("insert message: {e}")))?;
    let id = read_returned_id(&mut rows, "insert message").await?;
    debug!(chat_id = %chat_id, message_id = id, role = %message.role, "Message inserted into DB");
    Ok(Message::confirmed(
        id,
        chat_id,
        message.role,
        message.content,
        timestamp,
    ))
}

async fn read_returned_id(rows: &mut libsql::Rows, op: &str) -> Result<i64, StoreError> {
    let row = rows
        .next()
        .await
        .map_err(|e| StoreError::Query(format!("{op}: {e}")))?
        .ok_or_else(|| StoreError::Query(format!("{op}: no id returned")))?;
    row.get::<i64>(0)
        .map_err(|e| StoreError::Decode(format!("{op} id: {e}")))
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_timestamp(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}
