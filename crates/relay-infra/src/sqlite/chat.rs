//! SQLite transcript store.
//!
//! Implements `TranscriptStore` from `relay-core` using sqlx with split
//! read/write pools: raw queries, private Row structs, RFC3339 text
//! timestamps. Ownership checks that must observe a just-committed write
//! run on the writer.

use chrono::{DateTime, Utc};
use relay_core::chat::repository::TranscriptStore;
use relay_types::chat::{ChatMessage, ChatThread, MessageRole, NewMessage, UsageSummary};
use relay_types::error::RepositoryError;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `TranscriptStore`.
#[derive(Clone)]
pub struct SqliteTranscriptStore {
    pool: DatabasePool,
}

impl SqliteTranscriptStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct ChatThreadRow {
    id: String,
    user_id: String,
    title: String,
    created_at: String,
    updated_at: String,
}

impl ChatThreadRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            title: row.try_get("title")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_thread(self) -> Result<ChatThread, RepositoryError> {
        Ok(ChatThread {
            id: parse_uuid(&self.id, "thread id")?,
            user_id: parse_uuid(&self.user_id, "user_id")?,
            title: self.title,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

struct ChatMessageRow {
    id: String,
    thread_id: String,
    user_id: String,
    role: String,
    model: String,
    content: String,
    truncated: bool,
    created_at: String,
}

impl ChatMessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            thread_id: row.try_get("thread_id")?,
            user_id: row.try_get("user_id")?,
            role: row.try_get("role")?,
            model: row.try_get("model")?,
            content: row.try_get("content")?,
            truncated: row.try_get("truncated")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self) -> Result<ChatMessage, RepositoryError> {
        let role: MessageRole = self
            .role
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(ChatMessage {
            id: parse_uuid(&self.id, "message id")?,
            thread_id: parse_uuid(&self.thread_id, "thread_id")?,
            user_id: parse_uuid(&self.user_id, "user_id")?,
            role,
            model: self.model,
            content: self.content,
            truncated: self.truncated,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_uuid(s: &str, what: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(s).map_err(|e| RepositoryError::Query(format!("invalid {what}: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn query_error(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

fn check_owner(thread: ChatThread, user_id: &Uuid) -> Result<ChatThread, RepositoryError> {
    if thread.user_id == *user_id {
        Ok(thread)
    } else {
        Err(RepositoryError::Forbidden)
    }
}

// ---------------------------------------------------------------------------
// TranscriptStore implementation
// ---------------------------------------------------------------------------

impl TranscriptStore for SqliteTranscriptStore {
    async fn ensure_thread(
        &self,
        thread_id: &Uuid,
        user_id: &Uuid,
        title: &str,
    ) -> Result<ChatThread, RepositoryError> {
        let now = format_datetime(&Utc::now());
        sqlx::query(
            r#"INSERT INTO chat_threads (id, user_id, title, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT (id) DO NOTHING"#,
        )
        .bind(thread_id.to_string())
        .bind(user_id.to_string())
        .bind(title)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        let row = sqlx::query("SELECT * FROM chat_threads WHERE id = ?")
            .bind(thread_id.to_string())
            .fetch_one(&self.pool.writer)
            .await
            .map_err(query_error)?;
        let thread = ChatThreadRow::from_row(&row)
            .map_err(query_error)?
            .into_thread()?;

        check_owner(thread, user_id)
    }

    async fn authorize_thread(
        &self,
        thread_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<ChatThread, RepositoryError> {
        let row = sqlx::query("SELECT * FROM chat_threads WHERE id = ?")
            .bind(thread_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?
            .ok_or(RepositoryError::NotFound)?;
        let thread = ChatThreadRow::from_row(&row)
            .map_err(query_error)?
            .into_thread()?;

        check_owner(thread, user_id)
    }

    async fn append_message(&self, message: &NewMessage) -> Result<ChatMessage, RepositoryError> {
        let stored = ChatMessage {
            id: Uuid::now_v7(),
            thread_id: message.thread_id,
            user_id: message.user_id,
            role: message.role,
            model: message.model.clone(),
            content: message.content.clone(),
            truncated: message.truncated,
            created_at: Utc::now(),
        };
        let created_at = format_datetime(&stored.created_at);

        // INSERT message + bump the thread's updated_at in one transaction
        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;

        sqlx::query(
            r#"INSERT INTO chat_messages (id, thread_id, user_id, role, model, content, truncated, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(stored.id.to_string())
        .bind(stored.thread_id.to_string())
        .bind(stored.user_id.to_string())
        .bind(stored.role.to_string())
        .bind(&stored.model)
        .bind(&stored.content)
        .bind(stored.truncated)
        .bind(&created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.message().contains("FOREIGN KEY") {
                    return RepositoryError::NotFound;
                }
            }
            query_error(e)
        })?;

        sqlx::query("UPDATE chat_threads SET updated_at = ? WHERE id = ?")
            .bind(&created_at)
            .bind(stored.thread_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;

        tx.commit().await.map_err(query_error)?;

        Ok(stored)
    }

    async fn get_message(
        &self,
        message_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<Option<ChatMessage>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM chat_messages WHERE id = ? AND user_id = ?")
            .bind(message_id.to_string())
            .bind(user_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        match row {
            Some(row) => {
                let message_row = ChatMessageRow::from_row(&row).map_err(query_error)?;
                Ok(Some(message_row.into_message()?))
            }
            None => Ok(None),
        }
    }

    async fn list_messages(
        &self,
        thread_id: &Uuid,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        // rowid breaks ties between messages written within the same instant
        let rows = sqlx::query(
            r#"SELECT * FROM chat_messages WHERE thread_id = ?
               ORDER BY created_at ASC, rowid ASC
               LIMIT ? OFFSET ?"#,
        )
        .bind(thread_id.to_string())
        .bind(limit.unwrap_or(-1))
        .bind(offset.unwrap_or(0))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let message_row = ChatMessageRow::from_row(row).map_err(query_error)?;
            messages.push(message_row.into_message()?);
        }

        Ok(messages)
    }

    async fn list_threads(&self, user_id: &Uuid) -> Result<Vec<ChatThread>, RepositoryError> {
        let rows =
            sqlx::query("SELECT * FROM chat_threads WHERE user_id = ? ORDER BY updated_at DESC")
                .bind(user_id.to_string())
                .fetch_all(&self.pool.reader)
                .await
                .map_err(query_error)?;

        let mut threads = Vec::with_capacity(rows.len());
        for row in &rows {
            threads.push(ChatThreadRow::from_row(row).map_err(query_error)?.into_thread()?);
        }

        Ok(threads)
    }

    async fn delete_thread(&self, thread_id: &Uuid) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM chat_threads WHERE id = ?")
            .bind(thread_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn usage_summary(&self, user_id: &Uuid) -> Result<UsageSummary, RepositoryError> {
        let row = sqlx::query(
            r#"SELECT COUNT(*) AS message_count, COALESCE(SUM(LENGTH(content)), 0) AS total_length
               FROM chat_messages WHERE user_id = ?"#,
        )
        .bind(user_id.to_string())
        .fetch_one(&self.pool.reader)
        .await
        .map_err(query_error)?;

        let message_count: i64 = row.try_get("message_count").map_err(query_error)?;
        let total_length: i64 = row.try_get("total_length").map_err(query_error)?;

        Ok(UsageSummary {
            message_count: message_count as u64,
            total_length: total_length as u64,
        })
    }
}
