//! SQLite connections for the transcript store.
//!
//! Writes go through a one-connection pool so SQLite never sees two writers;
//! reads fan out over a small read-only pool. WAL lets both proceed at once.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

const READER_CONNECTIONS: u32 = 8;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct DatabasePool {
    pub reader: SqlitePool,
    pub writer: SqlitePool,
}

fn connect_options(database_url: &str) -> Result<SqliteConnectOptions, sqlx::Error> {
    Ok(SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true))
}

impl DatabasePool {
    /// Open (or create) the database and bring its schema up to date.
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let options = connect_options(database_url)?;

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options.clone())
            .await?;
        // Migrate before any read-only connection opens.
        sqlx::migrate!("../../migrations").run(&writer).await?;

        let reader = SqlitePoolOptions::new()
            .max_connections(READER_CONNECTIONS)
            .connect_with(options.read_only(true))
            .await?;

        tracing::debug!(url = database_url, "transcript database ready");
        Ok(Self { reader, writer })
    }

    /// Liveness probe used by the health report.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        for pool in [&self.writer, &self.reader] {
            sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn fresh_pool() -> (TempDir, DatabasePool) {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}", dir.path().join("relay.db").display());
        (dir, DatabasePool::new(&url).await.unwrap())
    }

    #[tokio::test]
    async fn migrations_create_transcript_tables() {
        let (_dir, pool) = fresh_pool().await;

        let names: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE 'chat_%' ORDER BY name",
        )
        .fetch_all(&pool.reader)
        .await
        .unwrap();
        assert_eq!(names, ["chat_messages", "chat_threads"]);
    }

    #[tokio::test]
    async fn connections_use_wal_and_enforce_foreign_keys() {
        let (_dir, pool) = fresh_pool().await;

        let journal: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(&pool.reader)
            .await
            .unwrap();
        assert!(journal.eq_ignore_ascii_case("wal"));

        let enforced: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(&pool.writer)
            .await
            .unwrap();
        assert_eq!(enforced, 1);
    }

    #[tokio::test]
    async fn reader_refuses_writes() {
        let (_dir, pool) = fresh_pool().await;
        pool.ping().await.unwrap();

        let write = sqlx::query("DELETE FROM chat_threads")
            .execute(&pool.reader)
            .await;
        assert!(write.is_err());
    }
}
