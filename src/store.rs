//! Backing store for per-channel message lists.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePoolOptions, Pool, Sqlite};
use tracing::info;

use crate::morse::message::Message;

/// Supplies the desired message set for a channel.
///
/// Implementations may be slow or fail; callers must treat a failed query as
/// non-fatal and keep their previous state. The trait seam also lets tests
/// substitute a slow or failing store.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn messages_for_channel(&self, channel_id: &str) -> Result<Vec<Message>>;
}

/// SQLite-backed message store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Connect to the database, creating it and running migrations if needed.
    pub async fn connect(database_url: &str) -> Result<Self> {
        if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
            info!("Creating database at {}", database_url);
            Sqlite::create_database(database_url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Wrap an existing pool (used by tests with an in-memory database).
    pub fn with_pool(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Create the schema.
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                channel_id TEXT NOT NULL,
                text TEXT NOT NULL,
                dpm INTEGER NOT NULL,
                frequency INTEGER NOT NULL,
                created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_messages_channel
            ON messages(channel_id);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Add a message to a channel's broadcast set.
    pub async fn add_message(&self, channel_id: &str, message: &Message) -> Result<()> {
        sqlx::query("INSERT INTO messages (channel_id, text, dpm, frequency) VALUES (?, ?, ?, ?)")
            .bind(channel_id)
            .bind(&message.text)
            .bind(message.dpm)
            .bind(message.frequency)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Remove every copy of a message from a channel's broadcast set.
    pub async fn remove_message(&self, channel_id: &str, message: &Message) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM messages WHERE channel_id = ? AND text = ? AND dpm = ? AND frequency = ?",
        )
        .bind(channel_id)
        .bind(&message.text)
        .bind(message.dpm)
        .bind(message.frequency)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn messages_for_channel(&self, channel_id: &str) -> Result<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            "SELECT text, dpm, frequency FROM messages WHERE channel_id = ? ORDER BY id",
        )
        .bind(channel_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }
}
