//! SQLite storage backend.
//!
//! Persists decoded events and checkpoints to a single SQLite file using
//! `sqlx` with WAL mode. A unit of work is one SQLite transaction.
//!
//! # Usage
//! ```rust,no_run
//! use giftindex_storage::sqlite::SqliteStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteStorage::open("sqlite:./data/events.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteStorage::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};

use giftindex_core::{AppendOutcome, Checkpoint, EventRecord, IndexStore, IndexerError, UnitOfWork};

use crate::rows::{db_err, encode_args, record_from_columns};

/// SQLite-backed storage for events and checkpoints.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (or create) a SQLite database.
    ///
    /// `path` may be a plain file path (`"./events.db"`) or a full SQLite
    /// URL (`"sqlite:./data/events.db"`). Missing parent directories are
    /// created.
    pub async fn open(path: &str) -> Result<Self, IndexerError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}")
        };
        if url.contains(":memory:") {
            return Self::in_memory().await;
        }

        let options = SqliteConnectOptions::from_str(&url)
            .map_err(db_err)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let filename = options.clone().get_filename();
        if let Some(parent) = filename.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    IndexerError::Storage(format!("create {}: {e}", parent.display()))
                })?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(db_err)?;

        let storage = Self { pool };
        storage.init_schema().await?;
        info!(url = %url, "sqlite store opened");
        Ok(storage)
    }

    /// Open an in-memory SQLite database.
    ///
    /// All data is lost when the pool is dropped. The pool holds a single
    /// connection, since every `:memory:` connection is its own database.
    pub async fn in_memory() -> Result<Self, IndexerError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(db_err)?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(db_err)?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<(), IndexerError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS event_logs (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                tx_hash      TEXT    NOT NULL,
                log_index    INTEGER NOT NULL,
                event_name   TEXT    NOT NULL,
                block_number INTEGER NOT NULL,
                args         TEXT    NOT NULL,
                created_at   TEXT    NOT NULL,
                UNIQUE (tx_hash, log_index)
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_event_logs_name ON event_logs (event_name);")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_event_logs_block ON event_logs (block_number);",
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS indexer_checkpoints (
                source       TEXT    PRIMARY KEY,
                block_number INTEGER NOT NULL,
                updated_at   INTEGER NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn query_events(
        &self,
        sql: &str,
        name: Option<&str>,
        limit: usize,
    ) -> Result<Vec<EventRecord>, IndexerError> {
        let mut query = sqlx::query(sql);
        if let Some(name) = name {
            query = query.bind(name);
        }
        let rows = query
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.into_iter()
            .map(|row| {
                let args: String = row.get("args");
                record_from_columns(
                    row.get("tx_hash"),
                    row.get("log_index"),
                    row.get("event_name"),
                    row.get("block_number"),
                    &args,
                    row.get::<DateTime<Utc>, _>("created_at"),
                )
            })
            .collect()
    }
}

#[async_trait]
impl IndexStore for SqliteStorage {
    async fn load_checkpoint(&self, source: &str) -> Result<Option<Checkpoint>, IndexerError> {
        let row = sqlx::query(
            "SELECT source, block_number, updated_at FROM indexer_checkpoints WHERE source = ?",
        )
        .bind(source)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(|r| Checkpoint {
            source: r.get("source"),
            block_number: r.get::<i64, _>("block_number") as u64,
            updated_at: r.get("updated_at"),
        }))
    }

    async fn delete_checkpoint(&self, source: &str) -> Result<(), IndexerError> {
        sqlx::query("DELETE FROM indexer_checkpoints WHERE source = ?")
            .bind(source)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, IndexerError> {
        let tx = self.pool.begin().await.map_err(db_err)?;
        Ok(Box::new(SqliteUnit { tx }))
    }

    async fn event_count(&self) -> Result<u64, IndexerError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM event_logs")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.get::<i64, _>("cnt") as u64)
    }

    async fn events_by_name(
        &self,
        event_name: &str,
        limit: usize,
    ) -> Result<Vec<EventRecord>, IndexerError> {
        self.query_events(
            "SELECT tx_hash, log_index, event_name, block_number, args, created_at
             FROM event_logs WHERE event_name = ?
             ORDER BY block_number, log_index LIMIT ?",
            Some(event_name),
            limit,
        )
        .await
    }

    async fn recent_events(&self, limit: usize) -> Result<Vec<EventRecord>, IndexerError> {
        self.query_events(
            "SELECT tx_hash, log_index, event_name, block_number, args, created_at
             FROM event_logs ORDER BY id DESC LIMIT ?",
            None,
            limit,
        )
        .await
    }
}

/// One SQLite transaction. Rolled back by sqlx when dropped uncommitted.
struct SqliteUnit {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl UnitOfWork for SqliteUnit {
    async fn append(&mut self, record: &EventRecord) -> Result<AppendOutcome, IndexerError> {
        let args = encode_args(record)?;
        let result = sqlx::query(
            "INSERT INTO event_logs (tx_hash, log_index, event_name, block_number, args, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (tx_hash, log_index) DO NOTHING",
        )
        .bind(&record.tx_hash)
        .bind(record.log_index as i64)
        .bind(&record.event_name)
        .bind(record.block_number as i64)
        .bind(&args)
        .bind(record.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            debug!(tx = %record.tx_hash, log_index = record.log_index, "duplicate event skipped");
            return Ok(AppendOutcome::Duplicate);
        }
        Ok(AppendOutcome::Inserted)
    }

    async fn set_checkpoint(
        &mut self,
        source: &str,
        block_number: u64,
    ) -> Result<(), IndexerError> {
        sqlx::query(
            "INSERT INTO indexer_checkpoints (source, block_number, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT (source) DO UPDATE SET
                block_number = MAX(indexer_checkpoints.block_number, excluded.block_number),
                updated_at   = excluded.updated_at",
        )
        .bind(source)
        .bind(block_number as i64)
        .bind(Utc::now().timestamp())
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), IndexerError> {
        self.tx
            .commit()
            .await
            .map_err(|e| IndexerError::Storage(format!("commit: {e}")))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
