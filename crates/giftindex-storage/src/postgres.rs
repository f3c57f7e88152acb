//! PostgreSQL storage backend.
//!
//! Persists decoded events and checkpoints to PostgreSQL using `sqlx`
//! with connection pooling. A unit of work is one database transaction.
//!
//! # Feature Flag
//! Requires the `postgres` feature:
//! ```toml
//! giftindex-storage = { version = "0.1", features = ["postgres"] }
//! ```
//!
//! # Schema
//! The storage creates these tables automatically on first connect:
//! - `event_logs`: decoded events, unique on `(tx_hash, log_index)`
//! - `indexer_checkpoints`: last fully ingested block per source

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, info};

use giftindex_core::{AppendOutcome, Checkpoint, EventRecord, IndexStore, IndexerError, UnitOfWork};

use crate::rows::{db_err, encode_args, record_from_columns};

// ─── Connection options ────────────────────────────────────────────────────────

/// Connection options for the Postgres storage backend.
#[derive(Debug, Clone)]
pub struct PostgresOptions {
    /// Maximum number of connections in the pool (default: 5)
    pub max_connections: u32,
    /// Connection timeout in seconds (default: 30)
    pub connect_timeout_secs: u64,
}

impl Default for PostgresOptions {
    fn default() -> Self {
        Self {
            max_connections: 5,
            connect_timeout_secs: 30,
        }
    }
}

// ─── PostgresStorage ─────────────────────────────────────────────────────────

/// PostgreSQL-backed storage for events and checkpoints.
#[derive(Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Connect with default pool options and initialize the schema.
    ///
    /// The URL format follows libpq convention:
    /// `postgresql://[user[:password]@][host][:port][/dbname]`
    pub async fn connect(database_url: &str) -> Result<Self, IndexerError> {
        Self::connect_with_options(database_url, PostgresOptions::default()).await
    }

    /// Connect with custom pool options.
    pub async fn connect_with_options(
        database_url: &str,
        opts: PostgresOptions,
    ) -> Result<Self, IndexerError> {
        let pool = PgPoolOptions::new()
            .max_connections(opts.max_connections)
            .acquire_timeout(Duration::from_secs(opts.connect_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| IndexerError::Storage(format!("postgres connect: {e}")))?;

        let storage = Self { pool };
        storage.init_schema().await?;
        info!("postgres store connected and schema initialized");
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<(), IndexerError> {
        // args is TEXT rather than JSONB: JSONB does not keep key order
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS event_logs (
                id           BIGSERIAL   PRIMARY KEY,
                tx_hash      TEXT        NOT NULL,
                log_index    BIGINT      NOT NULL,
                event_name   TEXT        NOT NULL,
                block_number BIGINT      NOT NULL,
                args         TEXT        NOT NULL,
                created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                UNIQUE (tx_hash, log_index)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_event_logs_name ON event_logs (event_name)")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_event_logs_block ON event_logs (block_number)")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS indexer_checkpoints (
                source       TEXT   PRIMARY KEY,
                block_number BIGINT NOT NULL,
                updated_at   BIGINT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    /// Get the underlying connection pool (for custom queries).
    pub fn pool(&self) -> &PgPool {
        &self.pool
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
impl IndexStore for PostgresStorage {
    async fn load_checkpoint(&self, source: &str) -> Result<Option<Checkpoint>, IndexerError> {
        let row = sqlx::query(
            "SELECT source, block_number, updated_at FROM indexer_checkpoints WHERE source = $1",
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
        sqlx::query("DELETE FROM indexer_checkpoints WHERE source = $1")
            .bind(source)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, IndexerError> {
        let tx = self.pool.begin().await.map_err(db_err)?;
        Ok(Box::new(PostgresUnit { tx }))
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
             FROM event_logs WHERE event_name = $1
             ORDER BY block_number, log_index LIMIT $2",
            Some(event_name),
            limit,
        )
        .await
    }

    async fn recent_events(&self, limit: usize) -> Result<Vec<EventRecord>, IndexerError> {
        self.query_events(
            "SELECT tx_hash, log_index, event_name, block_number, args, created_at
             FROM event_logs ORDER BY id DESC LIMIT $1",
            None,
            limit,
        )
        .await
    }
}

struct PostgresUnit {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PostgresUnit {
    async fn append(&mut self, record: &EventRecord) -> Result<AppendOutcome, IndexerError> {
        let args = encode_args(record)?;
        let result = sqlx::query(
            "INSERT INTO event_logs (tx_hash, log_index, event_name, block_number, args, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)
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
             VALUES ($1, $2, $3)
             ON CONFLICT (source) DO UPDATE SET
                block_number = GREATEST(indexer_checkpoints.block_number, EXCLUDED.block_number),
                updated_at   = EXCLUDED.updated_at",
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
