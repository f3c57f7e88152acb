//! giftindex-storage: pluggable storage backends for the event indexer.
//!
//! Backends:
//! - [`memory`]: in-memory (dev/testing, no persistence)
//! - [`sqlite`]: SQLite via `sqlx` (embedded, single-file persistence)
//! - `postgres`: PostgreSQL via `sqlx`
//!
//! Every backend implements [`giftindex_core::IndexStore`]; [`open`] picks
//! one from a database URL.

use std::sync::Arc;

use giftindex_core::{IndexStore, IndexerError};

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(any(feature = "sqlite", feature = "postgres"))]
mod rows;

pub use memory::InMemoryStorage;

/// Open the store named by `database_url`.
///
/// - `memory` / `memory://` → [`InMemoryStorage`]
/// - `sqlite:…` → `SqliteStorage` (file created if missing)
/// - `postgres://…` / `postgresql://…` → `PostgresStorage`
pub async fn open(database_url: &str) -> Result<Arc<dyn IndexStore>, IndexerError> {
    let url = database_url.trim();

    if url == "memory" || url.starts_with("memory:") {
        return Ok(Arc::new(InMemoryStorage::new()));
    }

    if url.starts_with("sqlite:") {
        #[cfg(feature = "sqlite")]
        return Ok(Arc::new(sqlite::SqliteStorage::open(url).await?));
        #[cfg(not(feature = "sqlite"))]
        return Err(IndexerError::Config(
            "sqlite support not compiled in (enable the `sqlite` feature)".into(),
        ));
    }

    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        #[cfg(feature = "postgres")]
        return Ok(Arc::new(postgres::PostgresStorage::connect(url).await?));
        #[cfg(not(feature = "postgres"))]
        return Err(IndexerError::Config(
            "postgres support not compiled in (enable the `postgres` feature)".into(),
        ));
    }

    Err(IndexerError::Config(format!(
        "unsupported DATABASE_URL scheme: {url}"
    )))
}
