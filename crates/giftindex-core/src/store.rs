//! Store traits: the event log and the checkpoint share one unit of work.
//!
//! A poll cycle opens a [`UnitOfWork`], appends every decoded record,
//! moves the checkpoint, and commits. Dropping a unit of work without
//! calling [`UnitOfWork::commit`] discards everything staged in it, so a
//! crash mid-cycle leaves both the events and the checkpoint untouched.

use async_trait::async_trait;

use crate::checkpoint::Checkpoint;
use crate::error::IndexerError;
use crate::types::EventRecord;

/// Result of appending one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The record was new and has been staged.
    Inserted,
    /// `(tx_hash, log_index)` already exists. Not an error: this is what
    /// re-ingesting an already processed range looks like.
    Duplicate,
}

/// A set of store mutations that commit or fail together.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Stage one event record.
    async fn append(&mut self, record: &EventRecord) -> Result<AppendOutcome, IndexerError>;

    /// Stage a checkpoint upsert. A value below the stored one is ignored.
    async fn set_checkpoint(&mut self, source: &str, block_number: u64)
        -> Result<(), IndexerError>;

    /// Durably apply everything staged so far.
    async fn commit(self: Box<Self>) -> Result<(), IndexerError>;
}

/// Persistent storage for decoded events and indexer checkpoints.
///
/// Implementations: `InMemoryStorage`, `SqliteStorage`, `PostgresStorage`.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Load the checkpoint for `source` (returns `None` if none exists).
    async fn load_checkpoint(&self, source: &str) -> Result<Option<Checkpoint>, IndexerError>;

    /// Delete the checkpoint for `source` (operator reset).
    async fn delete_checkpoint(&self, source: &str) -> Result<(), IndexerError>;

    /// Open a new unit of work.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, IndexerError>;

    /// Total number of stored events.
    async fn event_count(&self) -> Result<u64, IndexerError>;

    /// Stored events with the given name, ordered by block and log index.
    async fn events_by_name(
        &self,
        event_name: &str,
        limit: usize,
    ) -> Result<Vec<EventRecord>, IndexerError>;

    /// The most recent stored events, newest first.
    async fn recent_events(&self, limit: usize) -> Result<Vec<EventRecord>, IndexerError>;
}
