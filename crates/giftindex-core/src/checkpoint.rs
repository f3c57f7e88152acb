//! Checkpoint manager: persists the indexer's position for crash recovery.
//!
//! A checkpoint stores the last block whose logs are all persisted. On
//! restart, the indexer resumes from `checkpoint + 1` rather than
//! re-indexing from scratch. When no checkpoint exists yet the configured
//! start height stands in for it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::IndexerError;
use crate::store::IndexStore;

/// A persisted checkpoint for one logical feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Feed identifier (e.g. `"gift_credits"`).
    pub source: String,
    /// Last fully ingested block number.
    pub block_number: u64,
    /// Unix timestamp of when this checkpoint was saved.
    pub updated_at: i64,
}

/// Reads the cursor for one source, falling back to the start height.
///
/// Writes go through [`crate::store::UnitOfWork::set_checkpoint`] so they
/// commit together with the cycle's events.
#[derive(Clone)]
pub struct CheckpointManager {
    store: Arc<dyn IndexStore>,
    source: String,
    start_block: u64,
}

impl CheckpointManager {
    pub fn new(store: Arc<dyn IndexStore>, source: impl Into<String>, start_block: u64) -> Self {
        Self {
            store,
            source: source.into(),
            start_block,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn start_block(&self) -> u64 {
        self.start_block
    }

    /// Load the saved checkpoint (returns `None` if none exists).
    pub async fn load(&self) -> Result<Option<Checkpoint>, IndexerError> {
        self.store.load_checkpoint(&self.source).await
    }

    /// The last fully ingested block, or the start height if nothing has
    /// been committed yet.
    pub async fn get(&self) -> Result<u64, IndexerError> {
        Ok(self
            .load()
            .await?
            .map(|cp| cp.block_number)
            .unwrap_or(self.start_block))
    }

    /// Forget the checkpoint so the next run starts from the start height.
    ///
    /// Stored events are kept; re-ingestion is idempotent.
    pub async fn reset(&self) -> Result<(), IndexerError> {
        self.store.delete_checkpoint(&self.source).await?;
        info!(source = %self.source, start = self.start_block, "checkpoint reset");
        Ok(())
    }
}
