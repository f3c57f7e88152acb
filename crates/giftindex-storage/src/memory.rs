//! In-memory storage backend.
//!
//! Stores decoded events and checkpoints in RAM.
//! Useful for testing and short-lived indexers that don't need persistence.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use giftindex_core::{AppendOutcome, Checkpoint, EventRecord, IndexStore, IndexerError, UnitOfWork};

#[derive(Default)]
struct State {
    events: Vec<EventRecord>,
    keys: HashSet<(String, u64)>,
    checkpoints: HashMap<String, Checkpoint>,
}

/// In-memory indexer storage.
///
/// Clones share the same data. All data is lost when the process exits.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    state: Arc<Mutex<State>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored event in insertion order.
    pub fn events(&self) -> Vec<EventRecord> {
        lock(&self.state)
            .map(|s| s.events.clone())
            .unwrap_or_default()
    }
}

fn lock(state: &Mutex<State>) -> Result<MutexGuard<'_, State>, IndexerError> {
    state
        .lock()
        .map_err(|_| IndexerError::Storage("in-memory store lock poisoned".into()))
}

#[async_trait]
impl IndexStore for InMemoryStorage {
    async fn load_checkpoint(&self, source: &str) -> Result<Option<Checkpoint>, IndexerError> {
        Ok(lock(&self.state)?.checkpoints.get(source).cloned())
    }

    async fn delete_checkpoint(&self, source: &str) -> Result<(), IndexerError> {
        lock(&self.state)?.checkpoints.remove(source);
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, IndexerError> {
        Ok(Box::new(InMemoryUnit {
            state: Arc::clone(&self.state),
            staged: Vec::new(),
            staged_keys: HashSet::new(),
            checkpoints: Vec::new(),
        }))
    }

    async fn event_count(&self) -> Result<u64, IndexerError> {
        Ok(lock(&self.state)?.events.len() as u64)
    }

    async fn events_by_name(
        &self,
        event_name: &str,
        limit: usize,
    ) -> Result<Vec<EventRecord>, IndexerError> {
        let state = lock(&self.state)?;
        let mut events: Vec<_> = state
            .events
            .iter()
            .filter(|e| e.event_name == event_name)
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.block_number, e.log_index));
        events.truncate(limit);
        Ok(events)
    }

    async fn recent_events(&self, limit: usize) -> Result<Vec<EventRecord>, IndexerError> {
        let state = lock(&self.state)?;
        Ok(state.events.iter().rev().take(limit).cloned().collect())
    }
}

/// Staged writes, applied under one lock on commit.
struct InMemoryUnit {
    state: Arc<Mutex<State>>,
    staged: Vec<EventRecord>,
    staged_keys: HashSet<(String, u64)>,
    checkpoints: Vec<(String, u64)>,
}

#[async_trait]
impl UnitOfWork for InMemoryUnit {
    async fn append(&mut self, record: &EventRecord) -> Result<AppendOutcome, IndexerError> {
        let key = (record.tx_hash.clone(), record.log_index);
        let committed = lock(&self.state)?.keys.contains(&key);
        if committed || !self.staged_keys.insert(key) {
            debug!(tx = %record.tx_hash, log_index = record.log_index, "duplicate event skipped");
            return Ok(AppendOutcome::Duplicate);
        }
        self.staged.push(record.clone());
        Ok(AppendOutcome::Inserted)
    }

    async fn set_checkpoint(
        &mut self,
        source: &str,
        block_number: u64,
    ) -> Result<(), IndexerError> {
        self.checkpoints.push((source.to_string(), block_number));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), IndexerError> {
        let this = *self;
        let mut state = lock(&this.state)?;

        for record in this.staged {
            let key = (record.tx_hash.clone(), record.log_index);
            if state.keys.insert(key) {
                state.events.push(record);
            }
        }

        let now = Utc::now().timestamp();
        for (source, block_number) in this.checkpoints {
            let entry = state
                .checkpoints
                .entry(source.clone())
                .or_insert_with(|| Checkpoint {
                    source,
                    block_number,
                    updated_at: now,
                });
            entry.block_number = entry.block_number.max(block_number);
            entry.updated_at = now;
        }
        Ok(())
    }
}
