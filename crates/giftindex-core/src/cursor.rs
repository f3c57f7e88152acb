//! Indexer cursor: turns a checkpoint and a chain head into the next range.

use serde::{Deserialize, Serialize};

/// The indexer's current position in the chain.
///
/// The cursor knows:
/// - Which block was last fully ingested
/// - The confirmation depth (how many blocks behind head we consider final)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Last fully ingested block number.
    pub block_number: u64,
    /// Blocks to stay behind the reported head.
    pub confirmation_depth: u64,
}

impl Cursor {
    pub fn new(block_number: u64, confirmation_depth: u64) -> Self {
        Self {
            block_number,
            confirmation_depth,
        }
    }

    /// The highest block we may ingest given the node's `head`.
    pub fn confirmed_head(&self, head: u64) -> u64 {
        head.saturating_sub(self.confirmation_depth)
    }

    /// Returns the next block to process (cursor + 1).
    pub fn next_block(&self) -> u64 {
        self.block_number + 1
    }

    /// The inclusive range `[cursor + 1, confirmed head]`, or `None` when
    /// there is nothing new.
    pub fn next_range(&self, head: u64) -> Option<(u64, u64)> {
        let to = self.confirmed_head(head);
        if to <= self.block_number {
            return None;
        }
        Some((self.next_block(), to))
    }
}
