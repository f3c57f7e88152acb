//! Fluent builder API for the poller.
//!
//! # Example
//!
//! ```rust,no_run
//! use giftindex_evm::IndexerBuilder;
//!
//! let config = IndexerBuilder::new()
//!     .contract("0x3a8de1e232d9674626a49e0127dfd8cc3ad9cb68")
//!     .start_block(1_200_000)
//!     .poll_interval_ms(2_000)
//!     .max_log_range(100)
//!     .build_config();
//! ```

use std::sync::Arc;

use giftindex_abi::EventDecoder;
use giftindex_core::{IndexStore, IndexerConfig, IndexerError};

use crate::client::ChainClient;
use crate::poller::Poller;

/// Fluent builder for `IndexerConfig` and `Poller`.
#[derive(Default)]
pub struct IndexerBuilder {
    config: IndexerConfig,
}

impl IndexerBuilder {
    pub fn new() -> Self {
        Self {
            config: IndexerConfig::default(),
        }
    }

    /// Set the checkpoint source key.
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.config.source = source.into();
        self
    }

    /// Set the contract whose logs are indexed.
    pub fn contract(mut self, address: impl Into<String>) -> Self {
        self.config.contract_address = address.into();
        self
    }

    /// Set the block treated as already processed when no checkpoint exists.
    pub fn start_block(mut self, block: u64) -> Self {
        self.config.start_block = block;
        self
    }

    /// Set the delay between cycles in milliseconds.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// Set the advisory batch size.
    pub fn batch_size(mut self, size: u64) -> Self {
        self.config.batch_size = size;
        self
    }

    /// Cap the block span of a single `eth_getLogs` call.
    pub fn max_log_range(mut self, blocks: u64) -> Self {
        self.config.max_log_range = Some(blocks);
        self
    }

    /// Stay `n` blocks behind the reported head.
    pub fn confirmations(mut self, n: u64) -> Self {
        self.config.confirmations = n;
        self
    }

    /// Replace the decoded event names (priority order).
    pub fn event_names<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.config.event_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Build the `IndexerConfig`.
    pub fn build_config(self) -> IndexerConfig {
        self.config
    }

    /// Validate the configuration and build a poller.
    pub fn build<C: ChainClient>(
        self,
        client: C,
        decoder: EventDecoder,
        store: Arc<dyn IndexStore>,
    ) -> Result<Poller<C>, IndexerError> {
        Poller::new(self.config, client, decoder, store)
    }
}
