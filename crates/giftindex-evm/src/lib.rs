//! giftindex-evm: the EVM side of the indexer.
//!
//! - [`ChainClient`] / [`RpcChainClient`]: `eth_blockNumber` + `eth_getLogs`
//! - [`EvmFetcher`]: range chunking on top of a client
//! - [`Poller`]: the fetch → decode → persist → advance cycle
//! - [`IndexerBuilder`]: fluent configuration

pub mod builder;
pub mod client;
pub mod fetcher;
pub mod poller;

pub use builder::IndexerBuilder;
pub use client::{ChainClient, RpcChainClient};
pub use fetcher::EvmFetcher;
pub use poller::{CycleOutcome, CycleReport, Poller, PollerStats};
