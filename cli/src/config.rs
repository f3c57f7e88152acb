//! Command-line / environment configuration.

use std::time::Duration;

use clap::Args;

use giftindex_core::indexer::{DEFAULT_EVENT_NAMES, DEFAULT_SOURCE};
use giftindex_core::IndexerConfig;

pub const DEFAULT_RPC_URL: &str = "https://testnet-rpc.monad.xyz";
pub const DEFAULT_ABI_PATH: &str = "packages/hardhat/deployments/monadTestnet/GiftCredits1155.json";
pub const DEFAULT_DATABASE_URL: &str = "sqlite:./data/events.db";

/// Settings shared by every subcommand. Each flag falls back to its
/// environment variable, then to the default.
#[derive(Debug, Clone, Args)]
pub struct IndexerArgs {
    /// JSON-RPC endpoint
    #[arg(long = "rpc-url", env = "RPC_HTTP_URL", default_value = DEFAULT_RPC_URL, global = true)]
    pub rpc_url: String,

    /// Deployed GiftCredits1155 address
    #[arg(long, env = "GIFT_CONTRACT_ADDRESS", global = true)]
    pub contract: Option<String>,

    /// Contract ABI (hardhat deployment artifact or bare ABI array)
    #[arg(long, env = "GIFT_CONTRACT_ABI", default_value = DEFAULT_ABI_PATH, global = true)]
    pub abi: String,

    /// Store URL: sqlite:<path>, postgres://…, or memory
    #[arg(long = "database-url", env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL, global = true)]
    pub database_url: String,

    /// Block treated as already processed when no checkpoint exists
    #[arg(long = "start-block", env = "INDEXER_START_BLOCK", default_value_t = 0, global = true)]
    pub start_block: u64,

    /// Seconds between poll cycles
    #[arg(long = "poll-interval", env = "INDEXER_POLL_INTERVAL", default_value_t = 2.0, global = true)]
    pub poll_interval: f64,

    /// Advisory range width; wider ranges are logged, not truncated
    #[arg(long = "batch-size", env = "INDEXER_BATCH_SIZE", default_value_t = 100, global = true)]
    pub batch_size: u64,

    /// Checkpoint key
    #[arg(long, env = "INDEXER_SOURCE", default_value = DEFAULT_SOURCE, global = true)]
    pub source: String,

    /// Blocks to stay behind the chain head
    #[arg(long, env = "INDEXER_CONFIRMATIONS", default_value_t = 0, global = true)]
    pub confirmations: u64,

    /// Max blocks per eth_getLogs call (unset = whole range in one call)
    #[arg(long = "max-log-range", env = "INDEXER_MAX_LOG_RANGE", global = true)]
    pub max_log_range: Option<u64>,

    /// Per-request RPC timeout in seconds
    #[arg(long = "rpc-timeout", env = "RPC_TIMEOUT_SECS", default_value_t = 30, global = true)]
    pub rpc_timeout: u64,
}

impl IndexerArgs {
    pub fn indexer_config(&self) -> IndexerConfig {
        IndexerConfig {
            source: self.source.clone(),
            contract_address: self.contract.clone().unwrap_or_default(),
            start_block: self.start_block,
            poll_interval_ms: poll_interval_ms(self.poll_interval),
            batch_size: self.batch_size,
            max_log_range: self.max_log_range,
            confirmations: self.confirmations,
            event_names: DEFAULT_EVENT_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout)
    }
}

/// Seconds to whole milliseconds. Non-positive and NaN map to 0, which
/// `IndexerConfig::validate` rejects.
fn poll_interval_ms(secs: f64) -> u64 {
    if secs.is_finite() && secs > 0.0 {
        (secs * 1000.0).round() as u64
    } else {
        0
    }
}
