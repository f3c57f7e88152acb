//! Indexer configuration and state types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::IndexerError;

/// Event names indexed by default, in decode priority order.
pub const DEFAULT_EVENT_NAMES: &[&str] = &[
    "GiftPurchased",
    "Tipped",
    "Withdrawn",
    "RedeemedToToken",
    "RedeemedToCredit",
    "GiftConfigUpdated",
    "TreasuryTransferred",
    "CreditsTransferred",
];

/// Default checkpoint source for the gift contract feed.
pub const DEFAULT_SOURCE: &str = "gift_credits";

/// Configuration for a poller instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Checkpoint key for this feed.
    pub source: String,
    /// Contract whose logs are indexed (`0x…`, 20 bytes).
    pub contract_address: String,
    /// Cursor value assumed when no checkpoint exists yet.
    pub start_block: u64,
    /// Delay between cycles (milliseconds).
    pub poll_interval_ms: u64,
    /// Advisory range width. Wider ranges are logged, never truncated.
    pub batch_size: u64,
    /// Split `eth_getLogs` calls into chunks of at most this many blocks.
    /// `None` = one call for the whole cycle range.
    pub max_log_range: Option<u64>,
    /// Blocks to stay behind the reported head.
    pub confirmations: u64,
    /// Event names to decode, in priority order.
    pub event_names: Vec<String>,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE.into(),
            contract_address: String::new(),
            start_block: 0,
            poll_interval_ms: 2000,
            batch_size: 100,
            max_log_range: None,
            confirmations: 0,
            event_names: DEFAULT_EVENT_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl IndexerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Reject configurations the poller cannot run with.
    pub fn validate(&self) -> Result<(), IndexerError> {
        if self.contract_address.is_empty() {
            return Err(IndexerError::Config("contract address not set".into()));
        }
        if !is_hex_address(&self.contract_address) {
            return Err(IndexerError::Config(format!(
                "invalid contract address: {}",
                self.contract_address
            )));
        }
        if self.source.trim().is_empty() {
            return Err(IndexerError::Config("checkpoint source must not be empty".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(IndexerError::Config("poll interval must be positive".into()));
        }
        if self.event_names.is_empty() {
            return Err(IndexerError::Config("no event names configured".into()));
        }
        if self.max_log_range == Some(0) {
            return Err(IndexerError::Config("max log range must be positive".into()));
        }
        Ok(())
    }
}

fn is_hex_address(s: &str) -> bool {
    s.strip_prefix("0x")
        .map(|h| h.len() == 40 && h.chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(false)
}

/// Where the poller is within its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollerState {
    /// Between cycles, about to read the checkpoint.
    Idle,
    /// Reading the checkpoint, chain head, and logs.
    Fetching,
    /// Running logs through the event decoder.
    Decoding,
    /// Appending records to the unit of work.
    Persisting,
    /// Moving the checkpoint and committing.
    Advancing,
    /// Waiting for the next tick.
    Sleeping,
    /// Shut down.
    Stopped,
}

impl std::fmt::Display for PollerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Fetching => write!(f, "fetching"),
            Self::Decoding => write!(f, "decoding"),
            Self::Persisting => write!(f, "persisting"),
            Self::Advancing => write!(f, "advancing"),
            Self::Sleeping => write!(f, "sleeping"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> IndexerConfig {
        IndexerConfig {
            contract_address: "0x3a8de1e232d9674626a49e0127dfd8cc3ad9cb68".into(),
            ..Default::default()
        }
    }

    #[test]
    fn defaults() {
        let cfg = IndexerConfig::default();
        assert_eq!(cfg.source, "gift_credits");
        assert_eq!(cfg.poll_interval(), Duration::from_secs(2));
        assert_eq!(cfg.event_names.len(), 8);
        assert_eq!(cfg.event_names[0], "GiftPurchased");
    }

    #[test]
    fn validate_accepts_good_config() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_address() {
        let err = IndexerConfig::default().validate().unwrap_err();
        assert!(matches!(err, IndexerError::Config(_)));
    }

    #[test]
    fn validate_rejects_bad_address() {
        let cfg = IndexerConfig {
            contract_address: "0x1234".into(),
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let cfg = IndexerConfig {
            poll_interval_ms: 0,
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn state_display() {
        assert_eq!(PollerState::Persisting.to_string(), "persisting");
    }
}
