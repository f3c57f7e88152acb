//! Shared types for the indexing pipeline.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::IndexerError;

// ─── RawLog ───────────────────────────────────────────────────────────────────

/// A raw EVM log as returned by `eth_getLogs`.
///
/// Quantities stay hex-encoded exactly as the node sent them; use the
/// accessor methods to get numbers out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    #[serde(rename = "blockNumber")]
    pub block_number: String,
    #[serde(rename = "blockHash", default)]
    pub block_hash: String,
    #[serde(rename = "transactionHash")]
    pub tx_hash: String,
    #[serde(rename = "logIndex")]
    pub log_index: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed: Option<bool>,
}

impl RawLog {
    /// Returns the block number, or `None` if the node sent garbage.
    pub fn block_number_u64(&self) -> Option<u64> {
        parse_hex_u64(&self.block_number)
    }

    /// Returns the log index, or `None` if the node sent garbage.
    pub fn log_index_u64(&self) -> Option<u64> {
        parse_hex_u64(&self.log_index)
    }

    /// Returns `true` if this log was removed by a reorg.
    pub fn is_removed(&self) -> bool {
        self.removed.unwrap_or(false)
    }

    /// topics[0], the event selector for non-anonymous events.
    pub fn topic0(&self) -> Option<&str> {
        self.topics.first().map(String::as_str)
    }

    /// Build the stored record for this log once it has been decoded.
    pub fn into_record(
        &self,
        event_name: impl Into<String>,
        args: IndexMap<String, serde_json::Value>,
    ) -> Result<EventRecord, IndexerError> {
        let malformed = |reason: &str| IndexerError::MalformedLog {
            tx_hash: self.tx_hash.clone(),
            log_index: self.log_index.clone(),
            reason: reason.to_string(),
        };
        let block_number = self
            .block_number_u64()
            .ok_or_else(|| malformed("invalid blockNumber"))?;
        let log_index = self
            .log_index_u64()
            .ok_or_else(|| malformed("invalid logIndex"))?;

        Ok(EventRecord {
            tx_hash: self.tx_hash.to_ascii_lowercase(),
            log_index,
            event_name: event_name.into(),
            block_number,
            args,
            created_at: Utc::now(),
        })
    }
}

/// Parse a hex-encoded quantity (with or without `0x`) to u64.
pub fn parse_hex_u64(s: &str) -> Option<u64> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    if s.is_empty() {
        return None;
    }
    u64::from_str_radix(s, 16).ok()
}

/// Encode a u64 as a JSON-RPC hex quantity (`0x1a`).
pub fn to_hex_quantity(n: u64) -> String {
    format!("{n:#x}")
}

// ─── EventRecord ──────────────────────────────────────────────────────────────

/// One decoded contract event, as stored in `event_logs`.
///
/// `(tx_hash, log_index)` is the natural key; the ledger never reuses it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Transaction hash, lowercase `0x…`.
    pub tx_hash: String,
    /// Log index within the block.
    pub log_index: u64,
    /// Event name from the contract ABI (e.g. `"Tipped"`).
    pub event_name: String,
    /// Block the log was emitted in.
    pub block_number: u64,
    /// Decoded parameters in ABI declaration order.
    pub args: IndexMap<String, serde_json::Value>,
    /// Ingestion time (not chain time).
    pub created_at: DateTime<Utc>,
}

impl EventRecord {
    /// The uniqueness key of this record.
    pub fn key(&self) -> (&str, u64) {
        (self.tx_hash.as_str(), self.log_index)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
