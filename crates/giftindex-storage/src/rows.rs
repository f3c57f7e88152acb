//! Helpers shared by the sqlx backends.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use giftindex_core::{EventRecord, IndexerError};

pub(crate) fn db_err(e: sqlx::Error) -> IndexerError {
    IndexerError::Storage(e.to_string())
}

/// Args are stored as JSON text; key order is the ABI declaration order.
pub(crate) fn encode_args(record: &EventRecord) -> Result<String, IndexerError> {
    serde_json::to_string(&record.args)
        .map_err(|e| IndexerError::Storage(format!("serialize args: {e}")))
}

pub(crate) fn record_from_columns(
    tx_hash: String,
    log_index: i64,
    event_name: String,
    block_number: i64,
    args: &str,
    created_at: DateTime<Utc>,
) -> Result<EventRecord, IndexerError> {
    let args: IndexMap<String, serde_json::Value> = serde_json::from_str(args)
        .map_err(|e| IndexerError::Storage(format!("corrupt args for {tx_hash}: {e}")))?;
    Ok(EventRecord {
        tx_hash,
        log_index: log_index as u64,
        event_name,
        block_number: block_number as u64,
        args,
        created_at,
    })
}
