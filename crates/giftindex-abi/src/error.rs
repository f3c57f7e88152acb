//! Error types for ABI loading and event decoding.

use std::path::PathBuf;

use giftindex_core::RawLog;
use thiserror::Error;

/// Errors raised while loading the contract interface. Fatal at startup.
#[derive(Debug, Error)]
pub enum AbiError {
    #[error("cannot read ABI file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid ABI JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ABI document has neither an \"abi\" array nor a top-level array")]
    MissingAbi,

    #[error("event '{name}' is not declared in the contract ABI")]
    EventNotFound { name: String },

    #[error("no events selected for decoding")]
    NoEvents,
}

/// Errors raised while decoding a single log. Never fatal to a cycle.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid topic {topic}: {reason}")]
    InvalidTopic { topic: String, reason: String },

    #[error("invalid log data: {0}")]
    InvalidData(String),

    /// One decoder rejected the log.
    #[error("{event}: {reason}")]
    Mismatch { event: String, reason: String },

    /// No decoder accepted the log.
    #[error("unknown event (topic0 {topic0}) at {}#{}", .log.tx_hash, .log.log_index)]
    UnknownEvent { topic0: String, log: Box<RawLog> },
}

impl DecodeError {
    /// The raw log, when the error is an unknown event.
    pub fn raw_log(&self) -> Option<&RawLog> {
        match self {
            Self::UnknownEvent { log, .. } => Some(log),
            _ => None,
        }
    }
}
