//! Error types for the indexing pipeline.

use thiserror::Error;

/// Errors that can occur during indexing.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// The chain RPC failed or timed out. The cycle is aborted and retried.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The persistent store failed. The cycle's unit of work is rolled back.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid or missing configuration. Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A log entry returned by the node could not be interpreted.
    #[error("Malformed log {tx_hash}#{log_index}: {reason}")]
    MalformedLog {
        tx_hash: String,
        log_index: String,
        reason: String,
    },
}

impl IndexerError {
    /// Returns `true` if the error came from the chain transport.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns `true` if the error is fatal and retrying cannot help.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
