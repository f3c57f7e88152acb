//! EVM log fetcher.
//!
//! Wraps a [`ChainClient`] and optionally splits wide ranges into several
//! `eth_getLogs` calls for nodes that cap the block span per request.

use giftindex_core::{IndexerError, RawLog};

use crate::client::ChainClient;

/// Fetcher that adds range chunking on top of a [`ChainClient`].
pub struct EvmFetcher<C> {
    client: C,
}

impl<C: ChainClient> EvmFetcher<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Fetch the current chain head block number.
    pub async fn head_block_number(&self) -> Result<u64, IndexerError> {
        self.client.latest_block().await
    }

    /// Fetch all logs of `address` in `[from, to]`.
    ///
    /// With `max_range = Some(n)` each call covers at most `n` blocks.
    /// Chunks are fetched in order; the first failure fails the whole range.
    pub async fn logs(
        &self,
        address: &str,
        from: u64,
        to: u64,
        max_range: Option<u64>,
    ) -> Result<Vec<RawLog>, IndexerError> {
        if to < from {
            return Ok(vec![]);
        }
        let span = match max_range {
            Some(n) if n > 0 && to - from >= n => n,
            _ => return self.client.get_logs(address, from, to).await,
        };

        let mut all_logs = Vec::new();
        let mut start = from;
        while start <= to {
            let end = start.saturating_add(span - 1).min(to);
            let chunk = self.client.get_logs(address, start, end).await?;
            tracing::trace!(start, end, logs = chunk.len(), "log chunk fetched");
            all_logs.extend(chunk);
            if end == u64::MAX {
                break;
            }
            start = end + 1;
        }
        Ok(all_logs)
    }
}
