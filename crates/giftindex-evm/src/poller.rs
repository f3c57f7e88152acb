//! The poll loop: one atomic cycle per tick.
//!
//! Each cycle:
//!   1. Fetching  : checkpoint `c`, confirmed head `h`; stop if `h <= c`
//!   2. Fetching  : logs for `[c + 1, h]`
//!   3. Decoding  : ordered decoders; removed and unknown logs are skipped
//!   4. Persisting: every record appended through one unit of work
//!   5. Advancing : checkpoint set to `h` in that same unit, then commit
//!
//! A failure anywhere before the commit drops the unit of work, so the
//! checkpoint only ever moves together with the records below it.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use giftindex_abi::EventDecoder;
use giftindex_core::{
    AppendOutcome, CheckpointManager, Cursor, IndexStore, IndexerConfig, IndexerError,
    PollerState,
};

use crate::client::ChainClient;
use crate::fetcher::EvmFetcher;

/// Counters for one indexed range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub from: u64,
    pub to: u64,
    /// Logs returned by the node.
    pub fetched: usize,
    /// Records newly stored.
    pub inserted: usize,
    /// Records already present from an earlier run.
    pub duplicates: usize,
    /// Logs no known decoder accepted.
    pub unrecognized: usize,
    /// Logs flagged `removed` by the node.
    pub skipped_removed: usize,
}

/// Result of a successful cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Confirmed head has not passed the checkpoint. Nothing was touched.
    UpToDate { checkpoint: u64, head: u64 },
    /// A range was indexed and the checkpoint moved to `report.to`.
    Indexed(CycleReport),
}

/// Totals across every cycle this poller has run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PollerStats {
    pub cycles: u64,
    pub idle_cycles: u64,
    pub failed_cycles: u64,
    pub fetched: u64,
    pub inserted: u64,
    pub duplicates: u64,
    pub unrecognized: u64,
    pub skipped_removed: u64,
    pub last_block: Option<u64>,
}

impl PollerStats {
    fn record(&mut self, outcome: &CycleOutcome) {
        self.cycles += 1;
        match outcome {
            CycleOutcome::UpToDate { .. } => self.idle_cycles += 1,
            CycleOutcome::Indexed(r) => {
                self.fetched += r.fetched as u64;
                self.inserted += r.inserted as u64;
                self.duplicates += r.duplicates as u64;
                self.unrecognized += r.unrecognized as u64;
                self.skipped_removed += r.skipped_removed as u64;
                self.last_block = Some(r.to);
            }
        }
    }
}

/// Drives the indexing cycle for one contract and one checkpoint source.
pub struct Poller<C> {
    config: IndexerConfig,
    fetcher: EvmFetcher<C>,
    decoder: EventDecoder,
    store: Arc<dyn IndexStore>,
    checkpoint: CheckpointManager,
    state: PollerState,
    stats: PollerStats,
}

impl<C: ChainClient> Poller<C> {
    /// Validates `config` and wires the poller together.
    pub fn new(
        config: IndexerConfig,
        client: C,
        decoder: EventDecoder,
        store: Arc<dyn IndexStore>,
    ) -> Result<Self, IndexerError> {
        config.validate()?;
        let checkpoint =
            CheckpointManager::new(Arc::clone(&store), config.source.clone(), config.start_block);
        Ok(Self {
            fetcher: EvmFetcher::new(client),
            decoder,
            store,
            checkpoint,
            state: PollerState::Idle,
            stats: PollerStats::default(),
            config,
        })
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    pub fn stats(&self) -> &PollerStats {
        &self.stats
    }

    pub fn checkpoint(&self) -> &CheckpointManager {
        &self.checkpoint
    }

    /// Run one cycle. On error nothing has been committed.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, IndexerError> {
        let result = self.cycle().await;
        self.state = PollerState::Idle;
        match &result {
            Ok(outcome) => self.stats.record(outcome),
            Err(_) => self.stats.failed_cycles += 1,
        }
        result
    }

    async fn cycle(&mut self) -> Result<CycleOutcome, IndexerError> {
        self.state = PollerState::Fetching;
        let last = self.checkpoint.get().await?;
        let cursor = Cursor::new(last, self.config.confirmations);
        let head = self.fetcher.head_block_number().await?;

        let Some((from, to)) = cursor.next_range(head) else {
            debug!(checkpoint = last, head, "up to date");
            return Ok(CycleOutcome::UpToDate {
                checkpoint: last,
                head,
            });
        };

        let width = to - from + 1;
        if width > self.config.batch_size {
            info!(from, to, width, batch_size = self.config.batch_size, "range wider than batch size");
        }

        let logs = self
            .fetcher
            .logs(&self.config.contract_address, from, to, self.config.max_log_range)
            .await?;

        self.state = PollerState::Decoding;
        let mut report = CycleReport {
            from,
            to,
            fetched: logs.len(),
            ..Default::default()
        };
        let mut records = Vec::with_capacity(logs.len());
        for log in &logs {
            if log.is_removed() {
                report.skipped_removed += 1;
                continue;
            }
            let decoded = match self.decoder.decode(log) {
                Ok(d) => d,
                Err(e) => {
                    report.unrecognized += 1;
                    warn!(tx = %log.tx_hash, log_index = %log.log_index, error = %e, "skipping log");
                    continue;
                }
            };
            match log.into_record(decoded.event_name, decoded.args) {
                Ok(record) => records.push(record),
                Err(e) => {
                    report.unrecognized += 1;
                    warn!(error = %e, "skipping log");
                }
            }
        }

        self.state = PollerState::Persisting;
        let mut uow = self.store.begin().await?;
        for record in &records {
            match uow.append(record).await? {
                AppendOutcome::Inserted => report.inserted += 1,
                AppendOutcome::Duplicate => report.duplicates += 1,
            }
        }

        self.state = PollerState::Advancing;
        uow.set_checkpoint(self.checkpoint.source(), to).await?;
        uow.commit().await?;

        info!(
            from,
            to,
            fetched = report.fetched,
            inserted = report.inserted,
            duplicates = report.duplicates,
            unrecognized = report.unrecognized,
            "cycle committed"
        );
        Ok(CycleOutcome::Indexed(report))
    }

    /// Poll until `shutdown` turns `true` (or its sender is dropped).
    ///
    /// Cycle errors are logged and retried on the next tick. Shutdown is
    /// only observed between cycles, never in the middle of one.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), IndexerError> {
        info!(
            source = %self.config.source,
            contract = %self.config.contract_address,
            start = self.config.start_block,
            events = self.decoder.len(),
            "poller starting"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.run_cycle().await {
                Ok(_) => {}
                Err(e) if e.is_fatal() => {
                    self.state = PollerState::Stopped;
                    return Err(e);
                }
                Err(e) => warn!(error = %e, "cycle failed, retrying next tick"),
            }

            self.state = PollerState::Sleeping;
            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval()) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        self.state = PollerState::Stopped;
        info!(
            cycles = self.stats.cycles,
            inserted = self.stats.inserted,
            last_block = ?self.stats.last_block,
            "poller stopped"
        );
        Ok(())
    }
}
