//! End-to-end cycles against a scripted chain and the in-memory store.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use giftindex_abi::{load_abi, EventDecoder};
use giftindex_core::indexer::DEFAULT_EVENT_NAMES;
use giftindex_core::{
    AppendOutcome, Checkpoint, EventRecord, IndexStore, IndexerError, PollerState, RawLog,
    UnitOfWork,
};
use giftindex_evm::{ChainClient, CycleOutcome, IndexerBuilder, Poller};
use giftindex_storage::InMemoryStorage;

const CONTRACT: &str = "0x3a8de1e232d9674626a49e0127dfd8cc3ad9cb68";
const STREAMER: &str = "70997970c51812dc3a010c7d01b50e0d17dc79c8";
const USER: &str = "3c44cdddb6a900fa2b585dd299e03d12fa4293bc";

// ─── Scripted chain ───────────────────────────────────────────────────────────

#[derive(Default)]
struct MockChain {
    head: Mutex<u64>,
    logs: Mutex<Vec<RawLog>>,
    log_calls: Mutex<Vec<(u64, u64)>>,
    fail_logs: Mutex<bool>,
}

impl MockChain {
    fn new(head: u64, logs: Vec<RawLog>) -> Arc<Self> {
        Arc::new(Self {
            head: Mutex::new(head),
            logs: Mutex::new(logs),
            ..Default::default()
        })
    }

    fn set_head(&self, head: u64) {
        *self.head.lock().unwrap() = head;
    }

    fn calls(&self) -> Vec<(u64, u64)> {
        self.log_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn latest_block(&self) -> Result<u64, IndexerError> {
        Ok(*self.head.lock().unwrap())
    }

    async fn get_logs(
        &self,
        address: &str,
        from: u64,
        to: u64,
    ) -> Result<Vec<RawLog>, IndexerError> {
        assert_eq!(address, CONTRACT);
        self.log_calls.lock().unwrap().push((from, to));
        if *self.fail_logs.lock().unwrap() {
            return Err(IndexerError::Transport("connection reset".into()));
        }
        Ok(self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|l| {
                let b = l.block_number_u64().unwrap();
                b >= from && b <= to
            })
            .cloned()
            .collect())
    }
}

// ─── Store whose commit can be made to fail ──────────────────────────────────

struct FlakyStore {
    inner: InMemoryStorage,
    fail_commit: Arc<Mutex<bool>>,
}

struct FlakyUnit {
    inner: Box<dyn UnitOfWork>,
    fail_commit: bool,
}

#[async_trait]
impl UnitOfWork for FlakyUnit {
    async fn append(&mut self, record: &EventRecord) -> Result<AppendOutcome, IndexerError> {
        self.inner.append(record).await
    }

    async fn set_checkpoint(&mut self, source: &str, block: u64) -> Result<(), IndexerError> {
        self.inner.set_checkpoint(source, block).await
    }

    async fn commit(self: Box<Self>) -> Result<(), IndexerError> {
        if self.fail_commit {
            // inner is dropped uncommitted
            return Err(IndexerError::Storage("disk I/O error".into()));
        }
        self.inner.commit().await
    }
}

#[async_trait]
impl IndexStore for FlakyStore {
    async fn load_checkpoint(&self, source: &str) -> Result<Option<Checkpoint>, IndexerError> {
        self.inner.load_checkpoint(source).await
    }

    async fn delete_checkpoint(&self, source: &str) -> Result<(), IndexerError> {
        self.inner.delete_checkpoint(source).await
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, IndexerError> {
        Ok(Box::new(FlakyUnit {
            inner: self.inner.begin().await?,
            fail_commit: *self.fail_commit.lock().unwrap(),
        }))
    }

    async fn event_count(&self) -> Result<u64, IndexerError> {
        self.inner.event_count().await
    }

    async fn events_by_name(
        &self,
        event_name: &str,
        limit: usize,
    ) -> Result<Vec<EventRecord>, IndexerError> {
        self.inner.events_by_name(event_name, limit).await
    }

    async fn recent_events(&self, limit: usize) -> Result<Vec<EventRecord>, IndexerError> {
        self.inner.recent_events(limit).await
    }
}

// ─── Log builders ─────────────────────────────────────────────────────────────

fn decoder() -> EventDecoder {
    let mut path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.pop();
    path.pop();
    path.push("fixtures/GiftCredits1155.json");
    let abi = load_abi(path).unwrap();
    EventDecoder::from_abi(&abi, DEFAULT_EVENT_NAMES).unwrap()
}

fn selector(name: &str) -> String {
    let d = decoder();
    let dec = d.decoders().iter().find(|d| d.name() == name).unwrap();
    format!("0x{}", hex::encode(dec.selector()))
}

fn word(n: u64) -> String {
    format!("{n:064x}")
}

fn addr(a: &str) -> String {
    format!("0x{a:0>64}")
}

fn log_at(block: u64, log_index: u64, topics: Vec<String>, data: String) -> RawLog {
    RawLog {
        address: CONTRACT.into(),
        topics,
        data,
        block_number: format!("{block:#x}"),
        block_hash: format!("0x{block:064x}"),
        tx_hash: format!("0x{:064x}", block * 1_000 + log_index),
        log_index: format!("{log_index:#x}"),
        removed: Some(false),
    }
}

fn tipped(block: u64, log_index: u64) -> RawLog {
    log_at(
        block,
        log_index,
        vec![selector("Tipped"), addr(STREAMER), addr(USER), format!("0x{}", word(1))],
        format!("0x{}{}", word(2), word(block)),
    )
}

fn purchased(block: u64) -> RawLog {
    log_at(
        block,
        0,
        vec![selector("GiftPurchased"), addr(USER), format!("0x{}", word(1))],
        format!("0x{}{}", word(5), word(5_000_000_000_000_000)),
    )
}

fn foreign(block: u64) -> RawLog {
    // ERC-1155 TransferSingle, emitted by the same contract but not indexed
    log_at(
        block,
        1,
        vec![
            format!("0x{}", "c3".repeat(32)),
            addr(USER),
            addr(USER),
            addr(STREAMER),
        ],
        format!("0x{}{}", word(1), word(1)),
    )
}

fn poller(chain: Arc<MockChain>, store: Arc<dyn IndexStore>, start: u64) -> Poller<Arc<MockChain>> {
    IndexerBuilder::new()
        .contract(CONTRACT)
        .start_block(start)
        .poll_interval_ms(10)
        .build(chain, decoder(), store)
        .unwrap()
}

async fn checkpoint(store: &Arc<dyn IndexStore>) -> Option<u64> {
    store
        .load_checkpoint("gift_credits")
        .await
        .unwrap()
        .map(|c| c.block_number)
}

async fn seed_checkpoint(store: &Arc<dyn IndexStore>, block: u64) {
    let mut uow = store.begin().await.unwrap();
    uow.set_checkpoint("gift_credits", block).await.unwrap();
    uow.commit().await.unwrap();
}

fn indexed(outcome: CycleOutcome) -> giftindex_evm::CycleReport {
    match outcome {
        CycleOutcome::Indexed(r) => r,
        other => panic!("expected Indexed, got {other:?}"),
    }
}

// ─── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn fresh_start_with_no_logs_advances_checkpoint() {
    let chain = MockChain::new(105, vec![]);
    let store: Arc<dyn IndexStore> = Arc::new(InMemoryStorage::new());
    let mut p = poller(Arc::clone(&chain), Arc::clone(&store), 100);

    let report = indexed(p.run_cycle().await.unwrap());
    assert_eq!((report.from, report.to), (101, 105));
    assert_eq!(report.inserted, 0);
    assert_eq!(chain.calls(), vec![(101, 105)]);
    assert_eq!(checkpoint(&store).await, Some(105));
    assert_eq!(store.event_count().await.unwrap(), 0);
    assert_eq!(p.state(), PollerState::Idle);
}

#[tokio::test]
async fn catches_up_and_rerun_stores_nothing() {
    let chain = MockChain::new(110, vec![tipped(106, 0), purchased(108), tipped(110, 2)]);
    let store: Arc<dyn IndexStore> = Arc::new(InMemoryStorage::new());
    seed_checkpoint(&store, 105).await;
    let mut p = poller(Arc::clone(&chain), Arc::clone(&store), 0);

    let report = indexed(p.run_cycle().await.unwrap());
    assert_eq!((report.from, report.to), (106, 110));
    assert_eq!(report.inserted, 3);
    assert_eq!(checkpoint(&store).await, Some(110));

    let tips = store.events_by_name("Tipped", 10).await.unwrap();
    assert_eq!(tips.len(), 2);
    assert_eq!(tips[0].block_number, 106);
    assert_eq!(tips[1].args["clientNonce"], serde_json::json!(110));

    // head unchanged: nothing to do
    assert!(matches!(
        p.run_cycle().await.unwrap(),
        CycleOutcome::UpToDate { checkpoint: 110, head: 110 }
    ));
    assert_eq!(store.event_count().await.unwrap(), 3);
}

#[tokio::test]
async fn up_to_date_does_not_fetch_or_write() {
    let chain = MockChain::new(200, vec![tipped(200, 0)]);
    let store: Arc<dyn IndexStore> = Arc::new(InMemoryStorage::new());
    seed_checkpoint(&store, 200).await;
    let before = store.load_checkpoint("gift_credits").await.unwrap();
    let mut p = poller(Arc::clone(&chain), Arc::clone(&store), 0);

    let outcome = p.run_cycle().await.unwrap();
    assert_eq!(outcome, CycleOutcome::UpToDate { checkpoint: 200, head: 200 });
    assert!(chain.calls().is_empty());
    assert_eq!(store.load_checkpoint("gift_credits").await.unwrap(), before);
    assert_eq!(store.event_count().await.unwrap(), 0);
    assert_eq!(p.stats().idle_cycles, 1);
}

// ─── Properties ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn reingesting_a_range_is_idempotent() {
    let chain = MockChain::new(110, vec![tipped(106, 0), purchased(108)]);
    let store: Arc<dyn IndexStore> = Arc::new(InMemoryStorage::new());
    let mut p = poller(Arc::clone(&chain), Arc::clone(&store), 105);
    indexed(p.run_cycle().await.unwrap());

    // operator reset: same range again
    p.checkpoint().reset().await.unwrap();
    let report = indexed(p.run_cycle().await.unwrap());
    assert_eq!(report.inserted, 0);
    assert_eq!(report.duplicates, 2);
    assert_eq!(store.event_count().await.unwrap(), 2);
    assert_eq!(checkpoint(&store).await, Some(110));
}

#[tokio::test]
async fn checkpoint_is_monotonic_across_cycles() {
    let chain = MockChain::new(103, vec![tipped(102, 0), tipped(107, 0)]);
    let store: Arc<dyn IndexStore> = Arc::new(InMemoryStorage::new());
    let mut p = poller(Arc::clone(&chain), Arc::clone(&store), 100);

    let mut seen = vec![];
    for head in [103, 103, 101, 108, 108] {
        chain.set_head(head);
        p.run_cycle().await.unwrap();
        seen.push(checkpoint(&store).await.unwrap());
    }
    assert_eq!(seen, vec![103, 103, 103, 108, 108]);
    assert_eq!(store.event_count().await.unwrap(), 2);
}

#[tokio::test]
async fn failed_commit_leaves_store_untouched() {
    let chain = MockChain::new(110, vec![tipped(106, 0), purchased(108)]);
    let fail_commit = Arc::new(Mutex::new(false));
    let store: Arc<dyn IndexStore> = Arc::new(FlakyStore {
        inner: InMemoryStorage::new(),
        fail_commit: Arc::clone(&fail_commit),
    });
    seed_checkpoint(&store, 105).await;
    *fail_commit.lock().unwrap() = true;
    let mut p = poller(Arc::clone(&chain), Arc::clone(&store), 0);

    let err = p.run_cycle().await.unwrap_err();
    assert!(matches!(err, IndexerError::Storage(_)));
    assert_eq!(store.event_count().await.unwrap(), 0);
    assert_eq!(checkpoint(&store).await, Some(105));
    assert_eq!(p.stats().failed_cycles, 1);

    // recovery on the next tick re-covers the same range
    *fail_commit.lock().unwrap() = false;
    let report = indexed(p.run_cycle().await.unwrap());
    assert_eq!((report.from, report.to), (106, 110));
    assert_eq!(report.inserted, 2);
    assert_eq!(checkpoint(&store).await, Some(110));
}

#[tokio::test]
async fn transport_failure_aborts_cycle() {
    let chain = MockChain::new(110, vec![tipped(106, 0)]);
    *chain.fail_logs.lock().unwrap() = true;
    let store: Arc<dyn IndexStore> = Arc::new(InMemoryStorage::new());
    let mut p = poller(Arc::clone(&chain), Arc::clone(&store), 105);

    assert!(p.run_cycle().await.unwrap_err().is_transport());
    assert_eq!(checkpoint(&store).await, None);
    assert_eq!(store.event_count().await.unwrap(), 0);
}

#[tokio::test]
async fn unknown_and_removed_logs_do_not_block_the_batch() {
    let mut removed = purchased(107);
    removed.removed = Some(true);
    let chain = MockChain::new(
        110,
        vec![tipped(106, 0), foreign(106), removed, purchased(108)],
    );
    let store: Arc<dyn IndexStore> = Arc::new(InMemoryStorage::new());
    let mut p = poller(Arc::clone(&chain), Arc::clone(&store), 105);

    let report = indexed(p.run_cycle().await.unwrap());
    assert_eq!(report.fetched, 4);
    assert_eq!(report.inserted, 2);
    assert_eq!(report.unrecognized, 1);
    assert_eq!(report.skipped_removed, 1);
    assert_eq!(checkpoint(&store).await, Some(110));

    let stats = p.stats();
    assert_eq!(stats.unrecognized, 1);
    assert_eq!(stats.last_block, Some(110));
}

#[tokio::test]
async fn confirmations_and_chunking() {
    let chain = MockChain::new(120, vec![tipped(106, 0), tipped(115, 0), tipped(119, 0)]);
    let store: Arc<dyn IndexStore> = Arc::new(InMemoryStorage::new());
    let mut p = IndexerBuilder::new()
        .contract(CONTRACT)
        .start_block(100)
        .confirmations(2)
        .max_log_range(8)
        .build(Arc::clone(&chain), decoder(), Arc::clone(&store))
        .unwrap();

    let report = indexed(p.run_cycle().await.unwrap());
    assert_eq!((report.from, report.to), (101, 118));
    assert_eq!(chain.calls(), vec![(101, 108), (109, 116), (117, 118)]);
    assert_eq!(report.inserted, 2);
}

#[tokio::test]
async fn run_stops_on_shutdown() {
    let chain = MockChain::new(105, vec![tipped(103, 0)]);
    let store: Arc<dyn IndexStore> = Arc::new(InMemoryStorage::new());
    let mut p = poller(Arc::clone(&chain), Arc::clone(&store), 100);
    let (tx, rx) = watch::channel(false);

    let stopper = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
    };
    let (result, ()) = tokio::join!(p.run(rx), stopper);
    result.unwrap();

    assert_eq!(p.state(), PollerState::Stopped);
    assert!(p.stats().cycles >= 1);
    assert_eq!(checkpoint(&store).await, Some(105));
    assert_eq!(store.event_count().await.unwrap(), 1);
}

#[tokio::test]
async fn run_keeps_going_after_errors() {
    let chain = MockChain::new(105, vec![]);
    *chain.fail_logs.lock().unwrap() = true;
    let store: Arc<dyn IndexStore> = Arc::new(InMemoryStorage::new());
    let mut p = poller(Arc::clone(&chain), Arc::clone(&store), 100);
    let (tx, rx) = watch::channel(false);

    let stopper = async {
        tokio::time::sleep(Duration::from_millis(80)).await;
        tx.send(true).unwrap();
    };
    let (result, ()) = tokio::join!(p.run(rx), stopper);
    result.unwrap();

    assert!(p.stats().failed_cycles >= 2);
    assert_eq!(checkpoint(&store).await, None);
}

#[test]
fn invalid_config_is_rejected() {
    let chain = MockChain::new(0, vec![]);
    let err = IndexerBuilder::new()
        .contract("not-an-address")
        .build(chain, decoder(), Arc::new(InMemoryStorage::new()))
        .err()
        .unwrap();
    assert!(err.is_fatal());
}
