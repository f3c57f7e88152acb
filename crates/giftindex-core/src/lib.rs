//! giftindex-core: foundation for the GiftCredits event indexer.
//!
//! # Architecture
//!
//! ```text
//! IndexerBuilder → Poller
//!                    ├── ChainClient        (eth_blockNumber / eth_getLogs)
//!                    ├── EventDecoder       (ordered ABI event decoders)
//!                    ├── CheckpointManager  (resumable cursor)
//!                    └── IndexStore         (memory / SQLite / Postgres)
//!                          └── UnitOfWork   (records + cursor, one commit)
//! ```

pub mod checkpoint;
pub mod cursor;
pub mod error;
pub mod indexer;
pub mod store;
pub mod types;

pub use checkpoint::{Checkpoint, CheckpointManager};
pub use cursor::Cursor;
pub use error::IndexerError;
pub use indexer::{IndexerConfig, PollerState};
pub use store::{AppendOutcome, IndexStore, UnitOfWork};
pub use types::{EventRecord, RawLog};
