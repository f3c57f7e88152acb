//! giftindex: event indexer for the GiftCredits1155 contract.
//!
//! # Commands
//! ```text
//! giftindex run                       poll until Ctrl-C
//! giftindex once                      run a single cycle, print the report
//! giftindex status                    checkpoint and stored event count
//! giftindex events [--name N] [--limit L]
//! giftindex reset                     forget the checkpoint
//! giftindex info                      known events and defaults
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::sync::watch;
use tracing::info;

use giftindex_abi::{load_abi, EventDecoder};
use giftindex_core::indexer::DEFAULT_EVENT_NAMES;
use giftindex_core::{CheckpointManager, IndexStore};
use giftindex_evm::{Poller, RpcChainClient};
use giftindex_rpc::{HttpClientConfig, HttpRpcClient};

mod config;
mod logging;

use config::IndexerArgs;
use logging::{init_tracing, LogConfig};

#[derive(Parser)]
#[command(
    name = "giftindex",
    about = "Index GiftCredits1155 events into SQLite or Postgres",
    long_about = "
Polls an EVM JSON-RPC node for GiftCredits1155 logs, decodes them against the
contract ABI, and stores them together with a resumable checkpoint.

ENVIRONMENT VARIABLES:
  RPC_HTTP_URL            JSON-RPC endpoint
  GIFT_CONTRACT_ADDRESS   contract address (required for run/once)
  GIFT_CONTRACT_ABI       path to the ABI / deployment artifact
  DATABASE_URL            sqlite:<path> | postgres://… | memory
  INDEXER_*               start block, poll interval, batch size, source, …
  RUST_LOG                log filter (overrides --log-level)
",
    version
)]
struct Cli {
    #[command(flatten)]
    indexer: IndexerArgs,

    /// Default log level when RUST_LOG is unset
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Emit JSON structured logs
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the chain until interrupted
    Run,

    /// Run exactly one cycle and print its outcome as JSON
    Once,

    /// Show the checkpoint and stored event count
    Status,

    /// Print stored events as JSON lines
    Events {
        /// Only events with this name (ordered by block), otherwise most recent first
        #[arg(long)]
        name: Option<String>,
        /// Maximum number of events
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Delete the checkpoint so indexing restarts from the start block
    Reset,

    /// Show known events and defaults
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&LogConfig {
        level: cli.log_level.clone(),
        json: cli.log_json,
    });

    match &cli.command {
        Commands::Run => cmd_run(&cli.indexer).await,
        Commands::Once => cmd_once(&cli.indexer).await,
        Commands::Status => cmd_status(&cli.indexer).await,
        Commands::Events { name, limit } => {
            cmd_events(&cli.indexer, name.as_deref(), *limit).await
        }
        Commands::Reset => cmd_reset(&cli.indexer).await,
        Commands::Info => cmd_info(&cli.indexer),
    }
}

// ─── Wiring ──────────────────────────────────────────────────────────────────

async fn open_store(args: &IndexerArgs) -> Result<Arc<dyn IndexStore>> {
    giftindex_storage::open(&args.database_url)
        .await
        .with_context(|| format!("opening store {}", args.database_url))
}

async fn build_poller(args: &IndexerArgs) -> Result<Poller<RpcChainClient<HttpRpcClient>>> {
    let config = args.indexer_config();
    config.validate().context("invalid indexer configuration")?;

    let abi = load_abi(&args.abi).with_context(|| format!("loading ABI from {}", args.abi))?;
    let decoder = EventDecoder::from_abi(&abi, config.event_names.as_slice())
        .context("building event decoders")?;

    let transport = HttpRpcClient::new(
        args.rpc_url.clone(),
        HttpClientConfig {
            request_timeout: args.rpc_timeout(),
        },
    )
    .context("creating RPC client")?;

    let store = open_store(args).await?;
    Ok(Poller::new(config, RpcChainClient::new(transport), decoder, store)?)
}

// ─── Commands ────────────────────────────────────────────────────────────────

async fn cmd_run(args: &IndexerArgs) -> Result<()> {
    let mut poller = build_poller(args).await?;
    let (tx, rx) = watch::channel(false);

    tokio::spawn(forward_shutdown(tokio::signal::ctrl_c(), tx));

    poller.run(rx).await?;
    Ok(())
}

/// Flip `tx` to `true` once `signal` fires. If the signal cannot be
/// listened for, `tx` is held forever: a dropped sender stops the poller.
async fn forward_shutdown<F>(signal: F, tx: watch::Sender<bool>)
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        tracing::error!(error = %e, "cannot listen for Ctrl-C, stop the process to exit");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested, finishing current cycle");
    let _ = tx.send(true);
}

async fn cmd_once(args: &IndexerArgs) -> Result<()> {
    let mut poller = build_poller(args).await?;
    let outcome = poller.run_cycle().await.context("poll cycle failed")?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn cmd_status(args: &IndexerArgs) -> Result<()> {
    let store = open_store(args).await?;
    let manager = CheckpointManager::new(Arc::clone(&store), args.source.clone(), args.start_block);
    let saved = manager.load().await?;
    let events = store.event_count().await?;

    let status = match saved {
        Some(cp) => json!({
            "source": cp.source,
            "checkpoint": cp.block_number,
            "updated_at": chrono::DateTime::from_timestamp(cp.updated_at, 0).map(|t| t.to_rfc3339()),
            "events": events,
        }),
        None => json!({
            "source": manager.source(),
            "checkpoint": manager.start_block(),
            "updated_at": null,
            "events": events,
        }),
    };
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

async fn cmd_events(args: &IndexerArgs, name: Option<&str>, limit: usize) -> Result<()> {
    let store = open_store(args).await?;
    let events = match name {
        Some(name) => store.events_by_name(name, limit).await?,
        None => store.recent_events(limit).await?,
    };
    for event in events {
        println!("{}", serde_json::to_string(&event)?);
    }
    Ok(())
}

async fn cmd_reset(args: &IndexerArgs) -> Result<()> {
    let store = open_store(args).await?;
    let manager = CheckpointManager::new(store, args.source.clone(), args.start_block);
    manager.reset().await?;
    println!(
        "checkpoint for '{}' removed; next run starts after block {}",
        manager.source(),
        manager.start_block()
    );
    Ok(())
}

fn cmd_info(args: &IndexerArgs) -> Result<()> {
    println!("giftindex v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("RPC:        {}", args.rpc_url);
    println!("Contract:   {}", args.contract.as_deref().unwrap_or("(unset)"));
    println!("ABI:        {}", args.abi);
    println!("Database:   {}", args.database_url);
    println!("Source:     {}", args.source);
    println!("Start:      {}", args.start_block);
    println!();
    println!("Events (decode priority order):");

    // The ABI is optional here; without it only names are shown.
    let decoder = load_abi(&args.abi)
        .ok()
        .and_then(|abi| EventDecoder::from_abi(&abi, DEFAULT_EVENT_NAMES).ok());
    match decoder {
        Some(decoder) => {
            for d in decoder.decoders() {
                println!("  0x{}  {}", hex::encode(d.selector()), d.signature());
            }
        }
        None => {
            for name in DEFAULT_EVENT_NAMES {
                println!("  {name}");
            }
        }
    }
    Ok(())
}
