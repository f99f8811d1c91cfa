//! consign-node — the consensus engine service binary.
//!
//! Startup sequence:
//!   1. Open (or initialise) the sled store
//!   2. Apply bootstrap participant records if provided
//!   3. Start the scheduler worker and the timeout pump
//!   4. Rehydrate timers from persisted deadlines
//!   5. Start the JSON-RPC 2.0 server

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use consign_bus::{EventBus, QueuePolicy};
use consign_core::config::EngineConfig;
use consign_core::event::topic;
use consign_engine::{Coordinator, StopController, TransferEngine};
use consign_rpc::RpcServer;
use consign_sched::{Clock, Scheduler, SystemClock};
use consign_store::{SledStore, Store};

mod bootstrap;

#[derive(Parser, Debug)]
#[command(
    name = "consign-node",
    version,
    about = "Two-party consensus engine for supply-chain custody transfers"
)]
struct Args {
    /// Directory for the persistent state database.
    #[arg(long, default_value = "~/.consign/data")]
    data_dir: PathBuf,

    /// JSON-RPC listen address.
    #[arg(long, default_value = "127.0.0.1:8650")]
    rpc_addr: SocketAddr,

    /// Path to an engine config JSON file (defaults apply when omitted).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to a bootstrap participants JSON file (applied only for
    /// records that do not exist yet).
    #[arg(long)]
    bootstrap: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,consign=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    info!("consign node starting");

    // ── Configuration ─────────────────────────────────────────────────────────
    let cfg = load_config(args.config.as_deref())?;

    // ── Store ─────────────────────────────────────────────────────────────────
    let data_dir = expand_tilde(&args.data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data dir {}", data_dir.display()))?;
    let store: Arc<dyn Store> =
        Arc::new(SledStore::open(&data_dir).context("opening state database")?);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // ── Bootstrap ─────────────────────────────────────────────────────────────
    if let Some(path) = args.bootstrap.as_deref() {
        bootstrap::apply_bootstrap(&*store, path, clock.now())
            .context("applying bootstrap records")?;
    }

    // ── Event bus + audit subscriber ──────────────────────────────────────────
    let bus = Arc::new(EventBus::new());
    let audit = bus.subscribe("audit", topic::ALL, QueuePolicy::Bounded(cfg.event_queue_cap));
    tokio::spawn(async move {
        while let Some(event) = audit.recv().await {
            info!(topic = event.topic(), ?event, "event");
        }
    });

    // ── Scheduler ─────────────────────────────────────────────────────────────
    let (sched, mut fired) = Scheduler::new();
    tokio::spawn(Arc::clone(&sched).run(Arc::clone(&clock)));

    // ── Engine + coordinator ──────────────────────────────────────────────────
    let engine = TransferEngine::new(
        Arc::clone(&store),
        Arc::clone(&bus),
        Arc::clone(&sched),
        Arc::clone(&clock),
        cfg.clone(),
    );
    let stops = StopController::new(
        Arc::clone(&store),
        Arc::clone(&bus),
        Arc::clone(&sched),
        Arc::clone(&clock),
        cfg,
    );
    let coordinator = Arc::new(Coordinator::new(engine, stops));

    // Replay persisted deadlines; anything already due fires immediately.
    coordinator.rehydrate().context("rehydrating timers")?;

    // ── Timeout pump ──────────────────────────────────────────────────────────
    let pump_coordinator = Arc::clone(&coordinator);
    tokio::spawn(async move {
        while let Some(key) = fired.recv().await {
            if let Err(e) = pump_coordinator.handle_timer(&key) {
                warn!(error = %e, ?key, "timer handling failed");
            }
        }
    });

    // ── RPC server ────────────────────────────────────────────────────────────
    let _rpc_handle = RpcServer::new(Arc::clone(&coordinator))
        .start(args.rpc_addr)
        .await
        .context("starting RPC server")?;

    info!("node ready");
    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;

    info!("shutting down");
    sched.stop();
    store.flush().context("flushing store")?;
    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    let Some(p) = path else {
        return Ok(EngineConfig::default());
    };
    let json = std::fs::read_to_string(p)
        .with_context(|| format!("reading engine config from {}", p.display()))?;
    serde_json::from_str(&json).context("parsing engine config JSON")
}

/// Expand a leading `~` to the user's home directory (`HOME` or `USERPROFILE`).
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
