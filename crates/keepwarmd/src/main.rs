//! keepwarmd — the KeepWarm daemon.
//!
//! Single binary that assembles the keep-alive service:
//! - Target store (redb)
//! - Prober (HTTP client)
//! - Scheduler core (per-target probe timers)
//! - REST control surface
//!
//! # Usage
//!
//! ```text
//! keepwarmd run --port 8100 --data-dir /var/lib/keepwarm
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(name = "keepwarmd", about = "KeepWarm keep-alive daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the keep-alive service.
    Run {
        /// Port for the REST control surface.
        #[arg(long, default_value = "8100")]
        port: u16,

        /// Data directory for the persistent target store.
        #[arg(long, default_value = "/var/lib/keepwarm")]
        data_dir: PathBuf,

        /// Per-probe timeout in seconds.
        #[arg(long, default_value = "10")]
        probe_timeout: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,keepwarmd=debug,keepwarm=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            port,
            data_dir,
            probe_timeout,
        } => run(port, data_dir, probe_timeout).await,
    }
}

async fn run(port: u16, data_dir: PathBuf, probe_timeout: u64) -> anyhow::Result<()> {
    info!("KeepWarm daemon starting");

    // Ensure data directory exists.
    std::fs::create_dir_all(&data_dir)?;
    let db_path = data_dir.join("keepwarm.redb");

    // ── Initialize subsystems ──────────────────────────────────

    let store = keepwarm_state::TargetStore::open(&db_path)?;
    info!(path = ?db_path, "target store opened");

    let prober = keepwarm_prober::Prober::with_timeout(Duration::from_secs(probe_timeout));
    info!(timeout_secs = probe_timeout, "prober initialized");

    let scheduler = Arc::new(keepwarm_scheduler::SchedulerCore::new(store, prober));

    // Re-arm persisted active targets with freshly drawn delays.
    scheduler.start().await?;

    // ── Start API server ───────────────────────────────────────

    let router = keepwarm_api::build_router(scheduler.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "control surface starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
        info!("shutdown signal received");
    });

    server.await?;

    scheduler.stop_all().await;

    info!("KeepWarm daemon stopped");
    Ok(())
}
