//! Sanction Sweeper CLI
//!
//! Periodic job for the sanction workflows:
//! 1. Approves pending sanctions whose approval window elapsed
//! 2. Lifts approved embargoes whose end date passed
//!
//! Usage:
//!   cargo run --features cli --bin sanction_sweeper -- \
//!     --snapshot data/graph.json \
//!     --dry-run

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use tracing::info;

use osf_models::{FileSnapshotStore, ModelConfig, Registry, SnapshotStore};

/// Approve expired sanctions and complete due embargoes
#[derive(Parser, Debug)]
#[command(name = "sanction_sweeper")]
#[command(about = "Run the scheduled sanction sweeps against a graph snapshot")]
struct Args {
    /// Path of the JSON graph snapshot
    #[arg(long, short = 's', env = "OSF_SNAPSHOT_PATH")]
    snapshot: PathBuf,

    /// Evaluate windows as of this RFC 3339 instant instead of now
    #[arg(long)]
    now: Option<DateTime<Utc>>,

    /// Report what would change without saving
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    let now = args.now.unwrap_or_else(Utc::now);
    let config = ModelConfig::from_env();
    let store = Arc::new(FileSnapshotStore::new(&args.snapshot));

    if args.dry_run {
        let mut graph = store
            .load()
            .await
            .context("loading snapshot")?
            .with_context(|| format!("no snapshot at {}", args.snapshot.display()))?
            .with_config(config);
        let report = graph.sweep_sanctions(now)?;
        println!(
            "dry run: {} sanctions would be approved, {} embargoes would complete",
            report.approved.len(),
            report.completed.len()
        );
        return Ok(());
    }

    let registry = Registry::open(config, store).await?;
    let report = registry.sweep(now).await?;
    info!(
        approved = report.approved.len(),
        completed = report.completed.len(),
        "sweep finished"
    );
    for id in &report.approved {
        println!("approved {}", id);
    }
    for id in &report.completed {
        println!("completed {}", id);
    }
    Ok(())
}
