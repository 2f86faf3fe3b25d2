//! Command-line interface for binlog-sync
//!
//! # Usage
//! ```bash
//! # run a pipeline described by a TOML file
//! binlog-sync --config pipelines/orders.toml
//!
//! # log filtering follows RUST_LOG
//! RUST_LOG=info,binlog_sync=debug binlog-sync --config pipelines/orders.toml
//! ```
//!
//! The pipeline runs until the replication stream ends, a fatal error
//! occurs, or SIGINT requests a drain. Restarting resumes from the last
//! checkpointed GTID set.

use std::path::PathBuf;

use clap::Parser;

use binlog_sync::{config::Config, pipeline};

#[derive(Parser)]
#[command(name = "binlog-sync")]
#[command(about = "Replicate MySQL tables into another MySQL server via the binlog")]
struct Cli {
    /// Path to the pipeline configuration file
    #[arg(short, long, env = "BINLOG_SYNC_CONFIG")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_file(&cli.config)?;
    pipeline::run(config).await
}
