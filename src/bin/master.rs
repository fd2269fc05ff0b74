//! # Master Binary Entry Point
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin master -- --config config/master.toml
//! ```
//!
//! Workers can also be listed directly, overriding the file:
//! ```bash
//! cargo run --bin master -- \
//!   --worker 127.0.0.1:25545 --worker 127.0.0.1:25546 \
//!   --total-samples 2000000 --json
//! ```
//!
//! The workers must already be starting; refused connects are retried per
//! the `[readiness]` section before the run is aborted.

use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use log::LevelFilter;

use distributed_pi::common::config::load_config;
use distributed_pi::common::logging::init_logger;
use distributed_pi::{Endpoint, MasterConfig, MasterCoordinator, RunReport};

/// Command-line arguments for the master binary
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the master configuration file (TOML format)
    #[arg(short, long)]
    config: Option<String>,

    /// Worker endpoint as host:port, in order; repeat for each worker
    #[arg(short, long = "worker")]
    workers: Vec<Endpoint>,

    /// Total sample budget, split evenly across workers
    #[arg(short, long)]
    total_samples: Option<u64>,

    /// Print the report as one JSON object instead of text
    #[arg(long)]
    json: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logger(args.log_level);

    let mut config: MasterConfig = match &args.config {
        Some(path) => load_config(path)?,
        None => MasterConfig::default(),
    };

    if !args.workers.is_empty() {
        config.workers = args.workers;
    }
    if let Some(total) = args.total_samples {
        config.run.total_samples = total;
    }

    let master = MasterCoordinator::from_config(&config);

    let start = Instant::now();
    let outcome = master
        .run_detailed(config.run.total_samples)
        .await
        .context("distributed run failed")?;
    let report = RunReport::new(&outcome, start.elapsed());

    if args.json {
        println!("{}", report.to_json()?);
    } else {
        println!("\n{}\n", report.summary());
    }

    Ok(())
}
