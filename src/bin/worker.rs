//! # Worker Binary Entry Point
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin worker -- --port 25545
//! ```
//!
//! The worker will:
//! 1. Bind the given port
//! 2. Accept exactly one master connection
//! 3. Answer each quota with its inside-quarter-disk count
//! 4. Exit on `END` (status 0) or on a protocol error (non-zero status)

use anyhow::Context;
use clap::Parser;
use log::LevelFilter;

use distributed_pi::common::logging::init_logger;
use distributed_pi::common::protocol::DEFAULT_WORKER_PORT;
use distributed_pi::Worker;

/// Command-line arguments for the worker binary
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_WORKER_PORT)]
    port: u16,

    /// Interface to bind
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Seed for a reproducible sampling stream
    #[arg(long)]
    seed: Option<u64>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logger(args.log_level);

    let worker = match args.seed {
        Some(seed) => Worker::with_seed(seed),
        None => Worker::new(),
    };

    worker
        .serve(&args.bind, args.port)
        .await
        .with_context(|| format!("worker on port {} failed", args.port))?;

    Ok(())
}
