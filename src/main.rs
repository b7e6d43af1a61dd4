//! # Main — CLI Entry Point
//!
//! Thin driver around the engine: `mine` runs a search session against a
//! synthetic block template and self-checks every solution with the
//! consensus validator; `check` validates a header's gap proof from JSON.
//! The node-facing surfaces (RPC, template assembly, chain state) live
//! outside this crate — the CLI exists for smoke runs and operations.
//!
//! ## Global Options
//!
//! - `--threads`: worker thread count (defaults to all logical cores).
//! - `--segment-bits`: bits per sieve window.
//! - `--sieve-primes`: small primes per mining job.
//! - `LOG_FORMAT=json`: structured JSON logs instead of human-readable.
//! - `RUST_LOG`: log filter (default `info`).

mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use gapwork::sieve::{DEFAULT_SEGMENT_BITS, DEFAULT_SIEVE_PRIMES};

#[derive(Parser)]
#[command(name = "gapwork", about = "Prime-gap proof-of-work engine")]
struct Cli {
    /// Number of mining worker threads (defaults to all logical cores)
    #[arg(long)]
    threads: Option<usize>,

    /// Bits per sieve window
    #[arg(long, default_value_t = DEFAULT_SEGMENT_BITS)]
    segment_bits: usize,

    /// Number of small primes each mining job sieves with
    #[arg(long, default_value_t = DEFAULT_SIEVE_PRIMES)]
    sieve_primes: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mine prime gaps against a synthetic block template
    Mine {
        /// Search-space exponent (candidate magnitude), consensus range [14, 65536]
        #[arg(long, default_value_t = 25)]
        shift: u32,

        /// Target merit a gap must meet to count as a solution
        /// (defaults to the chain's initial difficulty)
        #[arg(long)]
        target: Option<f64>,

        /// Stop after this many seconds (0 = run until interrupted)
        #[arg(long, default_value_t = 0)]
        duration: u64,
    },
    /// Validate the gap proof of a block header given as JSON
    Check {
        /// Path to the header JSON file (use "-" for stdin)
        #[arg(long)]
        header: PathBuf,
    },
}

fn main() -> Result<()> {
    // LOG_FORMAT=json for machine-readable logs, human-readable otherwise
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    let cli = Cli::parse();
    match &cli.command {
        Commands::Mine {
            shift,
            target,
            duration,
        } => cli::run_mine(&cli, *shift, *target, *duration),
        Commands::Check { header } => cli::run_check(header),
    }
}
