//! # CLI Execution Functions
//!
//! Extracted from `main.rs` to keep the entry point slim. `run_mine`
//! drives a mining session end to end, re-validating every reported
//! solution with the consensus checker before printing it; `run_check`
//! is the validator half on its own.

use std::io::Read;
use std::path::Path;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{error, info, warn};

use gapwork::header::BlockHeader;
use gapwork::merit::merit_to_compact;
use gapwork::miner::{GapMiner, MinerConfig};
use gapwork::pow::{check_proof, ConsensusParams};

use super::Cli;

/// Run a mining session against a synthetic template. Each solution is
/// applied to a copy of the template and re-validated with `check_proof`
/// before being printed as a JSON line — the miner must never emit a
/// proof the validator would reject.
pub fn run_mine(cli: &Cli, shift: u32, target: Option<f64>, duration: u64) -> Result<()> {
    let params = ConsensusParams::default();
    let target = target.unwrap_or(params.initial_difficulty);

    let config = MinerConfig {
        threads: cli
            .threads
            .unwrap_or_else(|| thread::available_parallelism().map(|n| n.get()).unwrap_or(1)),
        segment_bits: cli.segment_bits,
        sieve_primes: cli.sieve_primes,
    };

    let template = BlockHeader {
        time: unix_time()?,
        bits: merit_to_compact(target),
        nonce: rand::random(),
        ..BlockHeader::default()
    };

    info!(
        threads = config.threads,
        shift,
        target = format_args!("{:.4}", target),
        "gapwork miner starting"
    );

    let miner = GapMiner::new(config);
    miner.set_shift(shift);
    miner.set_progress_callback(|snap| {
        info!(
            sieve_cycles = snap.sieve_cycles,
            gaps_found = snap.gaps_found,
            best_merit = format_args!("{:.4}", snap.best_merit),
            "progress"
        );
    });

    let check_template = template.clone();
    let started = miner.start_mining(&template, target, move |solution| {
        let mut block = check_template.clone();
        solution.apply_to(&mut block);
        match check_proof(&block, &ConsensusParams::default()) {
            Ok(merit) => {
                println!(
                    "{}",
                    json!({
                        "shift": solution.shift,
                        "adder": solution.adder.to_string(),
                        "gap_size": solution.gap_size,
                        "merit": merit,
                    })
                );
            }
            // A reject here means the miner and validator disagree on the
            // gap predicate, which is exactly the fork hazard this engine
            // exists to rule out. Loud failure, never a silent drop.
            Err(err) => error!(%err, tag = err.tag(), "mined solution failed validation"),
        }
    });
    anyhow::ensure!(started, "no mining workers could be started");

    if duration == 0 {
        loop {
            thread::sleep(Duration::from_secs(3600));
        }
    }
    thread::sleep(Duration::from_secs(duration));
    miner.stop_mining();

    let stats = miner.get_stats();
    info!(
        sieve_cycles = stats.sieve_cycles,
        gaps_found = stats.gaps_found,
        best_merit = format_args!("{:.4}", stats.best_merit),
        "mining session finished"
    );
    Ok(())
}

/// Validate the gap proof of a header read from a JSON file (or stdin
/// with `-`). Prints a JSON verdict; an invalid proof is also a non-zero
/// exit.
pub fn run_check(path: &Path) -> Result<()> {
    let raw = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading header from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("reading header from {}", path.display()))?
    };
    let header: BlockHeader = serde_json::from_str(&raw).context("parsing header JSON")?;

    match check_proof(&header, &ConsensusParams::default()) {
        Ok(merit) => {
            println!("{}", json!({ "valid": true, "merit": merit }));
            Ok(())
        }
        Err(err) => {
            warn!(%err, tag = err.tag(), "gap proof rejected");
            println!(
                "{}",
                json!({ "valid": false, "tag": err.tag(), "error": err.to_string() })
            );
            anyhow::bail!("gap proof rejected: {}", err.tag())
        }
    }
}

/// Current unix time as the u32 a header carries.
fn unix_time() -> Result<u32> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock before unix epoch")?;
    Ok(now.as_secs() as u32)
}
