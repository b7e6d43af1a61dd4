//! # Stats — Shared Mining Counters
//!
//! Lock-free counters shared by every worker in a mining session and read
//! by the progress callback. Counts are plain `AtomicU64` adds; the best
//! merit is an `f64` stored by bit pattern and raised through a
//! compare-and-swap maximum ([`atomic_f64_max`]), so a worker that finds a
//! better gap never loses the update to a racing worker with a worse one.
//!
//! The bit-pattern comparison is order-preserving because merits are
//! non-negative finite doubles (IEEE 754 ordering matches integer ordering
//! on the non-negative range).

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Raise `cell` (holding `f64` bits) to at least `value`; returns true if
/// this call improved the stored maximum. `value` must be non-negative
/// and finite.
pub fn atomic_f64_max(cell: &AtomicU64, value: f64) -> bool {
    let mut current = cell.load(Ordering::Acquire);
    loop {
        if f64::from_bits(current) >= value {
            return false;
        }
        match cell.compare_exchange_weak(
            current,
            value.to_bits(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => return true,
            Err(actual) => current = actual,
        }
    }
}

/// Counters for one mining session. Reset when a new session starts.
#[derive(Debug)]
pub struct MinerStats {
    primes_checked: AtomicU64,
    gaps_found: AtomicU64,
    sieve_cycles: AtomicU64,
    best_merit_bits: AtomicU64,
}

/// Point-in-time copy of the counters, as handed to progress callbacks
/// and serialized by the CLI.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub primes_checked: u64,
    pub gaps_found: u64,
    pub sieve_cycles: u64,
    pub best_merit: f64,
}

impl MinerStats {
    pub fn new() -> Self {
        MinerStats {
            primes_checked: AtomicU64::new(0),
            gaps_found: AtomicU64::new(0),
            sieve_cycles: AtomicU64::new(0),
            best_merit_bits: AtomicU64::new(0f64.to_bits()),
        }
    }

    /// Zero everything for a fresh session.
    pub fn reset(&self) {
        self.primes_checked.store(0, Ordering::Release);
        self.gaps_found.store(0, Ordering::Release);
        self.sieve_cycles.store(0, Ordering::Release);
        self.best_merit_bits.store(0f64.to_bits(), Ordering::Release);
    }

    /// Count candidates that went through a primality check.
    pub fn add_primes_checked(&self, n: u64) {
        self.primes_checked.fetch_add(n, Ordering::Relaxed);
    }

    /// Count one verified prime gap.
    pub fn record_gap(&self) {
        self.gaps_found.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one completed sieve window.
    pub fn record_sieve_cycle(&self) {
        self.sieve_cycles.fetch_add(1, Ordering::Relaxed);
    }

    /// Monotonic best-merit update; true if `merit` set a new record.
    pub fn update_best_merit(&self, merit: f64) -> bool {
        atomic_f64_max(&self.best_merit_bits, merit)
    }

    pub fn best_merit(&self) -> f64 {
        f64::from_bits(self.best_merit_bits.load(Ordering::Acquire))
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            primes_checked: self.primes_checked.load(Ordering::Relaxed),
            gaps_found: self.gaps_found.load(Ordering::Relaxed),
            sieve_cycles: self.sieve_cycles.load(Ordering::Relaxed),
            best_merit: self.best_merit(),
        }
    }
}

impl Default for MinerStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    //! # Stats Tests
    //!
    //! The load-bearing behavior is the monotonic best-merit maximum: it
    //! must never regress, must report whether a call improved it, and
    //! must survive concurrent raisers without losing the true maximum.
    //! Counter arithmetic and snapshot/reset round-trips are checked
    //! alongside.

    use super::*;
    use std::sync::Arc;
    use std::thread;

    /// Plain counters accumulate and snapshot together.
    #[test]
    fn counters_accumulate() {
        let stats = MinerStats::new();
        stats.add_primes_checked(10);
        stats.add_primes_checked(32);
        stats.record_gap();
        stats.record_sieve_cycle();
        stats.record_sieve_cycle();

        let snap = stats.snapshot();
        assert_eq!(snap.primes_checked, 42);
        assert_eq!(snap.gaps_found, 1);
        assert_eq!(snap.sieve_cycles, 2);
        assert_eq!(snap.best_merit, 0.0);
    }

    /// The best merit only moves up, and the return value says whether a
    /// call was the one that moved it.
    #[test]
    fn best_merit_is_monotonic() {
        let stats = MinerStats::new();
        assert!(stats.update_best_merit(3.5));
        assert!(!stats.update_best_merit(2.0));
        assert!(!stats.update_best_merit(3.5));
        assert!(stats.update_best_merit(20.25));
        assert_eq!(stats.best_merit(), 20.25);
    }

    /// Many threads racing to raise the maximum: the final value is the
    /// largest submitted, regardless of interleaving.
    #[test]
    fn best_merit_survives_concurrent_updates() {
        let stats = Arc::new(MinerStats::new());
        let mut handles = Vec::new();
        for t in 0..8u64 {
            let stats = Arc::clone(&stats);
            handles.push(thread::spawn(move || {
                for i in 0..1_000u64 {
                    let merit = ((t * 1_000 + i) % 997) as f64 / 10.0;
                    stats.update_best_merit(merit);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(stats.best_merit(), 99.6);
    }

    /// `reset` returns every counter to the fresh-session state.
    #[test]
    fn reset_zeroes_everything() {
        let stats = MinerStats::new();
        stats.add_primes_checked(5);
        stats.record_gap();
        stats.record_sieve_cycle();
        stats.update_best_merit(7.0);

        stats.reset();
        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                primes_checked: 0,
                gaps_found: 0,
                sieve_cycles: 0,
                best_merit: 0.0,
            }
        );
    }

    /// The raw helper works on any cell, not just MinerStats.
    #[test]
    fn atomic_max_helper_standalone() {
        let cell = AtomicU64::new(0f64.to_bits());
        assert!(atomic_f64_max(&cell, 1.5));
        assert!(!atomic_f64_max(&cell, 1.25));
        assert_eq!(f64::from_bits(cell.load(Ordering::Acquire)), 1.5);
    }

    /// Snapshots serialize for the CLI's progress output.
    #[test]
    fn snapshot_serializes_to_json() {
        let stats = MinerStats::new();
        stats.add_primes_checked(7);
        stats.update_best_merit(2.5);
        let json = serde_json::to_string(&stats.snapshot()).unwrap();
        assert!(json.contains("\"primes_checked\":7"));
        assert!(json.contains("\"best_merit\":2.5"));
    }
}
