//! # Gap — Prime-Gap Verification
//!
//! Confirms that a claimed gap `(start, start + gapSize)` is genuine: both
//! endpoints prime, every interior integer composite. The interior scan is
//! exhaustive — the validator never skips an offset, because a single missed
//! interior prime would let a miner claim a larger (higher-merit) gap than
//! actually exists.
//!
//! Interior offsets are cheap to dismiss in bulk: half are even, and most of
//! the rest fall to trial division by the primes up to 31. Only the
//! survivors pay for a single-witness Fermat test. Offsets are independent,
//! so the scan runs data-parallel under rayon; the verdict is a pure
//! conjunction and therefore deterministic regardless of scheduling.

use rayon::prelude::*;
use rug::Integer;

use crate::primality::is_probably_prime;

/// Trial-division primes for the interior fast path. Matches the witness
/// primes below 37 so a divisibility hit here is consistent with a Fermat
/// rejection later.
const INTERIOR_FILTER_PRIMES: [u32; 10] = [3, 5, 7, 11, 13, 17, 19, 23, 29, 31];

/// Fermat rounds for interior candidates that survive trial division. One
/// witness suffices: a false "prime" verdict only *rejects* a gap, it can
/// never validate a bogus one.
const INTERIOR_FERMAT_ROUNDS: u32 = 1;

/// True when `start + offset` is composite.
fn interior_offset_is_composite(start: &Integer, offset: u32) -> bool {
    let candidate = Integer::from(start + offset);
    if candidate.is_even() {
        return true;
    }
    for &p in &INTERIOR_FILTER_PRIMES {
        if candidate.is_divisible_u(p) {
            // Divisible by p and larger than p means composite; equal to p
            // means we just found a small prime inside the gap.
            return candidate > p;
        }
    }
    !is_probably_prime(&candidate, INTERIOR_FERMAT_ROUNDS)
}

/// Verify that every integer strictly between `start` and
/// `start + gap_size` is composite. Full scan, no sampling.
pub fn interior_all_composite(start: &Integer, gap_size: u32) -> bool {
    if gap_size < 2 {
        return false;
    }
    (1..gap_size)
        .into_par_iter()
        .all(|offset| interior_offset_is_composite(start, offset))
}

/// Verify a complete gap claim: `start` prime, `start + gap_size` prime,
/// all interior integers composite. Requires `gap_size >= 2`.
///
/// `rounds` is the Fermat round count applied to both endpoints (the
/// consensus validator passes [`crate::pow::FERMAT_ROUNDS`]).
pub fn verify_gap(start: &Integer, gap_size: u32, rounds: u32) -> bool {
    if gap_size < 2 {
        return false;
    }
    if !is_probably_prime(start, rounds) {
        return false;
    }
    let end = Integer::from(start + gap_size);
    if !is_probably_prime(&end, rounds) {
        return false;
    }
    interior_all_composite(start, gap_size)
}
