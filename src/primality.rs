//! # Primality — Deterministic Fermat Probable-Primality Oracle
//!
//! The single primality predicate shared by the consensus validator and the
//! mining engine. Uses Fermat's test `a^(n-1) ≡ 1 (mod n)` with a **fixed,
//! ordered witness list** (the first 12 primes) so that every node reaches
//! the same verdict for the same input.
//!
//! ## Why Fermat with fixed witnesses
//!
//! Fermat's test admits rare false positives (Carmichael numbers), so two
//! nodes running it with *different* witness sets could disagree on whether
//! a gap endpoint "is prime" — a consensus fork. The witness list and the
//! round count are therefore consensus parameters, hard-coded here and never
//! runtime-configurable. Mining-side pre-filters may be cheaper and sloppier;
//! this oracle is the authority.

use rug::Integer;

/// Deterministic Fermat witnesses, in test order. Consensus parameter —
/// changing this list or its order is a hard fork.
pub const FERMAT_WITNESSES: [u32; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

/// Fermat probable-primality test with deterministic witnesses.
///
/// Runs `min(rounds, 12)` witnesses from [`FERMAT_WITNESSES`] in order,
/// skipping any witness ≥ n. Returns false on the first failing witness.
/// Rejects n < 2 and even n ≠ 2 immediately.
pub fn is_probably_prime(n: &Integer, rounds: u32) -> bool {
    if *n < 2u32 {
        return false;
    }
    if *n == 2u32 {
        return true;
    }
    if n.is_even() {
        return false;
    }

    let n_minus_1 = Integer::from(n - 1u32);
    let num_witnesses = (rounds as usize).min(FERMAT_WITNESSES.len());

    for &w in &FERMAT_WITNESSES[..num_witnesses] {
        // Witnesses at or above n tell us nothing; skip them.
        if *n <= w {
            continue;
        }
        let a = Integer::from(w);
        let Some(residue) = a.pow_mod_ref(&n_minus_1, n) else {
            return false;
        };
        if Integer::from(residue) != 1u32 {
            return false;
        }
    }
    true
}
