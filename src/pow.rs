//! # PoW — Consensus Validation of Prime-Gap Proofs
//!
//! The single source of truth for "is this proof-of-work valid". Block
//! acceptance calls [`check_proof`], which re-derives the candidate from the
//! header and re-verifies the whole gap — the miner's claim is never
//! trusted. Checks run in a fixed order and the first failure wins, so every
//! node rejects an invalid header for the identical reason.
//!
//! All numeric knobs in this module are consensus parameters. They are
//! compiled in, never configurable: a node that validated with different
//! constants would fork.

use rug::Integer;
use thiserror::Error;
use tracing::{debug, info};

use crate::gap::interior_all_composite;
use crate::header::BlockHeader;
use crate::merit::{calculate_merit, compact_to_merit};
use crate::primality::is_probably_prime;

/// Minimum accepted shift. Keeps candidates large enough that gaps are
/// non-trivial to enumerate.
pub const SHIFT_MIN: u32 = 14;

/// Maximum accepted shift. Bounds candidate bit length so a single
/// validation call stays tractable — there is no timeout, only this cap.
pub const SHIFT_MAX: u32 = 65536;

/// Fermat rounds used for gap endpoints during validation.
pub const FERMAT_ROUNDS: u32 = 3;

/// Chain-level consensus parameters consumed (not owned) by this engine.
#[derive(Clone, Copy, Debug)]
pub struct ConsensusParams {
    /// Target merit before any difficulty history exists.
    pub initial_difficulty: f64,
    /// Target block spacing in seconds.
    pub target_spacing: i64,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        ConsensusParams {
            initial_difficulty: 20.0,
            target_spacing: 600,
        }
    }
}

/// Rejection reasons, in the order the validator checks them. Each carries
/// a stable machine tag (see [`PowError::tag`]) for block-rejection
/// messages; the `Display` form is the human-readable message.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PowError {
    #[error("shift {0} outside [{SHIFT_MIN}, {SHIFT_MAX}]")]
    ShiftOutOfRange(u32),
    #[error("gap size {0} below minimum of 2")]
    GapTooSmall(u32),
    #[error("adder not below 2^{0}")]
    AdderTooLarge(u32),
    #[error("derived candidate is not prime")]
    StartNotPrime,
    #[error("candidate + gap size is not prime")]
    EndNotPrime,
    #[error("gap interior contains a prime")]
    GapContainsPrime,
    #[error("merit {merit:.4} below target {target:.4}")]
    MeritBelowTarget { merit: f64, target: f64 },
}

impl PowError {
    /// Stable machine-readable rejection tag.
    pub fn tag(&self) -> &'static str {
        match self {
            PowError::ShiftOutOfRange(_) => "gap-shift-out-of-range",
            PowError::GapTooSmall(_) => "gap-too-small",
            PowError::AdderTooLarge(_) => "gap-adder-too-large",
            PowError::StartNotPrime => "gap-start-not-prime",
            PowError::EndNotPrime => "gap-end-not-prime",
            PowError::GapContainsPrime => "gap-contains-prime",
            PowError::MeritBelowTarget { .. } => "gap-merit-below-target",
        }
    }
}

/// Derive the prime candidate for a header:
/// `hash(header with proof fields zeroed) · 2^shift + adder`, forced odd.
///
/// Pure function of its inputs — recomputed per validation, never cached
/// across headers. Does *not* enforce `adder < 2^shift`; that is
/// [`check_proof`]'s job, so this stays usable for miner-side derivation
/// where the adder is still being chosen.
pub fn derive_candidate(header: &BlockHeader) -> Integer {
    let mut candidate = header.pow_hash_int() << header.shift;
    candidate += header.adder_int();
    if candidate.is_even() {
        candidate += 1u32;
    }
    candidate
}

/// Validate a header's prime-gap proof against its embedded compact target.
///
/// Checks, first failure wins:
/// 1. shift within [SHIFT_MIN, SHIFT_MAX]
/// 2. gap size ≥ 2
/// 3. adder < 2^shift (prevents replaying a winning adder elsewhere)
/// 4. derived candidate is prime
/// 5. candidate + gap size is prime
/// 6. every interior integer is composite (full scan)
/// 7. merit ≥ the target encoded in `header.bits`
///
/// On success returns the achieved merit; by convention the caller records
/// it on the chain index for the difficulty adjuster and chain-work
/// function. No other side effects beyond an informational log.
pub fn check_proof(header: &BlockHeader, _params: &ConsensusParams) -> Result<f64, PowError> {
    if header.shift < SHIFT_MIN || header.shift > SHIFT_MAX {
        return Err(PowError::ShiftOutOfRange(header.shift));
    }
    if header.gap_size < 2 {
        return Err(PowError::GapTooSmall(header.gap_size));
    }
    let adder = header.adder_int();
    if adder.significant_bits() > header.shift {
        return Err(PowError::AdderTooLarge(header.shift));
    }

    let candidate = derive_candidate(header);
    if !is_probably_prime(&candidate, FERMAT_ROUNDS) {
        return Err(PowError::StartNotPrime);
    }

    let end = Integer::from(&candidate + header.gap_size);
    if !is_probably_prime(&end, FERMAT_ROUNDS) {
        return Err(PowError::EndNotPrime);
    }

    if !interior_all_composite(&candidate, header.gap_size) {
        return Err(PowError::GapContainsPrime);
    }

    let merit = calculate_merit(&candidate, header.gap_size);
    let target = compact_to_merit(header.bits);
    if merit < target {
        debug!(merit, target, "gap proof below target");
        return Err(PowError::MeritBelowTarget { merit, target });
    }

    info!(
        shift = header.shift,
        gap_size = header.gap_size,
        merit = format_args!("{:.4}", merit),
        "gap proof valid"
    );
    Ok(merit)
}
