//! # Merit — Gap Quality Metric, Compact Encoding, and Chain Work
//!
//! The merit of a prime gap is `gapSize / ln(start)`: the gap length
//! normalized by the *expected* gap at that magnitude (Prime Number Theorem:
//! the average gap near p is ln p). Merit is the difficulty metric of the
//! whole scheme, so its computation is consensus-critical — the logarithm is
//! taken at 256-bit precision via MPFR (`rug::Float`) on the true candidate
//! value, never approximated from bit lengths.
//!
//! Headers persist merit as a compact fixed-point integer (merit × 10^6,
//! rounded), and best-chain selection converts merit to an additive chain
//! work of `2^min(merit, 80)`.

use rug::{Float, Integer};

/// MPFR significand precision (bits) for the consensus logarithm.
const LN_PRECISION: u32 = 256;

/// Merit above which chain work saturates (2^80), bounding the work integer.
pub const CHAIN_WORK_MERIT_CAP: f64 = 80.0;

/// Compute `gap_size / ln(start)` with a 256-bit logarithm.
///
/// Returns 0.0 for degenerate inputs where the logarithm is non-positive
/// (start ≤ 1).
pub fn calculate_merit(start: &Integer, gap_size: u32) -> f64 {
    let ln_start = Float::with_val(LN_PRECISION, start).ln().to_f64();
    if ln_start <= 0.0 {
        return 0.0;
    }
    gap_size as f64 / ln_start
}

/// Encode merit into the compact header `bits` field: merit × 10^6, rounded
/// to the nearest integer.
pub fn merit_to_compact(merit: f64) -> u32 {
    (merit * 1_000_000.0).round() as u32
}

/// Decode the compact header `bits` field back into a merit.
pub fn compact_to_merit(bits: u32) -> f64 {
    bits as f64 / 1_000_000.0
}

/// Chain work contributed by a block of the given merit: `2^min(merit, 80)`,
/// evaluated with fractional precision and floored to an integer.
/// Non-positive merit yields work 1.
///
/// The floor quantizes to integer resolution: every merit in (0, 1)
/// flattens to work 1, and growth is strict only once `2^merit` steps past
/// the next integer. Consensus targets sit well above merit 10, where a
/// 0.01 merit difference already moves the result, so the plateau is never
/// reachable by a valid block.
///
/// Exponential weighting gives exceptional gaps outsized influence on
/// best-chain selection, which is what makes forging a competing chain
/// require comparably exceptional gaps.
pub fn chain_work(merit: f64) -> Integer {
    if merit <= 0.0 {
        return Integer::from(1u32);
    }
    let capped = merit.min(CHAIN_WORK_MERIT_CAP);
    // 2^capped with the fractional part carried: floor(2^frac · 2^int).
    let work = Float::with_val(96, capped).exp2();
    work.floor().to_integer().unwrap_or_else(|| Integer::from(1u32))
}
