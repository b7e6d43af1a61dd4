//! # Difficulty — Merit Target Retargeting
//!
//! Recomputes the target merit for each new block from a one-day lookback
//! window (144 blocks at 10-minute spacing): average the recorded merits,
//! then scale by how fast the window was actually produced versus the
//! target spacing. Timespans are clamped to a 4× band so a burst of lucky
//! blocks (or a mining outage) moves the target smoothly instead of
//! whipsawing it.
//!
//! The chain index is externally owned; this module only *reads* it through
//! the [`BlockIndex`] trait (previous link, block time, and the merit the
//! validator recorded at acceptance).

use tracing::debug;

use crate::pow::ConsensusParams;

/// Retarget lookback window, in blocks.
pub const LOOKBACK: usize = 144;

/// Hard floor and ceiling on the target merit.
pub const MIN_TARGET_MERIT: f64 = 10.0;
pub const MAX_TARGET_MERIT: f64 = 100.0;

/// Read-only view of a chain-index entry. Implemented by the node's chain
/// state; the engine never mutates it.
pub trait BlockIndex {
    /// The previous block's index entry, if any.
    fn prev(&self) -> Option<&dyn BlockIndex>;
    /// Block time (unix seconds).
    fn time(&self) -> i64;
    /// The merit recorded when this block's proof was validated, if the
    /// block carried a gap proof.
    fn recorded_merit(&self) -> Option<f64>;
}

/// Compute the target merit for the block after `prev`.
///
/// Returns the configured initial difficulty when there is no history at
/// all, or when no block in the lookback window recorded a merit.
pub fn next_target_merit(prev: Option<&dyn BlockIndex>, params: &ConsensusParams) -> f64 {
    let Some(prev) = prev else {
        return params.initial_difficulty;
    };

    let mut total_merit = 0.0;
    let mut valid_blocks = 0usize;
    let mut index = prev;
    let mut oldest = prev;

    for _ in 0..LOOKBACK {
        if let Some(merit) = index.recorded_merit() {
            if merit > 0.0 {
                total_merit += merit;
                valid_blocks += 1;
            }
        }
        oldest = index;
        match index.prev() {
            Some(p) => index = p,
            None => break,
        }
    }

    if valid_blocks == 0 {
        return params.initial_difficulty;
    }

    let target_timespan = valid_blocks as i64 * params.target_spacing;
    let actual_timespan =
        (prev.time() - oldest.time()).clamp(target_timespan / 4, target_timespan * 4);

    let avg_merit = total_merit / valid_blocks as f64;
    let adjustment = actual_timespan as f64 / target_timespan as f64;
    let next = (avg_merit * adjustment).clamp(MIN_TARGET_MERIT, MAX_TARGET_MERIT);

    debug!(
        valid_blocks,
        avg_merit,
        adjustment,
        next,
        "difficulty retarget"
    );
    next
}
