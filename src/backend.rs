//! # Backend — Pluggable Sieve Execution
//!
//! The scheduler drives sieving and gap scanning through the
//! [`SieveBackend`] trait so the same worker loop can run on the CPU or on
//! an accelerator. A backend owns nothing about the block being mined; the
//! per-job inputs (sieving primes, base residues, wheel offset) travel in a
//! [`SieveJob`] built once per mining session.
//!
//! [`CpuBackend`] is always available. GPU variants are a capability that
//! is negotiated at runtime — [`is_gpu_available`] and
//! [`enumerate_gpu_devices`] may legitimately report nothing on every
//! platform this builds for, and the scheduler must behave identically
//! whether zero or many accelerators show up.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rug::Integer;

use crate::sieve::{
    base_residues, coprime_to_wheel, sieve_segment_rebased, SieveSegment, WHEEL_MODULUS,
};

/// Per-session sieving inputs, derived once from the candidate base.
pub struct SieveJob {
    /// Small sieving primes, shared across workers.
    pub primes: Arc<Vec<u64>>,
    /// `base mod p` for each sieving prime.
    pub residues: Vec<u64>,
    /// Sieving primes with the wheel's own factors (2, 3, 5, 7) removed,
    /// the stride set the wheel pass does not already cover.
    pub stride_primes: Vec<u64>,
    /// `base mod p` for each stride prime, parallel to `stride_primes`.
    pub stride_residues: Vec<u64>,
    /// `base mod 210`, anchoring the wheel skip pattern.
    pub wheel_offset: u64,
}

impl SieveJob {
    /// Reduce the base modulo every sieving prime and the wheel modulus.
    /// The wheel-filtered stride lists are built here, once per session,
    /// so segment passes never reallocate.
    pub fn new(base: &Integer, primes: Arc<Vec<u64>>) -> Self {
        let residues = base_residues(base, &primes);
        let wheel_offset = base.mod_u(WHEEL_MODULUS as u32) as u64;
        let keep = |p: u64| WHEEL_MODULUS % p != 0;
        let stride_primes: Vec<u64> = primes.iter().copied().filter(|&p| keep(p)).collect();
        let stride_residues: Vec<u64> = primes
            .iter()
            .zip(&residues)
            .filter(|(&p, _)| keep(p))
            .map(|(_, &r)| r)
            .collect();
        SieveJob {
            primes,
            residues,
            stride_primes,
            stride_residues,
            wheel_offset,
        }
    }
}

/// A run between two consecutive surviving bitmap positions, i.e. a
/// candidate prime gap before verification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GapRun {
    /// Offset of the lower surviving position within the segment.
    pub low_offset: usize,
    /// Distance to the next surviving position.
    pub gap: u32,
}

/// One sieve execution engine. Implementations must be shareable across
/// worker threads; the stop flag is the cooperative cancellation point the
/// scheduler uses to wind a session down.
pub trait SieveBackend: Send + Sync {
    /// Short human-readable identifier for logs.
    fn name(&self) -> &str;

    /// Sieve one window of candidates `base + window_start + i`, clearing
    /// bits of known composites.
    fn sieve_segment(&self, segment: &mut SieveSegment, job: &SieveJob, window_start: u64);

    /// Scan a sieved bitmap for runs of at least `min_gap` between
    /// consecutive surviving positions.
    fn find_gaps(&self, segment: &SieveSegment, min_gap: u32) -> Vec<GapRun>;

    fn request_stop(&self);
    fn is_stop_requested(&self) -> bool;
    fn reset_stop(&self);
}

/// The always-available CPU engine: wheel-210 pre-clear followed by
/// rebased strides over the remaining sieving primes.
pub struct CpuBackend {
    stop: AtomicBool,
}

impl CpuBackend {
    pub fn new() -> Self {
        CpuBackend {
            stop: AtomicBool::new(false),
        }
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SieveBackend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn sieve_segment(&self, segment: &mut SieveSegment, job: &SieveJob, window_start: u64) {
        let len = segment.len() as u64;
        if len == 0 {
            return;
        }

        // Wheel pass: clear offsets whose candidate shares a factor with
        // 210. Walking a residue counter beats a div per bit.
        let mut residue = (job.wheel_offset + window_start % WHEEL_MODULUS) % WHEEL_MODULUS;
        for o in 0..len {
            if !coprime_to_wheel(residue) {
                segment.clear(o as usize);
            }
            residue += 1;
            if residue == WHEEL_MODULUS {
                residue = 0;
            }
        }

        // The wheel already covered 2, 3, 5, 7; stride the rest.
        sieve_segment_rebased(segment, window_start, &job.stride_primes, &job.stride_residues);
    }

    fn find_gaps(&self, segment: &SieveSegment, min_gap: u32) -> Vec<GapRun> {
        let mut runs = Vec::new();
        let mut prev: Option<usize> = None;
        for i in segment.iter_candidates() {
            if let Some(p) = prev {
                let gap = (i - p) as u32;
                if gap >= min_gap {
                    runs.push(GapRun {
                        low_offset: p,
                        gap,
                    });
                }
            }
            prev = Some(i);
        }
        runs
    }

    fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn reset_stop(&self) {
        self.stop.store(false, Ordering::SeqCst);
    }
}

/// Accelerator families a build may know how to drive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GpuKind {
    Cuda,
    OpenCl,
}

/// A discovered accelerator.
#[derive(Clone, Debug)]
pub struct GpuDevice {
    pub kind: GpuKind,
    pub index: usize,
    pub name: String,
}

/// Whether any accelerator backend can be constructed in this build.
/// No GPU engine ships yet, so discovery is honest about it.
pub fn is_gpu_available() -> bool {
    false
}

/// Enumerate usable accelerators. Empty whenever [`is_gpu_available`]
/// is false.
pub fn enumerate_gpu_devices() -> Vec<GpuDevice> {
    Vec::new()
}
