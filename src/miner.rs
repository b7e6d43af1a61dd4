//! # Miner — Gap Search Scheduler
//!
//! Drives the search side of the proof: slide sieve windows across the
//! adder space, read candidate gaps off the bitmap, confirm them with the
//! same verifier consensus uses, and report anything that meets the target
//! merit through a callback.
//!
//! ## Session model
//!
//! One scheduler owns at most one active session. `start_mining` snapshots
//! the header, resets the shared counters, and spawns one worker per
//! configured thread (plus one per extra active backend); `stop_mining`
//! raises the cooperative stop flag and joins everything. Solutions do
//! **not** stop the session — whether a found block wins is decided
//! upstream, so workers keep searching for a better gap.
//!
//! ## Work partition
//!
//! The adder space (`2^shift`, capped at 2^32 for scheduling) is split
//! into one contiguous slice per worker. A worker slides its window
//! deterministically through its own slice and, on exhausting it, wraps to
//! a randomized restart offset *inside the same slice* — two workers can
//! therefore never test the same adder in one session.
//!
//! ## Miner/validator agreement
//!
//! Every run found in the bitmap is re-derived as a true big-integer
//! endpoint and re-checked with [`verify_gap`] at consensus rounds before
//! it is ever reported. A solution emitted here passes
//! [`check_proof`](crate::pow::check_proof) by construction; the sieve is
//! only ever a filter, never an authority.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rug::Integer;
use tracing::{debug, info, warn};

use crate::backend::{
    enumerate_gpu_devices, is_gpu_available, CpuBackend, GpuDevice, SieveBackend, SieveJob,
};
use crate::gap::verify_gap;
use crate::header::BlockHeader;
use crate::merit::calculate_merit;
use crate::pow::{FERMAT_ROUNDS, SHIFT_MAX, SHIFT_MIN};
use crate::sieve::{sieving_primes, SieveSegment, DEFAULT_SEGMENT_BITS, DEFAULT_SIEVE_PRIMES};
use crate::stats::{MinerStats, StatsSnapshot};

/// Smallest bitmap run worth re-deriving and verifying.
pub const MIN_INTERESTING_GAP: u32 = 10;

/// Search-space exponent used when the caller never set one.
pub const DEFAULT_SHIFT: u32 = 25;

/// Adder-space striping is capped here so scheduling arithmetic stays in
/// u64 even for huge shifts; workers simply never reach past it.
const ADDER_SPAN_CAP_BITS: u32 = 32;

/// How often the progress callback fires.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// A verified gap that met the session's target merit.
#[derive(Clone, Debug)]
pub struct MiningSolution {
    pub shift: u32,
    pub adder: Integer,
    pub gap_size: u32,
    pub merit: f64,
}

impl MiningSolution {
    /// Write the proof fields back into a header, producing the block the
    /// validator will accept.
    pub fn apply_to(&self, header: &mut BlockHeader) {
        header.shift = self.shift;
        header.set_adder(&self.adder);
        header.gap_size = self.gap_size;
    }
}

pub type SolutionCallback = Arc<dyn Fn(&MiningSolution) + Send + Sync>;
pub type ProgressCallback = Arc<dyn Fn(&StatsSnapshot) + Send + Sync>;

/// Scheduler tuning. The defaults match a desktop-class CPU miner.
#[derive(Clone, Debug)]
pub struct MinerConfig {
    /// CPU worker threads.
    pub threads: usize,
    /// Bits per sieve window.
    pub segment_bits: usize,
    /// Number of small primes each job sieves with.
    pub sieve_primes: usize,
}

impl Default for MinerConfig {
    fn default() -> Self {
        MinerConfig {
            threads: thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            segment_bits: DEFAULT_SEGMENT_BITS,
            sieve_primes: DEFAULT_SIEVE_PRIMES,
        }
    }
}

/// The gap search scheduler. `Idle → Mining → Idle`, one session at a time.
pub struct GapMiner {
    config: MinerConfig,
    shift: AtomicU32,
    stats: Arc<MinerStats>,
    backends: Mutex<Vec<Arc<dyn SieveBackend>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    mining: AtomicBool,
    gpu_enabled: AtomicBool,
    progress: Arc<Mutex<Option<ProgressCallback>>>,
}

impl GapMiner {
    pub fn new(config: MinerConfig) -> Self {
        let cpu: Arc<dyn SieveBackend> = Arc::new(CpuBackend::new());
        GapMiner {
            config,
            shift: AtomicU32::new(DEFAULT_SHIFT),
            stats: Arc::new(MinerStats::new()),
            backends: Mutex::new(vec![cpu]),
            workers: Mutex::new(Vec::new()),
            mining: AtomicBool::new(false),
            gpu_enabled: AtomicBool::new(false),
            progress: Arc::new(Mutex::new(None)),
        }
    }

    /// Begin a session against a header snapshot. An already-running
    /// session is stopped (and joined) first. Returns false only if no
    /// worker at all could be spawned.
    pub fn start_mining<F>(&self, header: &BlockHeader, target_merit: f64, on_solution: F) -> bool
    where
        F: Fn(&MiningSolution) + Send + Sync + 'static,
    {
        if self.is_mining() {
            self.stop_mining();
        }

        let shift = self.get_shift();
        self.stats.reset();
        let backends: Vec<Arc<dyn SieveBackend>> = self.backends.lock().unwrap().clone();
        for b in &backends {
            b.reset_stop();
        }

        let base = Arc::new(header.pow_hash_int() << shift);
        let primes = Arc::new(sieving_primes(self.config.sieve_primes));
        let job = Arc::new(SieveJob::new(&base, Arc::clone(&primes)));
        let on_solution: SolutionCallback = Arc::new(on_solution);
        let span = adder_span(shift);

        // Worker plan: `threads` workers on the primary (CPU) backend,
        // one per additional active backend.
        let mut plan: Vec<Arc<dyn SieveBackend>> = Vec::new();
        for _ in 0..self.config.threads.max(1) {
            plan.push(Arc::clone(&backends[0]));
        }
        for extra in backends.iter().skip(1) {
            plan.push(Arc::clone(extra));
        }

        let worker_count = plan.len();
        let mut handles = Vec::with_capacity(worker_count + 1);
        for (index, backend) in plan.into_iter().enumerate() {
            let range = worker_range(span, index, worker_count);
            let base = Arc::clone(&base);
            let job = Arc::clone(&job);
            let stats = Arc::clone(&self.stats);
            let on_solution = Arc::clone(&on_solution);
            let segment_bits = self.config.segment_bits;
            let spawn = thread::Builder::new()
                .name(format!("gap-worker-{index}"))
                .spawn(move || {
                    worker_loop(WorkerCtx {
                        index,
                        range,
                        base,
                        job,
                        backend,
                        segment_bits,
                        shift,
                        target_merit,
                        stats,
                        on_solution,
                    })
                });
            match spawn {
                Ok(handle) => handles.push(handle),
                Err(err) => warn!(index, %err, "failed to spawn mining worker"),
            }
        }

        if handles.is_empty() {
            warn!("no mining workers could be started");
            return false;
        }

        // Progress reporter rides the same stop flag as the workers.
        let stop_watch = Arc::clone(&backends[0]);
        let stats = Arc::clone(&self.stats);
        let progress = Arc::clone(&self.progress);
        if let Ok(handle) = thread::Builder::new()
            .name("gap-progress".into())
            .spawn(move || {
                let mut last = Instant::now();
                while !stop_watch.is_stop_requested() {
                    thread::sleep(Duration::from_millis(100));
                    if last.elapsed() >= PROGRESS_INTERVAL {
                        let cb = progress.lock().unwrap().clone();
                        if let Some(cb) = cb {
                            cb(&stats.snapshot());
                        }
                        last = Instant::now();
                    }
                }
            })
        {
            handles.push(handle);
        }

        *self.workers.lock().unwrap() = handles;
        self.mining.store(true, Ordering::SeqCst);
        info!(
            workers = worker_count,
            shift,
            target = format_args!("{:.4}", target_merit),
            "mining session started"
        );
        true
    }

    /// Raise the stop flag and join every worker. Idempotent.
    pub fn stop_mining(&self) {
        for b in self.backends.lock().unwrap().iter() {
            b.request_stop();
        }
        let handles: Vec<JoinHandle<()>> = self.workers.lock().unwrap().drain(..).collect();
        for handle in handles {
            if handle.join().is_err() {
                warn!("mining worker panicked");
            }
        }
        if self.mining.swap(false, Ordering::SeqCst) {
            info!(stats = ?self.stats.snapshot(), "mining session stopped");
        }
    }

    pub fn is_mining(&self) -> bool {
        self.mining.load(Ordering::SeqCst)
    }

    pub fn get_stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Install (or replace) the ~1/second progress callback.
    pub fn set_progress_callback<F>(&self, callback: F)
    where
        F: Fn(&StatsSnapshot) + Send + Sync + 'static,
    {
        *self.progress.lock().unwrap() = Some(Arc::new(callback));
    }

    /// Set the search-space exponent for the *next* session, clamped to
    /// the consensus range.
    pub fn set_shift(&self, shift: u32) {
        let clamped = shift.clamp(SHIFT_MIN, SHIFT_MAX);
        if clamped != shift {
            warn!(requested = shift, clamped, "shift outside consensus range");
        }
        self.shift.store(clamped, Ordering::SeqCst);
    }

    pub fn get_shift(&self) -> u32 {
        self.shift.load(Ordering::SeqCst)
    }

    /// Try to activate GPU sieving. Reports false when no accelerator
    /// backend is available in this build.
    pub fn enable_gpu(&self) -> bool {
        if !is_gpu_available() {
            debug!("gpu sieving requested but no accelerator backend is available");
            return false;
        }
        self.gpu_enabled.store(true, Ordering::SeqCst);
        true
    }

    /// Deactivate GPU sieving; CPU workers are unaffected.
    pub fn disable_gpu(&self) {
        self.gpu_enabled.store(false, Ordering::SeqCst);
        self.backends.lock().unwrap().truncate(1);
    }

    pub fn is_gpu_available(&self) -> bool {
        is_gpu_available()
    }

    pub fn enumerate_gpu_devices(&self) -> Vec<GpuDevice> {
        enumerate_gpu_devices()
    }
}

impl Drop for GapMiner {
    fn drop(&mut self) {
        self.stop_mining();
    }
}

/// The adder space a session stripes across: `2^min(shift, 32)`.
fn adder_span(shift: u32) -> u64 {
    1u64 << shift.min(ADDER_SPAN_CAP_BITS)
}

/// Contiguous slice of `[0, span)` for worker `index` of `count`.
/// Slices are disjoint and cover the span exactly.
fn worker_range(span: u64, index: usize, count: usize) -> (u64, u64) {
    let count = count.max(1) as u64;
    let index = index as u64;
    (index * span / count, (index + 1) * span / count)
}

struct WorkerCtx {
    index: usize,
    range: (u64, u64),
    base: Arc<Integer>,
    job: Arc<SieveJob>,
    backend: Arc<dyn SieveBackend>,
    segment_bits: usize,
    shift: u32,
    target_merit: f64,
    stats: Arc<MinerStats>,
    on_solution: SolutionCallback,
}

fn worker_loop(ctx: WorkerCtx) {
    let (range_start, range_end) = ctx.range;
    if range_end <= range_start {
        return;
    }
    let seg_len = ctx.segment_bits.min((range_end - range_start) as usize).max(2);
    let mut segment = SieveSegment::new(seg_len);
    let mut rng = StdRng::from_entropy();
    let mut window = range_start;

    while !ctx.backend.is_stop_requested() {
        segment.reset();
        ctx.backend.sieve_segment(&mut segment, &ctx.job, window);
        ctx.stats.record_sieve_cycle();

        for run in ctx.backend.find_gaps(&segment, MIN_INTERESTING_GAP) {
            if ctx.backend.is_stop_requested() {
                return;
            }
            let adder = window + run.low_offset as u64;
            let start = Integer::from(&*ctx.base + adder);
            ctx.stats.add_primes_checked(2);
            if !verify_gap(&start, run.gap, FERMAT_ROUNDS) {
                continue;
            }
            ctx.stats.record_gap();
            let merit = calculate_merit(&start, run.gap);
            if ctx.stats.update_best_merit(merit) {
                debug!(
                    worker = ctx.index,
                    gap = run.gap,
                    merit = format_args!("{:.4}", merit),
                    "new best gap"
                );
            }
            if merit >= ctx.target_merit {
                let solution = MiningSolution {
                    shift: ctx.shift,
                    adder: Integer::from(adder),
                    gap_size: run.gap,
                    merit,
                };
                info!(
                    worker = ctx.index,
                    adder,
                    gap = run.gap,
                    merit = format_args!("{:.4}", merit),
                    "solution found"
                );
                (ctx.on_solution)(&solution);
            }
        }

        window += seg_len as u64;
        if window + seg_len as u64 > range_end {
            // Wrap with a randomized restart inside the slice so repeat
            // passes do not retrace the identical window sequence.
            let slack = (range_end - range_start).saturating_sub(seg_len as u64);
            window = range_start + if slack > 0 { rng.gen_range(0..=slack) } else { 0 };
        }
    }
}
