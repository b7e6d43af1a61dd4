//! # Sieve — Segmented Composite Elimination for Gap Search
//!
//! Number-theoretic groundwork for the mining scheduler. Provides:
//!
//! 1. **Small-prime generation** (`generate_small_primes`) via a classic
//!    sieve of Eratosthenes, plus `sieving_primes` which sizes the sieve
//!    bound from a requested prime count.
//! 2. **`SieveSegment`** — a packed u64 bitmap over a contiguous numeric
//!    window. Bit convention throughout the crate: a **set** bit survives
//!    (still a primality candidate), a **clear** bit is known composite.
//! 3. **Absolute sieving** (`sieve_segment`): marks multiples of each small
//!    prime inside a window of the integers themselves, so the surviving
//!    bits of `[0, n)` are exactly the primes below `n`.
//! 4. **Rebased sieving** (`sieve_segment_rebased`): the mining variant.
//!    Candidates are `base + offset` for a huge hash-derived `base`, so
//!    divisibility of an offset depends on `base mod p`. Precomputing those
//!    residues once per job (`base_residues`) turns each segment pass into
//!    pure u64 strides with no big-integer work.
//! 5. **Wheel-210 skip pattern** (`wheel_residues`, `coprime_to_wheel`):
//!    offsets whose candidate shares a factor with 2·3·5·7 can be cleared
//!    before the prime loop even starts. An optimization only; the sieve is
//!    correct without it.
//!
//! ## Complexity
//!
//! One segment pass costs O(Σ len/p) ≈ O(len · ln ln P) u64 operations for
//! sieving primes up to P, amortized over every candidate in the window.
//! The bitmap keeps a 256 Ki-bit segment in 32 KiB, inside L1/L2 on
//! anything modern.

use rug::Integer;

/// Bits per sieve segment (32 KiB of bitmap).
pub const DEFAULT_SEGMENT_BITS: usize = 1 << 18;

/// How many small primes each mining job sieves with by default.
pub const DEFAULT_SIEVE_PRIMES: usize = 100_000;

/// Wheel modulus 2·3·5·7; offsets not coprime to it are trivially composite.
pub const WHEEL_MODULUS: u64 = 210;

/// Generate all primes up to and including `limit` with a classic sieve
/// of Eratosthenes.
pub fn generate_small_primes(limit: u64) -> Vec<u64> {
    if limit < 2 {
        return vec![];
    }
    let limit = limit as usize;
    let mut composite = vec![false; limit + 1];
    let mut p = 2usize;
    while p * p <= limit {
        if !composite[p] {
            let mut m = p * p;
            while m <= limit {
                composite[m] = true;
                m += p;
            }
        }
        p += 1;
    }
    (2..=limit)
        .filter(|&n| !composite[n])
        .map(|n| n as u64)
        .collect()
}

/// Generate (at least) the first `count` primes and truncate to exactly
/// `count`. The sieve bound comes from the p_n ~ n(ln n + ln ln n) upper
/// bound, so the underlying sieve never has to be rerun.
pub fn sieving_primes(count: usize) -> Vec<u64> {
    if count == 0 {
        return vec![];
    }
    let bound = if count < 6 {
        13
    } else {
        let n = count as f64;
        (n * (n.ln() + n.ln().ln())).ceil() as u64 + 1
    };
    let mut primes = generate_small_primes(bound);
    primes.truncate(count);
    primes
}

/// Euclid's gcd on u64.
fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

/// True if `n mod 210` shares no factor with the wheel modulus.
#[inline]
pub fn coprime_to_wheel(n: u64) -> bool {
    gcd(n % WHEEL_MODULUS, WHEEL_MODULUS) == 1
}

/// The 48 residues mod 210 coprime to 2·3·5·7, ascending.
pub fn wheel_residues() -> Vec<u64> {
    (0..WHEEL_MODULUS).filter(|&r| coprime_to_wheel(r)).collect()
}

/// Per-prime residues of a big-integer base: `residues[i] = base mod
/// primes[i]`. Computed once per mining job so segment passes stay in
/// u64 arithmetic.
pub fn base_residues(base: &Integer, primes: &[u64]) -> Vec<u64> {
    primes.iter().map(|&p| base.mod_u(p as u32) as u64).collect()
}

/// Packed bit buffer over one contiguous numeric window.
///
/// Bit `i` set means position `i` is still a candidate; clear means ruled
/// out. Words are u64, bit `i` lives in word `i / 64` at position `i % 64`;
/// padding bits past `len` are kept clear so `count_candidates` is exact.
pub struct SieveSegment {
    words: Vec<u64>,
    len: usize,
}

impl SieveSegment {
    /// A segment of `len` bits, everything a candidate.
    pub fn new(len: usize) -> Self {
        let num_words = len.div_ceil(64);
        let mut words = vec![u64::MAX; num_words];
        let extra = num_words * 64 - len;
        if extra > 0 && num_words > 0 {
            words[num_words - 1] >>= extra;
        }
        SieveSegment { words, len }
    }

    /// Re-arm every bit for the next window without reallocating.
    pub fn reset(&mut self) {
        let num_words = self.words.len();
        for w in &mut self.words {
            *w = u64::MAX;
        }
        let extra = num_words * 64 - self.len;
        if extra > 0 && num_words > 0 {
            self.words[num_words - 1] >>= extra;
        }
    }

    /// Number of bits in the window.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True if position `index` is still a candidate.
    ///
    /// # Panics
    /// Panics in debug builds if `index >= len`.
    #[inline]
    pub fn get(&self, index: usize) -> bool {
        debug_assert!(index < self.len, "segment index {} >= {}", index, self.len);
        self.words[index / 64] & (1u64 << (index % 64)) != 0
    }

    /// Rule position `index` out as composite.
    #[inline]
    pub fn clear(&mut self, index: usize) {
        debug_assert!(index < self.len);
        self.words[index / 64] &= !(1u64 << (index % 64));
    }

    /// Surviving-candidate count via word-level popcount.
    pub fn count_candidates(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Indices of surviving candidates, ascending.
    pub fn iter_candidates(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(wi, &word)| {
            let base = wi * 64;
            CandidateIter { word, base }
        })
    }
}

/// Iterator over set bits within one u64 word.
struct CandidateIter {
    word: u64,
    base: usize,
}

impl Iterator for CandidateIter {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.word == 0 {
            return None;
        }
        let tz = self.word.trailing_zeros() as usize;
        self.word &= self.word - 1;
        Some(self.base + tz)
    }
}

/// Sieve a window of the integers themselves: positions are the numbers
/// `start .. start + segment.len()`, and every composite in that range up
/// to the square of the largest listed prime gets its bit cleared.
///
/// Multiples of `p` below `p²` are skipped (they are either `p` itself or
/// carry a smaller factor already handled), so primes in the window keep
/// their bits. Positions 0 and 1 are cleared explicitly when the window
/// covers them.
pub fn sieve_segment(segment: &mut SieveSegment, start: u64, primes: &[u64]) {
    let len = segment.len() as u64;
    if len == 0 {
        return;
    }
    let end = start + len;

    for &p in primes {
        // First multiple of p at or after start, but never below p².
        let first = start.div_ceil(p) * p;
        let mut m = first.max(p * p);
        while m < end {
            segment.clear((m - start) as usize);
            m += p;
        }
    }

    for unit in [0u64, 1] {
        if unit >= start && unit < end {
            segment.clear((unit - start) as usize);
        }
    }
}

/// Sieve a window of candidates `base + offset` for `offset` in
/// `window_start .. window_start + segment.len()`, where `residues[i] =
/// base mod primes[i]` (see [`base_residues`]).
///
/// Bit `i` of the segment is cleared when `base + window_start + i` is
/// divisible by a listed prime. The base is astronomically larger than any
/// sieving prime, so a divisible candidate is always a true composite and
/// no p² guard is needed.
pub fn sieve_segment_rebased(
    segment: &mut SieveSegment,
    window_start: u64,
    primes: &[u64],
    residues: &[u64],
) {
    let len = segment.len() as u64;
    if len == 0 {
        return;
    }

    for (&p, &r) in primes.iter().zip(residues) {
        // Smallest offset o >= 0 with (r + window_start + o) ≡ 0 (mod p).
        let shifted = (r + window_start % p) % p;
        let mut o = (p - shifted) % p;
        while o < len {
            segment.clear(o as usize);
            o += p;
        }
    }
}
