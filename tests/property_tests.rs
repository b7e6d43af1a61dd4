//! Property-based tests for gapwork's consensus and sieve primitives.
//!
//! These tests use the `proptest` framework to verify invariants across
//! thousands of randomly generated inputs. Example-based tests elsewhere in
//! the crate pin down specific known values; the properties here express
//! universal truths the proof-of-work rules depend on, which makes them
//! good at surfacing edge cases in candidate derivation, merit arithmetic,
//! and the sieve.
//!
//! # Prerequisites
//!
//! - No database or network access required.
//! - These tests are purely computational and always run.
//!
//! # How to run
//!
//! ```bash
//! # Run all property tests:
//! cargo test --test property_tests
//!
//! # Run a specific property:
//! cargo test --test property_tests prop_derive_candidate_is_odd
//!
//! # Increase case count for thorough testing (default is 256):
//! PROPTEST_CASES=10000 cargo test --test property_tests
//! ```
//!
//! # Testing strategy
//!
//! Properties are organized by module:
//! - **Merit module**: compact encoding roundtrip, chain-work monotonicity,
//!   agreement with floating-point logarithms on small inputs
//! - **Pow module**: candidate oddness and determinism, adder bound
//!   enforcement
//! - **Primality/gap modules**: no false negatives against GMP's
//!   Miller-Rabin, acceptance of true prime gaps, rejection of widened ones
//! - **Sieve module**: soundness (a cleared bit is never a prime)
//!
//! Each property is named `prop_<function>_<invariant>`. The `proptest!`
//! macro generates the harness, input strategies, and shrinking logic.
//!
//! # References
//!
//! - proptest: <https://proptest-rs.github.io/proptest/>

use proptest::prelude::*;
use rug::integer::IsPrime;
use rug::Integer;

use gapwork::gap::verify_gap;
use gapwork::header::BlockHeader;
use gapwork::merit::{calculate_merit, chain_work, compact_to_merit, merit_to_compact};
use gapwork::pow::{check_proof, derive_candidate, ConsensusParams, PowError, SHIFT_MIN};
use gapwork::primality::is_probably_prime;
use gapwork::sieve::{generate_small_primes, sieve_segment, SieveSegment};

/// Strategy producing a fully populated header with proof fields in their
/// consensus-legal ranges.
fn arb_header() -> impl Strategy<Value = BlockHeader> {
    (
        any::<[u8; 32]>(),
        any::<[u8; 32]>(),
        any::<u32>(),
        any::<u32>(),
        SHIFT_MIN..=256u32,
        any::<u64>(),
        2u32..=400,
    )
        .prop_map(
            |(prev_block, merkle_root, time, nonce, shift, adder, gap_size)| {
                let mut header = BlockHeader {
                    version: 2,
                    prev_block,
                    merkle_root,
                    time,
                    bits: merit_to_compact(20.0),
                    nonce,
                    shift,
                    gap_size,
                    ..BlockHeader::default()
                };
                header.set_adder_u64(adder % (1u64 << shift.min(63)));
                header
            },
        )
}

// == Merit Module Properties ===================================================
// The compact encoding rides in every block header; a drift of more than the
// encoding's own quantum between encode and decode would let miners claim a
// different target than the one the adjuster chose.
// ==============================================================================

proptest! {
    /// Verifies the compact difficulty encoding is lossless up to its quantum.
    ///
    /// **Mathematical property**: |decode(encode(m)) - m| <= 0.5e-6
    ///
    /// `merit_to_compact` rounds to the nearest millionth, so the decoded
    /// value can differ from the input by at most half that quantum.
    #[test]
    fn prop_merit_compact_roundtrip(merit in 0.0f64..=100.0) {
        let decoded = compact_to_merit(merit_to_compact(merit));
        prop_assert!((decoded - merit).abs() <= 0.5e-6 + f64::EPSILON,
            "merit {} decoded to {}", merit, decoded);
    }

    /// Verifies re-encoding a decoded compact value is the identity.
    ///
    /// **Mathematical property**: encode(decode(bits)) == bits
    ///
    /// This direction must be exact: two nodes exchanging `bits` fields must
    /// agree on the target to the last integer.
    #[test]
    fn prop_compact_merit_roundtrip_exact(bits in 0u32..=100_000_000) {
        prop_assert_eq!(merit_to_compact(compact_to_merit(bits)), bits);
    }

    /// Verifies chain work never decreases as merit increases.
    ///
    /// **Mathematical property**: a <= b implies chain_work(a) <= chain_work(b)
    ///
    /// Fork choice sums chain work; a non-monotonic work function would let a
    /// chain of weaker proofs outrank a chain of stronger ones.
    #[test]
    fn prop_chain_work_monotonic(a in 0.0f64..=120.0, b in 0.0f64..=120.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(chain_work(lo) <= chain_work(hi));
    }

    /// Verifies big-integer merit agrees with plain f64 arithmetic where the
    /// latter is exact enough to judge.
    ///
    /// **Mathematical property**: merit(n, g) ~= g / ln(n) for n that fit in u64
    ///
    /// The production path computes ln over a 256-bit start; for small starts
    /// both paths must land on the same value to within float noise.
    #[test]
    fn prop_calculate_merit_matches_f64(start in 1_000_000u64..=1u64 << 50, gap in 2u32..=2000) {
        let merit = calculate_merit(&Integer::from(start), gap);
        let reference = f64::from(gap) / (start as f64).ln();
        prop_assert!((merit - reference).abs() <= reference * 1e-9,
            "merit {} vs reference {}", merit, reference);
    }
}

// == Pow Module Properties =====================================================
// Candidate derivation is the hinge between mining and validation: both sides
// must derive the same integer from the same header, and the adder bound must
// hold regardless of what bytes a peer puts on the wire.
// ==============================================================================

proptest! {
    /// Verifies every derived candidate is odd.
    ///
    /// The base `hash << shift` is even for any legal shift, so the forced-odd
    /// step fires exactly when the adder is even. An even candidate would
    /// trivially fail the primality check and waste a validation round.
    #[test]
    fn prop_derive_candidate_is_odd(header in arb_header()) {
        prop_assert!(derive_candidate(&header).is_odd());
    }

    /// Verifies candidate derivation is a pure function of the header.
    ///
    /// Two independent derivations from the same header bytes must agree, and
    /// the candidate must sit in the window `[base, base + 2^shift + 1]`.
    #[test]
    fn prop_derive_candidate_deterministic(header in arb_header()) {
        let first = derive_candidate(&header);
        let second = derive_candidate(&header);
        prop_assert_eq!(&first, &second);

        let base = header.pow_hash_int() << header.shift;
        let span = Integer::from(1u32) << header.shift;
        prop_assert!(first >= base);
        prop_assert!(first <= base + span + 1u32);
    }

    /// Verifies an adder at or above 2^shift is rejected before any number
    /// theory runs.
    ///
    /// Without this bound a miner could replay one winning adder against
    /// every template by shifting it out of the claimed search space.
    #[test]
    fn prop_check_proof_rejects_wide_adder(
        mut header in arb_header(),
        excess in 0u32..=1000,
    ) {
        // Keep the widened adder inside the 256-bit header field.
        header.shift = header.shift.min(200);
        let wide = (Integer::from(1u32) << header.shift) + excess;
        header.set_adder(&wide);
        let result = check_proof(&header, &ConsensusParams::default());
        prop_assert!(matches!(result, Err(PowError::AdderTooLarge(_))),
            "expected adder rejection, got {:?}", result);
    }
}

// == Primality and Gap Properties ==============================================
// The Fermat test is the consensus primality oracle. It may wave through a
// pseudoprime (both sides then agree anyway), but it must never reject a true
// prime, and gap verification must track the actual next-prime structure.
// ==============================================================================

proptest! {
    /// Verifies the Fermat test never rejects a prime.
    ///
    /// **Mathematical property**: n prime implies is_probably_prime(n) == true
    ///
    /// GMP's 30-round Miller-Rabin is the reference oracle; any n it declares
    /// prime in this range genuinely is.
    #[test]
    fn prop_is_probably_prime_no_false_negatives(n in 2u64..=5_000_000) {
        let candidate = Integer::from(n);
        if candidate.is_probably_prime(30) != IsPrime::No {
            prop_assert!(is_probably_prime(&candidate, 3),
                "rejected the prime {}", n);
        }
    }

    /// Verifies a genuine gap between consecutive primes passes verification
    /// and any widening of it fails.
    ///
    /// The widened gap either ends on a composite or swallows the true upper
    /// endpoint into its interior; both are rejections.
    #[test]
    fn prop_verify_gap_tracks_consecutive_primes(seed in 1_000u64..=10_000_000) {
        let start = Integer::from(seed).next_prime();
        let end = Integer::from(&start).next_prime();
        let gap = u32::try_from(Integer::from(&end - &start)).unwrap();

        prop_assert!(verify_gap(&start, gap, 3));
        prop_assert!(!verify_gap(&start, gap + 2, 3));
    }
}

// == Sieve Module Properties ===================================================
// The sieve only ever discards candidates; the miner trusts that a cleared
// bit marks a composite and never re-examines it. An unsound clear would
// silently skip real gaps, an unsound keep merely costs a Fermat test.
// ==============================================================================

proptest! {
    /// Verifies the absolute sieve never clears a prime.
    ///
    /// **Soundness**: bit i cleared implies start + i is 0, 1, or composite.
    ///
    /// The prime list covers sqrt of the window end, so the sieve is also
    /// complete here, but soundness is the property consensus rests on.
    #[test]
    fn prop_sieve_segment_sound(start in 0u64..=1_000_000, len in 64usize..=2048) {
        let primes = generate_small_primes(1_024);
        let mut segment = SieveSegment::new(len);
        sieve_segment(&mut segment, start, &primes);

        for i in 0..len {
            if !segment.get(i) {
                let n = Integer::from(start + i as u64);
                prop_assert!(n.is_probably_prime(30) == IsPrime::No,
                    "sieve cleared the prime {}", start + i as u64);
            }
        }
    }
}
