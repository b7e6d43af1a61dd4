//! # gapwork — Prime-Gap Proof-of-Work Engine
//!
//! Consensus validation and sieve-based mining for a prime-gap
//! proof-of-work: a block is valid when the candidate derived from its
//! header starts a genuine gap between consecutive primes whose merit
//! (gap size normalized by `ln(start)`) meets the chain's target.
//!
//! Two halves that must agree bit-for-bit:
//!
//! - **Validation** ([`pow::check_proof`]): re-derives the candidate,
//!   re-verifies the gap endpoints and interior, and compares the merit to
//!   the compact target in the header. Never trusts the miner.
//! - **Mining** ([`miner::GapMiner`]): slides segmented sieves across the
//!   adder space, scans the bitmap for large runs, and confirms each one
//!   with the *same* verifier before reporting a solution.
//!
//! Supporting modules: fixed-witness primality ([`primality`]), gap
//! verification ([`gap`]), merit and chain work ([`merit`]), difficulty
//! retargeting ([`difficulty`]), header hashing ([`header`]), the sieve
//! primitives ([`sieve`]), pluggable execution backends ([`backend`]),
//! and shared session counters ([`stats`]).

pub mod backend;
pub mod difficulty;
pub mod gap;
pub mod header;
pub mod merit;
pub mod miner;
pub mod pow;
pub mod primality;
pub mod sieve;
pub mod stats;
