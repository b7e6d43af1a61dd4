//! # Header — Block Header View and PoW Hash
//!
//! The block header as seen by the proof-of-work engine: the six standard
//! chain fields plus the three gap-proof fields (`shift`, `adder`,
//! `gap_size`). The PoW hash — the value that seeds candidate derivation —
//! is the double SHA-256 of the serialized header *with the three proof
//! fields zeroed*, so a miner cannot influence its own search space by
//! fiddling the proof it is searching for.
//!
//! The adder is a 256-bit unsigned integer stored little-endian, matching
//! the wire layout of the hash fields.

use rug::integer::Order;
use rug::Integer;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Block header view consumed by the validator and snapshotted by the miner.
///
/// `prev_block`, `merkle_root`, and `adder` are little-endian byte arrays.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_block: [u8; 32],
    pub merkle_root: [u8; 32],
    pub time: u32,
    /// Compact difficulty: target merit × 10^6 (see [`crate::merit`]).
    pub bits: u32,
    pub nonce: u32,
    /// Search-space exponent. Consensus-bounded to [14, 65536].
    pub shift: u32,
    /// Offset within the 2^shift search space, little-endian. Must be
    /// < 2^shift for the proof to be valid.
    pub adder: [u8; 32],
    /// Claimed prime-gap length, ≥ 2.
    pub gap_size: u32,
}

impl BlockHeader {
    /// The adder as a big integer.
    pub fn adder_int(&self) -> Integer {
        Integer::from_digits(&self.adder, Order::Lsf)
    }

    /// Store a small adder value into the little-endian field.
    pub fn set_adder_u64(&mut self, adder: u64) {
        self.adder = [0u8; 32];
        self.adder[..8].copy_from_slice(&adder.to_le_bytes());
    }

    /// Store an arbitrary adder into the little-endian field.
    ///
    /// # Panics
    ///
    /// Panics if the adder does not fit in 256 bits, the wire field's
    /// width. The mining scheduler never produces adders past its 2^32
    /// span cap, so a wider value is always a caller bug, not a
    /// data-dependent condition worth an error path.
    pub fn set_adder(&mut self, adder: &Integer) {
        let digits = adder.to_digits::<u8>(Order::Lsf);
        assert!(digits.len() <= 32, "adder wider than 256 bits");
        self.adder = [0u8; 32];
        self.adder[..digits.len()].copy_from_slice(&digits);
    }

    /// Double SHA-256 of the header with `shift`, `adder`, and `gap_size`
    /// zeroed. Only the six remaining fields enter the digest, serialized
    /// little-endian in declaration order, so the proof fields can never
    /// perturb the hash that seeds their own candidate.
    pub fn pow_hash(&self) -> [u8; 32] {
        let mut bytes = Vec::with_capacity(4 + 32 + 32 + 4 + 4 + 4);
        bytes.extend_from_slice(&self.version.to_le_bytes());
        bytes.extend_from_slice(&self.prev_block);
        bytes.extend_from_slice(&self.merkle_root);
        bytes.extend_from_slice(&self.time.to_le_bytes());
        bytes.extend_from_slice(&self.bits.to_le_bytes());
        bytes.extend_from_slice(&self.nonce.to_le_bytes());

        let first = Sha256::digest(&bytes);
        let second = Sha256::digest(first);
        second.into()
    }

    /// The PoW hash as a little-endian big integer, the base value every
    /// candidate is derived from.
    pub fn pow_hash_int(&self) -> Integer {
        Integer::from_digits(&self.pow_hash(), Order::Lsf)
    }
}

impl Default for BlockHeader {
    fn default() -> Self {
        BlockHeader {
            version: 1,
            prev_block: [0u8; 32],
            merkle_root: [0u8; 32],
            time: 0,
            bits: 0,
            nonce: 0,
            shift: 0,
            adder: [0u8; 32],
            gap_size: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> BlockHeader {
        BlockHeader {
            version: 2,
            prev_block: [0xAB; 32],
            merkle_root: [0xCD; 32],
            time: 1_700_000_000,
            bits: 20_000_000,
            nonce: 42,
            shift: 20,
            adder: [0u8; 32],
            gap_size: 0,
        }
    }

    /// The same header hashes to the same value on every call.
    #[test]
    fn pow_hash_is_deterministic() {
        let h = sample_header();
        assert_eq!(h.pow_hash(), h.pow_hash());
    }

    /// Mutating any proof field leaves the PoW hash unchanged — the three
    /// fields are excluded from the digest entirely.
    #[test]
    fn pow_fields_do_not_affect_hash() {
        let base = sample_header();
        let mut h = base.clone();
        h.shift = 65536;
        h.gap_size = 1234;
        h.set_adder_u64(0xDEAD_BEEF);
        assert_eq!(base.pow_hash(), h.pow_hash());
    }

    /// Mutating any hashed field changes the PoW hash.
    #[test]
    fn chain_fields_affect_hash() {
        let base = sample_header();
        for mutate in [
            (|h: &mut BlockHeader| h.version = 3) as fn(&mut BlockHeader),
            |h| h.time += 1,
            |h| h.bits += 1,
            |h| h.nonce += 1,
            |h| h.prev_block[0] ^= 1,
            |h| h.merkle_root[31] ^= 1,
        ] {
            let mut h = base.clone();
            mutate(&mut h);
            assert_ne!(base.pow_hash(), h.pow_hash(), "hash ignored a chain field");
        }
    }

    /// A big-integer adder round-trips through the 256-bit field.
    #[test]
    fn adder_integer_roundtrip() {
        let mut h = sample_header();
        let wide = (Integer::from(1u32) << 200u32) + 0xFEED_FACEu32;
        h.set_adder(&wide);
        assert_eq!(h.adder_int(), wide);
        h.set_adder(&Integer::from(0u32));
        assert_eq!(h.adder_int(), Integer::from(0u32));
    }

    /// An adder wider than the 256-bit field is refused in every build
    /// profile, not just under debug assertions.
    #[test]
    #[should_panic(expected = "adder wider than 256 bits")]
    fn adder_past_field_width_panics() {
        let mut h = sample_header();
        h.set_adder(&(Integer::from(1u32) << 256u32));
    }

    /// adder round-trips through the little-endian field.
    #[test]
    fn adder_u64_roundtrip() {
        let mut h = sample_header();
        h.set_adder_u64(0x0123_4567_89AB_CDEF);
        assert_eq!(h.adder_int(), Integer::from(0x0123_4567_89AB_CDEFu64));
        h.set_adder_u64(0);
        assert_eq!(h.adder_int(), Integer::from(0u32));
    }

    /// The hash integer is read little-endian: the last digest byte is the
    /// most significant.
    #[test]
    fn pow_hash_int_is_little_endian() {
        let h = sample_header();
        let digest = h.pow_hash();
        let n = h.pow_hash_int();
        let expected = Integer::from_digits(&digest, Order::Lsf);
        assert_eq!(n, expected);
        // Cross-check one byte by hand: bit 0 of the integer is bit 0 of
        // digest[0].
        assert_eq!(n.get_bit(0), digest[0] & 1 == 1);
    }

    /// Headers survive a serde JSON round trip (used by the CLI `check`
    /// subcommand).
    #[test]
    fn serde_json_roundtrip() {
        let mut h = sample_header();
        h.set_adder_u64(987_654_321);
        h.gap_size = 36;
        let json = serde_json::to_string(&h).unwrap();
        let back: BlockHeader = serde_json::from_str(&json).unwrap();
        assert_eq!(h, back);
    }
}
