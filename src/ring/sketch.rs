// In: src/ring/sketch.rs

//! HyperLogLog cardinality sketch backing APPROX_COUNT_DISTINCT.
//!
//! `2^precision` one-byte registers. Inserting takes a 64-bit hash: the low
//! `precision` bits pick the register, the rank of the first set bit in the
//! remaining bits is max-merged into it. Union is a register-wise max, which is
//! what makes partial sketches mergeable across workers.
//!
//! Hashing is XXH3 with a fixed seed, so registers built on different nodes and
//! by different builds agree. The register functions work on plain slices; the
//! ring keeps every group's registers in one arena-backed array and
//! `HllSketch` is the owned form of a single sketch.

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64_with_seed;

use crate::config::{MAX_SKETCH_PRECISION, MIN_SKETCH_PRECISION};
use crate::error::RingwireError;

/// Seed of the register hash. Part of the wire format.
pub const SKETCH_HASH_SEED: u64 = 0x5249_4e47_5749_5245;

pub fn clamp_precision(precision: u8) -> u8 {
    precision.clamp(MIN_SKETCH_PRECISION, MAX_SKETCH_PRECISION)
}

/// Registers in a sketch of `precision`.
pub fn register_count(precision: u8) -> usize {
    1 << precision
}

pub fn hash_bytes(bytes: &[u8]) -> u64 {
    xxh3_64_with_seed(bytes, SKETCH_HASH_SEED)
}

pub(crate) fn insert_hash(registers: &mut [u8], precision: u8, hash: u64) {
    let p = precision as u32;
    let idx = (hash & ((1u64 << p) - 1)) as usize;
    let rank = ((hash >> p).leading_zeros() - p + 1) as u8;
    if rank > registers[idx] {
        registers[idx] = rank;
    }
}

pub(crate) fn merge_registers(mine: &mut [u8], theirs: &[u8]) {
    for (m, t) in mine.iter_mut().zip(theirs) {
        *m = (*m).max(*t);
    }
}

pub(crate) fn estimate_registers(registers: &[u8]) -> f64 {
    let m = registers.len() as f64;
    let alpha = match registers.len() {
        16 => 0.673,
        32 => 0.697,
        64 => 0.709,
        _ => 0.7213 / (1.0 + 1.079 / m),
    };
    let sum: f64 = registers.iter().map(|&r| 2.0_f64.powi(-(r as i32))).sum();
    let raw = alpha * m * m / sum;

    // Small-range correction: linear counting over empty registers.
    let zeros = registers.iter().filter(|&&r| r == 0).count();
    if raw <= 2.5 * m && zeros > 0 {
        m * (m / zeros as f64).ln()
    } else {
        raw
    }
}

/// Splits a `precision` byte + registers blob, checking both.
pub(crate) fn split_blob(bytes: &[u8]) -> Result<(u8, &[u8]), RingwireError> {
    let (&precision, registers) = bytes
        .split_first()
        .ok_or_else(|| RingwireError::MalformedEncoding("empty sketch blob".into()))?;
    if !(MIN_SKETCH_PRECISION..=MAX_SKETCH_PRECISION).contains(&precision) {
        return Err(RingwireError::MalformedEncoding(format!(
            "sketch precision {} out of range",
            precision
        )));
    }
    if registers.len() != register_count(precision) {
        return Err(RingwireError::MalformedEncoding(format!(
            "sketch of precision {} carries {} registers",
            precision,
            registers.len()
        )));
    }
    Ok((precision, registers))
}

pub(crate) fn blob(precision: u8, registers: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + registers.len());
    out.push(precision);
    out.extend_from_slice(registers);
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HllSketch {
    precision: u8,
    registers: Vec<u8>,
}

impl HllSketch {
    /// Creates an empty sketch; `precision` is clamped to the supported range.
    pub fn new(precision: u8) -> Self {
        let precision = clamp_precision(precision);
        Self {
            precision,
            registers: vec![0; register_count(precision)],
        }
    }

    /// Copies registers that already passed a precision check.
    pub(crate) fn from_registers(precision: u8, registers: &[u8]) -> Self {
        Self {
            precision,
            registers: registers.to_vec(),
        }
    }

    pub fn precision(&self) -> u8 {
        self.precision
    }

    pub fn register_count(&self) -> usize {
        self.registers.len()
    }

    pub fn registers(&self) -> &[u8] {
        &self.registers
    }

    pub fn insert_bytes(&mut self, bytes: &[u8]) {
        self.insert_hash(hash_bytes(bytes));
    }

    pub fn insert_hash(&mut self, hash: u64) {
        insert_hash(&mut self.registers, self.precision, hash);
    }

    /// Register-wise union. Sketches must share a precision.
    pub fn merge(&mut self, other: &HllSketch) -> Result<(), RingwireError> {
        if self.precision != other.precision {
            return Err(RingwireError::ContractViolation(format!(
                "cannot merge sketches of precision {} and {}",
                self.precision, other.precision
            )));
        }
        merge_registers(&mut self.registers, &other.registers);
        Ok(())
    }

    pub fn estimate(&self) -> f64 {
        estimate_registers(&self.registers)
    }

    /// `precision` byte followed by the registers.
    pub fn to_bytes(&self) -> Vec<u8> {
        blob(self.precision, &self.registers)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RingwireError> {
        let (precision, registers) = split_blob(bytes)?;
        Ok(Self::from_registers(precision, registers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sketch_estimates_zero() {
        let sketch = HllSketch::new(10);
        assert_eq!(sketch.register_count(), 1024);
        assert_eq!(sketch.estimate(), 0.0);
    }

    #[test]
    fn test_duplicates_do_not_inflate_estimate() {
        let mut sketch = HllSketch::new(12);
        for _ in 0..100 {
            sketch.insert_bytes(b"same");
        }
        let estimate = sketch.estimate();
        assert!(estimate > 0.5 && estimate < 1.5, "got {}", estimate);
    }

    #[test]
    fn test_estimate_within_error_bounds() {
        let mut sketch = HllSketch::new(14);
        for i in 0u64..10_000 {
            sketch.insert_bytes(&i.to_le_bytes());
        }
        let estimate = sketch.estimate();
        // Standard error at p=14 is under 1%; allow a wide margin.
        assert!(estimate > 9_000.0 && estimate < 11_000.0, "got {}", estimate);
    }

    #[test]
    fn test_merge_is_union() {
        let mut left = HllSketch::new(12);
        let mut right = HllSketch::new(12);
        for i in 0u32..500 {
            left.insert_bytes(&i.to_le_bytes());
        }
        for i in 250u32..1000 {
            right.insert_bytes(&i.to_le_bytes());
        }
        left.merge(&right).unwrap();
        let estimate = left.estimate();
        assert!(estimate > 900.0 && estimate < 1100.0, "got {}", estimate);

        assert!(left.merge(&HllSketch::new(8)).is_err());
    }

    #[test]
    fn test_hash_is_fixed_across_builds() {
        // Reference XXH3-64 value of the empty input under seed 0.
        assert_eq!(xxh3_64_with_seed(b"", 0), 0x2D06_8005_38D3_94C2);
        assert_eq!(hash_bytes(b"ring"), hash_bytes(b"ring"));
        assert_ne!(hash_bytes(b"ring"), hash_bytes(b"wire"));

        // Two independently built sketches of the same input share registers.
        let mut a = HllSketch::new(8);
        let mut b = HllSketch::new(8);
        for i in 0u32..300 {
            a.insert_bytes(&i.to_le_bytes());
        }
        for i in (0u32..300).rev() {
            b.insert_bytes(&i.to_le_bytes());
        }
        assert_eq!(a, b);
    }

    #[test]
    fn test_blob_rejects_bad_register_count() {
        let sketch = HllSketch::new(4);
        let mut blob = sketch.to_bytes();
        assert_eq!(HllSketch::from_bytes(&blob).unwrap(), sketch);
        blob.pop();
        assert!(matches!(
            HllSketch::from_bytes(&blob),
            Err(RingwireError::MalformedEncoding(_))
        ));
    }
}
