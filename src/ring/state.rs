// In: src/ring/state.rs

//! The lifecycle contract every ring variant implements, and `Slots`, the
//! shared per-group storage (values + null counts) most variants are built on.

use crate::arena::{Arena, ArenaVec, Growth};
use crate::error::RingwireError;
use crate::null_handling::NullBitmap;
use crate::traits::Scalar;
use crate::types::Type;
use crate::vector::Vector;

//==================================================================================
// 1. The contract
//==================================================================================

/// One accumulator for a single (function, type) pair.
///
/// Group indices are validated on every call. A ring that has been evaluated
/// rejects every further mutation with `RingFinalized`.
pub trait Accumulator: Sized {
    /// Input type the ring was created for.
    fn typ(&self) -> &Type;

    /// Type of the vector `eval` produces.
    fn output_type(&self) -> Type;

    /// A new, empty ring of the same variant and configuration.
    fn dup(&self) -> Self;

    fn count(&self) -> usize;

    /// Slot capacity reserved by the first single-group grow.
    fn initial_capacity(&self) -> usize;

    /// Arena bytes held.
    fn size(&self) -> usize;

    fn null_counts(&self) -> &[i64];

    /// Appends `n` groups initialised to the identity with zero null count.
    fn grow_by(&mut self, arena: &Arena, n: usize, growth: Growth) -> Result<(), RingwireError>;

    fn fill(&mut self, group: usize, row: usize, weight: i64, vec: &Vector) -> Result<(), RingwireError>;

    /// Folds rows `start + i` with `mask[i] == 1` into `groups[i]`, weighted by
    /// `zs[start + i]`.
    fn batch_fill(
        &mut self,
        start: usize,
        mask: &[u8],
        groups: &[u64],
        zs: &[i64],
        vec: &Vector,
    ) -> Result<(), RingwireError> {
        check_batch_args(start, mask, groups)?;
        check_len("weights", zs.len(), start + mask.len())?;
        for (i, (&m, &g)) in mask.iter().zip(groups).enumerate() {
            if m == 1 {
                self.fill(g as usize, start + i, zs[start + i], vec)?;
            }
        }
        Ok(())
    }

    /// Folds every row of `vec` into one group, row `j` weighted by `zs[j]`.
    fn bulk_fill(&mut self, group: usize, zs: &[i64], vec: &Vector) -> Result<(), RingwireError> {
        check_len("weights", zs.len(), vec.len())?;
        for row in 0..vec.len() {
            self.fill(group, row, zs[row], vec)?;
        }
        Ok(())
    }

    /// Merges group `src` of `other` into group `dst` of `self`.
    fn add(&mut self, other: &Self, src: usize, dst: usize) -> Result<(), RingwireError>;

    /// Merges groups `start + i` of `other` with `mask[i] == 1` into `groups[i]`.
    fn batch_add(
        &mut self,
        other: &Self,
        start: usize,
        mask: &[u8],
        groups: &[u64],
    ) -> Result<(), RingwireError> {
        check_batch_args(start, mask, groups)?;
        for (i, (&m, &g)) in mask.iter().zip(groups).enumerate() {
            if m == 1 {
                self.add(other, start + i, g as usize)?;
            }
        }
        Ok(())
    }

    /// Scales `group` as if every row folded into it had been seen `factor`
    /// times: the null count and the additive statistics are multiplied,
    /// idempotent ones (MIN, MAX, BIT_AND, BIT_OR) only change their null count.
    fn mul(&mut self, group: usize, factor: i64) -> Result<(), RingwireError>;

    /// Finalises into an output vector. The ring is unusable afterwards.
    fn eval(&mut self, zs: &[i64]) -> Result<Vector, RingwireError>;

    fn shrink(&mut self, sels: &[i64]) -> Result<(), RingwireError>;

    fn set_length(&mut self, n: usize) -> Result<(), RingwireError>;

    /// Releases all arena memory. The ring is empty afterwards.
    fn free(&mut self);
}

//==================================================================================
// 2. Argument checks
//==================================================================================

pub(crate) fn check_group(group: usize, count: usize) -> Result<usize, RingwireError> {
    if group < count {
        Ok(group)
    } else {
        Err(RingwireError::ContractViolation(format!(
            "group {} out of range for {} groups",
            group, count
        )))
    }
}

pub(crate) fn check_len(what: &str, have: usize, need: usize) -> Result<(), RingwireError> {
    if have < need {
        return Err(RingwireError::ContractViolation(format!(
            "{} has {} entries, at least {} required",
            what, have, need
        )));
    }
    Ok(())
}

pub(crate) fn check_batch_args(start: usize, mask: &[u8], groups: &[u64]) -> Result<(), RingwireError> {
    if mask.len() != groups.len() {
        return Err(RingwireError::ContractViolation(format!(
            "selection mask has {} entries but group assignment has {} (start {})",
            mask.len(),
            groups.len(),
            start
        )));
    }
    Ok(())
}

/// Null bitmap for `eval`: group `i` is null iff `zs[i] - nulls[i] == 0`.
pub(crate) fn eval_nulls(nulls: &[i64], zs: &[i64]) -> Result<NullBitmap, RingwireError> {
    if zs.len() != nulls.len() {
        return Err(RingwireError::ContractViolation(format!(
            "eval given {} weights for {} groups",
            zs.len(),
            nulls.len()
        )));
    }
    let mut bitmap = NullBitmap::new();
    for (group, (&total, &n)) in zs.iter().zip(nulls).enumerate() {
        if total < n {
            return Err(RingwireError::WeightUnderflow {
                group,
                total,
                nulls: n,
            });
        }
        if total == n {
            bitmap.add(group);
        }
    }
    Ok(bitmap)
}

//==================================================================================
// 3. Per-group storage
//==================================================================================

/// Parallel value and null-count slots, both arena backed.
#[derive(Debug)]
pub struct Slots<T: Scalar> {
    pub(crate) values: ArenaVec<T>,
    pub(crate) nulls: ArenaVec<i64>,
    finalized: bool,
}

impl<T: Scalar> Slots<T> {
    pub fn new() -> Self {
        Self {
            values: ArenaVec::new(),
            nulls: ArenaVec::new(),
            finalized: false,
        }
    }

    /// Rebuilds slots from decoded parts.
    pub(crate) fn from_parts(values: ArenaVec<T>, nulls: ArenaVec<i64>) -> Result<Self, RingwireError> {
        if values.len() != nulls.len() {
            return Err(RingwireError::MalformedEncoding(format!(
                "{} ring values but {} null counts",
                values.len(),
                nulls.len()
            )));
        }
        Ok(Self {
            values,
            nulls,
            finalized: false,
        })
    }

    pub fn live(&self) -> Result<(), RingwireError> {
        if self.finalized {
            Err(RingwireError::RingFinalized)
        } else {
            Ok(())
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn size(&self) -> usize {
        self.values.size_bytes() + self.nulls.size_bytes()
    }

    /// Live check plus group bound check.
    pub fn group(&self, group: usize) -> Result<usize, RingwireError> {
        self.live()?;
        check_group(group, self.len())
    }

    /// Appends `n` slots set to `identity`. Either both arrays grow or neither does.
    pub fn grow(&mut self, arena: &Arena, n: usize, identity: T, growth: Growth) -> Result<(), RingwireError> {
        self.live()?;
        let before = self.values.len();
        self.values.extend_filled(arena, n, identity, growth)?;
        if let Err(e) = self.nulls.extend_filled(arena, n, 0, growth) {
            self.values.truncate(before);
            return Err(e);
        }
        Ok(())
    }

    pub fn add_nulls(&mut self, group: usize, weight: i64) {
        let slot = &mut self.nulls.as_mut_slice()[group];
        *slot = slot.wrapping_add(weight);
    }

    /// Multiplies the null count of `group` by `factor` and rewrites its value
    /// with `scale`. Returns the checked group index.
    pub fn mul(
        &mut self,
        group: usize,
        factor: i64,
        scale: impl FnOnce(T, i64) -> T,
    ) -> Result<usize, RingwireError> {
        let group = self.group(group)?;
        let slot = &mut self.nulls.as_mut_slice()[group];
        *slot = slot.wrapping_mul(factor);
        let value = &mut self.values.as_mut_slice()[group];
        *value = scale(*value, factor);
        Ok(group)
    }

    pub fn shrink(&mut self, sels: &[i64]) -> Result<(), RingwireError> {
        self.live()?;
        self.values.gather(sels)?;
        self.nulls.gather(sels)
    }

    pub fn set_length(&mut self, n: usize) -> Result<(), RingwireError> {
        self.live()?;
        if n > self.len() {
            return Err(RingwireError::ContractViolation(format!(
                "set_length({}) on a ring of {} groups",
                n,
                self.len()
            )));
        }
        self.values.truncate(n);
        self.nulls.truncate(n);
        Ok(())
    }

    /// Computes the output null bitmap and detaches the value buffer.
    pub fn finish(&mut self, zs: &[i64]) -> Result<(ArenaVec<T>, NullBitmap), RingwireError> {
        self.live()?;
        let bitmap = eval_nulls(self.nulls.as_slice(), zs)?;
        self.finalized = true;
        self.nulls = ArenaVec::new();
        Ok((std::mem::take(&mut self.values), bitmap))
    }

    pub fn free(&mut self) {
        self.values = ArenaVec::new();
        self.nulls = ArenaVec::new();
    }
}

impl<T: Scalar> Default for Slots<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Slot growth policy for a single-group `grow`.
pub(crate) fn single_growth(initial_capacity: usize) -> Growth {
    Growth::Geometric {
        initial: initial_capacity.max(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval_nulls_rule() {
        let bitmap = eval_nulls(&[0, 3, 1], &[2, 3, 2]).unwrap();
        assert_eq!(bitmap.iter().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_eval_nulls_rejects_underflow_and_length_mismatch() {
        assert!(matches!(
            eval_nulls(&[0, 4], &[1, 2]),
            Err(RingwireError::WeightUnderflow {
                group: 1,
                total: 2,
                nulls: 4
            })
        ));
        assert!(matches!(
            eval_nulls(&[0, 0], &[1]),
            Err(RingwireError::ContractViolation(_))
        ));
    }

    #[test]
    fn test_grow_is_all_or_nothing() {
        // 8 i64 values fit, the matching null counts do not.
        let arena = Arena::with_budget(64);
        let mut slots: Slots<i64> = Slots::new();
        let err = slots.grow(&arena, 8, 0, Growth::Exact).unwrap_err();
        assert!(matches!(err, RingwireError::AllocationExhausted { .. }));
        assert_eq!(slots.values.len(), 0);
        assert_eq!(slots.nulls.len(), 0);
    }

    #[test]
    fn test_finish_seals_slots() {
        let arena = Arena::unbounded();
        let mut slots: Slots<u8> = Slots::new();
        slots.grow(&arena, 2, 9, Growth::Exact).unwrap();
        let (values, nulls) = slots.finish(&[1, 1]).unwrap();
        assert_eq!(values.as_slice(), &[9, 9]);
        assert!(!nulls.any());
        assert!(matches!(slots.mul(0, 2, |v, _| v), Err(RingwireError::RingFinalized)));
        assert!(matches!(slots.finish(&[]), Err(RingwireError::RingFinalized)));
    }
}
