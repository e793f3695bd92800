// In: src/ring/numeric.rs

//! `NumericRing`: the fold-generic ring behind MIN, MAX, SUM and the bit operators.

use std::marker::PhantomData;

use crate::arena::{Arena, Growth};
use crate::config::RingwireConfig;
use crate::error::RingwireError;
use crate::ring::fold::Fold;
use crate::ring::state::{check_batch_args, check_group, check_len, Accumulator, Slots};
use crate::types::Type;
use crate::vector::Vector;

pub struct NumericRing<F: Fold> {
    pub(crate) typ: Type,
    pub(crate) slots: Slots<F::State>,
    pub(crate) initial_capacity: usize,
    _fold: PhantomData<F>,
}

impl<F: Fold> NumericRing<F> {
    pub fn new(typ: Type, config: &RingwireConfig) -> Self {
        Self {
            typ,
            slots: Slots::new(),
            initial_capacity: config.initial_group_capacity,
            _fold: PhantomData,
        }
    }

    /// Current per-group accumulator values.
    pub fn values(&self) -> &[F::State] {
        self.slots.values.as_slice()
    }

    /// Validates every selected group before anything is touched, so a bad
    /// assignment never leaves the ring half updated.
    fn check_assignment(&self, mask: &[u8], groups: &[u64]) -> Result<(), RingwireError> {
        let count = self.slots.len();
        for (&m, &g) in mask.iter().zip(groups) {
            if m == 1 {
                check_group(g as usize, count)?;
            }
        }
        Ok(())
    }
}

impl<F: Fold> std::fmt::Debug for NumericRing<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NumericRing")
            .field("typ", &self.typ)
            .field("values", &self.slots.values)
            .field("nulls", &self.slots.nulls)
            .finish()
    }
}

impl<F: Fold> Accumulator for NumericRing<F> {
    fn typ(&self) -> &Type {
        &self.typ
    }

    fn output_type(&self) -> Type {
        F::output_type(&self.typ)
    }

    fn dup(&self) -> Self {
        Self {
            typ: self.typ,
            slots: Slots::new(),
            initial_capacity: self.initial_capacity,
            _fold: PhantomData,
        }
    }

    fn initial_capacity(&self) -> usize {
        self.initial_capacity
    }

    fn count(&self) -> usize {
        self.slots.len()
    }

    fn size(&self) -> usize {
        self.slots.size()
    }

    fn null_counts(&self) -> &[i64] {
        self.slots.nulls.as_slice()
    }

    fn grow_by(&mut self, arena: &Arena, n: usize, growth: Growth) -> Result<(), RingwireError> {
        self.slots.grow(arena, n, F::identity(), growth)
    }

    fn fill(&mut self, group: usize, row: usize, weight: i64, vec: &Vector) -> Result<(), RingwireError> {
        let group = self.slots.group(group)?;
        check_group(row, vec.len())?;
        if vec.is_null(row) {
            self.slots.add_nulls(group, weight);
            return Ok(());
        }
        let v = F::input(vec, row..row + 1)?[0];
        let slot = &mut self.slots.values.as_mut_slice()[group];
        *slot = F::fold(*slot, v, weight);
        Ok(())
    }

    fn batch_fill(
        &mut self,
        start: usize,
        mask: &[u8],
        groups: &[u64],
        zs: &[i64],
        vec: &Vector,
    ) -> Result<(), RingwireError> {
        self.slots.live()?;
        check_batch_args(start, mask, groups)?;
        check_len("weights", zs.len(), start + mask.len())?;
        self.check_assignment(mask, groups)?;
        let input = F::input(vec, start..start + mask.len())?;
        let values = self.slots.values.as_mut_slice();

        if !vec.has_nulls() {
            for (i, (&m, &g)) in mask.iter().zip(groups).enumerate() {
                if m == 1 {
                    let g = g as usize;
                    values[g] = F::fold(values[g], input[i], zs[start + i]);
                }
            }
            return Ok(());
        }

        let nulls = self.slots.nulls.as_mut_slice();
        for (i, (&m, &g)) in mask.iter().zip(groups).enumerate() {
            if m != 1 {
                continue;
            }
            let g = g as usize;
            let weight = zs[start + i];
            if vec.is_null(start + i) {
                nulls[g] = nulls[g].wrapping_add(weight);
            } else {
                values[g] = F::fold(values[g], input[i], weight);
            }
        }
        Ok(())
    }

    fn bulk_fill(&mut self, group: usize, zs: &[i64], vec: &Vector) -> Result<(), RingwireError> {
        let group = self.slots.group(group)?;
        check_len("weights", zs.len(), vec.len())?;
        let input = F::input(vec, 0..vec.len())?;
        let mut acc = self.slots.values.as_slice()[group];
        let mut null_weight = 0i64;
        for (row, &v) in input.iter().enumerate() {
            if vec.is_null(row) {
                null_weight = null_weight.wrapping_add(zs[row]);
            } else {
                acc = F::fold(acc, v, zs[row]);
            }
        }
        self.slots.values.as_mut_slice()[group] = acc;
        self.slots.add_nulls(group, null_weight);
        Ok(())
    }

    fn add(&mut self, other: &Self, src: usize, dst: usize) -> Result<(), RingwireError> {
        let dst = self.slots.group(dst)?;
        let src = other.slots.group(src)?;
        let theirs = other.slots.values.as_slice()[src];
        let slot = &mut self.slots.values.as_mut_slice()[dst];
        *slot = F::merge(*slot, theirs);
        self.slots.add_nulls(dst, other.slots.nulls.as_slice()[src]);
        Ok(())
    }

    fn batch_add(
        &mut self,
        other: &Self,
        start: usize,
        mask: &[u8],
        groups: &[u64],
    ) -> Result<(), RingwireError> {
        self.slots.live()?;
        other.slots.live()?;
        check_batch_args(start, mask, groups)?;
        check_len("source ring", other.slots.len(), start + mask.len())?;
        self.check_assignment(mask, groups)?;

        let theirs = other.slots.values.as_slice();
        let their_nulls = other.slots.nulls.as_slice();
        let values = self.slots.values.as_mut_slice();
        let nulls = self.slots.nulls.as_mut_slice();
        for (i, (&m, &g)) in mask.iter().zip(groups).enumerate() {
            if m == 1 {
                let g = g as usize;
                values[g] = F::merge(values[g], theirs[start + i]);
                nulls[g] = nulls[g].wrapping_add(their_nulls[start + i]);
            }
        }
        Ok(())
    }

    fn mul(&mut self, group: usize, factor: i64) -> Result<(), RingwireError> {
        self.slots.mul(group, factor, F::scale)?;
        Ok(())
    }

    fn eval(&mut self, zs: &[i64]) -> Result<Vector, RingwireError> {
        let (values, nulls) = self.slots.finish(zs)?;
        Vector::from_buffer(self.output_type(), values.into_buffer(), nulls)
    }

    fn shrink(&mut self, sels: &[i64]) -> Result<(), RingwireError> {
        self.slots.shrink(sels)
    }

    fn set_length(&mut self, n: usize) -> Result<(), RingwireError> {
        self.slots.set_length(n)
    }

    fn free(&mut self) {
        self.slots.free();
    }
}
