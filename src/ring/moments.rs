// In: src/ring/moments.rs

//! AVG and VARIANCE.
//!
//! Both keep sufficient statistics rather than the final ratio so partial rings
//! merge exactly: AVG keeps the weighted sum of x, VARIANCE additionally keeps
//! the weighted sum of x². The non-null weight of group `i` is recovered at
//! `eval` as `zs[i] - nulls[i]`.

use crate::arena::{Arena, ArenaVec, Growth};
use crate::config::RingwireConfig;
use crate::error::RingwireError;
use crate::ring::fold::numeric_as;
use crate::ring::state::{check_group, Accumulator, Slots};
use crate::types::{Type, TypeKind};
use crate::vector::Vector;

/// Non-null weight per group. Lengths are checked later by `Slots::finish`.
fn non_null_weights(zs: &[i64], nulls: &[i64]) -> Vec<i64> {
    zs.iter().zip(nulls).map(|(&z, &n)| z - n).collect()
}

fn read_f64(vec: &Vector, row: usize) -> Result<f64, RingwireError> {
    check_group(row, vec.len())?;
    Ok(numeric_as::<f64>(vec, row..row + 1)?[0])
}

//==================================================================================
// 1. AVG
//==================================================================================

#[derive(Debug)]
pub struct AvgRing {
    pub(crate) typ: Type,
    /// Weighted sum of x per group.
    pub(crate) slots: Slots<f64>,
    pub(crate) initial_capacity: usize,
}

impl AvgRing {
    pub fn new(typ: Type, config: &RingwireConfig) -> Self {
        Self {
            typ,
            slots: Slots::new(),
            initial_capacity: config.initial_group_capacity,
        }
    }

    pub fn sums(&self) -> &[f64] {
        self.slots.values.as_slice()
    }
}

impl Accumulator for AvgRing {
    fn typ(&self) -> &Type {
        &self.typ
    }

    fn output_type(&self) -> Type {
        Type::new(TypeKind::Float64)
    }

    fn dup(&self) -> Self {
        Self {
            typ: self.typ,
            slots: Slots::new(),
            initial_capacity: self.initial_capacity,
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
        self.slots.grow(arena, n, 0.0, growth)
    }

    fn fill(&mut self, group: usize, row: usize, weight: i64, vec: &Vector) -> Result<(), RingwireError> {
        let group = self.slots.group(group)?;
        if vec.is_null(row) {
            check_group(row, vec.len())?;
            self.slots.add_nulls(group, weight);
            return Ok(());
        }
        let x = read_f64(vec, row)?;
        self.slots.values.as_mut_slice()[group] += x * weight as f64;
        Ok(())
    }

    fn add(&mut self, other: &Self, src: usize, dst: usize) -> Result<(), RingwireError> {
        let dst = self.slots.group(dst)?;
        let src = other.slots.group(src)?;
        self.slots.values.as_mut_slice()[dst] += other.slots.values.as_slice()[src];
        self.slots.add_nulls(dst, other.slots.nulls.as_slice()[src]);
        Ok(())
    }

    fn mul(&mut self, group: usize, factor: i64) -> Result<(), RingwireError> {
        self.slots.mul(group, factor, |sum, k| sum * k as f64)?;
        Ok(())
    }

    fn eval(&mut self, zs: &[i64]) -> Result<Vector, RingwireError> {
        let weights = non_null_weights(zs, self.slots.nulls.as_slice());
        let (mut sums, nulls) = self.slots.finish(zs)?;
        for (sum, &w) in sums.as_mut_slice().iter_mut().zip(&weights) {
            *sum = if w > 0 { *sum / w as f64 } else { 0.0 };
        }
        Vector::from_buffer(self.output_type(), sums.into_buffer(), nulls)
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

//==================================================================================
// 2. VARIANCE (population)
//==================================================================================

#[derive(Debug)]
pub struct VarianceRing {
    pub(crate) typ: Type,
    /// Weighted sum of x per group.
    pub(crate) slots: Slots<f64>,
    /// Weighted sum of x² per group, parallel to `slots`.
    pub(crate) sum_x2: ArenaVec<f64>,
    pub(crate) initial_capacity: usize,
}

impl VarianceRing {
    pub fn new(typ: Type, config: &RingwireConfig) -> Self {
        Self {
            typ,
            slots: Slots::new(),
            sum_x2: ArenaVec::new(),
            initial_capacity: config.initial_group_capacity,
        }
    }

    pub fn sums(&self) -> &[f64] {
        self.slots.values.as_slice()
    }

    pub fn sums_of_squares(&self) -> &[f64] {
        self.sum_x2.as_slice()
    }
}

impl Accumulator for VarianceRing {
    fn typ(&self) -> &Type {
        &self.typ
    }

    fn output_type(&self) -> Type {
        Type::new(TypeKind::Float64)
    }

    fn dup(&self) -> Self {
        Self {
            typ: self.typ,
            slots: Slots::new(),
            sum_x2: ArenaVec::new(),
            initial_capacity: self.initial_capacity,
        }
    }

    fn initial_capacity(&self) -> usize {
        self.initial_capacity
    }

    fn count(&self) -> usize {
        self.slots.len()
    }

    fn size(&self) -> usize {
        self.slots.size() + self.sum_x2.size_bytes()
    }

    fn null_counts(&self) -> &[i64] {
        self.slots.nulls.as_slice()
    }

    fn grow_by(&mut self, arena: &Arena, n: usize, growth: Growth) -> Result<(), RingwireError> {
        let before = self.slots.len();
        self.slots.grow(arena, n, 0.0, growth)?;
        if let Err(e) = self.sum_x2.extend_filled(arena, n, 0.0, growth) {
            self.slots.set_length(before)?;
            return Err(e);
        }
        Ok(())
    }

    fn fill(&mut self, group: usize, row: usize, weight: i64, vec: &Vector) -> Result<(), RingwireError> {
        let group = self.slots.group(group)?;
        if vec.is_null(row) {
            check_group(row, vec.len())?;
            self.slots.add_nulls(group, weight);
            return Ok(());
        }
        let x = read_f64(vec, row)?;
        let w = weight as f64;
        self.slots.values.as_mut_slice()[group] += x * w;
        self.sum_x2.as_mut_slice()[group] += x * x * w;
        Ok(())
    }

    fn add(&mut self, other: &Self, src: usize, dst: usize) -> Result<(), RingwireError> {
        let dst = self.slots.group(dst)?;
        let src = other.slots.group(src)?;
        self.slots.values.as_mut_slice()[dst] += other.slots.values.as_slice()[src];
        self.sum_x2.as_mut_slice()[dst] += other.sum_x2.as_slice()[src];
        self.slots.add_nulls(dst, other.slots.nulls.as_slice()[src]);
        Ok(())
    }

    fn mul(&mut self, group: usize, factor: i64) -> Result<(), RingwireError> {
        let group = self.slots.mul(group, factor, |sum, k| sum * k as f64)?;
        self.sum_x2.as_mut_slice()[group] *= factor as f64;
        Ok(())
    }

    fn eval(&mut self, zs: &[i64]) -> Result<Vector, RingwireError> {
        let weights = non_null_weights(zs, self.slots.nulls.as_slice());
        let (mut out, nulls) = self.slots.finish(zs)?;
        let sum_x2 = std::mem::take(&mut self.sum_x2);
        for ((v, &sx2), &w) in out.as_mut_slice().iter_mut().zip(sum_x2.as_slice()).zip(&weights) {
            *v = if w > 0 {
                let n = w as f64;
                let mean = *v / n;
                // Rounding can push a zero variance slightly negative.
                (sx2 / n - mean * mean).max(0.0)
            } else {
                0.0
            };
        }
        Vector::from_buffer(self.output_type(), out.into_buffer(), nulls)
    }

    fn shrink(&mut self, sels: &[i64]) -> Result<(), RingwireError> {
        self.slots.shrink(sels)?;
        self.sum_x2.gather(sels)
    }

    fn set_length(&mut self, n: usize) -> Result<(), RingwireError> {
        self.slots.set_length(n)?;
        self.sum_x2.truncate(n);
        Ok(())
    }

    fn free(&mut self) {
        self.slots.free();
        self.sum_x2 = ArenaVec::new();
    }
}
