// In: src/ring/count.rs

//! COUNT and STARCOUNT.
//!
//! Both add the row weight to the group's count; COUNT skips null rows,
//! STARCOUNT does not. Null rows are still tracked in the null counts so the
//! codec and `mul` behave like every other ring, but a count is never null.

use crate::arena::{Arena, Growth};
use crate::config::RingwireConfig;
use crate::error::RingwireError;
use crate::null_handling::NullBitmap;
use crate::ring::state::{check_group, Accumulator, Slots};
use crate::types::{Type, TypeKind};
use crate::vector::Vector;

#[derive(Debug)]
pub struct CountRing {
    pub(crate) typ: Type,
    pub(crate) star: bool,
    pub(crate) slots: Slots<i64>,
    pub(crate) initial_capacity: usize,
}

impl CountRing {
    pub fn new(typ: Type, star: bool, config: &RingwireConfig) -> Self {
        Self {
            typ,
            star,
            slots: Slots::new(),
            initial_capacity: config.initial_group_capacity,
        }
    }

    pub fn is_star(&self) -> bool {
        self.star
    }

    pub fn values(&self) -> &[i64] {
        self.slots.values.as_slice()
    }
}

impl Accumulator for CountRing {
    fn typ(&self) -> &Type {
        &self.typ
    }

    fn output_type(&self) -> Type {
        Type::new(TypeKind::Int64)
    }

    fn dup(&self) -> Self {
        Self {
            typ: self.typ,
            star: self.star,
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
        self.slots.grow(arena, n, 0, growth)
    }

    fn fill(&mut self, group: usize, row: usize, weight: i64, vec: &Vector) -> Result<(), RingwireError> {
        let group = self.slots.group(group)?;
        check_group(row, vec.len())?;
        let null = vec.is_null(row);
        if null {
            self.slots.add_nulls(group, weight);
        }
        if self.star || !null {
            let slot = &mut self.slots.values.as_mut_slice()[group];
            *slot = slot.wrapping_add(weight);
        }
        Ok(())
    }

    fn add(&mut self, other: &Self, src: usize, dst: usize) -> Result<(), RingwireError> {
        let dst = self.slots.group(dst)?;
        let src = other.slots.group(src)?;
        let slot = &mut self.slots.values.as_mut_slice()[dst];
        *slot = slot.wrapping_add(other.slots.values.as_slice()[src]);
        self.slots.add_nulls(dst, other.slots.nulls.as_slice()[src]);
        Ok(())
    }

    fn mul(&mut self, group: usize, factor: i64) -> Result<(), RingwireError> {
        self.slots.mul(group, factor, i64::wrapping_mul)?;
        Ok(())
    }

    fn eval(&mut self, zs: &[i64]) -> Result<Vector, RingwireError> {
        let (values, _) = self.slots.finish(zs)?;
        Vector::from_buffer(self.output_type(), values.into_buffer(), NullBitmap::new())
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
