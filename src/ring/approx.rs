// In: src/ring/approx.rs

//! APPROX_COUNT_DISTINCT: one HyperLogLog sketch per group.
//!
//! Values are hashed from their raw bytes, so any column kind is accepted.
//! Every group owns `2^precision` registers in one arena-backed array, so
//! sketch memory counts against the arena budget like any other ring state.
//! The u64 slots hold the estimate and are only written at `eval`; merging is
//! sketch union. Like COUNT, the result is never null.

use crate::arena::{gather_slice, Arena, ArenaVec, Growth};
use crate::config::RingwireConfig;
use crate::error::RingwireError;
use crate::null_handling::NullBitmap;
use crate::ring::sketch::{self, HllSketch};
use crate::ring::state::{check_group, Accumulator, Slots};
use crate::types::{Type, TypeKind};
use crate::vector::Vector;

#[derive(Debug)]
pub struct ApproxCdRing {
    pub(crate) typ: Type,
    pub(crate) slots: Slots<u64>,
    /// Group `g` owns `registers[g * width..(g + 1) * width]`.
    registers: ArenaVec<u8>,
    pub(crate) precision: u8,
    /// Arena of the last `grow_by`, used when `shrink` rebuilds the registers.
    arena: Option<Arena>,
    pub(crate) initial_capacity: usize,
}

/// Raw bytes of row `row`, whatever the column kind.
fn row_bytes(vec: &Vector, row: usize) -> Result<&[u8], RingwireError> {
    match vec.typ().kind.fixed_width() {
        Some(width) => {
            check_group(row, vec.len())?;
            Ok(&vec.raw_bytes()[row * width..(row + 1) * width])
        }
        None => vec.bytes_at(row),
    }
}

impl ApproxCdRing {
    pub fn new(typ: Type, config: &RingwireConfig) -> Self {
        Self {
            typ,
            slots: Slots::new(),
            registers: ArenaVec::new(),
            precision: sketch::clamp_precision(config.sketch_precision),
            arena: None,
            initial_capacity: config.initial_group_capacity,
        }
    }

    /// Registers per group.
    fn width(&self) -> usize {
        sketch::register_count(self.precision)
    }

    fn group_registers(&self, group: usize) -> &[u8] {
        let width = self.width();
        &self.registers.as_slice()[group * width..(group + 1) * width]
    }

    fn arena(&self) -> Arena {
        self.arena.clone().unwrap_or_else(Arena::unbounded)
    }

    /// Byte count of `groups` sketches, or `AllocationExhausted` past `usize::MAX`.
    fn register_bytes(&self, arena: &Arena, groups: usize) -> Result<usize, RingwireError> {
        groups
            .checked_mul(self.width())
            .ok_or_else(|| arena.oversized())
    }

    /// Rebuilds the sketches from decoded registers, `width` bytes per group.
    pub(crate) fn restore(&mut self, slots: Slots<u64>, precision: u8, registers: &[u8]) -> Result<(), RingwireError> {
        if registers.len() != slots.len() * sketch::register_count(precision) {
            return Err(RingwireError::MalformedEncoding(format!(
                "{} register bytes for {} sketches of precision {}",
                registers.len(),
                slots.len(),
                precision
            )));
        }
        self.precision = precision;
        self.slots = slots;
        self.registers = ArenaVec::from_slice(registers);
        Ok(())
    }

    /// An owned copy of one group's sketch.
    pub fn sketch(&self, group: usize) -> Result<HllSketch, RingwireError> {
        let group = self.slots.group(group)?;
        Ok(HllSketch::from_registers(self.precision, self.group_registers(group)))
    }

    /// Current estimate for one group, without finalising.
    pub fn estimate(&self, group: usize) -> Result<u64, RingwireError> {
        let group = self.slots.group(group)?;
        Ok(sketch::estimate_registers(self.group_registers(group)).round() as u64)
    }

    /// Per-group estimates, in group order.
    pub(crate) fn estimates(&self) -> Vec<u64> {
        (0..self.slots.len())
            .map(|g| sketch::estimate_registers(self.group_registers(g)).round() as u64)
            .collect()
    }

    /// Every group's registers, `2^precision` bytes each.
    pub(crate) fn all_registers(&self) -> &[u8] {
        self.registers.as_slice()
    }
}

impl Accumulator for ApproxCdRing {
    fn typ(&self) -> &Type {
        &self.typ
    }

    fn output_type(&self) -> Type {
        Type::new(TypeKind::UInt64)
    }

    fn dup(&self) -> Self {
        Self {
            typ: self.typ,
            slots: Slots::new(),
            registers: ArenaVec::new(),
            precision: self.precision,
            arena: None,
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
        self.slots.size() + self.registers.size_bytes()
    }

    fn null_counts(&self) -> &[i64] {
        self.slots.nulls.as_slice()
    }

    fn grow_by(&mut self, arena: &Arena, n: usize, growth: Growth) -> Result<(), RingwireError> {
        let bytes = self.register_bytes(arena, n)?;
        let before = self.slots.len();
        self.slots.grow(arena, n, 0, growth)?;
        let register_growth = match growth {
            Growth::Geometric { initial } => Growth::Geometric {
                initial: initial.saturating_mul(self.width()),
            },
            Growth::Exact => Growth::Exact,
        };
        if let Err(e) = self.registers.extend_filled(arena, bytes, 0, register_growth) {
            self.slots.set_length(before)?;
            return Err(e);
        }
        self.arena = Some(arena.clone());
        Ok(())
    }

    fn fill(&mut self, group: usize, row: usize, weight: i64, vec: &Vector) -> Result<(), RingwireError> {
        let group = self.slots.group(group)?;
        let bytes = row_bytes(vec, row)?;
        if vec.is_null(row) {
            self.slots.add_nulls(group, weight);
        } else {
            let width = self.width();
            let precision = self.precision;
            let registers = &mut self.registers.as_mut_slice()[group * width..(group + 1) * width];
            sketch::insert_hash(registers, precision, sketch::hash_bytes(bytes));
        }
        Ok(())
    }

    fn add(&mut self, other: &Self, src: usize, dst: usize) -> Result<(), RingwireError> {
        let dst = self.slots.group(dst)?;
        let src = other.slots.group(src)?;
        if self.precision != other.precision {
            return Err(RingwireError::ContractViolation(format!(
                "cannot merge sketches of precision {} and {}",
                self.precision, other.precision
            )));
        }
        let width = self.width();
        sketch::merge_registers(
            &mut self.registers.as_mut_slice()[dst * width..(dst + 1) * width],
            other.group_registers(src),
        );
        self.slots.add_nulls(dst, other.slots.nulls.as_slice()[src]);
        Ok(())
    }

    // Repetition adds no new distinct values.
    fn mul(&mut self, group: usize, factor: i64) -> Result<(), RingwireError> {
        self.slots.mul(group, factor, |v, _| v)?;
        Ok(())
    }

    fn eval(&mut self, zs: &[i64]) -> Result<Vector, RingwireError> {
        self.slots.live()?;
        let estimates = self.estimates();
        self.slots.values.as_mut_slice().copy_from_slice(&estimates);
        let (values, _) = self.slots.finish(zs)?;
        self.registers = ArenaVec::new();
        Vector::from_buffer(self.output_type(), values.into_buffer(), NullBitmap::new())
    }

    // A selection may repeat a group, so the registers are rebuilt rather than
    // gathered in place.
    fn shrink(&mut self, sels: &[i64]) -> Result<(), RingwireError> {
        self.slots.live()?;
        // Rejects every bad index before a register is read.
        gather_slice(self.slots.nulls.as_slice(), sels)?;
        let arena = self.arena();
        let width = self.width();
        let mut registers = ArenaVec::new();
        registers.extend_filled(&arena, self.register_bytes(&arena, sels.len())?, 0, Growth::Exact)?;
        for (i, &s) in sels.iter().enumerate() {
            registers.as_mut_slice()[i * width..(i + 1) * width]
                .copy_from_slice(self.group_registers(s as usize));
        }
        self.slots.shrink(sels)?;
        self.registers = registers;
        Ok(())
    }

    fn set_length(&mut self, n: usize) -> Result<(), RingwireError> {
        self.slots.set_length(n)?;
        self.registers.truncate(n * self.width());
        Ok(())
    }

    fn free(&mut self) {
        self.slots.free();
        self.registers = ArenaVec::new();
    }
}
