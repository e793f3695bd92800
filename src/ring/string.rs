// In: src/ring/string.rs

//! MIN / MAX over byte-string columns.
//!
//! Group extremes live in one arena-backed data area addressed through an
//! offset table and a length table, the same layout byte-string vectors use.
//! A length of `UNSET_SLOT` is the identity (no non-null input seen yet).
//!
//! A replacement no longer than the bytes its slot already holds is written in
//! place. A longer one is appended and the old bytes become garbage, which is
//! reclaimed by rewriting the data area once it outweighs the live bytes.
//! Comparison is bytewise.

use std::marker::PhantomData;

use crate::arena::{gather_slice, Arena, ArenaBuffer, ArenaVec, Growth};
use crate::config::RingwireConfig;
use crate::error::RingwireError;
use crate::ring::fold::Extreme;
use crate::ring::state::{check_group, eval_nulls, Accumulator};
use crate::types::Type;
use crate::vector::Vector;

/// Length-table marker for a slot with no value.
pub(crate) const UNSET_SLOT: u32 = u32::MAX;

/// Garbage below this many bytes is never compacted.
const COMPACT_FLOOR: usize = 4096;

fn slot_u32(n: usize) -> Result<u32, RingwireError> {
    u32::try_from(n)
        .ok()
        .filter(|&n| n != UNSET_SLOT)
        .ok_or_else(|| {
            RingwireError::ContractViolation(format!(
                "string ring data of {} bytes exceeds the u32 slot table",
                n
            ))
        })
}

pub struct StrRing<E: Extreme> {
    pub(crate) typ: Type,
    data: ArenaBuffer,
    offsets: ArenaVec<u32>,
    lengths: ArenaVec<u32>,
    pub(crate) nulls: ArenaVec<i64>,
    /// Arena of the last `grow_by`. The data area grows through it.
    arena: Option<Arena>,
    /// Dead bytes in `data`.
    garbage: usize,
    pub(crate) initial_capacity: usize,
    finalized: bool,
    _pick: PhantomData<E>,
}

impl<E: Extreme> StrRing<E> {
    pub fn new(typ: Type, config: &RingwireConfig) -> Self {
        Self {
            typ,
            data: ArenaBuffer::empty(),
            offsets: ArenaVec::new(),
            lengths: ArenaVec::new(),
            nulls: ArenaVec::new(),
            arena: None,
            garbage: 0,
            initial_capacity: config.initial_group_capacity,
            finalized: false,
            _pick: PhantomData,
        }
    }

    /// Rebuilds a ring from decoded slots. The data area starts detached and
    /// is adopted by the arena of the next `grow_by`.
    pub(crate) fn restore(&mut self, slots: &[Option<&[u8]>], nulls: ArenaVec<i64>) -> Result<(), RingwireError> {
        if slots.len() != nulls.len() {
            return Err(RingwireError::MalformedEncoding(format!(
                "{} string slots but {} null counts",
                slots.len(),
                nulls.len()
            )));
        }
        let mut data = Vec::new();
        let mut offsets = Vec::with_capacity(slots.len());
        let mut lengths = Vec::with_capacity(slots.len());
        for slot in slots {
            match slot {
                Some(bytes) => {
                    offsets.push(slot_u32(data.len())?);
                    lengths.push(slot_u32(bytes.len())?);
                    data.extend_from_slice(bytes);
                }
                None => {
                    offsets.push(0);
                    lengths.push(UNSET_SLOT);
                }
            }
        }
        slot_u32(data.len())?;
        self.data = ArenaBuffer::detached_from_bytes(&data);
        self.offsets = ArenaVec::from_slice(&offsets);
        self.lengths = ArenaVec::from_slice(&lengths);
        self.nulls = nulls;
        self.garbage = 0;
        Ok(())
    }

    /// Current extreme of `group`, `None` while it has seen no value.
    pub fn value(&self, group: usize) -> Option<&[u8]> {
        let len = *self.lengths.as_slice().get(group)?;
        if len == UNSET_SLOT {
            return None;
        }
        let start = self.offsets.as_slice()[group] as usize;
        Some(&self.data.as_bytes()[start..start + len as usize])
    }

    pub fn values(&self) -> Vec<Option<&[u8]>> {
        (0..self.count()).map(|g| self.value(g)).collect()
    }

    /// Bytes of the data area no slot refers to any more.
    pub fn garbage_bytes(&self) -> usize {
        self.garbage
    }

    pub(crate) fn live(&self) -> Result<(), RingwireError> {
        if self.finalized {
            Err(RingwireError::RingFinalized)
        } else {
            Ok(())
        }
    }

    fn group(&self, group: usize) -> Result<usize, RingwireError> {
        self.live()?;
        check_group(group, self.count())
    }

    fn arena(&self) -> Arena {
        // Only a decoded ring that was never grown has no arena yet.
        self.arena.clone().unwrap_or_else(Arena::unbounded)
    }

    fn offer(&mut self, group: usize, candidate: &[u8]) -> Result<(), RingwireError> {
        let replace = match self.value(group) {
            None => true,
            Some(current) => E::wins(candidate, current),
        };
        if !replace {
            return Ok(());
        }
        let len = slot_u32(candidate.len())?;
        let held = self.lengths.as_slice()[group];
        if held != UNSET_SLOT && len <= held {
            let start = self.offsets.as_slice()[group] as usize;
            self.data.as_bytes_mut()[start..start + candidate.len()].copy_from_slice(candidate);
            self.lengths.as_mut_slice()[group] = len;
            self.garbage += (held - len) as usize;
            return Ok(());
        }

        if self.garbage >= COMPACT_FLOOR && self.garbage * 2 > self.data.len() {
            self.compact()?;
        }
        let start = slot_u32(self.data.len())?;
        slot_u32(self.data.len() + candidate.len())?;
        let arena = self.arena();
        self.data.extend_from_bytes(&arena, candidate)?;
        if held != UNSET_SLOT {
            self.garbage += held as usize;
        }
        self.offsets.as_mut_slice()[group] = start;
        self.lengths.as_mut_slice()[group] = len;
        Ok(())
    }

    /// Rewrites the data area with only the live slots, in group order.
    /// On failure the ring is unchanged.
    fn compact(&mut self) -> Result<(), RingwireError> {
        let live: usize = self
            .lengths
            .as_slice()
            .iter()
            .filter(|&&l| l != UNSET_SLOT)
            .map(|&l| l as usize)
            .sum();
        let mut fresh = self.arena().alloc(live)?;
        let mut offsets = Vec::with_capacity(self.count());
        let mut cursor = 0usize;
        for group in 0..self.count() {
            match self.value(group) {
                Some(bytes) => {
                    fresh.as_bytes_mut()[cursor..cursor + bytes.len()].copy_from_slice(bytes);
                    offsets.push(cursor as u32);
                    cursor += bytes.len();
                }
                None => offsets.push(0),
            }
        }
        log::trace!(
            "string ring compacted {} -> {} bytes",
            self.data.len(),
            live
        );
        self.offsets.as_mut_slice().copy_from_slice(&offsets);
        self.data = fresh;
        self.garbage = 0;
        Ok(())
    }
}

impl<E: Extreme> std::fmt::Debug for StrRing<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrRing")
            .field("typ", &self.typ)
            .field("values", &self.values())
            .field("nulls", &self.nulls)
            .finish()
    }
}

impl<E: Extreme> Accumulator for StrRing<E> {
    fn typ(&self) -> &Type {
        &self.typ
    }

    fn output_type(&self) -> Type {
        self.typ
    }

    fn dup(&self) -> Self {
        Self {
            typ: self.typ,
            data: ArenaBuffer::empty(),
            offsets: ArenaVec::new(),
            lengths: ArenaVec::new(),
            nulls: ArenaVec::new(),
            arena: None,
            garbage: 0,
            initial_capacity: self.initial_capacity,
            finalized: false,
            _pick: PhantomData,
        }
    }

    fn initial_capacity(&self) -> usize {
        self.initial_capacity
    }

    fn count(&self) -> usize {
        self.lengths.len()
    }

    fn size(&self) -> usize {
        self.data.charged() + self.offsets.size_bytes() + self.lengths.size_bytes() + self.nulls.size_bytes()
    }

    fn null_counts(&self) -> &[i64] {
        self.nulls.as_slice()
    }

    fn grow_by(&mut self, arena: &Arena, n: usize, growth: Growth) -> Result<(), RingwireError> {
        self.live()?;
        let before = self.count();
        self.offsets.extend_filled(arena, n, 0, growth)?;
        let grown = self
            .lengths
            .extend_filled(arena, n, UNSET_SLOT, growth)
            .and_then(|()| self.nulls.extend_filled(arena, n, 0, growth));
        if let Err(e) = grown {
            self.offsets.truncate(before);
            self.lengths.truncate(before);
            self.nulls.truncate(before);
            return Err(e);
        }
        self.arena = Some(arena.clone());
        Ok(())
    }

    fn fill(&mut self, group: usize, row: usize, weight: i64, vec: &Vector) -> Result<(), RingwireError> {
        let group = self.group(group)?;
        let candidate = vec.bytes_at(row)?;
        if vec.is_null(row) {
            let slot = &mut self.nulls.as_mut_slice()[group];
            *slot = slot.wrapping_add(weight);
            Ok(())
        } else {
            self.offer(group, candidate)
        }
    }

    fn add(&mut self, other: &Self, src: usize, dst: usize) -> Result<(), RingwireError> {
        let dst = self.group(dst)?;
        let src = other.group(src)?;
        if let Some(theirs) = other.value(src) {
            self.offer(dst, theirs)?;
        }
        let slot = &mut self.nulls.as_mut_slice()[dst];
        *slot = slot.wrapping_add(other.nulls.as_slice()[src]);
        Ok(())
    }

    // Extremes are idempotent under repetition.
    fn mul(&mut self, group: usize, factor: i64) -> Result<(), RingwireError> {
        let group = self.group(group)?;
        let slot = &mut self.nulls.as_mut_slice()[group];
        *slot = slot.wrapping_mul(factor);
        Ok(())
    }

    fn eval(&mut self, zs: &[i64]) -> Result<Vector, RingwireError> {
        self.live()?;
        let bitmap = eval_nulls(self.nulls.as_slice(), zs)?;
        let rows: Vec<&[u8]> = (0..self.count())
            .map(|g| self.value(g).unwrap_or(&[]))
            .collect();
        let mut out = Vector::from_byte_rows(self.typ, &rows)?;
        *out.nulls_mut() = bitmap;
        self.finalized = true;
        self.free();
        Ok(out)
    }

    // A selection may repeat a group, so the picked slots are copied into a
    // fresh data area instead of sharing bytes.
    fn shrink(&mut self, sels: &[i64]) -> Result<(), RingwireError> {
        self.live()?;
        // Rejects every bad index before anything is built.
        let null_counts = gather_slice(self.nulls.as_slice(), sels)?;
        let picked: Vec<Option<&[u8]>> = sels.iter().map(|&s| self.value(s as usize)).collect();
        let live: usize = picked.iter().flatten().map(|b| b.len()).sum();

        let arena = self.arena();
        let mut data = arena.alloc(live)?;
        let mut offsets = ArenaVec::new();
        let mut lengths = ArenaVec::new();
        let mut nulls = ArenaVec::new();
        offsets.extend_filled(&arena, picked.len(), 0, Growth::Exact)?;
        lengths.extend_filled(&arena, picked.len(), UNSET_SLOT, Growth::Exact)?;
        nulls.extend_from_slice(&arena, &null_counts)?;
        let mut cursor = 0usize;
        for (i, slot) in picked.iter().enumerate() {
            if let Some(bytes) = slot {
                data.as_bytes_mut()[cursor..cursor + bytes.len()].copy_from_slice(bytes);
                offsets.as_mut_slice()[i] = slot_u32(cursor)?;
                lengths.as_mut_slice()[i] = slot_u32(bytes.len())?;
                cursor += bytes.len();
            }
        }
        self.data = data;
        self.offsets = offsets;
        self.lengths = lengths;
        self.nulls = nulls;
        self.garbage = 0;
        Ok(())
    }

    fn set_length(&mut self, n: usize) -> Result<(), RingwireError> {
        self.live()?;
        if n > self.count() {
            return Err(RingwireError::ContractViolation(format!(
                "set_length({}) on a ring of {} groups",
                n,
                self.count()
            )));
        }
        self.garbage += self.lengths.as_slice()[n..]
            .iter()
            .filter(|&&l| l != UNSET_SLOT)
            .map(|&l| l as usize)
            .sum::<usize>();
        self.offsets.truncate(n);
        self.lengths.truncate(n);
        self.nulls.truncate(n);
        Ok(())
    }

    fn free(&mut self) {
        self.data = ArenaBuffer::empty();
        self.offsets = ArenaVec::new();
        self.lengths = ArenaVec::new();
        self.nulls = ArenaVec::new();
        self.garbage = 0;
    }
}
