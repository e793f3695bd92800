// --- IN: src/null_handling/bitmap.rs ---

//! The `NullBitmap`: a set of row or group indices that are logically null.
//!
//! Backed by a `bitvec` bit vector that grows on demand, so an empty bitmap costs
//! nothing and `any()` is a cheap scan. Equality is set equality: two bitmaps with
//! the same members compare equal even if one was grown further than the other.

use bitvec::prelude::*;

#[derive(Debug, Clone, Default)]
pub struct NullBitmap {
    bits: BitVec<u64, Lsb0>,
}

impl NullBitmap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a bitmap from an explicit list of null indices.
    pub fn from_indices<I: IntoIterator<Item = usize>>(indices: I) -> Self {
        let mut bitmap = Self::new();
        for i in indices {
            bitmap.add(i);
        }
        bitmap
    }

    /// Marks index `i` as null. `usize::MAX` is never a valid row and is ignored.
    pub fn add(&mut self, i: usize) {
        let Some(end) = i.checked_add(1) else {
            log::warn!("ignoring null index {}", i);
            return;
        };
        if end > self.bits.len() {
            self.bits.resize(end, false);
        }
        self.bits.set(i, true);
    }

    /// Marks every index in `start..end` as null.
    pub fn add_range(&mut self, start: usize, end: usize) {
        if start >= end {
            return;
        }
        if end > self.bits.len() {
            self.bits.resize(end, false);
        }
        self.bits[start..end].fill(true);
    }

    /// Clears index `i`.
    pub fn remove(&mut self, i: usize) {
        if i < self.bits.len() {
            self.bits.set(i, false);
        }
    }

    pub fn contains(&self, i: usize) -> bool {
        self.bits.get(i).map_or(false, |b| *b)
    }

    /// `true` if at least one index is null.
    pub fn any(&self) -> bool {
        self.bits.any()
    }

    /// Number of null indices.
    pub fn count(&self) -> usize {
        self.bits.count_ones()
    }

    /// Null indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits.iter_ones()
    }

    /// Drops every index `>= n`.
    pub fn truncate(&mut self, n: usize) {
        self.bits.truncate(n);
    }

    /// Re-maps the bitmap through a selection: position `i` of the result is null
    /// iff position `sels[i]` of `self` was.
    pub fn shrink(&self, sels: &[i64]) -> NullBitmap {
        let mut out = NullBitmap::new();
        if !self.any() {
            return out;
        }
        for (i, &sel) in sels.iter().enumerate() {
            if sel >= 0 && self.contains(sel as usize) {
                out.add(i);
            }
        }
        out
    }

    /// Adds every member of `other` shifted by `offset` (used when appending rows).
    pub fn extend_shifted(&mut self, other: &NullBitmap, offset: usize) {
        for i in other.iter() {
            self.add(i + offset);
        }
    }
}

impl PartialEq for NullBitmap {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl Eq for NullBitmap {}

impl FromIterator<usize> for NullBitmap {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self::from_indices(iter)
    }
}
