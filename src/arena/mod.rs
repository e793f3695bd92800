//! The memory arena: budgeted, growable raw buffers for ring and vector values.
//!
//! The arena itself never owns memory. It is a shared accounting handle with an
//! optional byte budget; every `ArenaBuffer` it hands out carries a clone of the
//! handle and refunds its bytes when dropped. That drop is the single release
//! point for arena memory on every exit path, including early returns and `?`.
//!
//! Buffers are stored as `u64` words so their start is 8-byte aligned and can be
//! reinterpreted as a slice of any supported scalar with `bytemuck`.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::RingwireConfig;
use crate::error::RingwireError;
use crate::traits::Scalar;

const WORD: usize = std::mem::size_of::<u64>();

fn words_for(bytes: usize) -> usize {
    bytes.div_ceil(WORD)
}

/// `bytes` rounded up to whole words, or `None` past `usize::MAX`.
fn word_capacity(bytes: usize) -> Option<usize> {
    words_for(bytes).checked_mul(WORD)
}

//==================================================================================
// 1. Arena handle
//==================================================================================

struct ArenaInner {
    budget: Option<usize>,
    in_use: AtomicUsize,
    peak: AtomicUsize,
}

/// A cloneable handle to one worker's memory budget.
#[derive(Clone)]
pub struct Arena {
    inner: Arc<ArenaInner>,
}

impl Arena {
    pub fn unbounded() -> Self {
        Self::build(None)
    }

    pub fn with_budget(budget_bytes: usize) -> Self {
        Self::build(Some(budget_bytes))
    }

    pub fn from_config(config: &RingwireConfig) -> Self {
        Self::build(config.arena_budget_bytes)
    }

    fn build(budget: Option<usize>) -> Self {
        Self {
            inner: Arc::new(ArenaInner {
                budget,
                in_use: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }),
        }
    }

    pub fn budget(&self) -> Option<usize> {
        self.inner.budget
    }

    /// Bytes currently charged by live buffers.
    pub fn in_use(&self) -> usize {
        self.inner.in_use.load(Ordering::Acquire)
    }

    /// High-water mark of `in_use`.
    pub fn peak(&self) -> usize {
        self.inner.peak.load(Ordering::Acquire)
    }

    fn same_as(&self, other: &Arena) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Reserves `bytes` against the budget or fails without side effects.
    fn charge(&self, bytes: usize) -> Result<(), RingwireError> {
        if bytes == 0 {
            return Ok(());
        }
        let mut current = self.inner.in_use.load(Ordering::Acquire);
        loop {
            let next = current.saturating_add(bytes);
            if let Some(budget) = self.inner.budget {
                if next > budget {
                    log::warn!(
                        "arena rejected {} bytes ({} in use, budget {})",
                        bytes,
                        current,
                        budget
                    );
                    return Err(RingwireError::AllocationExhausted {
                        requested: bytes,
                        in_use: current,
                        budget,
                    });
                }
            }
            match self.inner.in_use.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.inner.peak.fetch_max(next, Ordering::AcqRel);
                    return Ok(());
                }
                Err(observed) => current = observed,
            }
        }
    }

    /// The error for a request whose byte size does not fit a `usize`.
    pub(crate) fn oversized(&self) -> RingwireError {
        log::warn!("arena rejected a request larger than the address space");
        RingwireError::AllocationExhausted {
            requested: usize::MAX,
            in_use: self.in_use(),
            budget: self.budget().unwrap_or(usize::MAX),
        }
    }

    fn refund(&self, bytes: usize) {
        if bytes > 0 {
            self.inner.in_use.fetch_sub(bytes, Ordering::AcqRel);
        }
    }

    /// Allocates a zeroed buffer of `size_bytes` logical length.
    pub fn alloc(&self, size_bytes: usize) -> Result<ArenaBuffer, RingwireError> {
        let capacity = word_capacity(size_bytes).ok_or_else(|| self.oversized())?;
        self.charge(capacity)?;
        log::trace!("arena alloc {} bytes", capacity);
        Ok(ArenaBuffer {
            words: vec![0u64; capacity / WORD],
            len: size_bytes,
            charged: capacity,
            arena: Some(self.clone()),
        })
    }

    /// Grows `buf` in place so it can hold at least `new_size_bytes`.
    ///
    /// On failure `buf` is left exactly as it was. A detached buffer is adopted
    /// by this arena and charged in full.
    pub fn grow(&self, buf: &mut ArenaBuffer, new_size_bytes: usize) -> Result<(), RingwireError> {
        if new_size_bytes <= buf.capacity() && buf.arena.as_ref().map_or(false, |a| a.same_as(self)) {
            return Ok(());
        }
        let new_capacity =
            word_capacity(new_size_bytes.max(buf.capacity())).ok_or_else(|| self.oversized())?;
        let owned_here = buf.arena.as_ref().map_or(false, |a| a.same_as(self));
        let already_charged = if owned_here { buf.charged } else { 0 };
        self.charge(new_capacity - already_charged)?;
        if !owned_here {
            if let Some(previous) = buf.arena.take() {
                previous.refund(buf.charged);
            }
        }
        log::trace!(
            "arena grow {} -> {} bytes",
            buf.capacity(),
            new_capacity
        );
        buf.words.resize(new_capacity / WORD, 0);
        buf.charged = new_capacity;
        buf.arena = Some(self.clone());
        Ok(())
    }

    /// Explicit release. Equivalent to dropping the buffer.
    pub fn release(&self, buf: ArenaBuffer) {
        drop(buf);
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("budget", &self.inner.budget)
            .field("in_use", &self.in_use())
            .finish()
    }
}

//==================================================================================
// 2. Raw buffer
//==================================================================================

/// An 8-byte aligned byte buffer, optionally charged to an arena.
pub struct ArenaBuffer {
    words: Vec<u64>,
    /// Logical length in bytes; never exceeds `capacity()`.
    len: usize,
    charged: usize,
    arena: Option<Arena>,
}

impl ArenaBuffer {
    /// An empty buffer that holds no allocation and no arena charge.
    pub fn empty() -> Self {
        Self {
            words: Vec::new(),
            len: 0,
            charged: 0,
            arena: None,
        }
    }

    /// A fresh owned copy of `bytes` that is not charged to any arena.
    /// This is what the decoder produces: it never aliases its input.
    pub fn detached_from_bytes(bytes: &[u8]) -> Self {
        let mut words = vec![0u64; words_for(bytes.len())];
        bytemuck::cast_slice_mut::<u64, u8>(&mut words)[..bytes.len()].copy_from_slice(bytes);
        Self {
            words,
            len: bytes.len(),
            charged: 0,
            arena: None,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.words.len() * WORD
    }

    /// Bytes this buffer currently holds against its arena.
    pub fn charged(&self) -> usize {
        self.charged
    }

    pub fn is_detached(&self) -> bool {
        self.arena.is_none()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<u64, u8>(&self.words)[..self.len]
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        let len = self.len;
        &mut bytemuck::cast_slice_mut::<u64, u8>(&mut self.words)[..len]
    }

    /// Sets the logical length. Bytes past the old length keep whatever the
    /// buffer held (zero for fresh capacity).
    pub fn set_len(&mut self, len: usize) -> Result<(), RingwireError> {
        if len > self.capacity() {
            return Err(RingwireError::ContractViolation(format!(
                "set_len({}) exceeds buffer capacity {}",
                len,
                self.capacity()
            )));
        }
        self.len = len;
        Ok(())
    }

    /// Appends raw bytes, growing through `arena` when capacity runs out.
    pub fn extend_from_bytes(&mut self, arena: &Arena, bytes: &[u8]) -> Result<(), RingwireError> {
        let new_len = self.len.checked_add(bytes.len()).ok_or_else(|| arena.oversized())?;
        if new_len > self.capacity() || self.is_detached() {
            let target = new_len.max(self.capacity().saturating_mul(2));
            arena.grow(self, target)?;
        }
        let start = self.len;
        self.len = new_len;
        self.as_bytes_mut()[start..].copy_from_slice(bytes);
        Ok(())
    }

    fn typed<T: Scalar>(&self, n: usize) -> &[T] {
        &bytemuck::cast_slice::<u64, T>(&self.words)[..n]
    }

    fn typed_mut<T: Scalar>(&mut self, n: usize) -> &mut [T] {
        &mut bytemuck::cast_slice_mut::<u64, T>(&mut self.words)[..n]
    }
}

impl Drop for ArenaBuffer {
    fn drop(&mut self) {
        if let Some(arena) = self.arena.take() {
            arena.refund(self.charged);
        }
    }
}

/// Clones are detached copies: they do not add to the source's arena charge.
impl Clone for ArenaBuffer {
    fn clone(&self) -> Self {
        Self::detached_from_bytes(self.as_bytes())
    }
}

impl PartialEq for ArenaBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl fmt::Debug for ArenaBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaBuffer")
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .field("detached", &self.is_detached())
            .finish()
    }
}

//==================================================================================
// 3. Typed growable view
//==================================================================================

/// How an `ArenaVec` sizes its next allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Growth {
    /// At least double the capacity (never below `initial`).
    Geometric { initial: usize },
    /// Exactly what was requested.
    Exact,
}

/// A typed, arena-backed vector. Growth goes through the arena contract so a
/// budget rejection surfaces as `AllocationExhausted` and leaves the contents
/// untouched.
pub struct ArenaVec<T: Scalar> {
    buf: ArenaBuffer,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T: Scalar> ArenaVec<T> {
    const ELEM: usize = std::mem::size_of::<T>();

    /// An empty vector. No arena allocation happens until the first growth.
    pub fn new() -> Self {
        Self {
            buf: ArenaBuffer::empty(),
            len: 0,
            _marker: PhantomData,
        }
    }

    /// Adopts a raw buffer whose length is a whole number of `T` values.
    pub fn from_buffer(buf: ArenaBuffer) -> Result<Self, RingwireError> {
        if buf.len() % Self::ELEM != 0 {
            return Err(RingwireError::MalformedEncoding(format!(
                "{} bytes is not a whole number of {}-byte values",
                buf.len(),
                Self::ELEM
            )));
        }
        let len = buf.len() / Self::ELEM;
        Ok(Self {
            buf,
            len,
            _marker: PhantomData,
        })
    }

    /// Detached copy of a typed slice.
    pub fn from_slice(values: &[T]) -> Self {
        let buf = ArenaBuffer::detached_from_bytes(bytemuck::cast_slice(values));
        let len = values.len();
        Self {
            buf,
            len,
            _marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity() / Self::ELEM
    }

    /// Arena bytes held by this vector.
    pub fn size_bytes(&self) -> usize {
        self.buf.charged()
    }

    pub fn as_slice(&self) -> &[T] {
        self.buf.typed(self.len)
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        let len = self.len;
        self.buf.typed_mut(len)
    }

    /// Appends `n` copies of `value`, growing the buffer once if needed.
    pub fn extend_filled(
        &mut self,
        arena: &Arena,
        n: usize,
        value: T,
        growth: Growth,
    ) -> Result<(), RingwireError> {
        let new_len = self.len.checked_add(n).ok_or_else(|| arena.oversized())?;
        if new_len > self.capacity() || (self.buf.is_detached() && n > 0) {
            let target = match growth {
                Growth::Geometric { initial } => {
                    new_len.max(initial).max(self.capacity().saturating_mul(2))
                }
                Growth::Exact => new_len,
            };
            let target_bytes = target
                .checked_mul(Self::ELEM)
                .ok_or_else(|| arena.oversized())?;
            arena.grow(&mut self.buf, target_bytes)?;
        }
        let start = self.len;
        self.len = new_len;
        self.buf.set_len(new_len * Self::ELEM)?;
        self.as_mut_slice()[start..].fill(value);
        Ok(())
    }

    pub fn push(&mut self, arena: &Arena, value: T, growth: Growth) -> Result<(), RingwireError> {
        self.extend_filled(arena, 1, value, growth)
    }

    pub fn extend_from_slice(&mut self, arena: &Arena, values: &[T]) -> Result<(), RingwireError> {
        let start = self.len;
        self.extend_filled(arena, values.len(), T::zeroed(), Growth::Geometric { initial: 8 })?;
        self.as_mut_slice()[start..].copy_from_slice(values);
        Ok(())
    }

    /// Drops trailing values; capacity is kept.
    pub fn truncate(&mut self, n: usize) {
        if n < self.len {
            self.len = n;
            // n * ELEM never exceeds the current capacity.
            let _ = self.buf.set_len(n * Self::ELEM);
        }
    }

    /// Keeps `values[sels[0]], values[sels[1]], ...` in that order.
    pub fn gather(&mut self, sels: &[i64]) -> Result<(), RingwireError> {
        let picked = gather_slice(self.as_slice(), sels)?;
        if picked.len() > self.capacity() {
            return Err(RingwireError::ContractViolation(format!(
                "selection of {} values exceeds capacity {}",
                picked.len(),
                self.capacity()
            )));
        }
        self.len = picked.len();
        self.buf.set_len(self.len * Self::ELEM)?;
        self.as_mut_slice().copy_from_slice(&picked);
        Ok(())
    }

    /// Hands the underlying buffer over without copying.
    pub fn into_buffer(self) -> ArenaBuffer {
        self.buf
    }
}

impl<T: Scalar> Default for ArenaVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Scalar> Clone for ArenaVec<T> {
    fn clone(&self) -> Self {
        Self::from_slice(self.as_slice())
    }
}

impl<T: Scalar> fmt::Debug for ArenaVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice().iter()).finish()
    }
}

/// Copies `data[sels[i]]` for every `i`, rejecting out-of-range selections.
pub(crate) fn gather_slice<T: Copy>(data: &[T], sels: &[i64]) -> Result<Vec<T>, RingwireError> {
    sels.iter()
        .map(|&s| {
            usize::try_from(s)
                .ok()
                .and_then(|i| data.get(i).copied())
                .ok_or_else(|| {
                    RingwireError::ContractViolation(format!(
                        "selection index {} out of range for length {}",
                        s,
                        data.len()
                    ))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_and_drop_refunds_budget() {
        let arena = Arena::with_budget(64);
        {
            let buf = arena.alloc(20).unwrap();
            assert_eq!(buf.len(), 20);
            assert_eq!(buf.capacity(), 24);
            assert_eq!(arena.in_use(), 24);
        }
        assert_eq!(arena.in_use(), 0);
        assert_eq!(arena.peak(), 24);
    }

    #[test]
    fn test_budget_rejection_leaves_buffer_untouched() {
        let arena = Arena::with_budget(16);
        let mut buf = arena.alloc(8).unwrap();
        buf.as_bytes_mut().copy_from_slice(&[7; 8]);

        let err = arena.grow(&mut buf, 64).unwrap_err();
        assert!(matches!(
            err,
            RingwireError::AllocationExhausted {
                requested: 56,
                in_use: 8,
                budget: 16
            }
        ));
        assert_eq!(buf.as_bytes(), &[7; 8]);
        assert_eq!(arena.in_use(), 8);
    }

    #[test]
    fn test_oversized_requests_are_exhausted_not_overflowed() {
        let arena = Arena::with_budget(1 << 20);
        let mut v: ArenaVec<u64> = ArenaVec::new();
        v.extend_filled(&arena, 2, 5, Growth::Exact).unwrap();
        for n in [usize::MAX / 4, usize::MAX] {
            let err = v.extend_filled(&arena, n, 0, Growth::Exact).unwrap_err();
            assert!(matches!(err, RingwireError::AllocationExhausted { .. }), "{:?}", err);
        }
        assert_eq!(v.as_slice(), &[5, 5]);
        assert!(matches!(
            arena.alloc(usize::MAX),
            Err(RingwireError::AllocationExhausted { requested: usize::MAX, .. })
        ));

        let unbounded = Arena::unbounded();
        let mut buf = unbounded.alloc(8).unwrap();
        assert!(matches!(
            unbounded.grow(&mut buf, usize::MAX - 1),
            Err(RingwireError::AllocationExhausted { budget: usize::MAX, .. })
        ));
        assert_eq!(unbounded.in_use(), 8);
    }

    #[test]
    fn test_grow_adopts_detached_buffer() {
        let arena = Arena::unbounded();
        let mut buf = ArenaBuffer::detached_from_bytes(&[1, 2, 3]);
        assert!(buf.is_detached());
        arena.grow(&mut buf, 16).unwrap();
        assert!(!buf.is_detached());
        assert_eq!(buf.as_bytes(), &[1, 2, 3]);
        assert_eq!(arena.in_use(), 16);
        arena.release(buf);
        assert_eq!(arena.in_use(), 0);
    }

    #[test]
    fn test_arena_vec_geometric_growth() {
        let arena = Arena::unbounded();
        let mut v: ArenaVec<f32> = ArenaVec::new();
        assert_eq!(arena.in_use(), 0);

        v.push(&arena, 1.5, Growth::Geometric { initial: 8 }).unwrap();
        assert_eq!(v.capacity(), 8);
        for i in 0..8 {
            v.push(&arena, i as f32, Growth::Geometric { initial: 8 }).unwrap();
        }
        assert_eq!(v.len(), 9);
        assert_eq!(v.capacity(), 16);
        assert_eq!(v.as_slice()[0], 1.5);
        assert_eq!(arena.in_use(), 16 * 4);
    }

    #[test]
    fn test_arena_vec_exact_growth_and_gather() {
        let arena = Arena::unbounded();
        let mut v: ArenaVec<i64> = ArenaVec::new();
        v.extend_filled(&arena, 5, 0, Growth::Exact).unwrap();
        assert_eq!(v.capacity(), 5);
        v.as_mut_slice().copy_from_slice(&[10, 11, 12, 13, 14]);

        v.gather(&[4, 0, 2]).unwrap();
        assert_eq!(v.as_slice(), &[14, 10, 12]);

        assert!(v.gather(&[9]).is_err());
        assert_eq!(v.as_slice(), &[14, 10, 12]);
    }

    #[test]
    fn test_into_buffer_is_zero_copy() {
        let arena = Arena::unbounded();
        let mut v: ArenaVec<u16> = ArenaVec::new();
        v.extend_from_slice(&arena, &[1, 2, 3]).unwrap();
        let charged = arena.in_use();
        let buf = v.into_buffer();
        assert_eq!(buf.len(), 6);
        assert_eq!(arena.in_use(), charged);
        drop(buf);
        assert_eq!(arena.in_use(), 0);
    }
}
