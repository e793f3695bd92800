// In: src/vector/mod.rs

//! The `Vector`: one typed column.
//!
//! A vector is a value buffer plus a null bitmap plus its type descriptor and
//! two opaque bookkeeping counters (`ref_count`, `link_count`) that belong to the
//! owning pipeline and are carried verbatim through the codec.
//!
//! Fixed-width kinds keep their values in one 8-byte aligned buffer that is
//! reinterpreted as `&[T]` on demand. Byte-string kinds (`Char`, `Varchar`,
//! `Tuple`) keep a data area plus parallel offset and length tables.

use std::fmt;

use arrow::buffer::Buffer;

use crate::arena::{gather_slice, Arena, ArenaBuffer, ArenaVec};
use crate::error::RingwireError;
use crate::null_handling::NullBitmap;
use crate::traits::Scalar;
use crate::types::Type;
use crate::utils::safe_bytes_to_typed_slice;

//==================================================================================
// 1. Storage
//==================================================================================

#[derive(Debug, Clone)]
pub(crate) enum VectorData {
    /// Values held in an arena (or decoded, detached) buffer.
    Owned(ArenaBuffer),
    /// Values referenced from an externally owned Arrow buffer, never copied.
    Shared(Buffer),
    /// Byte strings: `data[offsets[i]..offsets[i] + lengths[i]]` is row `i`.
    Bytes {
        data: ArenaBuffer,
        offsets: ArenaVec<u32>,
        lengths: ArenaVec<u32>,
    },
}

#[derive(Debug, Clone)]
pub struct Vector {
    typ: Type,
    data: VectorData,
    nulls: NullBitmap,
    owns_data: bool,
    ref_count: u64,
    link_count: u64,
}

fn check_fixed_kind(typ: &Type) -> Result<usize, RingwireError> {
    typ.kind.fixed_width().ok_or_else(|| {
        RingwireError::TypeMismatch(format!("{} is not a fixed-width kind", typ.kind))
    })
}

fn offset_u32(n: usize) -> Result<u32, RingwireError> {
    u32::try_from(n).map_err(|_| {
        RingwireError::ContractViolation(format!("byte column data area of {} bytes exceeds u32", n))
    })
}

impl Vector {
    //==============================================================================
    // 2. Construction
    //==============================================================================

    /// An empty vector of the given type. Nothing is allocated yet.
    pub fn new(typ: Type) -> Self {
        let data = if typ.kind.is_bytes() {
            VectorData::Bytes {
                data: ArenaBuffer::empty(),
                offsets: ArenaVec::new(),
                lengths: ArenaVec::new(),
            }
        } else {
            VectorData::Owned(ArenaBuffer::empty())
        };
        Self {
            typ,
            data,
            nulls: NullBitmap::new(),
            owns_data: false,
            ref_count: 0,
            link_count: 0,
        }
    }

    /// A detached vector holding a copy of `values`.
    pub fn from_slice<T: Scalar>(values: &[T]) -> Self {
        let mut vector = Self::new(Type::new(T::KIND));
        vector.data = VectorData::Owned(ArenaBuffer::detached_from_bytes(bytemuck::cast_slice(values)));
        vector
    }

    /// A detached byte-string vector with one row per entry of `rows`.
    pub fn from_byte_rows<B: AsRef<[u8]>>(typ: Type, rows: &[B]) -> Result<Self, RingwireError> {
        if !typ.kind.is_bytes() {
            return Err(RingwireError::TypeMismatch(format!(
                "{} cannot hold byte strings",
                typ.kind
            )));
        }
        let mut data = Vec::new();
        let mut offsets = Vec::with_capacity(rows.len());
        let mut lengths = Vec::with_capacity(rows.len());
        for row in rows {
            let row = row.as_ref();
            offsets.push(offset_u32(data.len())?);
            lengths.push(offset_u32(row.len())?);
            data.extend_from_slice(row);
        }
        offset_u32(data.len())?;
        let mut vector = Self::new(typ);
        vector.data = VectorData::Bytes {
            data: ArenaBuffer::detached_from_bytes(&data),
            offsets: ArenaVec::from_slice(&offsets),
            lengths: ArenaVec::from_slice(&lengths),
        };
        Ok(vector)
    }

    /// Wraps a finished fixed-width buffer (e.g. a ring's detached values).
    pub fn from_buffer(typ: Type, buf: ArenaBuffer, nulls: NullBitmap) -> Result<Self, RingwireError> {
        let width = check_fixed_kind(&typ)?;
        if buf.len() % width != 0 {
            return Err(RingwireError::ContractViolation(format!(
                "{} bytes is not a whole number of {} values",
                buf.len(),
                typ.kind
            )));
        }
        let mut vector = Self::new(typ);
        vector.data = VectorData::Owned(buf);
        vector.nulls = nulls;
        Ok(vector)
    }

    /// References an externally owned Arrow buffer without copying.
    /// The resulting vector reports `owns_data() == false` and is read-only.
    pub fn shared(typ: Type, buffer: Buffer, nulls: NullBitmap) -> Result<Self, RingwireError> {
        let width = check_fixed_kind(&typ)?;
        if buffer.len() % width != 0 {
            return Err(RingwireError::ContractViolation(format!(
                "shared buffer of {} bytes is not a whole number of {} values",
                buffer.len(),
                typ.kind
            )));
        }
        let mut vector = Self::new(typ);
        vector.data = VectorData::Shared(buffer);
        vector.nulls = nulls;
        Ok(vector)
    }

    /// Decoder entry point for fixed-width kinds.
    pub(crate) fn decoded_fixed(
        typ: Type,
        buf: ArenaBuffer,
        nulls: NullBitmap,
        ref_count: u64,
        link_count: u64,
    ) -> Result<Self, RingwireError> {
        let width = check_fixed_kind(&typ)?;
        if buf.len() % width != 0 {
            return Err(RingwireError::MalformedEncoding(format!(
                "{} value bytes is not a whole number of {} values",
                buf.len(),
                typ.kind
            )));
        }
        let mut vector = Self::from_buffer(typ, buf, nulls)?;
        vector.owns_data = true;
        vector.ref_count = ref_count;
        vector.link_count = link_count;
        Ok(vector)
    }

    /// Decoder entry point for byte-string kinds.
    pub(crate) fn decoded_bytes(
        typ: Type,
        data: ArenaBuffer,
        offsets: ArenaVec<u32>,
        lengths: ArenaVec<u32>,
        nulls: NullBitmap,
        ref_count: u64,
        link_count: u64,
    ) -> Result<Self, RingwireError> {
        if !typ.kind.is_bytes() {
            return Err(RingwireError::MalformedEncoding(format!(
                "{} vector encoded with an offset table",
                typ.kind
            )));
        }
        if offsets.len() != lengths.len() {
            return Err(RingwireError::MalformedEncoding(format!(
                "offset table has {} entries but length table has {}",
                offsets.len(),
                lengths.len()
            )));
        }
        for (&off, &len) in offsets.as_slice().iter().zip(lengths.as_slice()) {
            if off as usize + len as usize > data.len() {
                return Err(RingwireError::MalformedEncoding(format!(
                    "row range {}+{} exceeds data area of {} bytes",
                    off,
                    len,
                    data.len()
                )));
            }
        }
        let mut vector = Self::new(typ);
        vector.data = VectorData::Bytes {
            data,
            offsets,
            lengths,
        };
        vector.nulls = nulls;
        vector.owns_data = true;
        vector.ref_count = ref_count;
        vector.link_count = link_count;
        Ok(vector)
    }

    //==============================================================================
    // 3. Mutation
    //==============================================================================

    /// Appends typed values, growing the buffer through `arena`.
    pub fn append<T: Scalar>(&mut self, arena: &Arena, values: &[T]) -> Result<(), RingwireError> {
        self.check_kind::<T>()?;
        match &mut self.data {
            VectorData::Owned(buf) => buf.extend_from_bytes(arena, bytemuck::cast_slice(values)),
            VectorData::Shared(_) => Err(RingwireError::ContractViolation(
                "cannot append to a vector that references shared memory".into(),
            )),
            VectorData::Bytes { .. } => Err(RingwireError::TypeMismatch(format!(
                "{} vector does not hold fixed-width values",
                self.typ.kind
            ))),
        }
    }

    /// Appends byte-string rows, growing the data area and tables through `arena`.
    pub fn append_bytes<B: AsRef<[u8]>>(&mut self, arena: &Arena, rows: &[B]) -> Result<(), RingwireError> {
        let VectorData::Bytes {
            data,
            offsets,
            lengths,
        } = &mut self.data
        else {
            return Err(RingwireError::TypeMismatch(format!(
                "{} vector does not hold byte strings",
                self.typ.kind
            )));
        };
        for row in rows {
            let row = row.as_ref();
            let start = offset_u32(data.len())?;
            offset_u32(data.len() + row.len())?;
            data.extend_from_bytes(arena, row)?;
            offsets.extend_from_slice(arena, &[start])?;
            lengths.extend_from_slice(arena, &[row.len() as u32])?;
        }
        Ok(())
    }

    /// Appends one null row (a zero value or an empty string) to the end.
    pub fn append_null(&mut self, arena: &Arena) -> Result<(), RingwireError> {
        if self.is_shared() {
            return Err(RingwireError::ContractViolation(
                "cannot append to a vector that references shared memory".into(),
            ));
        }
        let row = self.len();
        match self.typ.kind.fixed_width() {
            Some(width) => {
                if let VectorData::Owned(buf) = &mut self.data {
                    buf.extend_from_bytes(arena, &vec![0u8; width])?;
                }
            }
            None => {
                let empty: [&[u8]; 1] = [&[]];
                self.append_bytes(arena, &empty)?;
            }
        }
        self.nulls.add(row);
        Ok(())
    }

    pub fn set_null(&mut self, row: usize) {
        self.nulls.add(row);
    }

    pub fn set_ref_count(&mut self, n: u64) {
        self.ref_count = n;
    }

    pub fn set_link_count(&mut self, n: u64) {
        self.link_count = n;
    }

    /// Keeps rows `sels[0], sels[1], ...` in that order.
    ///
    /// A shared vector is materialised into a private copy first.
    pub fn shrink(&mut self, sels: &[i64]) -> Result<(), RingwireError> {
        if let VectorData::Bytes {
            offsets, lengths, ..
        } = &mut self.data
        {
            offsets.gather(sels)?;
            lengths.gather(sels)?;
        } else {
            let width = check_fixed_kind(&self.typ)?;
            let rows: Vec<&[u8]> = self.raw_bytes().chunks_exact(width).collect();
            let picked = gather_slice(&rows, sels)?.concat();
            if let VectorData::Owned(buf) = &mut self.data {
                buf.set_len(picked.len())?;
                buf.as_bytes_mut().copy_from_slice(&picked);
            } else {
                self.data = VectorData::Owned(ArenaBuffer::detached_from_bytes(&picked));
            }
        }
        self.nulls = self.nulls.shrink(sels);
        Ok(())
    }

    //==============================================================================
    // 4. Access
    //==============================================================================

    pub fn typ(&self) -> &Type {
        &self.typ
    }

    pub fn nulls(&self) -> &NullBitmap {
        &self.nulls
    }

    pub fn nulls_mut(&mut self) -> &mut NullBitmap {
        &mut self.nulls
    }

    pub fn is_null(&self, row: usize) -> bool {
        self.nulls.contains(row)
    }

    pub fn has_nulls(&self) -> bool {
        self.nulls.any()
    }

    /// `true` when the buffer came from the decoder and belongs to this vector alone.
    pub fn owns_data(&self) -> bool {
        self.owns_data
    }

    pub fn ref_count(&self) -> u64 {
        self.ref_count
    }

    pub fn link_count(&self) -> u64 {
        self.link_count
    }

    pub fn is_shared(&self) -> bool {
        matches!(self.data, VectorData::Shared(_))
    }

    /// Logical row count.
    pub fn len(&self) -> usize {
        match &self.data {
            VectorData::Bytes { offsets, .. } => offsets.len(),
            _ => self
                .typ
                .kind
                .fixed_width()
                .map_or(0, |w| self.raw_bytes().len() / w),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The typed value slice. Fails unless `T` matches the vector's kind.
    pub fn col<T: Scalar>(&self) -> Result<&[T], RingwireError> {
        self.check_kind::<T>()?;
        safe_bytes_to_typed_slice(self.raw_bytes())
    }

    /// Row `row` of a byte-string vector.
    pub fn bytes_at(&self, row: usize) -> Result<&[u8], RingwireError> {
        let VectorData::Bytes {
            data,
            offsets,
            lengths,
        } = &self.data
        else {
            return Err(RingwireError::TypeMismatch(format!(
                "{} vector does not hold byte strings",
                self.typ.kind
            )));
        };
        let (off, len) = offsets
            .as_slice()
            .get(row)
            .zip(lengths.as_slice().get(row))
            .ok_or_else(|| {
                RingwireError::ContractViolation(format!(
                    "row {} out of range for {} rows",
                    row,
                    offsets.len()
                ))
            })?;
        let start = *off as usize;
        Ok(&data.as_bytes()[start..start + *len as usize])
    }

    /// Raw value bytes of a fixed-width vector (empty for byte-string kinds).
    pub fn raw_bytes(&self) -> &[u8] {
        match &self.data {
            VectorData::Owned(buf) => buf.as_bytes(),
            VectorData::Shared(buffer) => buffer.as_slice(),
            VectorData::Bytes { .. } => &[],
        }
    }

    /// Data area, offsets and lengths of a byte-string vector.
    pub fn byte_parts(&self) -> Option<(&[u8], &[u32], &[u32])> {
        match &self.data {
            VectorData::Bytes {
                data,
                offsets,
                lengths,
            } => Some((data.as_bytes(), offsets.as_slice(), lengths.as_slice())),
            _ => None,
        }
    }

    fn check_kind<T: Scalar>(&self) -> Result<(), RingwireError> {
        if T::KIND != self.typ.kind {
            return Err(RingwireError::TypeMismatch(format!(
                "requested {} view of a {} vector",
                T::KIND,
                self.typ.kind
            )));
        }
        Ok(())
    }
}

/// Field-for-field equality of the logical content. `owns_data` is excluded:
/// it records where the buffer came from, not what it holds.
impl PartialEq for Vector {
    fn eq(&self, other: &Self) -> bool {
        if self.typ != other.typ
            || self.nulls != other.nulls
            || self.ref_count != other.ref_count
            || self.link_count != other.link_count
            || self.len() != other.len()
        {
            return false;
        }
        if self.typ.kind.is_bytes() {
            (0..self.len()).all(|i| self.bytes_at(i).ok() == other.bytes_at(i).ok())
        } else {
            self.raw_bytes() == other.raw_bytes()
        }
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{} rows, {} null]", self.typ, self.len(), self.nulls.count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeKind;

    #[test]
    fn test_append_and_typed_view() {
        let arena = Arena::unbounded();
        let mut v = Vector::new(Type::new(TypeKind::Int32));
        v.append(&arena, &[1i32, 2, 3]).unwrap();
        v.append_null(&arena).unwrap();
        v.append(&arena, &[5i32]).unwrap();

        assert_eq!(v.len(), 5);
        assert_eq!(v.col::<i32>().unwrap(), &[1, 2, 3, 0, 5]);
        assert!(v.is_null(3));
        assert!(!v.is_null(4));
        assert!(!v.owns_data());
        assert!(arena.in_use() > 0);
    }

    #[test]
    fn test_col_rejects_wrong_kind() {
        let v = Vector::from_slice(&[1.0f64, 2.0]);
        assert!(matches!(v.col::<i64>(), Err(RingwireError::TypeMismatch(_))));
        assert!(matches!(v.bytes_at(0), Err(RingwireError::TypeMismatch(_))));
    }

    #[test]
    fn test_byte_rows() {
        let arena = Arena::unbounded();
        let mut v = Vector::new(Type::new(TypeKind::Varchar));
        v.append_bytes(&arena, &["alpha", "", "gamma"]).unwrap();
        assert_eq!(v.len(), 3);
        assert_eq!(v.bytes_at(0).unwrap(), b"alpha");
        assert_eq!(v.bytes_at(1).unwrap(), b"");
        assert_eq!(v.bytes_at(2).unwrap(), b"gamma");
        assert!(v.bytes_at(3).is_err());
        assert!(v.append(&arena, &[1i32]).is_err());
    }

    #[test]
    fn test_shrink_fixed_and_bytes() {
        let mut v = Vector::from_slice(&[10u16, 11, 12, 13]);
        v.set_null(1);
        v.shrink(&[3, 1, 0]).unwrap();
        assert_eq!(v.col::<u16>().unwrap(), &[13, 11, 10]);
        assert_eq!(v.nulls().iter().collect::<Vec<_>>(), vec![1]);

        let mut s = Vector::from_byte_rows(Type::new(TypeKind::Char), &["a", "bb", "ccc"]).unwrap();
        s.shrink(&[2, 0]).unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s.bytes_at(0).unwrap(), b"ccc");
        assert_eq!(s.bytes_at(1).unwrap(), b"a");
    }

    #[test]
    fn test_shared_buffer_is_zero_copy_and_read_only() {
        let arena = Arena::unbounded();
        let buffer = Buffer::from_slice_ref(&[1i64, 2, 3]);
        let mut v = Vector::shared(Type::new(TypeKind::Int64), buffer.clone(), NullBitmap::new()).unwrap();

        assert!(v.is_shared());
        assert!(!v.owns_data());
        assert_eq!(v.col::<i64>().unwrap().as_ptr() as *const u8, buffer.as_ptr());
        assert!(matches!(
            v.append(&arena, &[4i64]),
            Err(RingwireError::ContractViolation(_))
        ));

        v.shrink(&[2]).unwrap();
        assert!(!v.is_shared());
        assert_eq!(v.col::<i64>().unwrap(), &[3]);
    }

    #[test]
    fn test_equality_ignores_ownership_flag() {
        let a = Vector::from_slice(&[1u8, 2]);
        let buf = ArenaBuffer::detached_from_bytes(&[1, 2]);
        let b = Vector::decoded_fixed(Type::new(TypeKind::UInt8), buf, NullBitmap::new(), 0, 0).unwrap();
        assert!(b.owns_data());
        assert_eq!(a, b);
    }
}
