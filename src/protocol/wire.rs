// In: src/protocol/wire.rs

//! Low-level little-endian field readers and writers shared by every codec.
//!
//! Variable-length fields carry a u32 byte-count prefix. The reader checks each
//! prefix against both the remaining input and a configurable ceiling before
//! touching the payload, so a corrupt length can never trigger a huge allocation.

use std::io::{Cursor, Read, Write};

use crate::arena::{ArenaBuffer, ArenaVec};
use crate::config::RingwireConfig;
use crate::error::RingwireError;
use crate::traits::Scalar;
use crate::types::{Type, TypeKind};
use crate::utils::typed_slice_to_bytes;

//==================================================================================
// 1. Writer
//==================================================================================

pub struct WireWriter<W: Write> {
    inner: W,
}

impl<W: Write> WireWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn u8(&mut self, v: u8) -> Result<(), RingwireError> {
        self.inner.write_all(&[v])?;
        Ok(())
    }

    pub fn bool(&mut self, v: bool) -> Result<(), RingwireError> {
        self.u8(v as u8)
    }

    pub fn u32(&mut self, v: u32) -> Result<(), RingwireError> {
        self.inner.write_all(&v.to_le_bytes())?;
        Ok(())
    }

    pub fn i32(&mut self, v: i32) -> Result<(), RingwireError> {
        self.inner.write_all(&v.to_le_bytes())?;
        Ok(())
    }

    pub fn u64(&mut self, v: u64) -> Result<(), RingwireError> {
        self.inner.write_all(&v.to_le_bytes())?;
        Ok(())
    }

    pub fn i64(&mut self, v: i64) -> Result<(), RingwireError> {
        self.inner.write_all(&v.to_le_bytes())?;
        Ok(())
    }

    /// Bytes written as-is, without a prefix.
    pub fn raw(&mut self, data: &[u8]) -> Result<(), RingwireError> {
        self.inner.write_all(data)?;
        Ok(())
    }

    /// A u32 count or byte length.
    pub fn len(&mut self, n: usize) -> Result<(), RingwireError> {
        let n = u32::try_from(n).map_err(|_| {
            RingwireError::ContractViolation(format!("length {} does not fit a u32 prefix", n))
        })?;
        self.u32(n)
    }

    pub fn bytes(&mut self, data: &[u8]) -> Result<(), RingwireError> {
        self.len(data.len())?;
        self.raw(data)
    }

    pub fn string(&mut self, s: &str) -> Result<(), RingwireError> {
        self.bytes(s.as_bytes())
    }

    pub fn strings(&mut self, list: &[String]) -> Result<(), RingwireError> {
        self.len(list.len())?;
        for s in list {
            self.string(s)?;
        }
        Ok(())
    }

    /// A byte-length prefix followed by the raw little-endian values.
    pub fn pod_slice<T: Scalar>(&mut self, values: &[T]) -> Result<(), RingwireError> {
        self.bytes(&typed_slice_to_bytes(values))
    }

    pub fn typ(&mut self, typ: &Type) -> Result<(), RingwireError> {
        self.u8(typ.kind.tag())?;
        self.i32(typ.size)?;
        self.i32(typ.width)?;
        self.i32(typ.precision)
    }
}

//==================================================================================
// 2. Reader
//==================================================================================

pub struct WireReader<'a> {
    cursor: Cursor<&'a [u8]>,
    max_len: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self::with_limit(bytes, RingwireConfig::default().max_decode_len)
    }

    pub fn with_limit(bytes: &'a [u8], max_len: usize) -> Self {
        Self {
            cursor: Cursor::new(bytes),
            max_len,
        }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    pub fn remaining(&self) -> usize {
        self.cursor.get_ref().len().saturating_sub(self.position())
    }

    fn fixed<const N: usize>(&mut self) -> Result<[u8; N], RingwireError> {
        let mut buf = [0u8; N];
        let at = self.position();
        self.cursor.read_exact(&mut buf).map_err(|_| {
            RingwireError::MalformedEncoding(format!(
                "truncated input: {} bytes needed at offset {}",
                N, at
            ))
        })?;
        Ok(buf)
    }

    /// Borrows the next `n` input bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], RingwireError> {
        if n > self.remaining() {
            return Err(RingwireError::MalformedEncoding(format!(
                "length {} at offset {} exceeds the {} remaining bytes",
                n,
                self.position(),
                self.remaining()
            )));
        }
        let start = self.position();
        let bytes: &'a [u8] = *self.cursor.get_ref();
        self.cursor.set_position((start + n) as u64);
        Ok(&bytes[start..start + n])
    }

    pub fn u8(&mut self) -> Result<u8, RingwireError> {
        Ok(self.fixed::<1>()?[0])
    }

    pub fn bool(&mut self) -> Result<bool, RingwireError> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            b => Err(RingwireError::MalformedEncoding(format!("invalid flag byte {}", b))),
        }
    }

    pub fn u32(&mut self) -> Result<u32, RingwireError> {
        Ok(u32::from_le_bytes(self.fixed()?))
    }

    pub fn i32(&mut self) -> Result<i32, RingwireError> {
        Ok(i32::from_le_bytes(self.fixed()?))
    }

    pub fn u64(&mut self) -> Result<u64, RingwireError> {
        Ok(u64::from_le_bytes(self.fixed()?))
    }

    pub fn i64(&mut self) -> Result<i64, RingwireError> {
        Ok(i64::from_le_bytes(self.fixed()?))
    }

    /// A u32 count or byte length, bounded by the decode limit.
    pub fn len(&mut self) -> Result<usize, RingwireError> {
        let n = self.u32()? as usize;
        if n > self.max_len {
            return Err(RingwireError::MalformedEncoding(format!(
                "length prefix {} exceeds the decode limit of {}",
                n, self.max_len
            )));
        }
        Ok(n)
    }

    pub fn bytes(&mut self) -> Result<&'a [u8], RingwireError> {
        let n = self.len()?;
        self.take(n)
    }

    pub fn string(&mut self) -> Result<String, RingwireError> {
        let bytes = self.bytes()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| RingwireError::MalformedEncoding(format!("invalid UTF-8 string: {}", e)))
    }

    pub fn strings(&mut self) -> Result<Vec<String>, RingwireError> {
        let n = self.len()?;
        (0..n).map(|_| self.string()).collect()
    }

    /// A fresh, aligned, detached copy of a prefixed value array.
    pub fn arena_vec<T: Scalar>(&mut self) -> Result<ArenaVec<T>, RingwireError> {
        let bytes = self.bytes()?;
        ArenaVec::from_buffer(ArenaBuffer::detached_from_bytes(bytes))
    }

    pub fn pod_vec<T: Scalar>(&mut self) -> Result<Vec<T>, RingwireError> {
        Ok(self.arena_vec::<T>()?.as_slice().to_vec())
    }

    pub fn typ(&mut self) -> Result<Type, RingwireError> {
        let kind = TypeKind::from_tag(self.u8()?)?;
        Ok(Type {
            kind,
            size: self.i32()?,
            width: self.i32()?,
            precision: self.i32()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_are_little_endian() {
        let mut w = WireWriter::new(Vec::new());
        w.u32(0x0102_0304).unwrap();
        w.string("hi").unwrap();
        let buf = w.into_inner();
        assert_eq!(buf, vec![4, 3, 2, 1, 2, 0, 0, 0, b'h', b'i']);

        let mut r = WireReader::new(&buf);
        assert_eq!(r.u32().unwrap(), 0x0102_0304);
        assert_eq!(r.string().unwrap(), "hi");
        assert_eq!(r.position(), buf.len());
    }

    #[test]
    fn test_truncation_is_malformed() {
        let mut r = WireReader::new(&[1, 2]);
        assert!(matches!(r.u32(), Err(RingwireError::MalformedEncoding(_))));

        // Prefix claims 10 bytes, only 1 follows.
        let mut r = WireReader::new(&[10, 0, 0, 0, 7]);
        assert!(matches!(r.bytes(), Err(RingwireError::MalformedEncoding(_))));
    }

    #[test]
    fn test_decode_limit() {
        let mut w = WireWriter::new(Vec::new());
        w.bytes(&[0u8; 32]).unwrap();
        let buf = w.into_inner();
        assert!(WireReader::with_limit(&buf, 31).bytes().is_err());
        assert_eq!(WireReader::with_limit(&buf, 32).bytes().unwrap().len(), 32);
    }

    #[test]
    fn test_pod_vec_requires_whole_values() {
        let mut r = WireReader::new(&[3, 0, 0, 0, 1, 2, 3]);
        assert!(matches!(
            r.pod_vec::<u16>(),
            Err(RingwireError::MalformedEncoding(_))
        ));
    }
}
