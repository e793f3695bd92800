// In: src/protocol/vector.rs

//! Vector layout: kind tag, ownership flag, the two bookkeeping counters, the
//! type descriptor, the value area (plus offset and length tables for byte
//! kinds) and finally the null rows as an explicit u64 index list.

use std::io::Write;

use crate::arena::ArenaBuffer;
use crate::error::RingwireError;
use crate::null_handling::NullBitmap;
use crate::protocol::wire::{WireReader, WireWriter};
use crate::types::TypeKind;
use crate::vector::Vector;

pub(crate) fn write_vector<W: Write>(w: &mut WireWriter<W>, v: &Vector) -> Result<(), RingwireError> {
    w.u8(v.typ().kind.tag())?;
    w.bool(v.owns_data())?;
    w.u64(v.ref_count())?;
    w.u64(v.link_count())?;
    w.typ(v.typ())?;
    match v.byte_parts() {
        Some((data, offsets, lengths)) => {
            w.bytes(data)?;
            w.pod_slice(offsets)?;
            w.pod_slice(lengths)?;
        }
        None => w.bytes(v.raw_bytes())?,
    }
    let nulls: Vec<u64> = v.nulls().iter().map(|i| i as u64).collect();
    w.pod_slice(&nulls)
}

pub(crate) fn read_vector(r: &mut WireReader<'_>) -> Result<Vector, RingwireError> {
    let kind = TypeKind::from_tag(r.u8()?)?;
    // The decoder always owns what it produced, whatever the sender had.
    let _sender_owned = r.bool()?;
    let ref_count = r.u64()?;
    let link_count = r.u64()?;
    let typ = r.typ()?;
    if typ.kind != kind {
        return Err(RingwireError::MalformedEncoding(format!(
            "vector tagged {} carries a {} type descriptor",
            kind, typ.kind
        )));
    }

    let (data, offsets, lengths) = if kind.is_bytes() {
        let data = ArenaBuffer::detached_from_bytes(r.bytes()?);
        (data, Some(r.arena_vec::<u32>()?), Some(r.arena_vec::<u32>()?))
    } else {
        (ArenaBuffer::detached_from_bytes(r.bytes()?), None, None)
    };

    let null_rows = r.pod_vec::<u64>()?;

    let mut vector = match (offsets, lengths) {
        (Some(offsets), Some(lengths)) => Vector::decoded_bytes(
            typ,
            data,
            offsets,
            lengths,
            NullBitmap::new(),
            ref_count,
            link_count,
        )?,
        _ => Vector::decoded_fixed(typ, data, NullBitmap::new(), ref_count, link_count)?,
    };
    // Rows are checked before the bitmap is sized from them.
    if let Some(&row) = null_rows.iter().find(|&&i| i >= vector.len() as u64) {
        return Err(RingwireError::MalformedEncoding(format!(
            "null row {} beyond a vector of {} rows",
            row,
            vector.len()
        )));
    }
    *vector.nulls_mut() = NullBitmap::from_indices(null_rows.iter().map(|&i| i as usize));
    Ok(vector)
}
