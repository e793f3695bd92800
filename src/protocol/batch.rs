// In: src/protocol/batch.rs

use std::io::Write;

use crate::batch::Batch;
use crate::error::RingwireError;
use crate::protocol::vector::{read_vector, write_vector};
use crate::protocol::wire::{WireReader, WireWriter};

pub(crate) const BATCH_TAG: u8 = 0xB7;

pub(crate) fn write_batch<W: Write>(w: &mut WireWriter<W>, bat: &Batch) -> Result<(), RingwireError> {
    w.u8(BATCH_TAG)?;
    w.strings(&bat.attrs)?;
    w.len(bat.vecs.len())?;
    for v in &bat.vecs {
        write_vector(w, v)?;
    }
    w.bytes(&bat.sels_data)?;
    match &bat.sels {
        Some(sels) => {
            w.bool(true)?;
            w.pod_slice(sels)?;
        }
        None => w.bool(false)?,
    }
    w.pod_slice(&bat.zs)?;
    w.pod_slice(&bat.refs)?;
    w.strings(&bat.aliases)
}

/// Reads one batch and checks its parallel-array invariants. An inconsistent
/// batch is reported as a malformed encoding.
pub(crate) fn read_batch(r: &mut WireReader<'_>) -> Result<Batch, RingwireError> {
    let tag = r.u8()?;
    if tag != BATCH_TAG {
        return Err(RingwireError::UnknownTag {
            what: "batch",
            tag: tag as u16,
        });
    }
    let attrs = r.strings()?;
    let n = r.len()?;
    let mut vecs = Vec::with_capacity(n.min(attrs.len()));
    for _ in 0..n {
        vecs.push(read_vector(r)?);
    }
    let sels_data = r.bytes()?.to_vec();
    let sels = if r.bool()? { Some(r.pod_vec::<i64>()?) } else { None };
    let bat = Batch {
        attrs,
        vecs,
        sels_data,
        sels,
        zs: r.pod_vec()?,
        refs: r.pod_vec()?,
        aliases: r.strings()?,
    };
    bat.validate().map_err(|e| match e {
        RingwireError::ContractViolation(msg) => RingwireError::MalformedEncoding(msg),
        other => other,
    })?;
    Ok(bat)
}
