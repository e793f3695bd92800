// In: src/protocol/ring.rs

//! Ring layout: function tag, kind tag, type descriptor, the null counts, then
//! the variant payload written by [`RingPayload`].
//!
//! Decoding builds an empty ring for the (function, type) pair through the
//! factory and lets the variant fill itself from the payload, so every decoded
//! ring starts live, detached from any arena.

use std::io::Write;

use crate::arena::ArenaVec;
use crate::config::RingwireConfig;
use crate::error::RingwireError;
use crate::protocol::wire::{WireReader, WireWriter};
use crate::ring::fold::{Extreme, Fold};
use crate::ring::state::Slots;
use crate::ring::string::UNSET_SLOT;
use crate::ring::sketch;
use crate::ring::{AggFunc, ApproxCdRing, AvgRing, CountRing, NumericRing, Ring, StrRing, VarianceRing};
use crate::types::TypeKind;

pub(crate) trait RingPayload {
    /// Everything after the null counts.
    fn encode_payload<W: Write>(&self, w: &mut WireWriter<W>) -> Result<(), RingwireError>;

    /// Rebuilds the ring state from `nulls` and the payload.
    fn decode_payload(&mut self, nulls: ArenaVec<i64>, r: &mut WireReader<'_>) -> Result<(), RingwireError>;
}

/// The payload is staged first so a finalized ring writes nothing.
pub(crate) fn write_ring<W: Write>(w: &mut WireWriter<W>, ring: &Ring) -> Result<(), RingwireError> {
    let mut payload = WireWriter::new(Vec::new());
    ring.encode_payload(&mut payload)?;
    w.u8(ring.func().tag())?;
    w.u8(ring.typ().kind.tag())?;
    w.typ(ring.typ())?;
    w.pod_slice(ring.null_counts())?;
    w.raw(&payload.into_inner())
}

pub(crate) fn read_ring(r: &mut WireReader<'_>, config: &RingwireConfig) -> Result<Ring, RingwireError> {
    let func_tag = r.u8()?;
    let kind_tag = r.u8()?;
    let func = AggFunc::from_tag(func_tag)?;
    let kind = TypeKind::from_tag(kind_tag)?;
    let typ = r.typ()?;
    if typ.kind != kind {
        return Err(RingwireError::MalformedEncoding(format!(
            "ring tagged {} carries a {} type descriptor",
            kind, typ.kind
        )));
    }
    let mut ring = Ring::with_config(func, typ, config).map_err(|_| RingwireError::UnknownTag {
        what: "ring variant",
        tag: u16::from_be_bytes([func_tag, kind_tag]),
    })?;
    let nulls = r.arena_vec::<i64>()?;
    ring.decode_payload(nulls, r)?;
    Ok(ring)
}

//==================================================================================
// Variant payloads
//==================================================================================

fn read_slots<T: crate::traits::Scalar>(
    nulls: ArenaVec<i64>,
    r: &mut WireReader<'_>,
) -> Result<Slots<T>, RingwireError> {
    Slots::from_parts(r.arena_vec::<T>()?, nulls)
}

impl<F: Fold> RingPayload for NumericRing<F> {
    fn encode_payload<W: Write>(&self, w: &mut WireWriter<W>) -> Result<(), RingwireError> {
        self.slots.live()?;
        w.pod_slice(self.slots.values.as_slice())
    }

    fn decode_payload(&mut self, nulls: ArenaVec<i64>, r: &mut WireReader<'_>) -> Result<(), RingwireError> {
        self.slots = read_slots(nulls, r)?;
        Ok(())
    }
}

impl RingPayload for CountRing {
    fn encode_payload<W: Write>(&self, w: &mut WireWriter<W>) -> Result<(), RingwireError> {
        self.slots.live()?;
        w.pod_slice(self.slots.values.as_slice())
    }

    fn decode_payload(&mut self, nulls: ArenaVec<i64>, r: &mut WireReader<'_>) -> Result<(), RingwireError> {
        self.slots = read_slots(nulls, r)?;
        Ok(())
    }
}

impl RingPayload for AvgRing {
    fn encode_payload<W: Write>(&self, w: &mut WireWriter<W>) -> Result<(), RingwireError> {
        self.slots.live()?;
        w.pod_slice(self.slots.values.as_slice())
    }

    fn decode_payload(&mut self, nulls: ArenaVec<i64>, r: &mut WireReader<'_>) -> Result<(), RingwireError> {
        self.slots = read_slots(nulls, r)?;
        Ok(())
    }
}

impl RingPayload for VarianceRing {
    fn encode_payload<W: Write>(&self, w: &mut WireWriter<W>) -> Result<(), RingwireError> {
        self.slots.live()?;
        w.pod_slice(self.slots.values.as_slice())?;
        w.pod_slice(self.sum_x2.as_slice())
    }

    fn decode_payload(&mut self, nulls: ArenaVec<i64>, r: &mut WireReader<'_>) -> Result<(), RingwireError> {
        let slots = read_slots(nulls, r)?;
        let sum_x2 = r.arena_vec::<f64>()?;
        if sum_x2.len() != slots.len() {
            return Err(RingwireError::MalformedEncoding(format!(
                "variance ring has {} sums but {} sums of squares",
                slots.len(),
                sum_x2.len()
            )));
        }
        self.slots = slots;
        self.sum_x2 = sum_x2;
        Ok(())
    }
}

impl RingPayload for ApproxCdRing {
    fn encode_payload<W: Write>(&self, w: &mut WireWriter<W>) -> Result<(), RingwireError> {
        self.slots.live()?;
        w.pod_slice(&self.estimates())?;
        let width = sketch::register_count(self.precision);
        for registers in self.all_registers().chunks_exact(width) {
            w.bytes(&sketch::blob(self.precision, registers))?;
        }
        Ok(())
    }

    fn decode_payload(&mut self, nulls: ArenaVec<i64>, r: &mut WireReader<'_>) -> Result<(), RingwireError> {
        let slots: Slots<u64> = read_slots(nulls, r)?;
        let mut precision = self.precision;
        let mut registers = Vec::new();
        for group in 0..slots.len() {
            let (p, regs) = sketch::split_blob(r.bytes()?)?;
            if group == 0 {
                precision = p;
            } else if p != precision {
                return Err(RingwireError::MalformedEncoding(
                    "sketches of one ring disagree on precision".into(),
                ));
            }
            registers.extend_from_slice(regs);
        }
        self.restore(slots, precision, &registers)
    }
}

impl<E: Extreme> RingPayload for StrRing<E> {
    fn encode_payload<W: Write>(&self, w: &mut WireWriter<W>) -> Result<(), RingwireError> {
        self.live()?;
        let slots = self.values();
        w.len(slots.len())?;
        for slot in slots {
            match slot {
                Some(bytes) => {
                    let len = u32::try_from(bytes.len())
                        .ok()
                        .filter(|&n| n != UNSET_SLOT)
                        .ok_or_else(|| {
                            RingwireError::ContractViolation(format!(
                                "string slot of {} bytes is too long to encode",
                                bytes.len()
                            ))
                        })?;
                    w.u32(len)?;
                    w.raw(bytes)?;
                }
                None => w.u32(UNSET_SLOT)?,
            }
        }
        Ok(())
    }

    fn decode_payload(&mut self, nulls: ArenaVec<i64>, r: &mut WireReader<'_>) -> Result<(), RingwireError> {
        let n = r.len()?;
        let mut values = Vec::with_capacity(n.min(r.remaining()));
        for _ in 0..n {
            let len = r.u32()?;
            values.push(if len == UNSET_SLOT {
                None
            } else {
                Some(r.take(len as usize)?)
            });
        }
        self.restore(&values, nulls)
    }
}
