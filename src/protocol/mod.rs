// In: src/protocol/mod.rs

//! The wire protocol: tagged binary encodings of vectors, batches, rings,
//! expression trees and pipeline instructions.
//!
//! Every `encode_*` builds one value in memory and hands it to any `Write`
//! sink in a single `write_all`, so an encode error writes nothing. Every
//! `decode_*` reads one value from the front of a byte slice and returns it together with
//! the number of bytes consumed, so a buffer holding several values can be
//! decoded back-to-back. Decoded values own fresh copies of their data and
//! never alias the input. A failed decode returns an error and nothing else.
//!
//! Integers are little-endian; see `wire` for the field primitives.

pub(crate) mod batch;
pub(crate) mod extend;
pub(crate) mod instruction;
pub(crate) mod ring;
pub(crate) mod vector;
pub mod wire;


use std::io::Write;

use crate::batch::Batch;
use crate::config::RingwireConfig;
use crate::error::RingwireError;
use crate::extend::Extend;
use crate::instruction::Instruction;
use crate::ring::Ring;
use crate::vector::Vector;

use wire::{WireReader, WireWriter};

/// Encodes into a scratch buffer, then emits it whole.
fn staged<W: Write>(
    out: &mut W,
    write: impl FnOnce(&mut WireWriter<Vec<u8>>) -> Result<(), RingwireError>,
) -> Result<(), RingwireError> {
    let mut w = WireWriter::new(Vec::new());
    write(&mut w)?;
    out.write_all(&w.into_inner())?;
    Ok(())
}

/// Runs one top-level decode and reports how far it got.
fn decode_with<T>(
    what: &'static str,
    bytes: &[u8],
    config: &RingwireConfig,
    read: impl FnOnce(&mut WireReader<'_>) -> Result<T, RingwireError>,
) -> Result<(T, usize), RingwireError> {
    let mut r = WireReader::with_limit(bytes, config.max_decode_len);
    match read(&mut r) {
        Ok(value) => {
            log::trace!("decoded {} from {} of {} bytes", what, r.position(), bytes.len());
            Ok((value, r.position()))
        }
        Err(e) => {
            log::debug!("{} decode failed at offset {}: {}", what, r.position(), e);
            Err(e)
        }
    }
}

//==================================================================================
// Vector
//==================================================================================

pub fn encode_vector<W: Write>(v: &Vector, out: &mut W) -> Result<(), RingwireError> {
    staged(out, |w| vector::write_vector(w, v))
}

pub fn decode_vector(bytes: &[u8]) -> Result<(Vector, usize), RingwireError> {
    decode_with("vector", bytes, &RingwireConfig::default(), vector::read_vector)
}

//==================================================================================
// Batch
//==================================================================================

pub fn encode_batch<W: Write>(bat: &Batch, out: &mut W) -> Result<(), RingwireError> {
    staged(out, |w| batch::write_batch(w, bat))
}

pub fn decode_batch(bytes: &[u8]) -> Result<(Batch, usize), RingwireError> {
    decode_with("batch", bytes, &RingwireConfig::default(), batch::read_batch)
}

//==================================================================================
// Ring
//==================================================================================

/// Fails with `RingFinalized` for a ring that has already been evaluated.
pub fn encode_ring<W: Write>(r: &Ring, out: &mut W) -> Result<(), RingwireError> {
    ring::write_ring(&mut WireWriter::new(out), r)
}

pub fn decode_ring(bytes: &[u8]) -> Result<(Ring, usize), RingwireError> {
    decode_ring_with_config(bytes, &RingwireConfig::default())
}

/// Decodes a ring; the configuration supplies the decode length limit and the
/// growth policy of the rebuilt ring.
pub fn decode_ring_with_config(bytes: &[u8], config: &RingwireConfig) -> Result<(Ring, usize), RingwireError> {
    decode_with("ring", bytes, config, |r| ring::read_ring(r, config))
}

//==================================================================================
// Extend
//==================================================================================

pub fn encode_extend<W: Write>(e: &Extend, out: &mut W) -> Result<(), RingwireError> {
    staged(out, |w| extend::write_extend(w, e))
}

pub fn decode_extend(bytes: &[u8]) -> Result<(Extend, usize), RingwireError> {
    decode_with("extend", bytes, &RingwireConfig::default(), extend::read_extend)
}

//==================================================================================
// Instruction
//==================================================================================

/// Fails with `TypeMismatch` if the argument kind does not belong to the opcode.
pub fn encode_instruction<W: Write>(ins: &Instruction, out: &mut W) -> Result<(), RingwireError> {
    instruction::write_instruction(&mut WireWriter::new(out), ins)
}

pub fn decode_instruction(bytes: &[u8]) -> Result<(Instruction, usize), RingwireError> {
    decode_with("instruction", bytes, &RingwireConfig::default(), instruction::read_instruction)
}
