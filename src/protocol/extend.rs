// In: src/protocol/extend.rs

use std::io::Write;

use crate::error::RingwireError;
use crate::extend::Extend;
use crate::protocol::vector::{read_vector, write_vector};
use crate::protocol::wire::{WireReader, WireWriter};

pub(crate) fn write_extend<W: Write>(w: &mut WireWriter<W>, e: &Extend) -> Result<(), RingwireError> {
    w.u8(e.tag())?;
    match e {
        Extend::Unary { op, expr } => {
            w.i32(*op)?;
            write_extend(w, expr)
        }
        Extend::Binary { op, left, right } => {
            w.i32(*op)?;
            write_extend(w, left)?;
            write_extend(w, right)
        }
        Extend::Multi { op, args } => {
            w.i32(*op)?;
            write_extends(w, args)
        }
        Extend::Paren { expr } => write_extend(w, expr),
        Extend::Func { name, args } => {
            w.string(name)?;
            write_extends(w, args)
        }
        Extend::Star => Ok(()),
        Extend::Value { vector } => write_vector(w, vector),
        Extend::Attribute { name, typ } => {
            w.string(name)?;
            w.typ(typ)
        }
    }
}

pub(crate) fn write_extends<W: Write>(w: &mut WireWriter<W>, list: &[Extend]) -> Result<(), RingwireError> {
    w.len(list.len())?;
    for e in list {
        write_extend(w, e)?;
    }
    Ok(())
}

pub(crate) fn read_extend(r: &mut WireReader<'_>) -> Result<Extend, RingwireError> {
    let tag = r.u8()?;
    let e = match tag {
        0 => {
            let op = r.i32()?;
            Extend::unary(op, read_extend(r)?)
        }
        1 => {
            let op = r.i32()?;
            let left = read_extend(r)?;
            Extend::binary(op, left, read_extend(r)?)
        }
        2 => Extend::Multi {
            op: r.i32()?,
            args: read_extends(r)?,
        },
        3 => Extend::paren(read_extend(r)?),
        4 => Extend::Func {
            name: r.string()?,
            args: read_extends(r)?,
        },
        5 => Extend::Star,
        6 => Extend::Value {
            vector: read_vector(r)?,
        },
        7 => Extend::Attribute {
            name: r.string()?,
            typ: r.typ()?,
        },
        _ => {
            return Err(RingwireError::UnknownTag {
                what: "extend node",
                tag: tag as u16,
            })
        }
    };
    Ok(e)
}

pub(crate) fn read_extends(r: &mut WireReader<'_>) -> Result<Vec<Extend>, RingwireError> {
    let n = r.len()?;
    // Every node is at least one byte, so `remaining` bounds the count.
    let mut out = Vec::with_capacity(n.min(r.remaining()));
    for _ in 0..n {
        out.push(read_extend(r)?);
    }
    Ok(out)
}
