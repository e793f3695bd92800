// In: src/protocol/instruction.rs

//! Instruction layout: opcode, argument tag, then the argument payload.
//!
//! Payloads are written by an opcode-indexed table of codec entries. Adding an
//! opcode means adding one entry; the dispatch below never changes.

use std::io::Write;

use crate::error::RingwireError;
use crate::instruction::{
    Argument, Direction, Instruction, OpCode, ProjectionArg, RestrictArg, SortField, TransformArg, Transformer,
};
use crate::protocol::extend::{read_extend, read_extends, write_extend, write_extends};
use crate::protocol::wire::{WireReader, WireWriter};

type EncodeFn = fn(&Argument, &mut WireWriter<Vec<u8>>) -> Result<(), RingwireError>;
type DecodeFn = fn(&mut WireReader<'_>) -> Result<Argument, RingwireError>;

struct ArgCodec {
    op: OpCode,
    encode: EncodeFn,
    decode: DecodeFn,
}

macro_rules! codec {
    ($op:ident, $enc:ident, $dec:ident) => {
        ArgCodec {
            op: OpCode::$op,
            encode: $enc,
            decode: $dec,
        }
    };
}

/// Indexed by opcode tag.
static ARG_CODECS: [ArgCodec; 15] = [
    codec!(Top, enc_top, dec_top),
    codec!(Plus, enc_plus, dec_plus),
    codec!(Limit, enc_limit, dec_limit),
    codec!(Join, enc_join, dec_join),
    codec!(Merge, enc_unit, dec_merge),
    codec!(Dedup, enc_unit, dec_dedup),
    codec!(Order, enc_order, dec_order),
    codec!(Oplus, enc_oplus, dec_oplus),
    codec!(Output, enc_output, dec_output),
    codec!(Offset, enc_offset, dec_offset),
    codec!(Restrict, enc_restrict, dec_restrict),
    codec!(Connector, enc_unit, dec_connector),
    codec!(Transform, enc_transform, dec_transform),
    codec!(Projection, enc_projection, dec_projection),
    codec!(UnTransform, enc_untransform, dec_untransform),
];

fn codec_for(op: OpCode) -> Result<&'static ArgCodec, RingwireError> {
    ARG_CODECS
        .get(op.tag() as usize)
        .filter(|c| c.op == op)
        .ok_or_else(|| RingwireError::ContractViolation(format!("no argument codec registered for {}", op)))
}

pub(crate) fn write_instruction<W: Write>(w: &mut WireWriter<W>, ins: &Instruction) -> Result<(), RingwireError> {
    ins.check()?;
    let codec = codec_for(ins.op)?;
    let mut payload = WireWriter::new(Vec::new());
    (codec.encode)(&ins.arg, &mut payload)?;
    w.u8(ins.op.tag())?;
    w.u8(ins.arg.tag())?;
    w.raw(&payload.into_inner())
}

pub(crate) fn read_instruction(r: &mut WireReader<'_>) -> Result<Instruction, RingwireError> {
    let op = OpCode::from_tag(r.u8()?)?;
    let arg_tag = r.u8()?;
    if arg_tag != op.tag() {
        return Err(RingwireError::TypeMismatch(format!(
            "{} instruction carries argument tag {}",
            op, arg_tag
        )));
    }
    let arg = (codec_for(op)?.decode)(r)?;
    Ok(Instruction { op, arg })
}

fn unexpected(arg: &Argument) -> RingwireError {
    RingwireError::TypeMismatch(format!("unexpected {} argument", arg.opcode()))
}

//==================================================================================
// Shared field groups
//==================================================================================

fn write_fields(w: &mut WireWriter<Vec<u8>>, fields: &[SortField]) -> Result<(), RingwireError> {
    w.len(fields.len())?;
    for f in fields {
        w.string(&f.attr)?;
        w.u8(f.direction as u8)?;
    }
    Ok(())
}

fn read_fields(r: &mut WireReader<'_>) -> Result<Vec<SortField>, RingwireError> {
    let n = r.len()?;
    let mut out = Vec::with_capacity(n.min(r.remaining()));
    for _ in 0..n {
        let attr = r.string()?;
        out.push(SortField {
            attr,
            direction: Direction::from_tag(r.u8()?)?,
        });
    }
    Ok(out)
}

fn write_restrict(w: &mut WireWriter<Vec<u8>>, arg: &RestrictArg) -> Result<(), RingwireError> {
    w.strings(&arg.attrs)?;
    write_extend(w, &arg.expr)
}

fn read_restrict(r: &mut WireReader<'_>) -> Result<RestrictArg, RingwireError> {
    Ok(RestrictArg {
        attrs: r.strings()?,
        expr: read_extend(r)?,
    })
}

fn write_projection(w: &mut WireWriter<Vec<u8>>, arg: &ProjectionArg) -> Result<(), RingwireError> {
    w.pod_slice(&arg.refs)?;
    w.strings(&arg.aliases)?;
    write_extends(w, &arg.exprs)
}

fn read_projection(r: &mut WireReader<'_>) -> Result<ProjectionArg, RingwireError> {
    Ok(ProjectionArg {
        refs: r.pod_vec()?,
        aliases: r.strings()?,
        exprs: read_extends(r)?,
    })
}

//==================================================================================
// Table entries
//==================================================================================

fn enc_unit(_arg: &Argument, _w: &mut WireWriter<Vec<u8>>) -> Result<(), RingwireError> {
    Ok(())
}

fn dec_merge(_r: &mut WireReader<'_>) -> Result<Argument, RingwireError> {
    Ok(Argument::Merge)
}

fn dec_dedup(_r: &mut WireReader<'_>) -> Result<Argument, RingwireError> {
    Ok(Argument::Dedup)
}

fn dec_connector(_r: &mut WireReader<'_>) -> Result<Argument, RingwireError> {
    Ok(Argument::Connector)
}

fn enc_top(arg: &Argument, w: &mut WireWriter<Vec<u8>>) -> Result<(), RingwireError> {
    let Argument::Top { limit, fields } = arg else {
        return Err(unexpected(arg));
    };
    w.i64(*limit)?;
    write_fields(w, fields)
}

fn dec_top(r: &mut WireReader<'_>) -> Result<Argument, RingwireError> {
    Ok(Argument::Top {
        limit: r.i64()?,
        fields: read_fields(r)?,
    })
}

fn enc_plus(arg: &Argument, w: &mut WireWriter<Vec<u8>>) -> Result<(), RingwireError> {
    let Argument::Plus { typ } = arg else {
        return Err(unexpected(arg));
    };
    w.i64(*typ)
}

fn dec_plus(r: &mut WireReader<'_>) -> Result<Argument, RingwireError> {
    Ok(Argument::Plus { typ: r.i64()? })
}

fn enc_oplus(arg: &Argument, w: &mut WireWriter<Vec<u8>>) -> Result<(), RingwireError> {
    let Argument::Oplus { typ } = arg else {
        return Err(unexpected(arg));
    };
    w.i64(*typ)
}

fn dec_oplus(r: &mut WireReader<'_>) -> Result<Argument, RingwireError> {
    Ok(Argument::Oplus { typ: r.i64()? })
}

fn enc_limit(arg: &Argument, w: &mut WireWriter<Vec<u8>>) -> Result<(), RingwireError> {
    let Argument::Limit { seen, limit } = arg else {
        return Err(unexpected(arg));
    };
    w.u64(*seen)?;
    w.u64(*limit)
}

fn dec_limit(r: &mut WireReader<'_>) -> Result<Argument, RingwireError> {
    Ok(Argument::Limit {
        seen: r.u64()?,
        limit: r.u64()?,
    })
}

fn enc_offset(arg: &Argument, w: &mut WireWriter<Vec<u8>>) -> Result<(), RingwireError> {
    let Argument::Offset { seen, offset } = arg else {
        return Err(unexpected(arg));
    };
    w.u64(*seen)?;
    w.u64(*offset)
}

fn dec_offset(r: &mut WireReader<'_>) -> Result<Argument, RingwireError> {
    Ok(Argument::Offset {
        seen: r.u64()?,
        offset: r.u64()?,
    })
}

fn enc_join(arg: &Argument, w: &mut WireWriter<Vec<u8>>) -> Result<(), RingwireError> {
    let Argument::Join { vars } = arg else {
        return Err(unexpected(arg));
    };
    w.len(vars.len())?;
    for group in vars {
        w.strings(group)?;
    }
    Ok(())
}

fn dec_join(r: &mut WireReader<'_>) -> Result<Argument, RingwireError> {
    let n = r.len()?;
    let mut vars = Vec::with_capacity(n.min(r.remaining()));
    for _ in 0..n {
        vars.push(r.strings()?);
    }
    Ok(Argument::Join { vars })
}

fn enc_order(arg: &Argument, w: &mut WireWriter<Vec<u8>>) -> Result<(), RingwireError> {
    let Argument::Order { fields } = arg else {
        return Err(unexpected(arg));
    };
    write_fields(w, fields)
}

fn dec_order(r: &mut WireReader<'_>) -> Result<Argument, RingwireError> {
    Ok(Argument::Order {
        fields: read_fields(r)?,
    })
}

fn enc_output(arg: &Argument, w: &mut WireWriter<Vec<u8>>) -> Result<(), RingwireError> {
    let Argument::Output { attrs } = arg else {
        return Err(unexpected(arg));
    };
    w.strings(attrs)
}

fn dec_output(r: &mut WireReader<'_>) -> Result<Argument, RingwireError> {
    Ok(Argument::Output { attrs: r.strings()? })
}

fn enc_restrict(arg: &Argument, w: &mut WireWriter<Vec<u8>>) -> Result<(), RingwireError> {
    let Argument::Restrict(restrict) = arg else {
        return Err(unexpected(arg));
    };
    write_restrict(w, restrict)
}

fn dec_restrict(r: &mut WireReader<'_>) -> Result<Argument, RingwireError> {
    Ok(Argument::Restrict(read_restrict(r)?))
}

fn enc_projection(arg: &Argument, w: &mut WireWriter<Vec<u8>>) -> Result<(), RingwireError> {
    let Argument::Projection(projection) = arg else {
        return Err(unexpected(arg));
    };
    write_projection(w, projection)
}

fn dec_projection(r: &mut WireReader<'_>) -> Result<Argument, RingwireError> {
    Ok(Argument::Projection(read_projection(r)?))
}

fn enc_transform(arg: &Argument, w: &mut WireWriter<Vec<u8>>) -> Result<(), RingwireError> {
    let Argument::Transform(t) = arg else {
        return Err(unexpected(arg));
    };
    w.i64(t.typ)?;
    w.bool(t.is_merge)?;
    w.strings(&t.free_vars)?;
    w.len(t.bound_vars.len())?;
    for b in &t.bound_vars {
        w.i64(b.op)?;
        w.i64(b.reference)?;
        w.string(&b.name)?;
        w.string(&b.alias)?;
    }
    match &t.restrict {
        Some(restrict) => {
            w.bool(true)?;
            write_restrict(w, restrict)?;
        }
        None => w.bool(false)?,
    }
    match &t.projection {
        Some(projection) => {
            w.bool(true)?;
            write_projection(w, projection)
        }
        None => w.bool(false),
    }
}

fn dec_transform(r: &mut WireReader<'_>) -> Result<Argument, RingwireError> {
    let typ = r.i64()?;
    let is_merge = r.bool()?;
    let free_vars = r.strings()?;
    let n = r.len()?;
    let mut bound_vars = Vec::with_capacity(n.min(r.remaining()));
    for _ in 0..n {
        bound_vars.push(Transformer {
            op: r.i64()?,
            reference: r.i64()?,
            name: r.string()?,
            alias: r.string()?,
        });
    }
    let restrict = if r.bool()? { Some(read_restrict(r)?) } else { None };
    let projection = if r.bool()? { Some(read_projection(r)?) } else { None };
    Ok(Argument::Transform(TransformArg {
        typ,
        is_merge,
        free_vars,
        bound_vars,
        restrict,
        projection,
    }))
}

fn enc_untransform(arg: &Argument, w: &mut WireWriter<Vec<u8>>) -> Result<(), RingwireError> {
    let Argument::UnTransform { typ, free_vars } = arg else {
        return Err(unexpected(arg));
    };
    w.i64(*typ)?;
    w.strings(free_vars)
}

fn dec_untransform(r: &mut WireReader<'_>) -> Result<Argument, RingwireError> {
    Ok(Argument::UnTransform {
        typ: r.i64()?,
        free_vars: r.strings()?,
    })
}
