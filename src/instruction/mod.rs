// In: src/instruction/mod.rs

//! Pipeline instructions: one operator step, an opcode plus its argument.
//!
//! Exactly one argument kind is valid per opcode. The pairing is checked by
//! [`Instruction::check`], which the codec runs before writing anything.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RingwireError;
use crate::extend::Extend;

//==================================================================================
// 1. Opcodes
//==================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    Top = 0,
    Plus = 1,
    Limit = 2,
    Join = 3,
    Merge = 4,
    Dedup = 5,
    Order = 6,
    Oplus = 7,
    Output = 8,
    Offset = 9,
    Restrict = 10,
    Connector = 11,
    Transform = 12,
    Projection = 13,
    UnTransform = 14,
}

impl OpCode {
    pub const ALL: [OpCode; 15] = [
        OpCode::Top,
        OpCode::Plus,
        OpCode::Limit,
        OpCode::Join,
        OpCode::Merge,
        OpCode::Dedup,
        OpCode::Order,
        OpCode::Oplus,
        OpCode::Output,
        OpCode::Offset,
        OpCode::Restrict,
        OpCode::Connector,
        OpCode::Transform,
        OpCode::Projection,
        OpCode::UnTransform,
    ];

    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Result<Self, RingwireError> {
        Self::ALL
            .get(tag as usize)
            .copied()
            .ok_or(RingwireError::UnknownTag {
                what: "opcode",
                tag: tag as u16,
            })
    }

    pub fn name(self) -> &'static str {
        match self {
            OpCode::Top => "top",
            OpCode::Plus => "plus",
            OpCode::Limit => "limit",
            OpCode::Join => "join",
            OpCode::Merge => "merge",
            OpCode::Dedup => "dedup",
            OpCode::Order => "order",
            OpCode::Oplus => "oplus",
            OpCode::Output => "output",
            OpCode::Offset => "offset",
            OpCode::Restrict => "restrict",
            OpCode::Connector => "connector",
            OpCode::Transform => "transform",
            OpCode::Projection => "projection",
            OpCode::UnTransform => "untransform",
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

//==================================================================================
// 2. Argument payloads
//==================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Direction {
    Ascending = 0,
    Descending = 1,
}

impl Direction {
    pub fn from_tag(tag: u8) -> Result<Self, RingwireError> {
        match tag {
            0 => Ok(Direction::Ascending),
            1 => Ok(Direction::Descending),
            _ => Err(RingwireError::UnknownTag {
                what: "sort direction",
                tag: tag as u16,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    pub attr: String,
    pub direction: Direction,
}

impl SortField {
    pub fn new(attr: impl Into<String>, direction: Direction) -> Self {
        Self {
            attr: attr.into(),
            direction,
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Direction::Ascending => write!(f, "{}", self.attr),
            Direction::Descending => write!(f, "{} desc", self.attr),
        }
    }
}

/// One bound-variable rewrite of a transform step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformer {
    pub op: i64,
    pub reference: i64,
    pub name: String,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestrictArg {
    pub attrs: Vec<String>,
    pub expr: Extend,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionArg {
    pub refs: Vec<u64>,
    pub aliases: Vec<String>,
    pub exprs: Vec<Extend>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformArg {
    pub typ: i64,
    pub is_merge: bool,
    pub free_vars: Vec<String>,
    pub bound_vars: Vec<Transformer>,
    pub restrict: Option<RestrictArg>,
    pub projection: Option<ProjectionArg>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Top { limit: i64, fields: Vec<SortField> },
    Plus { typ: i64 },
    Limit { seen: u64, limit: u64 },
    Join { vars: Vec<Vec<String>> },
    Merge,
    Dedup,
    Order { fields: Vec<SortField> },
    Oplus { typ: i64 },
    Output { attrs: Vec<String> },
    Offset { seen: u64, offset: u64 },
    Restrict(RestrictArg),
    Connector,
    Transform(TransformArg),
    Projection(ProjectionArg),
    UnTransform { typ: i64, free_vars: Vec<String> },
}

impl Argument {
    /// The opcode this argument kind belongs to.
    pub fn opcode(&self) -> OpCode {
        match self {
            Argument::Top { .. } => OpCode::Top,
            Argument::Plus { .. } => OpCode::Plus,
            Argument::Limit { .. } => OpCode::Limit,
            Argument::Join { .. } => OpCode::Join,
            Argument::Merge => OpCode::Merge,
            Argument::Dedup => OpCode::Dedup,
            Argument::Order { .. } => OpCode::Order,
            Argument::Oplus { .. } => OpCode::Oplus,
            Argument::Output { .. } => OpCode::Output,
            Argument::Offset { .. } => OpCode::Offset,
            Argument::Restrict(_) => OpCode::Restrict,
            Argument::Connector => OpCode::Connector,
            Argument::Transform(_) => OpCode::Transform,
            Argument::Projection(_) => OpCode::Projection,
            Argument::UnTransform { .. } => OpCode::UnTransform,
        }
    }

    /// Wire tag of the argument kind; equal to its opcode's tag.
    pub fn tag(&self) -> u8 {
        self.opcode().tag()
    }
}

//==================================================================================
// 3. Instructions
//==================================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub op: OpCode,
    pub arg: Argument,
}

impl Instruction {
    /// Builds an instruction whose opcode is implied by the argument.
    pub fn from_argument(arg: Argument) -> Self {
        Self {
            op: arg.opcode(),
            arg,
        }
    }

    /// Fails with `TypeMismatch` if the argument kind does not belong to the opcode.
    pub fn check(&self) -> Result<(), RingwireError> {
        let expected = self.arg.opcode();
        if expected != self.op {
            return Err(RingwireError::TypeMismatch(format!(
                "{} instruction carries a {} argument",
                self.op, expected
            )));
        }
        Ok(())
    }
}

fn join_display<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.op)?;
        match &self.arg {
            Argument::Top { limit, fields } => {
                write!(f, " {} order by {}", limit, join_display(fields))
            }
            Argument::Plus { typ } | Argument::Oplus { typ } => write!(f, " type {}", typ),
            Argument::Limit { limit, .. } => write!(f, " {}", limit),
            Argument::Offset { offset, .. } => write!(f, " {}", offset),
            Argument::Join { vars } => {
                let groups: Vec<String> = vars.iter().map(|v| format!("[{}]", v.join(", "))).collect();
                write!(f, " on {}", groups.join(" "))
            }
            Argument::Order { fields } => write!(f, " by {}", join_display(fields)),
            Argument::Output { attrs } => write!(f, " {}", attrs.join(", ")),
            Argument::Restrict(r) => write!(f, " {}", r.expr),
            Argument::Projection(p) => write!(f, " {}", join_display(&p.exprs)),
            Argument::Transform(t) => {
                write!(f, " type {}", t.typ)?;
                if !t.free_vars.is_empty() {
                    write!(f, " group by {}", t.free_vars.join(", "))?;
                }
                Ok(())
            }
            Argument::UnTransform { free_vars, .. } if !free_vars.is_empty() => {
                write!(f, " group by {}", free_vars.join(", "))
            }
            Argument::UnTransform { .. } | Argument::Merge | Argument::Dedup | Argument::Connector => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_tags() {
        for (i, op) in OpCode::ALL.iter().enumerate() {
            assert_eq!(op.tag() as usize, i);
            assert_eq!(OpCode::from_tag(op.tag()).unwrap(), *op);
        }
        assert!(matches!(
            OpCode::from_tag(15),
            Err(RingwireError::UnknownTag { what: "opcode", tag: 15 })
        ));
    }

    #[test]
    fn test_check_rejects_foreign_argument() {
        let ok = Instruction::from_argument(Argument::Limit { seen: 0, limit: 10 });
        assert!(ok.check().is_ok());

        let bad = Instruction {
            op: OpCode::Connector,
            arg: Argument::Dedup,
        };
        assert!(matches!(bad.check(), Err(RingwireError::TypeMismatch(_))));
    }

    #[test]
    fn test_display() {
        let top = Instruction::from_argument(Argument::Top {
            limit: 5,
            fields: vec![
                SortField::new("a", Direction::Ascending),
                SortField::new("b", Direction::Descending),
            ],
        });
        assert_eq!(top.to_string(), "top 5 order by a, b desc");
        assert_eq!(Instruction::from_argument(Argument::Merge).to_string(), "merge");
    }
}
