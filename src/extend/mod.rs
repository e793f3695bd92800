// In: src/extend/mod.rs

//! `Extend`: the scalar expression trees attached to pipeline instructions.
//!
//! Trees are built once by the planner and never mutated; children are owned
//! (boxed) so a tree has exactly one owner and no cycles. Operator codes are
//! opaque integers owned by the planner; the codec carries them verbatim and
//! `Display` renders the ones it knows.

use std::fmt;

use crate::types::Type;
use crate::vector::Vector;

/// Well-known operator codes.
pub mod op {
    pub const OR: i32 = 0;
    pub const AND: i32 = 1;
    pub const PLUS: i32 = 2;
    pub const MINUS: i32 = 3;
    pub const MULT: i32 = 4;
    pub const DIV: i32 = 5;
    pub const MOD: i32 = 6;
    pub const EQ: i32 = 7;
    pub const LT: i32 = 8;
    pub const LE: i32 = 9;
    pub const GT: i32 = 10;
    pub const GE: i32 = 11;
    pub const NE: i32 = 12;
    pub const NOT: i32 = 13;
    pub const UNARY_MINUS: i32 = 14;

    pub fn symbol(code: i32) -> Option<&'static str> {
        Some(match code {
            OR => "or",
            AND => "and",
            PLUS => "+",
            MINUS | UNARY_MINUS => "-",
            MULT => "*",
            DIV => "/",
            MOD => "%",
            EQ => "=",
            LT => "<",
            LE => "<=",
            GT => ">",
            GE => ">=",
            NE => "<>",
            NOT => "not",
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Extend {
    Unary { op: i32, expr: Box<Extend> },
    Binary { op: i32, left: Box<Extend>, right: Box<Extend> },
    Multi { op: i32, args: Vec<Extend> },
    Paren { expr: Box<Extend> },
    Func { name: String, args: Vec<Extend> },
    Star,
    /// A literal column, usually of length 1.
    Value { vector: Vector },
    Attribute { name: String, typ: Type },
}

impl Extend {
    pub fn unary(op: i32, expr: Extend) -> Self {
        Extend::Unary { op, expr: Box::new(expr) }
    }

    pub fn binary(op: i32, left: Extend, right: Extend) -> Self {
        Extend::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn paren(expr: Extend) -> Self {
        Extend::Paren { expr: Box::new(expr) }
    }

    pub fn attribute(name: impl Into<String>, typ: Type) -> Self {
        Extend::Attribute {
            name: name.into(),
            typ,
        }
    }

    /// Names of the attributes the expression reads, first occurrence first.
    pub fn attributes(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_attributes(&mut out);
        out
    }

    fn collect_attributes(&self, out: &mut Vec<String>) {
        match self {
            Extend::Unary { expr, .. } | Extend::Paren { expr } => expr.collect_attributes(out),
            Extend::Binary { left, right, .. } => {
                left.collect_attributes(out);
                right.collect_attributes(out);
            }
            Extend::Multi { args, .. } | Extend::Func { args, .. } => {
                for arg in args {
                    arg.collect_attributes(out);
                }
            }
            Extend::Attribute { name, .. } => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            Extend::Star | Extend::Value { .. } => {}
        }
    }

    /// The wire tag of this node variant.
    pub fn tag(&self) -> u8 {
        match self {
            Extend::Unary { .. } => 0,
            Extend::Binary { .. } => 1,
            Extend::Multi { .. } => 2,
            Extend::Paren { .. } => 3,
            Extend::Func { .. } => 4,
            Extend::Star => 5,
            Extend::Value { .. } => 6,
            Extend::Attribute { .. } => 7,
        }
    }
}

struct OpName(i32);

impl fmt::Display for OpName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match op::symbol(self.0) {
            Some(s) => f.write_str(s),
            None => write!(f, "op{}", self.0),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, args: &[Extend], sep: &str) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", arg)?;
    }
    Ok(())
}

impl fmt::Display for Extend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Extend::Unary { op, expr } if *op == op::NOT => write!(f, "not {}", expr),
            Extend::Unary { op, expr } => write!(f, "{}{}", OpName(*op), expr),
            Extend::Binary { op, left, right } => write!(f, "{} {} {}", left, OpName(*op), right),
            Extend::Multi { op, args } => {
                let sep = format!(" {} ", OpName(*op));
                write_list(f, args, &sep)
            }
            Extend::Paren { expr } => write!(f, "({})", expr),
            Extend::Func { name, args } => {
                write!(f, "{}(", name)?;
                write_list(f, args, ", ")?;
                f.write_str(")")
            }
            Extend::Star => f.write_str("*"),
            Extend::Value { vector } => {
                if vector.len() == 1 && vector.is_null(0) {
                    return f.write_str("null");
                }
                write!(f, "{}", vector)
            }
            Extend::Attribute { name, .. } => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeKind;

    fn attr(name: &str) -> Extend {
        Extend::attribute(name, Type::new(TypeKind::Int64))
    }

    #[test]
    fn test_attributes_in_tree_order() {
        let e = Extend::binary(
            op::AND,
            Extend::paren(Extend::binary(op::GT, attr("b"), attr("a"))),
            Extend::Func {
                name: "abs".into(),
                args: vec![attr("b"), attr("c")],
            },
        );
        assert_eq!(e.attributes(), vec!["b", "a", "c"]);
        assert!(Extend::Star.attributes().is_empty());
    }

    #[test]
    fn test_display_infix() {
        let e = Extend::binary(
            op::PLUS,
            attr("x"),
            Extend::paren(Extend::Multi {
                op: op::MULT,
                args: vec![attr("y"), attr("z"), Extend::Star],
            }),
        );
        assert_eq!(e.to_string(), "x + (y * z * *)");
        assert_eq!(Extend::unary(op::NOT, attr("flag")).to_string(), "not flag");
        assert_eq!(Extend::unary(99, attr("q")).to_string(), "op99q");
        let f = Extend::Func {
            name: "max".into(),
            args: vec![attr("a"), attr("b")],
        };
        assert_eq!(f.to_string(), "max(a, b)");
    }

    #[test]
    fn test_tags_are_distinct() {
        let nodes = [
            Extend::unary(op::NOT, Extend::Star),
            Extend::binary(op::EQ, Extend::Star, Extend::Star),
            Extend::Multi { op: op::OR, args: vec![] },
            Extend::paren(Extend::Star),
            Extend::Func { name: "f".into(), args: vec![] },
            Extend::Star,
            Extend::Value {
                vector: Vector::from_slice(&[1i64]),
            },
            attr("a"),
        ];
        let mut tags: Vec<u8> = nodes.iter().map(Extend::tag).collect();
        tags.dedup();
        assert_eq!(tags, (0..8).collect::<Vec<u8>>());
    }
}
