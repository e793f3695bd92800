// In: src/ring/fold.rs

//! Fold operators for the scalar ring family.
//!
//! A `Fold` names the state type, its identity, how one weighted input value is
//! combined into an accumulator, and how two accumulators merge. `NumericRing`
//! is generic over it, so MIN/MAX for every fixed-width kind, the three SUM
//! widths and the bit operators all share a single implementation.

use std::borrow::Cow;
use std::marker::PhantomData;
use std::ops::Range;

use num_traits::{AsPrimitive, Bounded};

use crate::error::RingwireError;
use crate::traits::Scalar;
use crate::types::{Type, TypeKind};
use crate::vector::Vector;

pub trait Fold: 'static {
    type State: Scalar;

    fn identity() -> Self::State;

    /// Combines input `v`, observed `weight` times, into `acc`.
    fn fold(acc: Self::State, v: Self::State, weight: i64) -> Self::State;

    fn merge(acc: Self::State, other: Self::State) -> Self::State;

    /// The accumulator after every folded row is repeated `factor` times.
    /// Idempotent folds keep `acc`.
    fn scale(acc: Self::State, _factor: i64) -> Self::State {
        acc
    }

    /// Reads `rows` of `vec` as state values. Borrowed when no conversion is needed.
    fn input<'a>(vec: &'a Vector, rows: Range<usize>) -> Result<Cow<'a, [Self::State]>, RingwireError>;

    /// Whether a ring of this fold accepts input of `kind`.
    fn accepts(kind: TypeKind) -> bool;

    fn output_type(_input: &Type) -> Type {
        Type::new(<Self::State as Scalar>::KIND)
    }
}

fn row_range<T>(values: &[T], rows: Range<usize>) -> Result<&[T], RingwireError> {
    let len = values.len();
    values.get(rows.clone()).ok_or_else(|| {
        RingwireError::ContractViolation(format!(
            "rows {}..{} out of range for a vector of {} rows",
            rows.start, rows.end, len
        ))
    })
}

/// Reads `rows` of any numeric vector, converting each value with `as`.
pub(crate) fn numeric_as<To>(vec: &Vector, rows: Range<usize>) -> Result<Vec<To>, RingwireError>
where
    To: Copy + 'static,
    i8: AsPrimitive<To>,
    i16: AsPrimitive<To>,
    i32: AsPrimitive<To>,
    i64: AsPrimitive<To>,
    u8: AsPrimitive<To>,
    u16: AsPrimitive<To>,
    u32: AsPrimitive<To>,
    u64: AsPrimitive<To>,
    f32: AsPrimitive<To>,
    f64: AsPrimitive<To>,
{
    fn cast<S, To>(vec: &Vector, rows: Range<usize>) -> Result<Vec<To>, RingwireError>
    where
        S: Scalar + AsPrimitive<To>,
        To: Copy + 'static,
    {
        Ok(row_range(vec.col::<S>()?, rows)?.iter().map(|v| v.as_()).collect())
    }

    match vec.typ().kind {
        TypeKind::Int8 => cast::<i8, To>(vec, rows),
        TypeKind::Int16 => cast::<i16, To>(vec, rows),
        TypeKind::Int32 => cast::<i32, To>(vec, rows),
        TypeKind::Int64 => cast::<i64, To>(vec, rows),
        TypeKind::UInt8 => cast::<u8, To>(vec, rows),
        TypeKind::UInt16 => cast::<u16, To>(vec, rows),
        TypeKind::UInt32 => cast::<u32, To>(vec, rows),
        TypeKind::UInt64 => cast::<u64, To>(vec, rows),
        TypeKind::Float32 => cast::<f32, To>(vec, rows),
        TypeKind::Float64 => cast::<f64, To>(vec, rows),
        kind => Err(RingwireError::TypeMismatch(format!(
            "{} is not a numeric kind",
            kind
        ))),
    }
}

/// Reads `rows` of any integer vector reinterpreted as u64 (sign-extended).
fn integer_bits(vec: &Vector, rows: Range<usize>) -> Result<Vec<u64>, RingwireError> {
    if !vec.typ().kind.is_integer() {
        return Err(RingwireError::TypeMismatch(format!(
            "bit operators need an integer column, got {}",
            vec.typ().kind
        )));
    }
    numeric_as::<u64>(vec, rows)
}

//==================================================================================
// MIN / MAX
//==================================================================================

/// Picks between two ordered values.
pub trait Extreme: 'static {
    /// `true` when `candidate` should replace `current`.
    fn wins<V: PartialOrd + ?Sized>(candidate: &V, current: &V) -> bool;
}

pub struct Min<T: ?Sized>(PhantomData<T>);
pub struct Max<T: ?Sized>(PhantomData<T>);

impl<T: ?Sized + 'static> Extreme for Min<T> {
    fn wins<V: PartialOrd + ?Sized>(candidate: &V, current: &V) -> bool {
        candidate < current
    }
}

impl<T: ?Sized + 'static> Extreme for Max<T> {
    fn wins<V: PartialOrd + ?Sized>(candidate: &V, current: &V) -> bool {
        candidate > current
    }
}

// MIN starts at the largest representable value, MAX at the smallest.
macro_rules! impl_extreme_fold {
    ($name:ident, $identity:ident) => {
        impl<T: Scalar> Fold for $name<T> {
            type State = T;

            fn identity() -> T {
                <T as Bounded>::$identity()
            }

            fn fold(acc: T, v: T, _weight: i64) -> T {
                if Self::wins(&v, &acc) {
                    v
                } else {
                    acc
                }
            }

            fn merge(acc: T, other: T) -> T {
                Self::fold(acc, other, 1)
            }

            fn input<'a>(vec: &'a Vector, rows: Range<usize>) -> Result<Cow<'a, [T]>, RingwireError> {
                Ok(Cow::Borrowed(row_range(vec.col::<T>()?, rows)?))
            }

            fn accepts(kind: TypeKind) -> bool {
                kind == T::KIND
            }

            fn output_type(input: &Type) -> Type {
                *input
            }
        }
    };
}

impl_extreme_fold!(Min, max_value);
impl_extreme_fold!(Max, min_value);

//==================================================================================
// SUM
//==================================================================================

/// SUM over signed integers into an i64 (wrapping on overflow).
pub struct SumInt;
/// SUM over unsigned integers into a u64 (wrapping on overflow).
pub struct SumUInt;
/// SUM over floats into an f64.
pub struct SumFloat;

impl Fold for SumInt {
    type State = i64;

    fn identity() -> i64 {
        0
    }

    fn fold(acc: i64, v: i64, weight: i64) -> i64 {
        acc.wrapping_add(v.wrapping_mul(weight))
    }

    fn merge(acc: i64, other: i64) -> i64 {
        acc.wrapping_add(other)
    }

    fn scale(acc: i64, factor: i64) -> i64 {
        acc.wrapping_mul(factor)
    }

    fn input<'a>(vec: &'a Vector, rows: Range<usize>) -> Result<Cow<'a, [i64]>, RingwireError> {
        if vec.typ().kind == TypeKind::Int64 {
            return Ok(Cow::Borrowed(row_range(vec.col::<i64>()?, rows)?));
        }
        numeric_as(vec, rows).map(Cow::Owned)
    }

    fn accepts(kind: TypeKind) -> bool {
        kind.is_signed_int()
    }
}

impl Fold for SumUInt {
    type State = u64;

    fn identity() -> u64 {
        0
    }

    fn fold(acc: u64, v: u64, weight: i64) -> u64 {
        acc.wrapping_add(v.wrapping_mul(weight as u64))
    }

    fn merge(acc: u64, other: u64) -> u64 {
        acc.wrapping_add(other)
    }

    fn scale(acc: u64, factor: i64) -> u64 {
        acc.wrapping_mul(factor as u64)
    }

    fn input<'a>(vec: &'a Vector, rows: Range<usize>) -> Result<Cow<'a, [u64]>, RingwireError> {
        if vec.typ().kind == TypeKind::UInt64 {
            return Ok(Cow::Borrowed(row_range(vec.col::<u64>()?, rows)?));
        }
        numeric_as(vec, rows).map(Cow::Owned)
    }

    fn accepts(kind: TypeKind) -> bool {
        kind.is_unsigned_int()
    }
}

impl Fold for SumFloat {
    type State = f64;

    fn identity() -> f64 {
        0.0
    }

    fn fold(acc: f64, v: f64, weight: i64) -> f64 {
        acc + v * weight as f64
    }

    fn merge(acc: f64, other: f64) -> f64 {
        acc + other
    }

    fn scale(acc: f64, factor: i64) -> f64 {
        acc * factor as f64
    }

    fn input<'a>(vec: &'a Vector, rows: Range<usize>) -> Result<Cow<'a, [f64]>, RingwireError> {
        if vec.typ().kind == TypeKind::Float64 {
            return Ok(Cow::Borrowed(row_range(vec.col::<f64>()?, rows)?));
        }
        numeric_as(vec, rows).map(Cow::Owned)
    }

    fn accepts(kind: TypeKind) -> bool {
        kind.is_float()
    }
}

//==================================================================================
// BIT_AND / BIT_OR / BIT_XOR
//==================================================================================

pub struct BitAnd;
pub struct BitOr;
pub struct BitXor;

macro_rules! impl_bit_fold {
    (
        $name:ident,
        $identity:expr,
        |$acc:ident, $v:ident, $w:ident| $fold:expr,
        $merge:tt,
        |$sacc:ident, $k:ident| $scale:expr
    ) => {
        impl Fold for $name {
            type State = u64;

            fn identity() -> u64 {
                $identity
            }

            fn fold($acc: u64, $v: u64, $w: i64) -> u64 {
                $fold
            }

            fn merge(acc: u64, other: u64) -> u64 {
                acc $merge other
            }

            fn scale($sacc: u64, $k: i64) -> u64 {
                $scale
            }

            fn input<'a>(vec: &'a Vector, rows: Range<usize>) -> Result<Cow<'a, [u64]>, RingwireError> {
                integer_bits(vec, rows).map(Cow::Owned)
            }

            fn accepts(kind: TypeKind) -> bool {
                kind.is_integer()
            }
        }
    };
}

// AND and OR are idempotent, so the weight does not matter. XOR cancels on
// every even repetition.
impl_bit_fold!(BitAnd, u64::MAX, |acc, v, _w| acc & v, &, |acc, _k| acc);
impl_bit_fold!(BitOr, 0, |acc, v, _w| acc | v, |, |acc, _k| acc);
impl_bit_fold!(
    BitXor,
    0,
    |acc, v, w| if w % 2 != 0 { acc ^ v } else { acc },
    ^,
    |acc, k| if k % 2 != 0 { acc } else { 0 }
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identities_are_neutral() {
        assert_eq!(<Min<f32>>::fold(Min::<f32>::identity(), 5.0, 1), 5.0);
        assert_eq!(<Max<i8>>::fold(Max::<i8>::identity(), -128, 1), -128);
        assert_eq!(BitAnd::fold(BitAnd::identity(), 0b1010, 1), 0b1010);
        assert_eq!(BitOr::fold(BitOr::identity(), 0b1010, 1), 0b1010);
        assert_eq!(SumInt::fold(SumInt::identity(), -4, 3), -12);
    }

    #[test]
    fn test_xor_weight_parity() {
        assert_eq!(BitXor::fold(0b1100, 0b0101, 1), 0b1001);
        assert_eq!(BitXor::fold(0b1100, 0b0101, 2), 0b1100);
        assert_eq!(BitXor::fold(0b1100, 0b0101, 3), 0b1001);
    }

    #[test]
    fn test_scale_repeats_every_row() {
        assert_eq!(SumInt::scale(-6, 3), -18);
        assert_eq!(SumUInt::scale(7, 2), 14);
        assert_eq!(SumFloat::scale(6.0, 3), 18.0);
        assert_eq!(BitXor::scale(0b1001, 3), 0b1001);
        assert_eq!(BitXor::scale(0b1001, 2), 0);
        assert_eq!(BitAnd::scale(0b1001, 2), 0b1001);
        assert_eq!(BitOr::scale(0b1001, 4), 0b1001);
        assert_eq!(<Min<i32>>::scale(-5, 7), -5);
        assert_eq!(<Max<f64>>::scale(2.5, 0), 2.5);
    }

    #[test]
    fn test_numeric_widening() {
        let v = Vector::from_slice(&[-1i16, 2, 300]);
        assert_eq!(numeric_as::<i64>(&v, 0..3).unwrap(), vec![-1, 2, 300]);
        assert_eq!(numeric_as::<f64>(&v, 1..2).unwrap(), vec![2.0]);
        assert!(numeric_as::<i64>(&v, 2..4).is_err());
        assert_eq!(
            SumInt::input(&v, 0..2).unwrap().into_owned(),
            vec![-1i64, 2]
        );
        assert!(BitOr::input(&Vector::from_slice(&[1.0f32]), 0..1).is_err());
    }

    #[test]
    fn test_acceptance() {
        assert!(Min::<i32>::accepts(TypeKind::Int32));
        assert!(!Min::<i32>::accepts(TypeKind::Int64));
        assert!(SumUInt::accepts(TypeKind::UInt8));
        assert!(!SumUInt::accepts(TypeKind::Int8));
        assert!(BitXor::accepts(TypeKind::Int8));
        assert!(!BitXor::accepts(TypeKind::Float64));
    }
}
