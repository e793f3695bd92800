// In: src/ring/mod.rs

// ====================================================================================
// ARCHITECTURAL OVERVIEW: The Ring Family
// ====================================================================================
//
// A ring is the per-group partial state of one aggregate function over one input
// type. Every ring follows the same lifecycle:
//
//   1. [Created empty]        -> `Ring::new(func, typ)`, nothing allocated
//   2. [Grown to N groups]    -> `grow` / `grows`, slots start at the identity
//   3. [Folded and merged]    -> `fill`, `batch_fill`, `bulk_fill`, `add`, `batch_add`
//   4. [Finalised once]       -> `eval(zs)` detaches the value buffer into a Vector
//
// The variant set is closed: `Ring` is an enum over the concrete accumulators and
// every operation is a match over it. Operations that pair two rings (`add`,
// `batch_add`) require both sides to be the same variant.
//
// ====================================================================================

pub mod approx;
pub mod count;
pub mod fold;
pub mod moments;
pub mod numeric;
pub mod sketch;
pub mod state;
pub mod string;


use std::fmt;
use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::arena::{Arena, ArenaVec, Growth};
use crate::config::RingwireConfig;
use crate::error::RingwireError;
use crate::protocol::ring::RingPayload;
use crate::protocol::wire::{WireReader, WireWriter};
use crate::types::{Date, Datetime, Type, TypeKind};
use crate::vector::Vector;

pub use approx::ApproxCdRing;
pub use count::CountRing;
pub use fold::{BitAnd, BitOr, BitXor, Fold, Max, Min, SumFloat, SumInt, SumUInt};
pub use moments::{AvgRing, VarianceRing};
pub use numeric::NumericRing;
pub use sketch::HllSketch;
pub use state::Accumulator;
pub use string::StrRing;

use state::single_growth;

//==================================================================================
// 1. Aggregate functions
//==================================================================================

/// The aggregate function a ring computes. The discriminant is its wire tag.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AggFunc {
    Min = 1,
    Max = 2,
    Sum = 3,
    Avg = 4,
    Count = 5,
    StarCount = 6,
    Variance = 7,
    BitAnd = 8,
    BitOr = 9,
    BitXor = 10,
    ApproxCountDistinct = 11,
}

impl AggFunc {
    pub const ALL: [AggFunc; 11] = [
        AggFunc::Min,
        AggFunc::Max,
        AggFunc::Sum,
        AggFunc::Avg,
        AggFunc::Count,
        AggFunc::StarCount,
        AggFunc::Variance,
        AggFunc::BitAnd,
        AggFunc::BitOr,
        AggFunc::BitXor,
        AggFunc::ApproxCountDistinct,
    ];

    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Result<Self, RingwireError> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.tag() == tag)
            .ok_or(RingwireError::UnknownTag {
                what: "aggregate function",
                tag: tag as u16,
            })
    }

    pub fn name(self) -> &'static str {
        match self {
            AggFunc::Min => "min",
            AggFunc::Max => "max",
            AggFunc::Sum => "sum",
            AggFunc::Avg => "avg",
            AggFunc::Count => "count",
            AggFunc::StarCount => "starcount",
            AggFunc::Variance => "variance",
            AggFunc::BitAnd => "bit_and",
            AggFunc::BitOr => "bit_or",
            AggFunc::BitXor => "bit_xor",
            AggFunc::ApproxCountDistinct => "approx_count_distinct",
        }
    }
}

impl fmt::Display for AggFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

//==================================================================================
// 2. The closed variant set
//==================================================================================

macro_rules! rings {
    ($($variant:ident($ring:ty) => $func:ident),+ $(,)?) => {
        /// One accumulator for a (function, type) pair. See the module overview.
        #[derive(Debug)]
        pub enum Ring {
            $($variant($ring),)+
        }

        impl Ring {
            pub fn func(&self) -> AggFunc {
                match self {
                    $(Ring::$variant(_) => AggFunc::$func,)+
                }
            }

            /// Input type the ring was created for.
            pub fn typ(&self) -> &Type {
                match self {
                    $(Ring::$variant(r) => r.typ(),)+
                }
            }

            /// Type of the vector `eval` produces.
            pub fn output_type(&self) -> Type {
                match self {
                    $(Ring::$variant(r) => r.output_type(),)+
                }
            }

            /// Number of groups.
            pub fn count(&self) -> usize {
                match self {
                    $(Ring::$variant(r) => r.count(),)+
                }
            }

            /// Arena bytes held.
            pub fn size(&self) -> usize {
                match self {
                    $(Ring::$variant(r) => r.size(),)+
                }
            }

            pub fn null_counts(&self) -> &[i64] {
                match self {
                    $(Ring::$variant(r) => r.null_counts(),)+
                }
            }

            /// An empty ring of the same variant.
            pub fn dup(&self) -> Ring {
                match self {
                    $(Ring::$variant(r) => Ring::$variant(r.dup()),)+
                }
            }

            /// Appends one group.
            pub fn grow(&mut self, arena: &Arena) -> Result<(), RingwireError> {
                match self {
                    $(Ring::$variant(r) => {
                        let growth = single_growth(r.initial_capacity());
                        r.grow_by(arena, 1, growth)
                    })+
                }
            }

            /// Appends `n` groups with a single exact reallocation.
            pub fn grows(&mut self, arena: &Arena, n: usize) -> Result<(), RingwireError> {
                match self {
                    $(Ring::$variant(r) => r.grow_by(arena, n, Growth::Exact),)+
                }
            }

            pub fn fill(&mut self, group: usize, row: usize, weight: i64, vec: &Vector) -> Result<(), RingwireError> {
                match self {
                    $(Ring::$variant(r) => r.fill(group, row, weight, vec),)+
                }
            }

            pub fn batch_fill(
                &mut self,
                start: usize,
                mask: &[u8],
                groups: &[u64],
                zs: &[i64],
                vec: &Vector,
            ) -> Result<(), RingwireError> {
                match self {
                    $(Ring::$variant(r) => r.batch_fill(start, mask, groups, zs, vec),)+
                }
            }

            pub fn bulk_fill(&mut self, group: usize, zs: &[i64], vec: &Vector) -> Result<(), RingwireError> {
                match self {
                    $(Ring::$variant(r) => r.bulk_fill(group, zs, vec),)+
                }
            }

            /// Merges group `src` of `other` into group `dst`.
            pub fn add(&mut self, other: &Ring, src: usize, dst: usize) -> Result<(), RingwireError> {
                match (self, other) {
                    $((Ring::$variant(a), Ring::$variant(b)) => a.add(b, src, dst),)+
                    (a, b) => Err(variant_mismatch(a, b)),
                }
            }

            pub fn batch_add(
                &mut self,
                other: &Ring,
                start: usize,
                mask: &[u8],
                groups: &[u64],
            ) -> Result<(), RingwireError> {
                match (self, other) {
                    $((Ring::$variant(a), Ring::$variant(b)) => a.batch_add(b, start, mask, groups),)+
                    (a, b) => Err(variant_mismatch(a, b)),
                }
            }

            pub fn mul(&mut self, group: usize, factor: i64) -> Result<(), RingwireError> {
                match self {
                    $(Ring::$variant(r) => r.mul(group, factor),)+
                }
            }

            fn eval_inner(&mut self, zs: &[i64]) -> Result<Vector, RingwireError> {
                match self {
                    $(Ring::$variant(r) => r.eval(zs),)+
                }
            }

            pub fn shrink(&mut self, sels: &[i64]) -> Result<(), RingwireError> {
                match self {
                    $(Ring::$variant(r) => r.shrink(sels),)+
                }
            }

            pub fn set_length(&mut self, n: usize) -> Result<(), RingwireError> {
                match self {
                    $(Ring::$variant(r) => r.set_length(n),)+
                }
            }

            /// Releases every arena buffer the ring holds.
            pub fn free(&mut self) {
                match self {
                    $(Ring::$variant(r) => r.free(),)+
                }
            }

            pub(crate) fn encode_payload<W: Write>(&self, w: &mut WireWriter<W>) -> Result<(), RingwireError> {
                match self {
                    $(Ring::$variant(r) => r.encode_payload(w),)+
                }
            }

            pub(crate) fn decode_payload(
                &mut self,
                nulls: ArenaVec<i64>,
                r: &mut WireReader<'_>,
            ) -> Result<(), RingwireError> {
                match self {
                    $(Ring::$variant(ring) => ring.decode_payload(nulls, r),)+
                }
            }
        }
    };
}

rings! {
    MinInt8(NumericRing<Min<i8>>) => Min,
    MinInt16(NumericRing<Min<i16>>) => Min,
    MinInt32(NumericRing<Min<i32>>) => Min,
    MinInt64(NumericRing<Min<i64>>) => Min,
    MinUInt8(NumericRing<Min<u8>>) => Min,
    MinUInt16(NumericRing<Min<u16>>) => Min,
    MinUInt32(NumericRing<Min<u32>>) => Min,
    MinUInt64(NumericRing<Min<u64>>) => Min,
    MinFloat32(NumericRing<Min<f32>>) => Min,
    MinFloat64(NumericRing<Min<f64>>) => Min,
    MinDate(NumericRing<Min<Date>>) => Min,
    MinDatetime(NumericRing<Min<Datetime>>) => Min,
    MinStr(StrRing<Min<[u8]>>) => Min,
    MaxInt8(NumericRing<Max<i8>>) => Max,
    MaxInt16(NumericRing<Max<i16>>) => Max,
    MaxInt32(NumericRing<Max<i32>>) => Max,
    MaxInt64(NumericRing<Max<i64>>) => Max,
    MaxUInt8(NumericRing<Max<u8>>) => Max,
    MaxUInt16(NumericRing<Max<u16>>) => Max,
    MaxUInt32(NumericRing<Max<u32>>) => Max,
    MaxUInt64(NumericRing<Max<u64>>) => Max,
    MaxFloat32(NumericRing<Max<f32>>) => Max,
    MaxFloat64(NumericRing<Max<f64>>) => Max,
    MaxDate(NumericRing<Max<Date>>) => Max,
    MaxDatetime(NumericRing<Max<Datetime>>) => Max,
    MaxStr(StrRing<Max<[u8]>>) => Max,
    SumInt(NumericRing<SumInt>) => Sum,
    SumUInt(NumericRing<SumUInt>) => Sum,
    SumFloat(NumericRing<SumFloat>) => Sum,
    BitAnd(NumericRing<BitAnd>) => BitAnd,
    BitOr(NumericRing<BitOr>) => BitOr,
    BitXor(NumericRing<BitXor>) => BitXor,
    Avg(AvgRing) => Avg,
    Variance(VarianceRing) => Variance,
    Count(CountRing) => Count,
    StarCount(CountRing) => StarCount,
    ApproxCd(ApproxCdRing) => ApproxCountDistinct,
}

fn variant_mismatch(a: &Ring, b: &Ring) -> RingwireError {
    RingwireError::TypeMismatch(format!(
        "cannot merge a {}({}) ring into a {}({}) ring",
        b.func(),
        b.typ().kind,
        a.func(),
        a.typ().kind
    ))
}

//==================================================================================
// 3. Factory and finalisation
//==================================================================================

// MIN and MAX have one variant per fixed-width kind.
macro_rules! extremes {
    ($func:expr, $typ:expr, $config:expr; $($kind:ident => $min:ident / $max:ident),+ $(,)?) => {
        match ($func, $typ.kind) {
            $(
                (AggFunc::Min, TypeKind::$kind) => Some(Ring::$min(NumericRing::new($typ, $config))),
                (AggFunc::Max, TypeKind::$kind) => Some(Ring::$max(NumericRing::new($typ, $config))),
            )+
            _ => None,
        }
    };
}

impl Ring {
    /// Creates an empty ring with the default configuration.
    pub fn new(func: AggFunc, typ: Type) -> Result<Ring, RingwireError> {
        Self::with_config(func, typ, &RingwireConfig::default())
    }

    /// Creates an empty ring for `func` over input `typ`.
    ///
    /// # Errors
    /// `TypeMismatch` if the function is not defined over the type.
    pub fn with_config(func: AggFunc, typ: Type, config: &RingwireConfig) -> Result<Ring, RingwireError> {
        if let Some(ring) = extremes!(func, typ, config;
            Int8 => MinInt8 / MaxInt8,
            Int16 => MinInt16 / MaxInt16,
            Int32 => MinInt32 / MaxInt32,
            Int64 => MinInt64 / MaxInt64,
            UInt8 => MinUInt8 / MaxUInt8,
            UInt16 => MinUInt16 / MaxUInt16,
            UInt32 => MinUInt32 / MaxUInt32,
            UInt64 => MinUInt64 / MaxUInt64,
            Float32 => MinFloat32 / MaxFloat32,
            Float64 => MinFloat64 / MaxFloat64,
            Date => MinDate / MaxDate,
            Datetime => MinDatetime / MaxDatetime,
        ) {
            return Ok(ring);
        }

        let kind = typ.kind;
        let ring = match func {
            AggFunc::Min if matches!(kind, TypeKind::Char | TypeKind::Varchar) => {
                Ring::MinStr(StrRing::new(typ, config))
            }
            AggFunc::Max if matches!(kind, TypeKind::Char | TypeKind::Varchar) => {
                Ring::MaxStr(StrRing::new(typ, config))
            }
            AggFunc::Sum if SumInt::accepts(kind) => Ring::SumInt(NumericRing::new(typ, config)),
            AggFunc::Sum if SumUInt::accepts(kind) => Ring::SumUInt(NumericRing::new(typ, config)),
            AggFunc::Sum if SumFloat::accepts(kind) => Ring::SumFloat(NumericRing::new(typ, config)),
            AggFunc::BitAnd if BitAnd::accepts(kind) => Ring::BitAnd(NumericRing::new(typ, config)),
            AggFunc::BitOr if BitOr::accepts(kind) => Ring::BitOr(NumericRing::new(typ, config)),
            AggFunc::BitXor if BitXor::accepts(kind) => Ring::BitXor(NumericRing::new(typ, config)),
            AggFunc::Avg if kind.is_numeric() => Ring::Avg(AvgRing::new(typ, config)),
            AggFunc::Variance if kind.is_numeric() => Ring::Variance(VarianceRing::new(typ, config)),
            AggFunc::Count => Ring::Count(CountRing::new(typ, false, config)),
            AggFunc::StarCount => Ring::StarCount(CountRing::new(typ, true, config)),
            AggFunc::ApproxCountDistinct => Ring::ApproxCd(ApproxCdRing::new(typ, config)),
            _ => {
                return Err(RingwireError::TypeMismatch(format!(
                    "{} is not defined over {}",
                    func, kind
                )))
            }
        };
        Ok(ring)
    }

    /// Finalises the ring: group `i` of the result is null iff
    /// `zs[i] - null_counts[i] == 0` (COUNT, STARCOUNT and
    /// APPROX_COUNT_DISTINCT are never null). The value buffer moves into the
    /// returned vector and every later call fails with `RingFinalized`.
    pub fn eval(&mut self, zs: &[i64]) -> Result<Vector, RingwireError> {
        let groups = self.count();
        let out = self.eval_inner(zs)?;
        crate::log_metric!(
            "event" = "ring_eval",
            "func" = self.func(),
            "groups" = groups,
            "nulls" = out.nulls().count()
        );
        Ok(out)
    }
}

impl fmt::Display for Ring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})[{} groups]", self.func(), self.typ(), self.count())
    }
}
