//! Casting rules between element types.
//!
//! Rules are ordered from strictest to most permissive and follow numpy's
//! `can_cast` table:
//!
//! ```text
//!   No / Equivalent : identical types only
//!   Safe            : every value of the source is representable in the target
//!   SameKind        : Safe, or the kind does not decrease
//!                     (bool < uint < int < float < complex)
//!   Unsafe          : any numeric pair
//! ```
//!
//! Reference elements (`DType::Object`) only ever convert to themselves.

use std::fmt;
use std::str::FromStr;

use crate::dtype::{DType, DTypeKind};

/// Policy governing which element-type conversions the iterator performs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CastingRule {
    /// No conversion at all.
    No,
    /// Only representation-equivalent types. Byte order is not modelled, so
    /// this behaves like [`CastingRule::No`].
    Equivalent,
    /// Value-preserving conversions.
    #[default]
    Safe,
    /// Safe conversions plus downcasts within a kind.
    SameKind,
    /// Any numeric conversion; values may wrap or truncate.
    Unsafe,
}

impl CastingRule {
    /// Name used by the `FromStr` parser.
    pub fn as_str(self) -> &'static str {
        match self {
            CastingRule::No => "no",
            CastingRule::Equivalent => "equiv",
            CastingRule::Safe => "safe",
            CastingRule::SameKind => "same_kind",
            CastingRule::Unsafe => "unsafe",
        }
    }

    /// Whether `from -> to` is permitted under this rule.
    #[inline]
    pub fn permits(self, from: DType, to: DType) -> bool {
        can_cast(from, to, self)
    }

    /// Whether reads may wrap or truncate instead of failing.
    #[inline]
    pub(crate) fn is_lossy(self) -> bool {
        self == CastingRule::Unsafe
    }
}

impl fmt::Display for CastingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CastingRule {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "no" => Ok(CastingRule::No),
            "equiv" | "equivalent" => Ok(CastingRule::Equivalent),
            "safe" => Ok(CastingRule::Safe),
            "same_kind" | "samekind" => Ok(CastingRule::SameKind),
            "unsafe" => Ok(CastingRule::Unsafe),
            other => Err(format!("unrecognized casting rule '{other}'")),
        }
    }
}

/// Whether an element of type `from` may be read as `to` under `rule`.
pub fn can_cast(from: DType, to: DType, rule: CastingRule) -> bool {
    if from == to {
        return true;
    }
    if from.is_reference() || to.is_reference() {
        return false;
    }
    match rule {
        CastingRule::No | CastingRule::Equivalent => false,
        CastingRule::Safe => is_safe(from, to),
        CastingRule::SameKind => is_safe(from, to) || from.kind() <= to.kind(),
        CastingRule::Unsafe => true,
    }
}

fn is_safe(from: DType, to: DType) -> bool {
    use DTypeKind::*;

    let (fs, ts) = (from.size(), to.size());
    match (from.kind(), to.kind()) {
        (Bool, _) => true,
        (UnsignedInt, UnsignedInt)
        | (SignedInt, SignedInt)
        | (Float, Float)
        | (Complex, Complex) => ts >= fs,
        (UnsignedInt, SignedInt) => ts > fs,
        // 8- and 16-bit integers fit float32; anything wider needs float64
        (UnsignedInt | SignedInt, Float) => ts >= 2 * fs || to == DType::F64,
        (UnsignedInt | SignedInt, Complex) => ts / 2 >= 2 * fs || to == DType::ComplexF64,
        (Float, Complex) => ts / 2 >= fs,
        _ => false,
    }
}
