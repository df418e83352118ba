//! Element type tags and value conversion.
//!
//! Every element type usable with the iterator implements [`Element`], which
//! ties a Rust type to its [`DType`] tag and converts values through a
//! [`Scalar`] intermediate. Conversion is either checked (values that do not
//! fit fail) or lossy (`as` semantics), selected by the active casting rule.

use std::fmt;
use std::sync::Arc;

use num_complex::{Complex, Complex64};
use num_traits::{AsPrimitive, NumCast};

/// Element type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    ComplexF32,
    ComplexF64,
    /// Reference elements (`Arc<T>`).
    Object,
}

/// Kind of a [`DType`], ordered the way same-kind casting climbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DTypeKind {
    Bool,
    UnsignedInt,
    SignedInt,
    Float,
    Complex,
    Object,
}

impl DType {
    pub fn kind(self) -> DTypeKind {
        match self {
            DType::Bool => DTypeKind::Bool,
            DType::U8 | DType::U16 | DType::U32 | DType::U64 => DTypeKind::UnsignedInt,
            DType::I8 | DType::I16 | DType::I32 | DType::I64 => DTypeKind::SignedInt,
            DType::F32 | DType::F64 => DTypeKind::Float,
            DType::ComplexF32 | DType::ComplexF64 => DTypeKind::Complex,
            DType::Object => DTypeKind::Object,
        }
    }

    /// Item size in bytes.
    pub fn size(self) -> usize {
        match self {
            DType::Bool | DType::I8 | DType::U8 => 1,
            DType::I16 | DType::U16 => 2,
            DType::I32 | DType::U32 | DType::F32 => 4,
            DType::I64 | DType::U64 | DType::F64 | DType::ComplexF32 => 8,
            DType::ComplexF64 => 16,
            DType::Object => std::mem::size_of::<usize>(),
        }
    }

    /// Whether elements of this type hold references.
    #[inline]
    pub fn is_reference(self) -> bool {
        self == DType::Object
    }

    /// Conventional lowercase name (`"int64"`, `"complex128"`, ...).
    pub fn name(self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::I8 => "int8",
            DType::I16 => "int16",
            DType::I32 => "int32",
            DType::I64 => "int64",
            DType::U8 => "uint8",
            DType::U16 => "uint16",
            DType::U32 => "uint32",
            DType::U64 => "uint64",
            DType::F32 => "float32",
            DType::F64 => "float64",
            DType::ComplexF32 => "complex64",
            DType::ComplexF64 => "complex128",
            DType::Object => "object",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Widest representation of a numeric element, used as the conversion pivot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Complex(Complex64),
}

/// Rust types that can be iterated.
pub trait Element: Clone + 'static {
    const DTYPE: DType;

    /// Widen to the conversion pivot. `None` for reference elements.
    fn to_scalar(&self) -> Option<Scalar>;

    /// Narrow from the conversion pivot.
    ///
    /// With `lossy` the conversion always succeeds for numeric types
    /// (`as` semantics); otherwise values that do not fit return `None`.
    fn from_scalar(value: Scalar, lossy: bool) -> Option<Self>;
}

/// Convert one element to another element type.
#[inline]
pub(crate) fn convert<S: Element, T: Element>(value: &S, lossy: bool) -> Option<T> {
    T::from_scalar(value.to_scalar()?, lossy)
}

fn cast_real<T>(value: Scalar, lossy: bool) -> Option<T>
where
    T: NumCast + Copy + 'static,
    u8: AsPrimitive<T>,
    i64: AsPrimitive<T>,
    u64: AsPrimitive<T>,
    f64: AsPrimitive<T>,
{
    if lossy {
        return Some(match value {
            Scalar::Bool(b) => <u8 as From<bool>>::from(b).as_(),
            Scalar::Int(i) => i.as_(),
            Scalar::UInt(u) => u.as_(),
            Scalar::Float(x) => x.as_(),
            // The imaginary part is discarded
            Scalar::Complex(c) => c.re.as_(),
        });
    }
    match value {
        Scalar::Bool(b) => num_traits::cast(<u8 as From<bool>>::from(b)),
        Scalar::Int(i) => num_traits::cast(i),
        Scalar::UInt(u) => num_traits::cast(u),
        Scalar::Float(x) => cast_finite(x),
        Scalar::Complex(c) if c.im == 0.0 => cast_finite(c.re),
        Scalar::Complex(_) => None,
    }
}

/// Float narrowing saturates to infinity in `NumCast`; treat that as overflow.
fn cast_finite<T: NumCast>(x: f64) -> Option<T> {
    let out: T = num_traits::cast(x)?;
    if x.is_finite() && !out.to_f64()?.is_finite() {
        return None;
    }
    Some(out)
}

fn cast_complex<F>(value: Scalar, lossy: bool) -> Option<Complex<F>>
where
    F: NumCast + Copy + 'static,
    u8: AsPrimitive<F>,
    i64: AsPrimitive<F>,
    u64: AsPrimitive<F>,
    f64: AsPrimitive<F>,
{
    match value {
        Scalar::Complex(c) => Some(Complex::new(
            cast_real(Scalar::Float(c.re), lossy)?,
            cast_real(Scalar::Float(c.im), lossy)?,
        )),
        other => Some(Complex::new(
            cast_real(other, lossy)?,
            cast_real(Scalar::Float(0.0), lossy)?,
        )),
    }
}

macro_rules! impl_element_real {
    ($($t:ty => $dtype:ident, $variant:ident, $wide:ty);* $(;)?) => {
        $(
            impl Element for $t {
                const DTYPE: DType = DType::$dtype;

                #[inline]
                fn to_scalar(&self) -> Option<Scalar> {
                    Some(Scalar::$variant(*self as $wide))
                }

                #[inline]
                fn from_scalar(value: Scalar, lossy: bool) -> Option<Self> {
                    cast_real(value, lossy)
                }
            }
        )*
    };
}

impl_element_real! {
    i8 => I8, Int, i64;
    i16 => I16, Int, i64;
    i32 => I32, Int, i64;
    i64 => I64, Int, i64;
    u8 => U8, UInt, u64;
    u16 => U16, UInt, u64;
    u32 => U32, UInt, u64;
    u64 => U64, UInt, u64;
    f32 => F32, Float, f64;
    f64 => F64, Float, f64;
}

impl Element for bool {
    const DTYPE: DType = DType::Bool;

    #[inline]
    fn to_scalar(&self) -> Option<Scalar> {
        Some(Scalar::Bool(*self))
    }

    fn from_scalar(value: Scalar, lossy: bool) -> Option<Self> {
        let truthy = match value {
            Scalar::Bool(b) => return Some(b),
            Scalar::Int(i) => (i != 0, i == 0 || i == 1),
            Scalar::UInt(u) => (u != 0, u <= 1),
            Scalar::Float(x) => (x != 0.0, x == 0.0 || x == 1.0),
            Scalar::Complex(c) => (
                c.re != 0.0 || c.im != 0.0,
                c.im == 0.0 && (c.re == 0.0 || c.re == 1.0),
            ),
        };
        match truthy {
            (b, exact) if lossy || exact => Some(b),
            _ => None,
        }
    }
}

macro_rules! impl_element_complex {
    ($($f:ty => $dtype:ident);* $(;)?) => {
        $(
            impl Element for Complex<$f> {
                const DTYPE: DType = DType::$dtype;

                #[inline]
                fn to_scalar(&self) -> Option<Scalar> {
                    Some(Scalar::Complex(Complex64::new(self.re as f64, self.im as f64)))
                }

                #[inline]
                fn from_scalar(value: Scalar, lossy: bool) -> Option<Self> {
                    cast_complex(value, lossy)
                }
            }
        )*
    };
}

impl_element_complex! {
    f32 => ComplexF32;
    f64 => ComplexF64;
}

impl<T: ?Sized + Send + Sync + 'static> Element for Arc<T> {
    const DTYPE: DType = DType::Object;

    #[inline]
    fn to_scalar(&self) -> Option<Scalar> {
        None
    }

    #[inline]
    fn from_scalar(_value: Scalar, _lossy: bool) -> Option<Self> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex32;

    #[test]
    fn test_dtype_kind_order() {
        assert!(DType::Bool.kind() < DType::U8.kind());
        assert!(DType::U64.kind() < DType::I8.kind());
        assert!(DType::I64.kind() < DType::F32.kind());
        assert!(DType::F64.kind() < DType::ComplexF32.kind());
    }

    #[test]
    fn test_dtype_names() {
        assert_eq!(DType::ComplexF64.to_string(), "complex128");
        assert_eq!(DType::U16.to_string(), "uint16");
        assert_eq!(DType::ComplexF32.size(), 8);
    }

    #[test]
    fn test_checked_int_narrowing() {
        assert_eq!(convert::<i64, i8>(&100, false), Some(100i8));
        assert_eq!(convert::<i64, i8>(&300, false), None);
        assert_eq!(convert::<i64, u32>(&-1, false), None);
    }

    #[test]
    fn test_lossy_int_narrowing_wraps() {
        assert_eq!(convert::<i64, i8>(&300, true), Some(44i8));
        assert_eq!(convert::<i64, u32>(&-1, true), Some(u32::MAX));
    }

    #[test]
    fn test_float_conversions() {
        assert_eq!(convert::<f64, f32>(&1.5, false), Some(1.5f32));
        assert_eq!(convert::<f64, f32>(&1e300, false), None);
        assert_eq!(convert::<f64, i32>(&2.75, true), Some(2));
        assert_eq!(convert::<f64, u8>(&-1.0, false), None);
    }

    #[test]
    fn test_complex_conversions() {
        let c = Complex64::new(1.0, 2.0);
        assert_eq!(convert::<Complex64, f64>(&c, true), Some(1.0));
        assert_eq!(convert::<Complex64, f64>(&c, false), None);
        assert_eq!(
            convert::<f32, Complex64>(&3.0, false),
            Some(Complex64::new(3.0, 0.0))
        );
        assert_eq!(
            convert::<Complex64, Complex32>(&c, false),
            Some(Complex32::new(1.0, 2.0))
        );
    }

    #[test]
    fn test_bool_conversions() {
        assert_eq!(convert::<bool, f64>(&true, false), Some(1.0));
        assert_eq!(convert::<i32, bool>(&1, false), Some(true));
        assert_eq!(convert::<i32, bool>(&5, false), None);
        assert_eq!(convert::<i32, bool>(&5, true), Some(true));
        assert_eq!(convert::<bool, i8>(&true, false), Some(1i8));
        assert_eq!(convert::<bool, u64>(&false, true), Some(0u64));
        assert_eq!(convert::<bool, f32>(&true, true), Some(1.0f32));
    }

    #[test]
    fn test_object_never_converts() {
        let a: Arc<str> = Arc::from("x");
        assert_eq!(a.to_scalar(), None);
        assert!(<Arc<str> as Element>::from_scalar(Scalar::Int(1), true).is_none());
        assert_eq!(<Arc<str> as Element>::DTYPE, DType::Object);
    }
}
