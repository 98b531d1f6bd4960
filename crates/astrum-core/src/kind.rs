//! Closed catalog of supported element kinds.
//!
//! Every array element is one of the kinds enumerated here; there is no
//! runtime extension point. Adding a kind is an explicit catalog change that
//! the compiler then forces through every `match` in the crate.
//!
//! The catalog owns three things:
//!
//! - the byte width of each kind (with an early portability guard on the
//!   host's `f32`/`f64` widths),
//! - the reserved "blank" bit pattern marking a missing datum, defined in
//!   one place only,
//! - the [`Element`] trait tying each Rust primitive to its kind, including
//!   the single shared NaN-aware blank test reused everywhere blank testing
//!   occurs (a blank NaN does not equal itself, so naive `==` is wrong for
//!   the floating kinds).

use core::fmt;
use core::mem;

use num_complex::{Complex32, Complex64};

use crate::error::{CoreError, Result};

// ---------------------------------------------------------------------------
// ElementKind — the closed enumeration
// ---------------------------------------------------------------------------

/// One member of the closed set of supported element kinds.
///
/// The declaration order is meaningful: kinds are ordered by how much they
/// can represent, and [`ElementKind::promoted`] picks the later of two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ElementKind {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
    /// Single-precision complex (pair of `f32`).
    C32,
    /// Double-precision complex (pair of `f64`).
    C64,
    /// String handles (one owned string per element).
    Str,
    /// Logical byte: zero is false, anything else is true.
    Logical,
}

/// Blank sentinel for the string kind.
pub const BLANK_STRING: &str = "Blank";

impl ElementKind {
    /// Every catalog member, in declaration order. Handy for exhaustive tests.
    pub const ALL: [ElementKind; 14] = [
        ElementKind::U8,
        ElementKind::I8,
        ElementKind::U16,
        ElementKind::I16,
        ElementKind::U32,
        ElementKind::I32,
        ElementKind::U64,
        ElementKind::I64,
        ElementKind::F32,
        ElementKind::F64,
        ElementKind::C32,
        ElementKind::C64,
        ElementKind::Str,
        ElementKind::Logical,
    ];

    /// Byte width of one element of this kind.
    ///
    /// The floating and complex arms additionally assert that the host's
    /// native `f32`/`f64` really are 4/8 bytes, failing with
    /// [`CoreError::PlatformAssumption`] otherwise. String elements are
    /// counted as one handle (pointer width).
    pub fn size_of(self) -> Result<usize> {
        match self {
            ElementKind::U8 | ElementKind::I8 | ElementKind::Logical => Ok(1),
            ElementKind::U16 | ElementKind::I16 => Ok(2),
            ElementKind::U32 | ElementKind::I32 => Ok(4),
            ElementKind::U64 | ElementKind::I64 => Ok(8),
            ElementKind::F32 => {
                ensure_f32_width()?;
                Ok(4)
            }
            ElementKind::F64 => {
                ensure_f64_width()?;
                Ok(8)
            }
            ElementKind::C32 => {
                ensure_f32_width()?;
                Ok(8)
            }
            ElementKind::C64 => {
                ensure_f64_width()?;
                Ok(16)
            }
            ElementKind::Str => Ok(mem::size_of::<*const u8>()),
        }
    }

    /// The element kind a binary operation between values of `self` and
    /// `other` should produce: whichever of the two comes later in catalog
    /// order, so neither operand is narrowed.
    pub fn promoted(self, other: ElementKind) -> ElementKind {
        self.max(other)
    }

    /// The blank sentinel of this kind as a type-erased [`Scalar`].
    ///
    /// Unsigned integers use their maximum, signed integers their minimum,
    /// floating kinds NaN (both parts for complex), strings the literal
    /// `"Blank"`. These bit patterns can occur in valid data only by caller
    /// misuse.
    pub fn blank_scalar(self) -> Scalar {
        match self {
            ElementKind::U8 => Scalar::U8(u8::blank()),
            ElementKind::I8 => Scalar::I8(i8::blank()),
            ElementKind::U16 => Scalar::U16(u16::blank()),
            ElementKind::I16 => Scalar::I16(i16::blank()),
            ElementKind::U32 => Scalar::U32(u32::blank()),
            ElementKind::I32 => Scalar::I32(i32::blank()),
            ElementKind::U64 => Scalar::U64(u64::blank()),
            ElementKind::I64 => Scalar::I64(i64::blank()),
            ElementKind::F32 => Scalar::F32(f32::blank()),
            ElementKind::F64 => Scalar::F64(f64::blank()),
            ElementKind::C32 => Scalar::C32(Complex32::blank()),
            ElementKind::C64 => Scalar::C64(Complex64::blank()),
            ElementKind::Str => Scalar::Str(BLANK_STRING.to_owned()),
            ElementKind::Logical => Scalar::Logical(i8::MIN),
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementKind::U8 => "u8",
            ElementKind::I8 => "i8",
            ElementKind::U16 => "u16",
            ElementKind::I16 => "i16",
            ElementKind::U32 => "u32",
            ElementKind::I32 => "i32",
            ElementKind::U64 => "u64",
            ElementKind::I64 => "i64",
            ElementKind::F32 => "f32",
            ElementKind::F64 => "f64",
            ElementKind::C32 => "c32",
            ElementKind::C64 => "c64",
            ElementKind::Str => "str",
            ElementKind::Logical => "logical",
        };
        f.write_str(name)
    }
}

fn ensure_f32_width() -> Result<()> {
    if mem::size_of::<f32>() != 4 {
        return Err(CoreError::PlatformAssumption(
            "`f32` is not 32 bits on this machine",
        ));
    }
    Ok(())
}

fn ensure_f64_width() -> Result<()> {
    if mem::size_of::<f64>() != 8 {
        return Err(CoreError::PlatformAssumption(
            "`f64` is not 64 bits on this machine",
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Scalar — one type-erased element value
// ---------------------------------------------------------------------------

/// A single element value crossing the type-erased boundary (blank
/// replacement values, sentinel queries).
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F32(f32),
    F64(f64),
    C32(Complex32),
    C64(Complex64),
    Str(String),
    Logical(i8),
}

impl Scalar {
    /// The element kind this value belongs to.
    pub fn kind(&self) -> ElementKind {
        match self {
            Scalar::U8(_) => ElementKind::U8,
            Scalar::I8(_) => ElementKind::I8,
            Scalar::U16(_) => ElementKind::U16,
            Scalar::I16(_) => ElementKind::I16,
            Scalar::U32(_) => ElementKind::U32,
            Scalar::I32(_) => ElementKind::I32,
            Scalar::U64(_) => ElementKind::U64,
            Scalar::I64(_) => ElementKind::I64,
            Scalar::F32(_) => ElementKind::F32,
            Scalar::F64(_) => ElementKind::F64,
            Scalar::C32(_) => ElementKind::C32,
            Scalar::C64(_) => ElementKind::C64,
            Scalar::Str(_) => ElementKind::Str,
            Scalar::Logical(_) => ElementKind::Logical,
        }
    }

    /// Whether this value is its kind's blank sentinel (NaN-aware).
    pub fn is_blank(&self) -> bool {
        match self {
            Scalar::U8(v) => v.is_blank(),
            Scalar::I8(v) | Scalar::Logical(v) => v.is_blank(),
            Scalar::U16(v) => v.is_blank(),
            Scalar::I16(v) => v.is_blank(),
            Scalar::U32(v) => v.is_blank(),
            Scalar::I32(v) => v.is_blank(),
            Scalar::U64(v) => v.is_blank(),
            Scalar::I64(v) => v.is_blank(),
            Scalar::F32(v) => v.is_blank(),
            Scalar::F64(v) => v.is_blank(),
            Scalar::C32(v) => v.is_blank(),
            Scalar::C64(v) => v.is_blank(),
            Scalar::Str(s) => s == BLANK_STRING,
        }
    }
}

// ---------------------------------------------------------------------------
// Element — binding Rust primitives to the catalog
// ---------------------------------------------------------------------------

mod sealed {
    pub trait Sealed {}
}

/// A Rust primitive storable in an array, bound to its catalog kind.
///
/// Sealed: the set of implementors is exactly the catalog's fixed-width
/// kinds. `is_blank` is the one place the NaN-inequality subtlety lives;
/// every blank test in the crate goes through it.
pub trait Element:
    sealed::Sealed + Copy + PartialEq + fmt::Debug + Send + Sync + 'static
{
    /// The catalog kind this primitive stores.
    const KIND: ElementKind;

    /// The additive identity, used for zero-initialized storage.
    fn zero() -> Self;

    /// This kind's blank sentinel.
    fn blank() -> Self;

    /// Whether `self` is the blank sentinel.
    ///
    /// Floating kinds test NaN-ness rather than equality; the sentinel NaN
    /// does not equal itself under IEEE semantics.
    fn is_blank(self) -> bool;
}

macro_rules! impl_element_int {
    ($ty:ty, $kind:ident, $blank:expr) => {
        impl sealed::Sealed for $ty {}

        impl Element for $ty {
            const KIND: ElementKind = ElementKind::$kind;

            #[inline]
            fn zero() -> Self {
                0
            }

            #[inline]
            fn blank() -> Self {
                $blank
            }

            #[inline]
            fn is_blank(self) -> bool {
                self == $blank
            }
        }
    };
}

impl_element_int!(u8, U8, u8::MAX);
impl_element_int!(i8, I8, i8::MIN);
impl_element_int!(u16, U16, u16::MAX);
impl_element_int!(i16, I16, i16::MIN);
impl_element_int!(u32, U32, u32::MAX);
impl_element_int!(i32, I32, i32::MIN);
impl_element_int!(u64, U64, u64::MAX);
impl_element_int!(i64, I64, i64::MIN);

macro_rules! impl_element_float {
    ($ty:ty, $kind:ident) => {
        impl sealed::Sealed for $ty {}

        impl Element for $ty {
            const KIND: ElementKind = ElementKind::$kind;

            #[inline]
            fn zero() -> Self {
                0.0
            }

            #[inline]
            fn blank() -> Self {
                <$ty>::NAN
            }

            #[inline]
            fn is_blank(self) -> bool {
                self.is_nan()
            }
        }
    };
}

impl_element_float!(f32, F32);
impl_element_float!(f64, F64);

macro_rules! impl_element_complex {
    ($ty:ty, $part:ty, $kind:ident) => {
        impl sealed::Sealed for $ty {}

        impl Element for $ty {
            const KIND: ElementKind = ElementKind::$kind;

            #[inline]
            fn zero() -> Self {
                <$ty>::new(0.0, 0.0)
            }

            #[inline]
            fn blank() -> Self {
                <$ty>::new(<$part>::NAN, <$part>::NAN)
            }

            #[inline]
            fn is_blank(self) -> bool {
                self.re.is_nan() && self.im.is_nan()
            }
        }
    };
}

impl_element_complex!(Complex32, f32, C32);
impl_element_complex!(Complex64, f64, C64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_of_matches_documented_widths() {
        let expected = [
            (ElementKind::U8, 1),
            (ElementKind::I8, 1),
            (ElementKind::U16, 2),
            (ElementKind::I16, 2),
            (ElementKind::U32, 4),
            (ElementKind::I32, 4),
            (ElementKind::U64, 8),
            (ElementKind::I64, 8),
            (ElementKind::F32, 4),
            (ElementKind::F64, 8),
            (ElementKind::C32, 8),
            (ElementKind::C64, 16),
            (ElementKind::Str, mem::size_of::<*const u8>()),
            (ElementKind::Logical, 1),
        ];
        for (kind, width) in expected {
            assert_eq!(kind.size_of().unwrap(), width, "kind {kind}");
        }
    }

    #[test]
    fn test_every_kind_has_a_blank() {
        for kind in ElementKind::ALL {
            let blank = kind.blank_scalar();
            assert_eq!(blank.kind(), kind);
            assert!(blank.is_blank(), "blank of {kind} must test blank");
        }
    }

    #[test]
    fn test_float_blank_is_nan_aware() {
        // The sentinel NaN is unequal to itself; the blank test must still
        // recognize it.
        let b = f64::blank();
        assert!(b != b);
        assert!(b.is_blank());
        assert!(!0.0f64.is_blank());

        let c = Complex64::blank();
        assert!(c != c);
        assert!(c.is_blank());
        // Half-blank complex values are not blank.
        assert!(!Complex64::new(f64::NAN, 0.0).is_blank());
    }

    #[test]
    fn test_integer_blanks() {
        assert_eq!(u8::blank(), u8::MAX);
        assert_eq!(i8::blank(), i8::MIN);
        assert_eq!(u64::blank(), u64::MAX);
        assert_eq!(i64::blank(), i64::MIN);
        assert!(u16::MAX.is_blank());
        assert!(!1u16.is_blank());
    }

    #[test]
    fn test_string_blank() {
        assert_eq!(
            ElementKind::Str.blank_scalar(),
            Scalar::Str("Blank".to_owned())
        );
        assert!(Scalar::Str("Blank".into()).is_blank());
        assert!(!Scalar::Str("blank".into()).is_blank());
    }

    #[test]
    fn test_promoted_picks_later_catalog_member() {
        assert_eq!(ElementKind::U8.promoted(ElementKind::I16), ElementKind::I16);
        assert_eq!(ElementKind::I64.promoted(ElementKind::F32), ElementKind::F32);
        assert_eq!(ElementKind::F64.promoted(ElementKind::U8), ElementKind::F64);
        assert_eq!(ElementKind::F64.promoted(ElementKind::C32), ElementKind::C32);
        assert_eq!(ElementKind::F32.promoted(ElementKind::F32), ElementKind::F32);
        // Symmetric.
        assert_eq!(ElementKind::C32.promoted(ElementKind::F64), ElementKind::C32);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(ElementKind::C32.to_string(), "c32");
        assert_eq!(ElementKind::Logical.to_string(), "logical");
        assert_eq!(ElementKind::Str.to_string(), "str");
    }
}
