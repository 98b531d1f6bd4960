//! Type-erased N-dimensional array container.
//!
//! [`DataArray`] is the central entity of the engine: it owns a shape, an
//! element kind chosen at runtime from the closed catalog, the physical
//! storage (heap or mapped file), an advisory blank flag, and opaque
//! world-coordinate metadata. File-I/O collaborators hand fully populated
//! `DataArray`s to the reduction code and receive finished ones back; the
//! `kind`/`shape`/`storage` triple is self-consistent at every hand-off.
//!
//! Element kinds are erased behind the sealed [`Values`] union, one variant
//! per catalog member, matched exhaustively everywhere. Freeing is `Drop`:
//! ownership is move-only, so double-free and use-after-free do not exist,
//! and a mapped array's backing file is deleted on every exit path.

mod blank;
mod convert;
mod storage;

use std::path::PathBuf;

use num_complex::{Complex32, Complex64};

use crate::error::{CoreError, Result};
use crate::kind::{Element, ElementKind, Scalar};

pub use storage::{DEFAULT_SCRATCH_DIR, StorageBackend};

use storage::Buf;

// ======================================================================
// Values — the sealed per-kind storage union
// ======================================================================

/// Type-erased element storage, one variant per catalog kind.
///
/// `Logical` shares the `i8` representation with `I8` but stays a distinct
/// variant so the kind survives erasure. `Str` is heap-only: string handles
/// are pointers and meaningless inside a raw mapped file image.
#[derive(Debug)]
#[doc(hidden)]
pub enum Values {
    U8(Buf<u8>),
    I8(Buf<i8>),
    U16(Buf<u16>),
    I16(Buf<i16>),
    U32(Buf<u32>),
    I32(Buf<i32>),
    U64(Buf<u64>),
    I64(Buf<i64>),
    F32(Buf<f32>),
    F64(Buf<f64>),
    C32(Buf<Complex32>),
    C64(Buf<Complex64>),
    Str(Vec<String>),
    Logical(Buf<i8>),
}

/// Run `$body` with `$buf` bound to the typed buffer of any real-numeric
/// (orderable, castable) arm, or evaluate the fallback arm. Covers the eight
/// integer kinds, both floats, and `Logical` (as its `i8` bytes).
macro_rules! dispatch_real {
    ($values:expr, $buf:ident => $body:expr, _ => $fallback:expr) => {
        match $values {
            $crate::array::Values::U8($buf) => $body,
            $crate::array::Values::I8($buf) => $body,
            $crate::array::Values::U16($buf) => $body,
            $crate::array::Values::I16($buf) => $body,
            $crate::array::Values::U32($buf) => $body,
            $crate::array::Values::I32($buf) => $body,
            $crate::array::Values::U64($buf) => $body,
            $crate::array::Values::I64($buf) => $body,
            $crate::array::Values::F32($buf) => $body,
            $crate::array::Values::F64($buf) => $body,
            $crate::array::Values::Logical($buf) => $body,
            _ => $fallback,
        }
    };
}

/// Like [`dispatch_real!`] but also covering the complex arms; only the
/// string arm takes the separate branch. Used by the blank machinery, where
/// every fixed-width kind behaves uniformly through [`Element`].
macro_rules! dispatch_fixed {
    ($values:expr, $buf:ident => $body:expr, $strs:ident => $str_body:expr) => {
        match $values {
            $crate::array::Values::U8($buf) => $body,
            $crate::array::Values::I8($buf) => $body,
            $crate::array::Values::U16($buf) => $body,
            $crate::array::Values::I16($buf) => $body,
            $crate::array::Values::U32($buf) => $body,
            $crate::array::Values::I32($buf) => $body,
            $crate::array::Values::U64($buf) => $body,
            $crate::array::Values::I64($buf) => $body,
            $crate::array::Values::F32($buf) => $body,
            $crate::array::Values::F64($buf) => $body,
            $crate::array::Values::C32($buf) => $body,
            $crate::array::Values::C64($buf) => $body,
            $crate::array::Values::Logical($buf) => $body,
            $crate::array::Values::Str($strs) => $str_body,
        }
    };
}

pub(crate) use {dispatch_fixed, dispatch_real};

impl Values {
    fn alloc(kind: ElementKind, count: usize, options: &AllocOptions) -> Result<Values> {
        let scratch = options.scratch();

        macro_rules! buf {
            ($ty:ty, $variant:ident) => {{
                let buf = if options.mapped {
                    Buf::<$ty>::mapped(count, &scratch)?
                } else {
                    Buf::<$ty>::heap(count)?
                };
                Values::$variant(buf)
            }};
        }

        Ok(match kind {
            ElementKind::U8 => buf!(u8, U8),
            ElementKind::I8 => buf!(i8, I8),
            ElementKind::U16 => buf!(u16, U16),
            ElementKind::I16 => buf!(i16, I16),
            ElementKind::U32 => buf!(u32, U32),
            ElementKind::I32 => buf!(i32, I32),
            ElementKind::U64 => buf!(u64, U64),
            ElementKind::I64 => buf!(i64, I64),
            ElementKind::F32 => buf!(f32, F32),
            ElementKind::F64 => buf!(f64, F64),
            ElementKind::C32 => buf!(Complex32, C32),
            ElementKind::C64 => buf!(Complex64, C64),
            ElementKind::Logical => buf!(i8, Logical),
            ElementKind::Str => {
                if options.mapped {
                    return Err(CoreError::UnsupportedKind {
                        kind,
                        context: "mapped storage",
                    });
                }
                let mut strings: Vec<String> = Vec::new();
                strings
                    .try_reserve_exact(count)
                    .map_err(|_| CoreError::OutOfMemory {
                        bytes: count * std::mem::size_of::<String>(),
                    })?;
                strings.resize(count, String::new());
                Values::Str(strings)
            }
        })
    }

    pub(crate) fn kind(&self) -> ElementKind {
        match self {
            Values::U8(_) => ElementKind::U8,
            Values::I8(_) => ElementKind::I8,
            Values::U16(_) => ElementKind::U16,
            Values::I16(_) => ElementKind::I16,
            Values::U32(_) => ElementKind::U32,
            Values::I32(_) => ElementKind::I32,
            Values::U64(_) => ElementKind::U64,
            Values::I64(_) => ElementKind::I64,
            Values::F32(_) => ElementKind::F32,
            Values::F64(_) => ElementKind::F64,
            Values::C32(_) => ElementKind::C32,
            Values::C64(_) => ElementKind::C64,
            Values::Str(_) => ElementKind::Str,
            Values::Logical(_) => ElementKind::Logical,
        }
    }

    fn len(&self) -> usize {
        dispatch_fixed!(self, buf => buf.len(), strings => strings.len())
    }

    fn backend(&self) -> StorageBackend {
        dispatch_fixed!(self, buf => buf.backend(), _strings => StorageBackend::Heap)
    }

    fn scratch_dir(&self) -> Option<PathBuf> {
        dispatch_fixed!(self, buf => buf.scratch_dir(), _strings => None)
    }
}

// ======================================================================
// ArrayElement — typed windows into the erased storage
// ======================================================================

/// A fixed-width element type with a dedicated [`Values`] variant.
///
/// Implemented for the twelve Copy kinds; `Logical` and `Str` arrays use the
/// dedicated [`DataArray::logical_slice`] / [`DataArray::str_slice`]
/// accessors instead.
pub trait ArrayElement: Element {
    #[doc(hidden)]
    fn wrap(buf: Buf<Self>) -> Values;
    #[doc(hidden)]
    fn buf(values: &Values) -> Option<&Buf<Self>>;
    #[doc(hidden)]
    fn buf_mut(values: &mut Values) -> Option<&mut Buf<Self>>;
}

macro_rules! impl_array_element {
    ($ty:ty, $variant:ident) => {
        impl ArrayElement for $ty {
            fn wrap(buf: Buf<Self>) -> Values {
                Values::$variant(buf)
            }

            fn buf(values: &Values) -> Option<&Buf<Self>> {
                match values {
                    Values::$variant(buf) => Some(buf),
                    _ => None,
                }
            }

            fn buf_mut(values: &mut Values) -> Option<&mut Buf<Self>> {
                match values {
                    Values::$variant(buf) => Some(buf),
                    _ => None,
                }
            }
        }
    };
}

impl_array_element!(u8, U8);
impl_array_element!(i8, I8);
impl_array_element!(u16, U16);
impl_array_element!(i16, I16);
impl_array_element!(u32, U32);
impl_array_element!(i32, I32);
impl_array_element!(u64, U64);
impl_array_element!(i64, I64);
impl_array_element!(f32, F32);
impl_array_element!(f64, F64);
impl_array_element!(Complex32, C32);
impl_array_element!(Complex64, C64);

// ======================================================================
// Allocation options and opaque WCS metadata
// ======================================================================

/// Storage choices for [`DataArray::alloc`].
///
/// All storage is zero-initialized regardless of backend: heap buffers are
/// filled with the kind's zero, mapped sparse pages read back as zero.
#[derive(Debug, Clone, Default)]
pub struct AllocOptions {
    /// Back the element buffer with a mapped scratch file instead of heap
    /// memory. There is no fallback: if mapping fails, allocation fails.
    pub mapped: bool,
    /// Scratch directory for mapped backing files; defaults to
    /// [`DEFAULT_SCRATCH_DIR`] in the working directory.
    pub scratch_dir: Option<PathBuf>,
}

impl AllocOptions {
    fn scratch(&self) -> PathBuf {
        self.scratch_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SCRATCH_DIR))
    }
}

/// Opaque world-coordinate-system metadata.
///
/// The engine never interprets it; it travels with its array and is dropped
/// with it, or handed off intact via [`DataArray::take_wcs`].
#[derive(Debug, Clone, PartialEq)]
pub struct Wcs(Vec<u8>);

impl Wcs {
    pub fn from_bytes(raw: Vec<u8>) -> Self {
        Wcs(raw)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

// ======================================================================
// DataArray
// ======================================================================

/// An N-dimensional array of one runtime-chosen element kind.
#[derive(Debug)]
pub struct DataArray {
    pub(crate) values: Values,
    shape: Vec<usize>,
    any_blank: bool,
    wcs: Option<Wcs>,
}

impl DataArray {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Allocate a zero-initialized array.
    ///
    /// Every dimension extent must be positive; a zero extent (or an empty
    /// shape) is rejected with [`CoreError::InvalidShape`]. On success,
    /// `len() == product(shape)` exactly, `any_blank` is false and no WCS
    /// metadata is attached.
    pub fn alloc(kind: ElementKind, shape: &[usize], options: &AllocOptions) -> Result<DataArray> {
        let count = validated_count(shape)?;
        let values = Values::alloc(kind, count, options)?;
        Ok(DataArray {
            values,
            shape: shape.to_vec(),
            any_blank: false,
            wcs: None,
        })
    }

    /// Allocate a zero-initialized heap array.
    ///
    /// ```
    /// # use astrum_core::{DataArray, kind::ElementKind};
    /// let arr = DataArray::zeros(ElementKind::F64, &[2, 3]).unwrap();
    /// assert_eq!(arr.shape(), &[2, 3]);
    /// assert_eq!(arr.len(), 6);
    /// ```
    pub fn zeros(kind: ElementKind, shape: &[usize]) -> Result<DataArray> {
        Self::alloc(kind, shape, &AllocOptions::default())
    }

    /// Create a heap array from a flat slice and a shape (copies the data).
    ///
    /// Returns [`CoreError::InvalidShape`] if the product of `shape` does
    /// not equal `data.len()`.
    pub fn from_slice<T: ArrayElement>(data: &[T], shape: &[usize]) -> Result<DataArray> {
        let count = validated_count(shape)?;
        if count != data.len() {
            return Err(CoreError::InvalidShape {
                shape: shape.to_vec(),
                reason: "shape product does not match data length",
            });
        }
        Ok(DataArray {
            values: T::wrap(Buf::Heap(data.to_vec())),
            shape: shape.to_vec(),
            any_blank: false,
            wcs: None,
        })
    }

    pub(crate) fn from_values(values: Values, shape: Vec<usize>) -> DataArray {
        debug_assert_eq!(values.len(), shape.iter().product::<usize>());
        DataArray {
            values,
            shape,
            any_blank: false,
            wcs: None,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// The element kind, fixed at creation. Changing kind means producing a
    /// new array via [`DataArray::convert`].
    #[inline]
    pub fn kind(&self) -> ElementKind {
        self.values.kind()
    }

    /// Per-dimension extents.
    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// The number of dimensions (rank).
    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Total element count; equals the product of the shape for the array's
    /// whole life.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false: zero-length dimensions are rejected at creation.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Which physical backend holds the elements.
    #[inline]
    pub fn backend(&self) -> StorageBackend {
        self.values.backend()
    }

    /// Advisory flag: true if any element may currently be blank. It may be
    /// conservatively true, but is never false while blanks exist after the
    /// blank-introducing operations of this crate.
    #[inline]
    pub fn any_blank(&self) -> bool {
        self.any_blank
    }

    pub(crate) fn set_any_blank(&mut self, any_blank: bool) {
        self.any_blank = any_blank;
    }

    pub(crate) fn scratch_dir(&self) -> Option<PathBuf> {
        self.values.scratch_dir()
    }

    /// The attached WCS metadata, if any.
    pub fn wcs(&self) -> Option<&Wcs> {
        self.wcs.as_ref()
    }

    /// Attach (or clear) WCS metadata.
    pub fn set_wcs(&mut self, wcs: Option<Wcs>) {
        self.wcs = wcs;
    }

    /// Detach and return the WCS metadata, leaving the array without any.
    pub fn take_wcs(&mut self) -> Option<Wcs> {
        self.wcs.take()
    }

    // ------------------------------------------------------------------
    // Typed element access
    // ------------------------------------------------------------------

    /// A typed flat view of the elements in storage order.
    ///
    /// Fails with [`CoreError::UnsupportedKind`] when `T` does not match the
    /// array's kind; no reinterpretation ever happens.
    pub fn as_slice<T: ArrayElement>(&self) -> Result<&[T]> {
        T::buf(&self.values)
            .map(Buf::as_slice)
            .ok_or(CoreError::UnsupportedKind {
                kind: self.kind(),
                context: "typed slice access",
            })
    }

    /// Mutable counterpart of [`DataArray::as_slice`].
    pub fn as_mut_slice<T: ArrayElement>(&mut self) -> Result<&mut [T]> {
        let kind = self.kind();
        T::buf_mut(&mut self.values)
            .map(Buf::as_mut_slice)
            .ok_or(CoreError::UnsupportedKind {
                kind,
                context: "typed slice access",
            })
    }

    /// The logical bytes of a `Logical` array (zero is false).
    pub fn logical_slice(&self) -> Result<&[i8]> {
        match &self.values {
            Values::Logical(buf) => Ok(buf.as_slice()),
            _ => Err(CoreError::UnsupportedKind {
                kind: self.kind(),
                context: "logical access",
            }),
        }
    }

    /// Mutable counterpart of [`DataArray::logical_slice`].
    pub fn logical_slice_mut(&mut self) -> Result<&mut [i8]> {
        let kind = self.kind();
        match &mut self.values {
            Values::Logical(buf) => Ok(buf.as_mut_slice()),
            _ => Err(CoreError::UnsupportedKind {
                kind,
                context: "logical access",
            }),
        }
    }

    /// The string handles of a `Str` array.
    pub fn str_slice(&self) -> Result<&[String]> {
        match &self.values {
            Values::Str(strings) => Ok(strings),
            _ => Err(CoreError::UnsupportedKind {
                kind: self.kind(),
                context: "string access",
            }),
        }
    }

    /// Mutable counterpart of [`DataArray::str_slice`].
    pub fn str_slice_mut(&mut self) -> Result<&mut [String]> {
        let kind = self.kind();
        match &mut self.values {
            Values::Str(strings) => Ok(strings),
            _ => Err(CoreError::UnsupportedKind {
                kind,
                context: "string access",
            }),
        }
    }

    // ------------------------------------------------------------------
    // Scalar element access
    // ------------------------------------------------------------------

    /// The element at flat index `index` as a type-erased [`Scalar`].
    ///
    /// Meant for headers, spot checks and tests; bulk access goes through
    /// the typed slices.
    pub fn get(&self, index: usize) -> Result<Scalar> {
        if index >= self.len() {
            return Err(CoreError::IndexOutOfBounds {
                index,
                len: self.len(),
            });
        }
        Ok(match &self.values {
            Values::U8(b) => Scalar::U8(b.as_slice()[index]),
            Values::I8(b) => Scalar::I8(b.as_slice()[index]),
            Values::U16(b) => Scalar::U16(b.as_slice()[index]),
            Values::I16(b) => Scalar::I16(b.as_slice()[index]),
            Values::U32(b) => Scalar::U32(b.as_slice()[index]),
            Values::I32(b) => Scalar::I32(b.as_slice()[index]),
            Values::U64(b) => Scalar::U64(b.as_slice()[index]),
            Values::I64(b) => Scalar::I64(b.as_slice()[index]),
            Values::F32(b) => Scalar::F32(b.as_slice()[index]),
            Values::F64(b) => Scalar::F64(b.as_slice()[index]),
            Values::C32(b) => Scalar::C32(b.as_slice()[index]),
            Values::C64(b) => Scalar::C64(b.as_slice()[index]),
            Values::Str(s) => Scalar::Str(s[index].clone()),
            Values::Logical(b) => Scalar::Logical(b.as_slice()[index]),
        })
    }

    /// Store `value` at flat index `index`.
    ///
    /// The value must be of the array's own kind
    /// ([`CoreError::UnsupportedConversion`] otherwise); no implicit cast
    /// happens here.
    pub fn set(&mut self, index: usize, value: &Scalar) -> Result<()> {
        if index >= self.len() {
            return Err(CoreError::IndexOutOfBounds {
                index,
                len: self.len(),
            });
        }
        match (&mut self.values, value) {
            (Values::U8(b), Scalar::U8(v)) => b.as_mut_slice()[index] = *v,
            (Values::I8(b), Scalar::I8(v)) => b.as_mut_slice()[index] = *v,
            (Values::U16(b), Scalar::U16(v)) => b.as_mut_slice()[index] = *v,
            (Values::I16(b), Scalar::I16(v)) => b.as_mut_slice()[index] = *v,
            (Values::U32(b), Scalar::U32(v)) => b.as_mut_slice()[index] = *v,
            (Values::I32(b), Scalar::I32(v)) => b.as_mut_slice()[index] = *v,
            (Values::U64(b), Scalar::U64(v)) => b.as_mut_slice()[index] = *v,
            (Values::I64(b), Scalar::I64(v)) => b.as_mut_slice()[index] = *v,
            (Values::F32(b), Scalar::F32(v)) => b.as_mut_slice()[index] = *v,
            (Values::F64(b), Scalar::F64(v)) => b.as_mut_slice()[index] = *v,
            (Values::C32(b), Scalar::C32(v)) => b.as_mut_slice()[index] = *v,
            (Values::C64(b), Scalar::C64(v)) => b.as_mut_slice()[index] = *v,
            (Values::Logical(b), Scalar::Logical(v)) => b.as_mut_slice()[index] = *v,
            (Values::Str(s), Scalar::Str(v)) => s[index].clone_from(v),
            _ => {
                return Err(CoreError::UnsupportedConversion {
                    from: value.kind(),
                    to: self.kind(),
                });
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Shape comparison
    // ------------------------------------------------------------------

    /// True iff both arrays have the same rank and identical extents in the
    /// same order.
    pub fn same_shape(&self, other: &DataArray) -> bool {
        self.shape == other.shape
    }

    /// Precondition check for elementwise binary operations. A mismatch is a
    /// caller error ([`CoreError::ShapeMismatch`]); shapes are never
    /// silently broadcast.
    pub fn ensure_same_shape(&self, other: &DataArray) -> Result<()> {
        if self.same_shape(other) {
            return Ok(());
        }
        Err(CoreError::ShapeMismatch {
            expected: self.shape.clone(),
            got: other.shape.clone(),
        })
    }

    // ------------------------------------------------------------------
    // Duplication
    // ------------------------------------------------------------------

    /// Allocate a zero-initialized buffer with this array's length, backend
    /// tag and scratch directory. Producers that fill elementwise (copying,
    /// conversion) start here, so a mapped result is written straight into
    /// its backing file rather than staged through a heap copy first.
    pub(crate) fn alloc_like<T: Element>(&self) -> Result<Buf<T>> {
        let scratch = self
            .scratch_dir()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SCRATCH_DIR));
        Buf::alloc(
            self.len(),
            self.backend() == StorageBackend::Mapped,
            &scratch,
        )
    }

    /// Deep copy preserving kind, shape, backend tag, blank flag and WCS.
    ///
    /// Can fail for mapped arrays, which need a fresh backing file in the
    /// same scratch directory.
    pub fn duplicate(&self) -> Result<DataArray> {
        macro_rules! dup {
            ($variant:ident, $buf:expr) => {{
                let mut out = self.alloc_like()?;
                out.as_mut_slice().copy_from_slice($buf.as_slice());
                Values::$variant(out)
            }};
        }

        let values = match &self.values {
            Values::U8(b) => dup!(U8, b),
            Values::I8(b) => dup!(I8, b),
            Values::U16(b) => dup!(U16, b),
            Values::I16(b) => dup!(I16, b),
            Values::U32(b) => dup!(U32, b),
            Values::I32(b) => dup!(I32, b),
            Values::U64(b) => dup!(U64, b),
            Values::I64(b) => dup!(I64, b),
            Values::F32(b) => dup!(F32, b),
            Values::F64(b) => dup!(F64, b),
            Values::C32(b) => dup!(C32, b),
            Values::C64(b) => dup!(C64, b),
            Values::Logical(b) => dup!(Logical, b),
            Values::Str(strings) => Values::Str(strings.clone()),
        };

        Ok(DataArray {
            values,
            shape: self.shape.clone(),
            any_blank: self.any_blank,
            wcs: self.wcs.clone(),
        })
    }
}

fn validated_count(shape: &[usize]) -> Result<usize> {
    if shape.is_empty() {
        return Err(CoreError::InvalidShape {
            shape: shape.to_vec(),
            reason: "array rank must be at least one",
        });
    }
    let mut count = 1usize;
    for &extent in shape {
        if extent == 0 {
            return Err(CoreError::InvalidShape {
                shape: shape.to_vec(),
                reason: "the size of a dimension cannot be zero",
            });
        }
        count = count
            .checked_mul(extent)
            .ok_or(CoreError::InvalidShape {
                shape: shape.to_vec(),
                reason: "element count overflows usize",
            })?;
    }
    Ok(count)
}
