//! `astrum-core` — Type-erased N-dimensional array engine for the Astrum
//! toolkit.
//!
//! Provides the [`DataArray`] container over fourteen element kinds, heap or
//! file-mapped element storage, blank-value bookkeeping, elementwise type
//! conversion, and the order statistics the reduction front ends build on.
//!
//! # Design
//!
//! - Runtime-typed: the element kind of an array is a value
//!   ([`ElementKind`]), not a type parameter, so a pipeline can carry arrays
//!   of mixed kinds through one code path and decide kinds from file
//!   headers at run time.
//! - `unsafe` is confined to the mapped storage backend; everything above it
//!   is safe code.

pub mod array;
pub mod error;
pub mod kind;
pub mod stats;

// Re-export key types at crate root for convenience.
pub use array::{AllocOptions, ArrayElement, DataArray, StorageBackend, Wcs, DEFAULT_SCRATCH_DIR};
pub use error::{CoreError, Result};
pub use kind::{ElementKind, Scalar, BLANK_STRING};
pub use stats::{QuantileRange, SigmaClip, SigmaClipResult};

/// Items intended for glob-import: `use astrum_core::prelude::*;`
pub mod prelude {
    pub use crate::array::{AllocOptions, ArrayElement, DataArray, StorageBackend, Wcs};
    pub use crate::error::{CoreError, Result};
    pub use crate::kind::{ElementKind, Scalar};
    pub use crate::stats::{
        is_sorted, quantile, sort_increasing, sorted_copy, QuantileRange, SigmaClip,
        SigmaClipResult,
    };
}
