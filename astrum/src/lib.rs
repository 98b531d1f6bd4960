//! # Astrum
//!
//! Building blocks for astronomical data reduction in Rust.
//!
//! The `core` crate carries the type-erased N-dimensional array engine:
//! fourteen element kinds, heap or file-mapped storage, blank-value
//! handling, type conversion, and order statistics. Higher-level sub-crates
//! (tables, image I/O, reduction front ends) will layer on top of it behind
//! their own feature flags.

pub use astrum_core as core;

/// Glob-import convenience: `use astrum::prelude::*;`
pub mod prelude {
    pub use astrum_core::prelude::*;
}
