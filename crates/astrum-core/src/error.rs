use crate::kind::ElementKind;

/// All errors returned by `astrum-core`.
///
/// The engine is fail-fast: every variant is unrecoverable at the point of
/// detection and propagates straight to the caller. There are no retry or
/// degraded-mode paths anywhere in the crate; a batch reduction that silently
/// produced partial results would be scientifically worse than one that
/// stopped.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A requested shape is invalid (zero-length dimension, zero rank).
    #[error("invalid shape {shape:?}: {reason}")]
    InvalidShape {
        shape: Vec<usize>,
        reason: &'static str,
    },

    /// The element kind is outside the closed set the operation covers.
    #[error("element kind `{kind}` is not supported for {context}")]
    UnsupportedKind {
        kind: ElementKind,
        context: &'static str,
    },

    /// No conversion path is defined between the two kinds.
    #[error("no conversion is defined from `{from}` to `{to}`")]
    UnsupportedConversion { from: ElementKind, to: ElementKind },

    /// Operand shapes differ; elementwise operations never broadcast.
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    /// The host's primitive widths disagree with the catalog's assumptions.
    #[error("platform assumption violated: {0}")]
    PlatformAssumption(&'static str),

    /// Heap allocation for the element buffer failed.
    #[error("out of memory allocating {bytes} bytes")]
    OutOfMemory { bytes: usize },

    /// The mapped-file backend failed (scratch dir, temp file, extension,
    /// or the mapping itself). There is no fallback to heap storage.
    #[error("storage backend failure: {0}")]
    StorageBackend(#[from] std::io::Error),

    /// A flat element index is out of bounds.
    #[error("index {index} out of bounds for array of {len} elements")]
    IndexOutOfBounds { index: usize, len: usize },

    /// A caller-supplied parameter failed validation.
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },
}

/// Convenience alias used throughout `astrum-core`.
pub type Result<T> = std::result::Result<T, CoreError>;
