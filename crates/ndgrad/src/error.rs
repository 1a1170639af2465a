//! Error types for ndgrad.

use thiserror::Error;

/// Errors that can occur in tensor and autodiff operations.
///
/// Every error aborts the current forward or backward call immediately.
/// Kernels never let a NaN or garbage value propagate silently: a corrupted
/// gradient several nodes downstream of the true fault is nearly
/// undiagnosable, so invalid inputs fail at the operator that saw them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TensorError {
    /// Operand shapes are incompatible (element count, broadcast pairing,
    /// or gradient accumulation).
    #[error("shape mismatch in {op}: {lhs:?} is not compatible with {rhs:?}")]
    ShapeMismatch {
        op: &'static str,
        lhs: Vec<usize>,
        rhs: Vec<usize>,
    },

    /// Wrong number of inputs passed to an operator.
    #[error("wrong number of inputs for {op}: expected {expected}, got {actual}")]
    Arity {
        op: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A value is outside the numeric domain of the operator.
    #[error("domain error in {op}: value {value} is outside the valid domain")]
    Domain { op: &'static str, value: f64 },

    /// Divisor magnitude is below the division epsilon.
    #[error("division by zero: divisor {value} is within epsilon of zero")]
    DivisionByZero { value: f64 },

    /// Slice or scatter index addresses outside the buffer bounds.
    #[error("index {index} out of range for axis {axis} with size {size}")]
    IndexOutOfRange {
        index: usize,
        axis: usize,
        size: usize,
    },

    /// The axis is invalid or unsupported for this kernel.
    #[error("axis {axis} not supported by {op} on a rank-{ndim} tensor")]
    NotSupportedAxis {
        op: &'static str,
        axis: isize,
        ndim: usize,
    },

    /// Invalid permutation of dimensions.
    #[error("invalid permutation {perm:?} for tensor with {ndim} dimensions")]
    InvalidPermutation { perm: Vec<usize>, ndim: usize },

    /// Shape constructed with a non-positive dimension.
    #[error("invalid dimension {dim} at axis {axis}: dimensions must be positive")]
    InvalidDimension { dim: usize, axis: usize },
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, TensorError>;
