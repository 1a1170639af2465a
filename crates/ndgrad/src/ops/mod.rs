//! Tensor kernels.
//!
//! Free functions over [`crate::NdArray`], organized by kind:
//!
//! - [`elementwise`]: broadcast binary and unary maps
//! - [`reduce`]: axis reductions and the broadcast-inverse `sum_to`
//! - [`structural`]: reshape, permute, broadcast, slice and scatter-add
//! - [`matmul`]: GEMM-backed (batched) matrix multiplication
//! - [`conv`]: convolution via im2col unfold
//! - [`softmax`]: numerically stable softmax
//!
//! All kernels are pure (they return new tensors) except [`structural::add_at`],
//! the documented in-place accumulation point.

pub mod conv;
pub mod elementwise;
pub mod matmul;
pub mod reduce;
pub mod softmax;
pub mod structural;

pub use conv::{col2im, conv2d, conv_out_size, im2col};
pub use elementwise::{
    abs, add, apply, apply_binary, clip, cos, div, eq_mask, exp, gt_mask, log, maximum, mul, neg,
    powf, scale, sigmoid, sin, sqrt, sub, tanh,
};
pub use matmul::matmul;
pub use reduce::{argmax, argmin, max, mean, min, sum, sum_to};
pub use softmax::softmax;
pub use structural::{add_at, broadcast_to, index_select, permutedims, reshape, transpose};

/// Divisors with magnitude below this raise `DivisionByZero`.
pub const DIV_EPSILON: f64 = 1e-12;

/// Added to the softmax normalizing sum before dividing.
pub const SOFTMAX_EPSILON: f64 = 1e-12;
