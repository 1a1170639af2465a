//! Stride computation utilities.
//!
//! Uses row-major (C) order: the last axis is contiguous.

/// Compute row-major strides from a shape.
///
/// For shape `[d0, d1, d2]`, returns `[d1*d2, d2, 1]`.
///
/// # Examples
///
/// ```
/// use ndgrad::strides::compute_strides;
///
/// assert_eq!(compute_strides(&[3, 4, 5]), vec![20, 5, 1]);
/// assert_eq!(compute_strides(&[2, 3]), vec![3, 1]);
/// assert_eq!(compute_strides(&[5]), vec![1]);
/// assert_eq!(compute_strides(&[]), Vec::<usize>::new());
/// ```
pub fn compute_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![0usize; shape.len()];
    let mut stride = 1;
    for (i, &dim) in shape.iter().enumerate().rev() {
        strides[i] = stride;
        stride *= dim;
    }
    strides
}

/// Convert cartesian indices to a linear index.
#[inline]
pub fn cartesian_to_linear(indices: &[usize], strides: &[usize]) -> usize {
    indices
        .iter()
        .zip(strides.iter())
        .map(|(&idx, &stride)| idx * stride)
        .sum()
}

/// Convert a linear index to cartesian indices using row-major order.
pub fn linear_to_cartesian(mut linear: usize, shape: &[usize]) -> Vec<usize> {
    let mut indices = vec![0usize; shape.len()];
    for (i, &dim) in shape.iter().enumerate().rev() {
        indices[i] = linear % dim;
        linear /= dim;
    }
    indices
}

/// Strides for reading a smaller operand at indices of a broadcast shape.
///
/// Returned strides have one entry per axis of `target`: axes the operand
/// does not have, and axes where its size is 1, get stride 0 (the index is
/// clamped to 0 on those axes).
///
/// `from` must be broadcastable to `target`.
pub fn broadcast_strides(from: &[usize], target: &[usize]) -> Vec<usize> {
    let from_strides = compute_strides(from);
    let offset = target.len() - from.len();
    let mut strides = vec![0usize; target.len()];
    for (i, &dim) in from.iter().enumerate() {
        if dim != 1 {
            strides[offset + i] = from_strides[i];
        }
    }
    strides
}
