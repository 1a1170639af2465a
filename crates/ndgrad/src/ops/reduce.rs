//! Reduction kernels: sum, mean, max, min, argmax/argmin, and `sum_to`.
//!
//! Reductions run along a single axis (or over all elements when no axis
//! is given) with optional `keepdims`. [`sum_to`] is the broadcast
//! inverse used by every backward rule that expanded a shape in forward.

use crate::error::{Result, TensorError};
use crate::shape::Shape;
use crate::strides::{broadcast_strides, compute_strides};
use crate::tensor::NdArray;

/// Reduce along `axis` (or all axes when `None`) with a binary fold.
fn reduce_with<F>(x: &NdArray, axis: Option<isize>, keepdims: bool, init: f64, f: F) -> Result<NdArray>
where
    F: Fn(f64, f64) -> f64,
{
    match axis {
        None => {
            let folded = x.data().iter().fold(init, |acc, &v| f(acc, v));
            if keepdims {
                let dims = vec![1usize; x.ndim()];
                NdArray::from_vec(vec![folded], &dims)
            } else {
                Ok(NdArray::scalar(folded))
            }
        }
        Some(axis) => {
            let axis = x.shape().normalize_axis(axis)?;
            let mut kept_dims = x.dims().to_vec();
            kept_dims[axis] = 1;
            let out_strides = compute_strides(&kept_dims);
            let kept_size: usize = kept_dims.iter().product();

            let mut out = vec![init; kept_size];
            let dims = x.dims();
            let mut index = vec![0usize; dims.len()];
            let mut out_off = 0usize;
            for &v in x.data() {
                out[out_off] = f(out[out_off], v);
                for ax in (0..dims.len()).rev() {
                    index[ax] += 1;
                    if ax != axis {
                        out_off += out_strides[ax];
                    }
                    if index[ax] < dims[ax] {
                        break;
                    }
                    if ax != axis {
                        out_off -= out_strides[ax] * dims[ax];
                    }
                    index[ax] = 0;
                }
            }

            let out_dims: Vec<usize> = if keepdims {
                kept_dims
            } else {
                let mut d = x.dims().to_vec();
                d.remove(axis);
                d
            };
            if out_dims.is_empty() {
                Ok(NdArray::scalar(out[0]))
            } else {
                NdArray::from_vec(out, &out_dims)
            }
        }
    }
}

/// Sum along one axis, or over all elements when `axis` is `None`.
///
/// # Examples
///
/// ```
/// use ndgrad::NdArray;
/// use ndgrad::ops::sum;
///
/// let x = NdArray::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
/// assert_eq!(sum(&x, Some(0), false).unwrap().data(), &[5.0, 7.0, 9.0]);
/// assert_eq!(sum(&x, Some(1), true).unwrap().shape().dims(), &[2, 1]);
/// assert_eq!(sum(&x, None, false).unwrap().item().unwrap(), 21.0);
/// ```
pub fn sum(x: &NdArray, axis: Option<isize>, keepdims: bool) -> Result<NdArray> {
    reduce_with(x, axis, keepdims, 0.0, |a, b| a + b)
}

/// Arithmetic mean along one axis, or over all elements.
pub fn mean(x: &NdArray, axis: Option<isize>, keepdims: bool) -> Result<NdArray> {
    let count = reduced_count(x, axis)?;
    let s = sum(x, axis, keepdims)?;
    Ok(crate::ops::elementwise::scale(&s, 1.0 / count as f64))
}

/// Maximum along one axis, or over all elements.
pub fn max(x: &NdArray, axis: Option<isize>, keepdims: bool) -> Result<NdArray> {
    reduce_with(x, axis, keepdims, f64::NEG_INFINITY, f64::max)
}

/// Minimum along one axis, or over all elements.
pub fn min(x: &NdArray, axis: Option<isize>, keepdims: bool) -> Result<NdArray> {
    reduce_with(x, axis, keepdims, f64::INFINITY, f64::min)
}

/// Number of elements collapsed by a reduction along `axis`.
pub(crate) fn reduced_count(x: &NdArray, axis: Option<isize>) -> Result<usize> {
    match axis {
        None => Ok(x.len()),
        Some(axis) => {
            let axis = x.shape().normalize_axis(axis)?;
            Ok(x.dims()[axis])
        }
    }
}

/// Sum a tensor down to a target shape, undoing broadcast expansion.
///
/// Every axis the target lacks, and every axis where the target size is 1,
/// is summed out. This is the exact inverse of `broadcast_to` and is what
/// every backward rule applies to gradients of broadcast operands.
///
/// # Errors
///
/// Returns `TensorError::ShapeMismatch` if `target` is not broadcastable
/// to the tensor's shape.
///
/// # Examples
///
/// ```
/// use ndgrad::{NdArray, Shape};
/// use ndgrad::ops::sum_to;
///
/// let x = NdArray::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
/// let s = sum_to(&x, &Shape::of(&[3]).unwrap()).unwrap();
/// assert_eq!(s.data(), &[5.0, 7.0, 9.0]);
/// ```
pub fn sum_to(x: &NdArray, target: &Shape) -> Result<NdArray> {
    if x.shape() == target {
        return Ok(x.clone());
    }
    if !target.broadcastable_to(x.shape()) {
        return Err(TensorError::ShapeMismatch {
            op: "sum_to",
            lhs: x.dims().to_vec(),
            rhs: target.dims().to_vec(),
        });
    }

    let strides = broadcast_strides(target.dims(), x.dims());
    let dims = x.dims();
    let mut out = vec![0.0f64; target.size()];
    let mut index = vec![0usize; dims.len()];
    let mut out_off = 0usize;
    for &v in x.data() {
        out[out_off] += v;
        for ax in (0..dims.len()).rev() {
            index[ax] += 1;
            out_off += strides[ax];
            if index[ax] < dims[ax] {
                break;
            }
            out_off -= strides[ax] * dims[ax];
            index[ax] = 0;
        }
    }
    Ok(NdArray::from_shape_vec(out, target.clone()))
}

/// Indices of maxima along `axis`.
///
/// The reference kernels only support the two innermost axes; any other
/// axis raises `NotSupportedAxis`. The returned tensor drops the reduced
/// axis and stores indices as `f64`.
pub fn argmax(x: &NdArray, axis: isize) -> Result<NdArray> {
    arg_reduce(x, axis, "argmax", |best, v| v > best)
}

/// Indices of minima along `axis`. Same axis restriction as [`argmax`].
pub fn argmin(x: &NdArray, axis: isize) -> Result<NdArray> {
    arg_reduce(x, axis, "argmin", |best, v| v < best)
}

fn arg_reduce<F>(x: &NdArray, axis: isize, op: &'static str, better: F) -> Result<NdArray>
where
    F: Fn(f64, f64) -> bool,
{
    let ndim = x.ndim();
    if ndim == 0 {
        return Err(TensorError::NotSupportedAxis { op, axis, ndim });
    }
    let norm = x.shape().normalize_axis(axis)?;
    if norm + 2 < ndim {
        return Err(TensorError::NotSupportedAxis { op, axis, ndim });
    }

    let dims = x.dims();
    let strides = x.strides();
    let axis_len = dims[norm];
    let axis_stride = strides[norm];

    let mut out_dims = dims.to_vec();
    out_dims.remove(norm);
    let out_size: usize = out_dims.iter().product::<usize>().max(1);

    // Outer iteration over every position with the reduced axis pinned to 0.
    let mut kept_dims = dims.to_vec();
    kept_dims[norm] = 1;
    let mut out = Vec::with_capacity(out_size);
    let mut index = vec![0usize; dims.len()];
    let mut base = 0usize;
    for _ in 0..out_size {
        let mut best = x.data()[base];
        let mut best_idx = 0usize;
        for j in 1..axis_len {
            let v = x.data()[base + j * axis_stride];
            if better(best, v) {
                best = v;
                best_idx = j;
            }
        }
        out.push(best_idx as f64);
        for ax in (0..dims.len()).rev() {
            index[ax] += 1;
            base += strides[ax] * if ax == norm { 0 } else { 1 };
            if index[ax] < kept_dims[ax] {
                break;
            }
            base -= strides[ax] * if ax == norm { 0 } else { kept_dims[ax] };
            index[ax] = 0;
        }
    }

    if out_dims.is_empty() {
        Ok(NdArray::scalar(out[0]))
    } else {
        NdArray::from_vec(out, &out_dims)
    }
}
