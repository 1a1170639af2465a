//! Element-wise tensor operations with broadcasting.

use crate::error::{Result, TensorError};
use crate::ops::DIV_EPSILON;
use crate::strides::broadcast_strides;
use crate::tensor::NdArray;

/// Apply a function to each element, returning a new tensor.
///
/// # Example
///
/// ```
/// use ndgrad::NdArray;
/// use ndgrad::ops::apply;
///
/// let t = NdArray::from_vec(vec![1.0, 4.0, 9.0], &[3]).unwrap();
/// let s = apply(&t, |x| x * 2.0);
/// assert_eq!(s.data(), &[2.0, 8.0, 18.0]);
/// ```
pub fn apply<F>(x: &NdArray, f: F) -> NdArray
where
    F: Fn(f64) -> f64,
{
    let data: Vec<f64> = x.data().iter().map(|&v| f(v)).collect();
    NdArray::from_shape_vec(data, x.shape().clone())
}

/// Combine two tensors element-wise under broadcasting.
///
/// Operand shapes must be identical or broadcast-compatible; the result
/// takes the broadcast shape.
///
/// # Example
///
/// ```
/// use ndgrad::NdArray;
/// use ndgrad::ops::apply_binary;
///
/// let a = NdArray::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
/// let b = NdArray::from_vec(vec![10.0, 20.0, 30.0], &[3]).unwrap();
/// let c = apply_binary(&a, &b, |x, y| x + y).unwrap();
/// assert_eq!(c.data(), &[11.0, 22.0, 33.0, 14.0, 25.0, 36.0]);
/// ```
pub fn apply_binary<F>(a: &NdArray, b: &NdArray, f: F) -> Result<NdArray>
where
    F: Fn(f64, f64) -> f64,
{
    // Fast path: identical shapes need no index mapping.
    if a.shape() == b.shape() {
        let data: Vec<f64> = a
            .data()
            .iter()
            .zip(b.data().iter())
            .map(|(&x, &y)| f(x, y))
            .collect();
        return Ok(NdArray::from_shape_vec(data, a.shape().clone()));
    }

    let out_shape = a.shape().broadcast(b.shape())?;
    let sa = broadcast_strides(a.dims(), out_shape.dims());
    let sb = broadcast_strides(b.dims(), out_shape.dims());
    let dims = out_shape.dims().to_vec();

    let mut data = Vec::with_capacity(out_shape.size());
    let mut index = vec![0usize; dims.len()];
    let mut off_a = 0usize;
    let mut off_b = 0usize;
    for _ in 0..out_shape.size() {
        data.push(f(a.data()[off_a], b.data()[off_b]));
        // Odometer increment over the output index, updating both offsets.
        for axis in (0..dims.len()).rev() {
            index[axis] += 1;
            off_a += sa[axis];
            off_b += sb[axis];
            if index[axis] < dims[axis] {
                break;
            }
            off_a -= sa[axis] * dims[axis];
            off_b -= sb[axis] * dims[axis];
            index[axis] = 0;
        }
    }
    Ok(NdArray::from_shape_vec(data, out_shape))
}

/// Element-wise addition with broadcasting.
pub fn add(a: &NdArray, b: &NdArray) -> Result<NdArray> {
    apply_binary(a, b, |x, y| x + y)
}

/// Element-wise subtraction with broadcasting.
pub fn sub(a: &NdArray, b: &NdArray) -> Result<NdArray> {
    apply_binary(a, b, |x, y| x - y)
}

/// Element-wise multiplication with broadcasting.
pub fn mul(a: &NdArray, b: &NdArray) -> Result<NdArray> {
    apply_binary(a, b, |x, y| x * y)
}

/// Element-wise division with broadcasting.
///
/// # Errors
///
/// Returns `TensorError::DivisionByZero` if any divisor element has
/// magnitude below [`DIV_EPSILON`].
pub fn div(a: &NdArray, b: &NdArray) -> Result<NdArray> {
    if let Some(&v) = b.data().iter().find(|v| v.abs() < DIV_EPSILON) {
        return Err(TensorError::DivisionByZero { value: v });
    }
    apply_binary(a, b, |x, y| x / y)
}

/// Element-wise negation.
pub fn neg(x: &NdArray) -> NdArray {
    apply(x, |v| -v)
}

/// Element-wise absolute value.
pub fn abs(x: &NdArray) -> NdArray {
    apply(x, f64::abs)
}

/// Element-wise square root.
///
/// # Errors
///
/// Returns `TensorError::Domain` for negative elements.
pub fn sqrt(x: &NdArray) -> Result<NdArray> {
    if let Some(&v) = x.data().iter().find(|&&v| v < 0.0) {
        return Err(TensorError::Domain { op: "sqrt", value: v });
    }
    Ok(apply(x, f64::sqrt))
}

/// Element-wise exponential.
pub fn exp(x: &NdArray) -> NdArray {
    apply(x, f64::exp)
}

/// Element-wise natural logarithm.
///
/// # Errors
///
/// Returns `TensorError::Domain` for non-positive elements.
pub fn log(x: &NdArray) -> Result<NdArray> {
    if let Some(&v) = x.data().iter().find(|&&v| v <= 0.0) {
        return Err(TensorError::Domain { op: "log", value: v });
    }
    Ok(apply(x, f64::ln))
}

/// Element-wise sine.
pub fn sin(x: &NdArray) -> NdArray {
    apply(x, f64::sin)
}

/// Element-wise cosine.
pub fn cos(x: &NdArray) -> NdArray {
    apply(x, f64::cos)
}

/// Element-wise hyperbolic tangent.
pub fn tanh(x: &NdArray) -> NdArray {
    apply(x, f64::tanh)
}

/// Element-wise logistic sigmoid.
pub fn sigmoid(x: &NdArray) -> NdArray {
    apply(x, |v| 1.0 / (1.0 + (-v).exp()))
}

/// Element-wise power with a constant exponent.
pub fn powf(x: &NdArray, exponent: f64) -> NdArray {
    apply(x, |v| v.powf(exponent))
}

/// Multiply every element by a scalar.
pub fn scale(x: &NdArray, alpha: f64) -> NdArray {
    apply(x, |v| v * alpha)
}

/// Clamp every element into `[min, max]`.
pub fn clip(x: &NdArray, min: f64, max: f64) -> NdArray {
    apply(x, |v| v.clamp(min, max))
}

/// Element-wise maximum of two tensors with broadcasting.
pub fn maximum(a: &NdArray, b: &NdArray) -> Result<NdArray> {
    apply_binary(a, b, f64::max)
}

/// Threshold mask: 1.0 where the element exceeds `threshold`, else 0.0.
pub fn gt_mask(x: &NdArray, threshold: f64) -> NdArray {
    apply(x, |v| if v > threshold { 1.0 } else { 0.0 })
}

/// Equality mask under broadcasting: 1.0 where elements compare equal.
pub fn eq_mask(a: &NdArray, b: &NdArray) -> Result<NdArray> {
    apply_binary(a, b, |x, y| if x == y { 1.0 } else { 0.0 })
}
