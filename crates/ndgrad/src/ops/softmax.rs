//! Numerically stable softmax.

use crate::error::Result;
use crate::ops::SOFTMAX_EPSILON;
use crate::ops::elementwise::{apply, sub};
use crate::ops::reduce::{max, sum};
use crate::tensor::NdArray;

/// Softmax along `axis`.
///
/// Stabilized against extreme inputs: the per-axis maximum is subtracted
/// before exponentiating, and an epsilon is added to the normalizing sum
/// before dividing, so inputs with magnitude up to ~1e300 produce neither
/// overflow nor division by zero.
///
/// # Examples
///
/// ```
/// use ndgrad::NdArray;
/// use ndgrad::ops::softmax;
///
/// let x = NdArray::from_vec(vec![1.0, 1.0, 1.0], &[3]).unwrap();
/// let y = softmax(&x, -1).unwrap();
/// for &v in y.data() {
///     assert!((v - 1.0 / 3.0).abs() < 1e-12);
/// }
/// ```
pub fn softmax(x: &NdArray, axis: isize) -> Result<NdArray> {
    let axis = x.shape().normalize_axis(axis)? as isize;
    let m = max(x, Some(axis), true)?;
    let shifted = sub(x, &m)?;
    let e = apply(&shifted, f64::exp);
    let s = sum(&e, Some(axis), true)?;
    let denom = apply(&s, |v| v + SOFTMAX_EPSILON);
    crate::ops::elementwise::apply_binary(&e, &denom, |a, b| a / b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_softmax_sums_to_one() {
        let x = NdArray::from_vec(vec![1.0, 2.0, 3.0, -1.0, 0.0, 1.0], &[2, 3]).unwrap();
        let y = softmax(&x, 1).unwrap();
        for row in 0..2 {
            let s: f64 = (0..3).map(|c| *y.get(&[row, c]).unwrap()).sum();
            assert_relative_eq!(s, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_softmax_known_values() {
        let x = NdArray::from_vec(vec![0.0, f64::ln(3.0)], &[2]).unwrap();
        let y = softmax(&x, 0).unwrap();
        assert_relative_eq!(y.data()[0], 0.25, epsilon = 1e-9);
        assert_relative_eq!(y.data()[1], 0.75, epsilon = 1e-9);
    }

    #[test]
    fn test_softmax_extreme_inputs() {
        let x = NdArray::from_vec(vec![1e30, -1e30, 0.0], &[3]).unwrap();
        let y = softmax(&x, 0).unwrap();
        assert!(y.data().iter().all(|v| v.is_finite()));
        let s: f64 = y.data().iter().sum();
        assert_relative_eq!(s, 1.0, epsilon = 1e-9);
        assert_relative_eq!(y.data()[0], 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_softmax_all_equal_extreme() {
        // All inputs identical at huge magnitude: shifted values are all
        // zero, so the result is uniform with no NaN/Inf.
        let x = NdArray::from_vec(vec![-1e30, -1e30], &[2]).unwrap();
        let y = softmax(&x, 0).unwrap();
        assert!(y.data().iter().all(|v| v.is_finite()));
        assert_relative_eq!(y.data()[0], 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_softmax_axis0() {
        let x = NdArray::from_vec(vec![1.0, 2.0, 1.0, 2.0], &[2, 2]).unwrap();
        let y = softmax(&x, 0).unwrap();
        for c in 0..2 {
            let s = *y.get(&[0, c]).unwrap() + *y.get(&[1, c]).unwrap();
            assert_relative_eq!(s, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_softmax_bad_axis() {
        let x = NdArray::zeros(&[2, 2]).unwrap();
        assert!(softmax(&x, 2).is_err());
    }
}
