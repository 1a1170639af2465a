//! Structural kernels: reshape, permute, broadcast, slice and scatter-add.

use crate::error::{Result, TensorError};
use crate::shape::Shape;
use crate::strides::{broadcast_strides, compute_strides};
use crate::tensor::NdArray;

/// Reshape to a new shape with the same total element count.
///
/// # Errors
///
/// Returns `TensorError::ShapeMismatch` if the element counts differ.
///
/// # Examples
///
/// ```
/// use ndgrad::NdArray;
/// use ndgrad::ops::reshape;
///
/// let t = NdArray::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
/// let r = reshape(&t, &[3, 2]).unwrap();
/// assert_eq!(r.shape().dims(), &[3, 2]);
/// assert_eq!(r.data(), t.data());
///
/// assert!(reshape(&t, &[4, 2]).is_err());
/// ```
pub fn reshape(x: &NdArray, dims: &[usize]) -> Result<NdArray> {
    let shape = Shape::of(dims)?;
    if shape.size() != x.len() {
        return Err(TensorError::ShapeMismatch {
            op: "reshape",
            lhs: x.dims().to_vec(),
            rhs: dims.to_vec(),
        });
    }
    Ok(NdArray::from_shape_vec(x.data().to_vec(), shape))
}

/// Reshape to an already-validated shape (internal).
pub(crate) fn reshape_to(x: &NdArray, shape: &Shape) -> Result<NdArray> {
    if shape.size() != x.len() {
        return Err(TensorError::ShapeMismatch {
            op: "reshape",
            lhs: x.dims().to_vec(),
            rhs: shape.dims().to_vec(),
        });
    }
    Ok(NdArray::from_shape_vec(x.data().to_vec(), shape.clone()))
}

/// Permute the dimensions of a tensor.
///
/// `perm[i]` names the source axis that becomes axis `i` of the result.
///
/// # Errors
///
/// Returns `TensorError::InvalidPermutation` if `perm` is not a valid
/// permutation of `0..ndim`.
///
/// # Examples
///
/// ```
/// use ndgrad::NdArray;
/// use ndgrad::ops::permutedims;
///
/// let t = NdArray::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
/// let p = permutedims(&t, &[1, 0]).unwrap();
/// assert_eq!(p.shape().dims(), &[3, 2]);
/// assert_eq!(p.get(&[2, 1]), t.get(&[1, 2]));
/// ```
pub fn permutedims(x: &NdArray, perm: &[usize]) -> Result<NdArray> {
    let ndim = x.ndim();
    if perm.len() != ndim {
        return Err(TensorError::InvalidPermutation {
            perm: perm.to_vec(),
            ndim,
        });
    }
    let mut seen = vec![false; ndim];
    for &p in perm {
        if p >= ndim || seen[p] {
            return Err(TensorError::InvalidPermutation {
                perm: perm.to_vec(),
                ndim,
            });
        }
        seen[p] = true;
    }

    let out_dims: Vec<usize> = perm.iter().map(|&p| x.dims()[p]).collect();
    // Source strides arranged in output axis order.
    let src_strides: Vec<usize> = perm.iter().map(|&p| x.strides()[p]).collect();

    let mut data = Vec::with_capacity(x.len());
    let mut index = vec![0usize; ndim];
    let mut src_off = 0usize;
    for _ in 0..x.len() {
        data.push(x.data()[src_off]);
        for ax in (0..ndim).rev() {
            index[ax] += 1;
            src_off += src_strides[ax];
            if index[ax] < out_dims[ax] {
                break;
            }
            src_off -= src_strides[ax] * out_dims[ax];
            index[ax] = 0;
        }
    }
    if out_dims.is_empty() {
        return Ok(x.clone());
    }
    NdArray::from_vec(data, &out_dims)
}

/// Invert a permutation: `inverse[perm[i]] = i`.
pub(crate) fn invert_permutation(perm: &[usize]) -> Vec<usize> {
    let mut inverse = vec![0usize; perm.len()];
    for (i, &p) in perm.iter().enumerate() {
        inverse[p] = i;
    }
    inverse
}

/// Swap the last two axes (matrix transpose, batched for rank > 2).
///
/// # Errors
///
/// Returns `TensorError::NotSupportedAxis` for tensors of rank below 2.
pub fn transpose(x: &NdArray) -> Result<NdArray> {
    let ndim = x.ndim();
    if ndim < 2 {
        return Err(TensorError::NotSupportedAxis {
            op: "transpose",
            axis: -1,
            ndim,
        });
    }
    let mut perm: Vec<usize> = (0..ndim).collect();
    perm.swap(ndim - 2, ndim - 1);
    permutedims(x, &perm)
}

/// Expand a tensor to a broadcast-compatible target shape.
///
/// Size-1 axes (and missing leading axes) are repeated; element
/// addressing clamps those axes to index 0.
///
/// # Errors
///
/// Returns `TensorError::ShapeMismatch` if the tensor cannot broadcast to
/// `target`.
pub fn broadcast_to(x: &NdArray, target: &Shape) -> Result<NdArray> {
    if x.shape() == target {
        return Ok(x.clone());
    }
    if !x.shape().broadcastable_to(target) {
        return Err(TensorError::ShapeMismatch {
            op: "broadcast_to",
            lhs: x.dims().to_vec(),
            rhs: target.dims().to_vec(),
        });
    }

    let strides = broadcast_strides(x.dims(), target.dims());
    let dims = target.dims();
    let mut data = Vec::with_capacity(target.size());
    let mut index = vec![0usize; dims.len()];
    let mut src_off = 0usize;
    for _ in 0..target.size() {
        data.push(x.data()[src_off]);
        for ax in (0..dims.len()).rev() {
            index[ax] += 1;
            src_off += strides[ax];
            if index[ax] < dims[ax] {
                break;
            }
            src_off -= strides[ax] * dims[ax];
            index[ax] = 0;
        }
    }
    Ok(NdArray::from_shape_vec(data, target.clone()))
}

/// Gather slices along `axis` at the given indices.
///
/// The result has the same shape as the input except the selected axis,
/// whose size becomes `indices.len()`.
///
/// # Errors
///
/// Returns `TensorError::IndexOutOfRange` for indices outside the axis.
///
/// # Examples
///
/// ```
/// use ndgrad::NdArray;
/// use ndgrad::ops::index_select;
///
/// let t = NdArray::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[3, 2]).unwrap();
/// let s = index_select(&t, 0, &[2, 0]).unwrap();
/// assert_eq!(s.shape().dims(), &[2, 2]);
/// assert_eq!(s.data(), &[5.0, 6.0, 1.0, 2.0]);
/// ```
pub fn index_select(x: &NdArray, axis: isize, indices: &[usize]) -> Result<NdArray> {
    let axis = x.shape().normalize_axis(axis)?;
    let dims = x.dims();
    let axis_size = dims[axis];
    for &i in indices {
        if i >= axis_size {
            return Err(TensorError::IndexOutOfRange {
                index: i,
                axis,
                size: axis_size,
            });
        }
    }

    if indices.is_empty() {
        return Err(TensorError::IndexOutOfRange {
            index: 0,
            axis,
            size: axis_size,
        });
    }

    let outer: usize = dims[..axis].iter().product();
    let inner: usize = dims[axis + 1..].iter().product();
    let mut out_dims = dims.to_vec();
    out_dims[axis] = indices.len();

    let mut data = Vec::with_capacity(outer * indices.len() * inner);
    for o in 0..outer {
        for &i in indices {
            let start = (o * axis_size + i) * inner;
            data.extend_from_slice(&x.data()[start..start + inner]);
        }
    }
    NdArray::from_vec(data, &out_dims)
}

/// Scatter-add slices of `src` into a copy of `x` along `axis`.
///
/// `src` must have the input's shape with the selected axis sized to
/// `indices.len()`. Repeated indices accumulate (index-accumulate), which
/// is what lets gradients scatter back into sparsely-touched regions.
/// This is the documented in-place accumulation kernel: the returned
/// buffer is mutated during construction, the inputs are not.
///
/// # Errors
///
/// Returns `TensorError::IndexOutOfRange` for out-of-bounds indices and
/// `TensorError::ShapeMismatch` when `src` has the wrong shape.
pub fn add_at(x: &NdArray, axis: isize, indices: &[usize], src: &NdArray) -> Result<NdArray> {
    let axis = x.shape().normalize_axis(axis)?;
    let dims = x.dims();
    let axis_size = dims[axis];

    let mut expected = dims.to_vec();
    expected[axis] = indices.len();
    if src.dims() != expected.as_slice() {
        return Err(TensorError::ShapeMismatch {
            op: "add_at",
            lhs: src.dims().to_vec(),
            rhs: expected,
        });
    }
    for &i in indices {
        if i >= axis_size {
            return Err(TensorError::IndexOutOfRange {
                index: i,
                axis,
                size: axis_size,
            });
        }
    }

    let outer: usize = dims[..axis].iter().product();
    let inner: usize = dims[axis + 1..].iter().product();
    let mut out = x.clone();
    for o in 0..outer {
        for (j, &i) in indices.iter().enumerate() {
            let dst = (o * axis_size + i) * inner;
            let from = (o * indices.len() + j) * inner;
            for k in 0..inner {
                out.data_mut()[dst + k] += src.data()[from + k];
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reshape_preserves_data() {
        let t = NdArray::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
        let r = reshape(&t, &[6]).unwrap();
        assert_eq!(r.dims(), &[6]);
        assert_eq!(r.data(), t.data());
    }

    #[test]
    fn test_reshape_count_mismatch() {
        let t = NdArray::zeros(&[2, 3]).unwrap();
        assert!(matches!(
            reshape(&t, &[7]),
            Err(TensorError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_permutedims_transpose() {
        let t = NdArray::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
        let p = permutedims(&t, &[1, 0]).unwrap();
        assert_eq!(p.dims(), &[3, 2]);
        for i in 0..2 {
            for j in 0..3 {
                assert_eq!(t.get(&[i, j]), p.get(&[j, i]));
            }
        }
    }

    #[test]
    fn test_permutedims_3d() {
        let mut t = NdArray::zeros(&[2, 3, 4]).unwrap();
        for i in 0..2 {
            for j in 0..3 {
                for k in 0..4 {
                    t.set(&[i, j, k], (i * 100 + j * 10 + k) as f64).unwrap();
                }
            }
        }
        let p = permutedims(&t, &[2, 0, 1]).unwrap();
        assert_eq!(p.dims(), &[4, 2, 3]);
        for i in 0..2 {
            for j in 0..3 {
                for k in 0..4 {
                    assert_eq!(t.get(&[i, j, k]), p.get(&[k, i, j]));
                }
            }
        }
    }

    #[test]
    fn test_permutedims_invalid() {
        let t = NdArray::zeros(&[2, 3]).unwrap();
        assert!(permutedims(&t, &[0]).is_err());
        assert!(permutedims(&t, &[0, 2]).is_err());
        assert!(permutedims(&t, &[0, 0]).is_err());
    }

    #[test]
    fn test_invert_permutation() {
        assert_eq!(invert_permutation(&[2, 0, 1]), vec![1, 2, 0]);
        assert_eq!(invert_permutation(&[1, 0]), vec![1, 0]);
    }

    #[test]
    fn test_transpose_batched() {
        let t = NdArray::from_vec((0..12).map(|i| i as f64).collect(), &[2, 2, 3]).unwrap();
        let tt = transpose(&t).unwrap();
        assert_eq!(tt.dims(), &[2, 3, 2]);
        for b in 0..2 {
            for i in 0..2 {
                for j in 0..3 {
                    assert_eq!(t.get(&[b, i, j]), tt.get(&[b, j, i]));
                }
            }
        }
    }

    #[test]
    fn test_transpose_rank1() {
        let t = NdArray::zeros(&[3]).unwrap();
        assert!(matches!(
            transpose(&t),
            Err(TensorError::NotSupportedAxis { .. })
        ));
    }

    #[test]
    fn test_broadcast_to() {
        let t = NdArray::from_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap();
        let b = broadcast_to(&t, &Shape::of(&[2, 3]).unwrap()).unwrap();
        assert_eq!(b.data(), &[1.0, 2.0, 3.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_broadcast_to_column() {
        let t = NdArray::from_vec(vec![1.0, 2.0], &[2, 1]).unwrap();
        let b = broadcast_to(&t, &Shape::of(&[2, 3]).unwrap()).unwrap();
        assert_eq!(b.data(), &[1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_broadcast_to_incompatible() {
        let t = NdArray::zeros(&[2, 3]).unwrap();
        assert!(broadcast_to(&t, &Shape::of(&[3]).unwrap()).is_err());
    }

    #[test]
    fn test_index_select_inner_axis() {
        let t = NdArray::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
        let s = index_select(&t, 1, &[2, 2, 0]).unwrap();
        assert_eq!(s.dims(), &[2, 3]);
        assert_eq!(s.data(), &[3.0, 3.0, 1.0, 6.0, 6.0, 4.0]);
    }

    #[test]
    fn test_index_select_out_of_range() {
        let t = NdArray::zeros(&[2, 3]).unwrap();
        assert!(matches!(
            index_select(&t, 1, &[3]),
            Err(TensorError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_add_at_accumulates_repeats() {
        let x = NdArray::zeros(&[3, 2]).unwrap();
        let src = NdArray::from_vec(vec![1.0, 2.0, 10.0, 20.0, 100.0, 200.0], &[3, 2]).unwrap();
        // Index 1 appears twice: contributions must sum, not overwrite.
        let out = add_at(&x, 0, &[1, 1, 2], &src).unwrap();
        assert_eq!(out.data(), &[0.0, 0.0, 11.0, 22.0, 100.0, 200.0]);
    }

    #[test]
    fn test_add_at_shape_mismatch() {
        let x = NdArray::zeros(&[3, 2]).unwrap();
        let src = NdArray::zeros(&[2, 2]).unwrap();
        assert!(matches!(
            add_at(&x, 0, &[0, 1, 2], &src),
            Err(TensorError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_add_at_out_of_range() {
        let x = NdArray::zeros(&[3, 2]).unwrap();
        let src = NdArray::zeros(&[1, 2]).unwrap();
        assert!(matches!(
            add_at(&x, 0, &[5], &src),
            Err(TensorError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_index_select_add_at_roundtrip() {
        // Gradient pattern: gather then scatter back accumulates correctly.
        let x = NdArray::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[4]).unwrap();
        let picked = index_select(&x, 0, &[0, 0, 3]).unwrap();
        assert_eq!(picked.data(), &[1.0, 1.0, 4.0]);
        let grad = add_at(&NdArray::zeros_like(&x), 0, &[0, 0, 3], &NdArray::ones(&[3]).unwrap())
            .unwrap();
        assert_eq!(grad.data(), &[2.0, 0.0, 0.0, 1.0]);
    }
}
