//! GEMM-backed matrix multiplication.
//!
//! The 2-D kernel hands contiguous row-major blocks to faer's `matmul`;
//! batched inputs contract over the last two axes with leading batch
//! dimensions matched positionally.

use faer::linalg::matmul::matmul as faer_matmul;
use faer::{Accum, MatMut, MatRef, Par};

use crate::error::{Result, TensorError};
use crate::tensor::NdArray;

/// View a contiguous row-major block as a faer matrix.
#[inline]
pub(crate) fn mat_ref(data: &[f64], rows: usize, cols: usize) -> MatRef<'_, f64> {
    debug_assert_eq!(data.len(), rows * cols);
    MatRef::from_row_major_slice(data, rows, cols)
}

/// View a contiguous row-major block as a mutable faer matrix.
#[inline]
pub(crate) fn mat_mut(data: &mut [f64], rows: usize, cols: usize) -> MatMut<'_, f64> {
    debug_assert_eq!(data.len(), rows * cols);
    MatMut::from_row_major_slice_mut(data, rows, cols)
}

/// `dst = lhs @ rhs` for row-major blocks.
pub(crate) fn gemm_into(
    dst: &mut [f64],
    lhs: MatRef<'_, f64>,
    rhs: MatRef<'_, f64>,
    m: usize,
    n: usize,
) {
    let mut c = mat_mut(dst, m, n);
    faer_matmul(c.as_mut(), Accum::Replace, lhs, rhs, 1.0, Par::Seq);
}

/// Matrix multiplication contracting the last two axes.
///
/// Both operands must have rank at least 2. For rank 2 this is the plain
/// matrix product; for higher ranks the leading (batch) dimensions are
/// matched positionally and must be equal, and each batch slice is
/// multiplied independently.
///
/// # Errors
///
/// Returns `TensorError::ShapeMismatch` when the contraction dimensions
/// or batch dimensions do not line up, or an operand has rank below 2.
///
/// # Examples
///
/// ```
/// use ndgrad::NdArray;
/// use ndgrad::ops::matmul;
///
/// let a = NdArray::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
/// let b = NdArray::ones(&[3, 4]).unwrap();
/// let c = matmul(&a, &b).unwrap();
/// assert_eq!(c.shape().dims(), &[2, 4]);
/// assert_eq!(c.get(&[0, 0]), Some(&6.0));
/// assert_eq!(c.get(&[1, 3]), Some(&15.0));
/// ```
pub fn matmul(a: &NdArray, b: &NdArray) -> Result<NdArray> {
    if a.ndim() < 2 || b.ndim() < 2 || a.ndim() != b.ndim() {
        return Err(TensorError::ShapeMismatch {
            op: "matmul",
            lhs: a.dims().to_vec(),
            rhs: b.dims().to_vec(),
        });
    }
    let ndim = a.ndim();
    let (m, k) = (a.dims()[ndim - 2], a.dims()[ndim - 1]);
    let (kb, n) = (b.dims()[ndim - 2], b.dims()[ndim - 1]);
    let batch_a = &a.dims()[..ndim - 2];
    let batch_b = &b.dims()[..ndim - 2];
    if k != kb || batch_a != batch_b {
        return Err(TensorError::ShapeMismatch {
            op: "matmul",
            lhs: a.dims().to_vec(),
            rhs: b.dims().to_vec(),
        });
    }

    let batches: usize = batch_a.iter().product();
    let mut out_dims = batch_a.to_vec();
    out_dims.push(m);
    out_dims.push(n);

    let mut out = vec![0.0f64; batches * m * n];
    for batch in 0..batches {
        let a_block = &a.data()[batch * m * k..(batch + 1) * m * k];
        let b_block = &b.data()[batch * k * n..(batch + 1) * k * n];
        let c_block = &mut out[batch * m * n..(batch + 1) * m * n];
        gemm_into(c_block, mat_ref(a_block, m, k), mat_ref(b_block, k, n), m, n);
    }
    NdArray::from_vec(out, &out_dims)
}
