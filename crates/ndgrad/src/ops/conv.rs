//! Convolution via im2col unfold.
//!
//! Input patches are unfolded into matrix columns so the whole
//! convolution reduces to a single GEMM against the flattened kernel,
//! reusing the optimized matmul backend instead of nested loops.
//! Layout convention: input `(N, C, H, W)`, kernel `(OC, C, KH, KW)`,
//! output `(N, OC, OH, OW)`.

use crate::error::{Result, TensorError};
use crate::ops::matmul::{gemm_into, mat_ref};
use crate::ops::structural::permutedims;
use crate::tensor::NdArray;

/// Output spatial size for one axis: `floor((in + 2*pad - kernel)/stride) + 1`.
#[inline]
pub fn conv_out_size(input: usize, kernel: usize, stride: usize, pad: usize) -> usize {
    (input + 2 * pad - kernel) / stride + 1
}

fn check_conv_geometry(
    op: &'static str,
    x: &NdArray,
    kh: usize,
    kw: usize,
    stride: (usize, usize),
    pad: (usize, usize),
) -> Result<(usize, usize, usize, usize, usize, usize)> {
    if x.ndim() != 4 {
        return Err(TensorError::ShapeMismatch {
            op,
            lhs: x.dims().to_vec(),
            rhs: vec![0, 0, 0, 0],
        });
    }
    let (n, c, h, w) = (x.dims()[0], x.dims()[1], x.dims()[2], x.dims()[3]);
    if stride.0 == 0 || stride.1 == 0 || h + 2 * pad.0 < kh || w + 2 * pad.1 < kw {
        return Err(TensorError::ShapeMismatch {
            op,
            lhs: x.dims().to_vec(),
            rhs: vec![kh, kw],
        });
    }
    let oh = conv_out_size(h, kh, stride.0, pad.0);
    let ow = conv_out_size(w, kw, stride.1, pad.1);
    Ok((n, c, h, w, oh, ow))
}

/// Unfold convolution patches into a matrix of shape
/// `(N*OH*OW, C*KH*KW)`. Out-of-bounds (padding) positions read as zero.
pub fn im2col(
    x: &NdArray,
    kh: usize,
    kw: usize,
    stride: (usize, usize),
    pad: (usize, usize),
) -> Result<NdArray> {
    let (n, c, h, w, oh, ow) = check_conv_geometry("im2col", x, kh, kw, stride, pad)?;

    let cols = c * kh * kw;
    let mut out = vec![0.0f64; n * oh * ow * cols];
    let data = x.data();
    for img in 0..n {
        for y in 0..oh {
            for xo in 0..ow {
                let row = ((img * oh + y) * ow + xo) * cols;
                for ch in 0..c {
                    for i in 0..kh {
                        let iy = (y * stride.0 + i) as isize - pad.0 as isize;
                        if iy < 0 || iy >= h as isize {
                            continue;
                        }
                        for j in 0..kw {
                            let ix = (xo * stride.1 + j) as isize - pad.1 as isize;
                            if ix < 0 || ix >= w as isize {
                                continue;
                            }
                            let src = ((img * c + ch) * h + iy as usize) * w + ix as usize;
                            out[row + (ch * kh + i) * kw + j] = data[src];
                        }
                    }
                }
            }
        }
    }
    NdArray::from_vec(out, &[n * oh * ow, cols])
}

/// Fold a patch matrix back into an image, accumulating overlaps.
///
/// Exact adjoint of [`im2col`]: positions visited by several patches sum
/// their contributions, which makes this the gradient path of the unfold.
pub fn col2im(
    col: &NdArray,
    x_dims: &[usize],
    kh: usize,
    kw: usize,
    stride: (usize, usize),
    pad: (usize, usize),
) -> Result<NdArray> {
    let reference = NdArray::zeros(x_dims)?;
    let (n, c, h, w, oh, ow) = check_conv_geometry("col2im", &reference, kh, kw, stride, pad)?;

    let cols = c * kh * kw;
    if col.dims() != [n * oh * ow, cols] {
        return Err(TensorError::ShapeMismatch {
            op: "col2im",
            lhs: col.dims().to_vec(),
            rhs: vec![n * oh * ow, cols],
        });
    }

    let mut out = reference;
    let src = col.data();
    for img in 0..n {
        for y in 0..oh {
            for xo in 0..ow {
                let row = ((img * oh + y) * ow + xo) * cols;
                for ch in 0..c {
                    for i in 0..kh {
                        let iy = (y * stride.0 + i) as isize - pad.0 as isize;
                        if iy < 0 || iy >= h as isize {
                            continue;
                        }
                        for j in 0..kw {
                            let ix = (xo * stride.1 + j) as isize - pad.1 as isize;
                            if ix < 0 || ix >= w as isize {
                                continue;
                            }
                            let dst = ((img * c + ch) * h + iy as usize) * w + ix as usize;
                            out.data_mut()[dst] += src[row + (ch * kh + i) * kw + j];
                        }
                    }
                }
            }
        }
    }
    Ok(out)
}

/// 2-D convolution (cross-correlation) of `x (N,C,H,W)` with kernel
/// `w (OC,C,KH,KW)`.
///
/// Implemented as `im2col` followed by one GEMM against the flattened
/// kernel, then reshaped to the `(N, OC, OH, OW)` feature map.
///
/// # Errors
///
/// Returns `TensorError::ShapeMismatch` when either operand is not rank 4,
/// channel counts differ, or the kernel does not fit the padded input.
pub fn conv2d(
    x: &NdArray,
    w: &NdArray,
    stride: (usize, usize),
    pad: (usize, usize),
) -> Result<NdArray> {
    if w.ndim() != 4 || x.ndim() != 4 || x.dims()[1] != w.dims()[1] {
        return Err(TensorError::ShapeMismatch {
            op: "conv2d",
            lhs: x.dims().to_vec(),
            rhs: w.dims().to_vec(),
        });
    }
    let (oc, kh, kw) = (w.dims()[0], w.dims()[2], w.dims()[3]);
    let (n, c, _, _, oh, ow) = check_conv_geometry("conv2d", x, kh, kw, stride, pad)?;

    let col = im2col(x, kh, kw, stride, pad)?;
    let ckk = c * kh * kw;

    // (N*OH*OW, CKK) @ (CKK, OC)
    let mut out_mat = vec![0.0f64; n * oh * ow * oc];
    gemm_into(
        &mut out_mat,
        mat_ref(col.data(), n * oh * ow, ckk),
        mat_ref(w.data(), oc, ckk).transpose(),
        n * oh * ow,
        oc,
    );

    let out = NdArray::from_vec(out_mat, &[n, oh, ow, oc])?;
    permutedims(&out, &[0, 3, 1, 2])
}
