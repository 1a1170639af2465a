//! The closed set of differentiable operators.
//!
//! [`Function`] is a tagged union over every operator kind the engine
//! supports; the set is closed on purpose (no plugin surface), which
//! keeps dispatch a plain `match` and makes the forward/backward pairing
//! auditable in one place.
//!
//! Contract for every variant:
//! - `forward` is pure and deterministic given input shapes and values,
//!   and checks its arity first (`Arity` error on mismatch).
//! - `backward` returns exactly one gradient per forward input, and any
//!   shape expansion performed in forward (broadcasting) is undone by a
//!   corresponding `sum_to` reduction, so each gradient already has its
//!   input's shape when it reaches the accumulator.

use crate::error::{Result, TensorError};
use crate::ops;
use crate::ops::elementwise::{apply, scale};
use crate::ops::structural::{invert_permutation, reshape_to};
use crate::shape::Shape;
use crate::tensor::NdArray;

/// A differentiable operator.
#[derive(Debug, Clone, PartialEq)]
pub enum Function {
    /// Element-wise negation.
    Neg,
    /// Broadcast addition.
    Add,
    /// Broadcast subtraction.
    Sub,
    /// Broadcast multiplication.
    Mul,
    /// Broadcast division.
    Div,
    /// Element-wise power with a constant exponent.
    Pow {
        /// The constant exponent.
        exponent: f64,
    },
    /// Element-wise square root.
    Sqrt,
    /// Element-wise exponential.
    Exp,
    /// Element-wise natural logarithm.
    Log,
    /// Element-wise sine.
    Sin,
    /// Element-wise cosine.
    Cos,
    /// Element-wise hyperbolic tangent.
    Tanh,
    /// Element-wise logistic sigmoid.
    Sigmoid,
    /// Sum along one axis (`None` sums everything).
    Sum {
        /// Reduced axis; `None` reduces all elements.
        axis: Option<isize>,
        /// Keep the reduced axis as size 1.
        keepdims: bool,
    },
    /// Mean along one axis (`None` averages everything).
    Mean {
        /// Reduced axis; `None` reduces all elements.
        axis: Option<isize>,
        /// Keep the reduced axis as size 1.
        keepdims: bool,
    },
    /// Maximum along one axis (`None` over everything).
    Max {
        /// Reduced axis; `None` reduces all elements.
        axis: Option<isize>,
        /// Keep the reduced axis as size 1.
        keepdims: bool,
    },
    /// Minimum along one axis (`None` over everything).
    Min {
        /// Reduced axis; `None` reduces all elements.
        axis: Option<isize>,
        /// Keep the reduced axis as size 1.
        keepdims: bool,
    },
    /// (Batched) matrix multiplication over the last two axes.
    MatMul,
    /// Reshape to a fixed target shape.
    Reshape {
        /// Target dimensions.
        shape: Vec<usize>,
    },
    /// Axis permutation; `None` swaps the last two axes.
    Transpose {
        /// Explicit permutation, or `None` for a last-two-axes swap.
        perm: Option<Vec<usize>>,
    },
    /// Broadcast expansion to a fixed target shape.
    BroadcastTo {
        /// Target dimensions.
        shape: Vec<usize>,
    },
    /// 2-D convolution via im2col.
    Conv2d {
        /// Stride per spatial axis (rows, cols).
        stride: (usize, usize),
        /// Zero padding per spatial axis (rows, cols).
        pad: (usize, usize),
    },
    /// Numerically stable softmax along one axis.
    Softmax {
        /// Normalization axis.
        axis: isize,
    },
}

impl Function {
    /// Operator name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Function::Neg => "neg",
            Function::Add => "add",
            Function::Sub => "sub",
            Function::Mul => "mul",
            Function::Div => "div",
            Function::Pow { .. } => "pow",
            Function::Sqrt => "sqrt",
            Function::Exp => "exp",
            Function::Log => "log",
            Function::Sin => "sin",
            Function::Cos => "cos",
            Function::Tanh => "tanh",
            Function::Sigmoid => "sigmoid",
            Function::Sum { .. } => "sum",
            Function::Mean { .. } => "mean",
            Function::Max { .. } => "max",
            Function::Min { .. } => "min",
            Function::MatMul => "matmul",
            Function::Reshape { .. } => "reshape",
            Function::Transpose { .. } => "transpose",
            Function::BroadcastTo { .. } => "broadcast_to",
            Function::Conv2d { .. } => "conv2d",
            Function::Softmax { .. } => "softmax",
        }
    }

    /// Number of inputs this operator expects.
    pub fn arity(&self) -> usize {
        match self {
            Function::Add
            | Function::Sub
            | Function::Mul
            | Function::Div
            | Function::MatMul
            | Function::Conv2d { .. } => 2,
            _ => 1,
        }
    }

    fn check_arity(&self, actual: usize) -> Result<()> {
        if actual != self.arity() {
            return Err(TensorError::Arity {
                op: self.name(),
                expected: self.arity(),
                actual,
            });
        }
        Ok(())
    }

    /// Evaluate the operator.
    ///
    /// # Errors
    ///
    /// `Arity` on a wrong input count, plus whatever the underlying
    /// kernel raises (shape, domain, division errors).
    pub fn forward(&self, inputs: &[&NdArray]) -> Result<NdArray> {
        self.check_arity(inputs.len())?;
        match self {
            Function::Neg => Ok(ops::neg(inputs[0])),
            Function::Add => ops::add(inputs[0], inputs[1]),
            Function::Sub => ops::sub(inputs[0], inputs[1]),
            Function::Mul => ops::mul(inputs[0], inputs[1]),
            Function::Div => ops::div(inputs[0], inputs[1]),
            Function::Pow { exponent } => Ok(ops::powf(inputs[0], *exponent)),
            Function::Sqrt => ops::sqrt(inputs[0]),
            Function::Exp => Ok(ops::exp(inputs[0])),
            Function::Log => ops::log(inputs[0]),
            Function::Sin => Ok(ops::sin(inputs[0])),
            Function::Cos => Ok(ops::cos(inputs[0])),
            Function::Tanh => Ok(ops::tanh(inputs[0])),
            Function::Sigmoid => Ok(ops::sigmoid(inputs[0])),
            Function::Sum { axis, keepdims } => ops::sum(inputs[0], *axis, *keepdims),
            Function::Mean { axis, keepdims } => ops::mean(inputs[0], *axis, *keepdims),
            Function::Max { axis, keepdims } => ops::max(inputs[0], *axis, *keepdims),
            Function::Min { axis, keepdims } => ops::min(inputs[0], *axis, *keepdims),
            Function::MatMul => ops::matmul(inputs[0], inputs[1]),
            Function::Reshape { shape } => ops::reshape(inputs[0], shape),
            Function::Transpose { perm } => match perm {
                Some(perm) => ops::permutedims(inputs[0], perm),
                None => ops::transpose(inputs[0]),
            },
            Function::BroadcastTo { shape } => {
                ops::broadcast_to(inputs[0], &Shape::of(shape)?)
            }
            Function::Conv2d { stride, pad } => {
                ops::conv2d(inputs[0], inputs[1], *stride, *pad)
            }
            Function::Softmax { axis } => ops::softmax(inputs[0], *axis),
        }
    }

    /// Propagate the output gradient to each input.
    ///
    /// `inputs` and `output` are the tensors from the forward call; the
    /// returned vector holds one gradient per input, each shaped exactly
    /// like its input.
    pub fn backward(
        &self,
        inputs: &[&NdArray],
        output: &NdArray,
        gy: &NdArray,
    ) -> Result<Vec<NdArray>> {
        self.check_arity(inputs.len())?;
        match self {
            Function::Neg => Ok(vec![ops::neg(gy)]),
            Function::Add => {
                let (a, b) = (inputs[0], inputs[1]);
                Ok(vec![
                    ops::sum_to(gy, a.shape())?,
                    ops::sum_to(gy, b.shape())?,
                ])
            }
            Function::Sub => {
                let (a, b) = (inputs[0], inputs[1]);
                Ok(vec![
                    ops::sum_to(gy, a.shape())?,
                    ops::sum_to(&ops::neg(gy), b.shape())?,
                ])
            }
            Function::Mul => {
                let (a, b) = (inputs[0], inputs[1]);
                Ok(vec![
                    ops::sum_to(&ops::mul(gy, b)?, a.shape())?,
                    ops::sum_to(&ops::mul(gy, a)?, b.shape())?,
                ])
            }
            Function::Div => {
                let (a, b) = (inputs[0], inputs[1]);
                let ga = ops::div(gy, b)?;
                // d/db (a/b) = -a / b^2, computed as -(a/b)/b to reuse the
                // checked divisor.
                let quotient = ops::div(a, b)?;
                let gb = ops::neg(&ops::mul(gy, &ops::div(&quotient, b)?)?);
                Ok(vec![
                    ops::sum_to(&ga, a.shape())?,
                    ops::sum_to(&gb, b.shape())?,
                ])
            }
            Function::Pow { exponent } => {
                let x = inputs[0];
                let gx = ops::mul(gy, &scale(&ops::powf(x, exponent - 1.0), *exponent))?;
                Ok(vec![gx])
            }
            Function::Sqrt => {
                // y = sqrt(x), dy/dx = 1 / (2 sqrt(x)) = 1 / (2 y)
                Ok(vec![ops::div(gy, &scale(output, 2.0))?])
            }
            Function::Exp => Ok(vec![ops::mul(gy, output)?]),
            Function::Log => Ok(vec![ops::div(gy, inputs[0])?]),
            Function::Sin => Ok(vec![ops::mul(gy, &ops::cos(inputs[0]))?]),
            Function::Cos => Ok(vec![ops::neg(&ops::mul(gy, &ops::sin(inputs[0]))?)]),
            Function::Tanh => {
                let gx = ops::mul(gy, &apply(output, |y| 1.0 - y * y))?;
                Ok(vec![gx])
            }
            Function::Sigmoid => {
                let gx = ops::mul(gy, &apply(output, |y| y * (1.0 - y)))?;
                Ok(vec![gx])
            }
            Function::Sum { axis, keepdims } => {
                let gx = spread_reduced(gy, inputs[0], *axis, *keepdims)?;
                Ok(vec![gx])
            }
            Function::Mean { axis, keepdims } => {
                let count = crate::ops::reduce::reduced_count(inputs[0], *axis)?;
                let gx = spread_reduced(gy, inputs[0], *axis, *keepdims)?;
                Ok(vec![scale(&gx, 1.0 / count as f64)])
            }
            Function::Max { axis, keepdims } | Function::Min { axis, keepdims } => {
                // Gradient flows to every element equal to the extremum
                // (ties share the full incoming gradient).
                let x = inputs[0];
                let y_full = spread_reduced(output, x, *axis, *keepdims)?;
                let gy_full = spread_reduced(gy, x, *axis, *keepdims)?;
                let mask = ops::eq_mask(x, &y_full)?;
                Ok(vec![ops::mul(&gy_full, &mask)?])
            }
            Function::MatMul => {
                let (a, b) = (inputs[0], inputs[1]);
                let ga = ops::matmul(gy, &ops::transpose(b)?)?;
                let gb = ops::matmul(&ops::transpose(a)?, gy)?;
                Ok(vec![ga, gb])
            }
            Function::Reshape { .. } => Ok(vec![reshape_to(gy, inputs[0].shape())?]),
            Function::Transpose { perm } => match perm {
                Some(perm) => Ok(vec![ops::permutedims(gy, &invert_permutation(perm))?]),
                None => Ok(vec![ops::transpose(gy)?]),
            },
            Function::BroadcastTo { .. } => Ok(vec![ops::sum_to(gy, inputs[0].shape())?]),
            Function::Conv2d { stride, pad } => conv2d_backward(inputs, gy, *stride, *pad),
            Function::Softmax { axis } => {
                // gx = y * gy - y * sum(y * gy, axis)
                let gx = ops::mul(output, gy)?;
                let total = ops::sum(&gx, Some(*axis), true)?;
                Ok(vec![ops::sub(&gx, &ops::mul(output, &total)?)?])
            }
        }
    }
}

/// Expand a reduced gradient (or reduced value) back to the input shape:
/// reinstate the collapsed axis as size 1, then broadcast.
fn spread_reduced(
    reduced: &NdArray,
    input: &NdArray,
    axis: Option<isize>,
    keepdims: bool,
) -> Result<NdArray> {
    let expanded = if keepdims || input.ndim() == 0 {
        reduced.clone()
    } else {
        let dims = match axis {
            None => vec![1usize; input.ndim()],
            Some(axis) => {
                let axis = input.shape().normalize_axis(axis)?;
                let mut dims = input.dims().to_vec();
                dims[axis] = 1;
                dims
            }
        };
        ops::reshape(reduced, &dims)?
    };
    ops::broadcast_to(&expanded, input.shape())
}

fn conv2d_backward(
    inputs: &[&NdArray],
    gy: &NdArray,
    stride: (usize, usize),
    pad: (usize, usize),
) -> Result<Vec<NdArray>> {
    use crate::ops::matmul::{gemm_into, mat_ref};

    let (x, w) = (inputs[0], inputs[1]);
    let (oc, kh, kw) = (w.dims()[0], w.dims()[2], w.dims()[3]);
    let (n, c) = (x.dims()[0], x.dims()[1]);
    let (oh, ow) = (gy.dims()[2], gy.dims()[3]);
    let ckk = c * kh * kw;
    let rows = n * oh * ow;

    // Same unfold the forward pass used.
    let col = ops::im2col(x, kh, kw, stride, pad)?;
    // (N, OC, OH, OW) -> (N*OH*OW, OC)
    let gy_mat = ops::permutedims(gy, &[0, 2, 3, 1])?;

    // gW = gy^T @ col, reshaped to the kernel layout.
    let mut gw = vec![0.0f64; oc * ckk];
    gemm_into(
        &mut gw,
        mat_ref(gy_mat.data(), rows, oc).transpose(),
        mat_ref(col.data(), rows, ckk),
        oc,
        ckk,
    );
    let gw = NdArray::from_vec(gw, w.dims())?;

    // gx = fold(gy @ W) back through the unfold.
    let mut gcol = vec![0.0f64; rows * ckk];
    gemm_into(
        &mut gcol,
        mat_ref(gy_mat.data(), rows, oc),
        mat_ref(w.data(), oc, ckk),
        rows,
        ckk,
    );
    let gcol = NdArray::from_vec(gcol, &[rows, ckk])?;
    let gx = ops::col2im(&gcol, x.dims(), kh, kw, stride, pad)?;

    Ok(vec![gx, gw])
}
