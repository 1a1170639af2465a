//! Dense n-dimensional tensors with define-by-run reverse-mode
//! automatic differentiation.
//!
//! The crate has two layers:
//!
//! - [`ops`]: pure tensor kernels over [`NdArray`] (broadcast
//!   element-wise maps, axis reductions, structural ops, GEMM-backed
//!   matmul, im2col convolution, stable softmax);
//! - [`autodiff`]: an arena-based computation graph ([`Graph`]) that
//!   records kernel applications as they run and replays them in reverse
//!   to accumulate gradients.
//!
//! # Examples
//!
//! ```
//! use ndgrad::{Graph, NdArray};
//!
//! let mut g = Graph::new();
//! let x = g.leaf(NdArray::from_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap());
//! let y = g.sigmoid(x).unwrap();
//! let loss = g.mean(y, None, false).unwrap();
//! g.backward(loss).unwrap();
//! assert_eq!(g.grad(x).unwrap().dims(), &[3]);
//! ```

pub mod autodiff;
pub mod error;
pub mod ops;
pub mod random;
pub mod shape;
pub mod strides;
pub mod tensor;

pub use autodiff::{FnId, Function, Graph, VarId};
pub use error::{Result, TensorError};
pub use shape::Shape;
pub use tensor::NdArray;
