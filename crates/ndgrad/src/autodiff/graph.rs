//! Arena-based computation graph.
//!
//! Variables and operator applications live in two flat vectors inside
//! [`Graph`]; [`VarId`] and [`FnId`] are plain indices into them. This
//! keeps the define-by-run tape free of reference counting and interior
//! mutability: recording is an append, and the backward pass walks the
//! arena by index. Ids stay valid for the lifetime of the graph (nothing
//! is ever removed, only edges are severed by `unchain_backward`).

use crate::autodiff::function::Function;
use crate::error::Result;
use crate::tensor::NdArray;

/// Handle to a variable in a [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(pub(crate) usize);

/// Handle to a recorded operator application in a [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FnId(pub(crate) usize);

#[derive(Debug)]
pub(crate) struct VarNode {
    pub(crate) value: NdArray,
    pub(crate) grad: Option<NdArray>,
    pub(crate) creator: Option<FnId>,
    pub(crate) generation: usize,
    pub(crate) requires_grad: bool,
    pub(crate) name: Option<String>,
}

#[derive(Debug)]
pub(crate) struct FnNode {
    pub(crate) op: Function,
    pub(crate) inputs: Vec<VarId>,
    pub(crate) output: VarId,
    /// Max generation over the inputs; drives backward scheduling.
    pub(crate) generation: usize,
}

/// A define-by-run computation graph.
///
/// Forward evaluation and tape recording happen together in [`Graph::apply`]:
/// the operator runs immediately on the input values, and when any input
/// requires a gradient (and recording is enabled) the application is
/// appended to the tape for [`Graph::backward`](crate::autodiff::Graph::backward)
/// to replay in reverse.
///
/// # Examples
///
/// ```
/// use ndgrad::{Graph, NdArray};
///
/// let mut g = Graph::new();
/// let x = g.leaf(NdArray::scalar(3.0));
/// let y = g.mul(x, x).unwrap();
/// g.backward(y).unwrap();
/// assert_eq!(g.grad(x).unwrap().item().unwrap(), 6.0);
/// ```
#[derive(Debug, Default)]
pub struct Graph {
    pub(crate) vars: Vec<VarNode>,
    pub(crate) fns: Vec<FnNode>,
    grad_enabled: bool,
}

impl Graph {
    /// An empty graph with gradient recording enabled.
    pub fn new() -> Self {
        Self {
            vars: Vec::new(),
            fns: Vec::new(),
            grad_enabled: true,
        }
    }

    fn push_var(&mut self, value: NdArray, requires_grad: bool, name: Option<String>) -> VarId {
        let id = VarId(self.vars.len());
        self.vars.push(VarNode {
            value,
            grad: None,
            creator: None,
            generation: 0,
            requires_grad,
            name,
        });
        id
    }

    /// Register a differentiable input (generation 0, no creator).
    pub fn leaf(&mut self, value: NdArray) -> VarId {
        self.push_var(value, true, None)
    }

    /// Register a named differentiable input.
    pub fn leaf_named(&mut self, value: NdArray, name: &str) -> VarId {
        self.push_var(value, true, Some(name.to_string()))
    }

    /// Register a constant: gradients never flow into it and applications
    /// consuming only constants are not recorded.
    pub fn constant(&mut self, value: NdArray) -> VarId {
        self.push_var(value, false, None)
    }

    /// Register an input with an explicit gradient requirement.
    /// `variable(v, true)` is [`leaf`](Graph::leaf); `variable(v, false)`
    /// is [`constant`](Graph::constant).
    pub fn variable(&mut self, value: NdArray, requires_grad: bool) -> VarId {
        self.push_var(value, requires_grad, None)
    }

    /// Register a named input with an explicit gradient requirement.
    pub fn variable_named(&mut self, value: NdArray, name: &str, requires_grad: bool) -> VarId {
        self.push_var(value, requires_grad, Some(name.to_string()))
    }

    /// Run `op` on `inputs`, record the application when a gradient will
    /// be needed, and return the output variable.
    ///
    /// The output's generation is one past the maximum input generation;
    /// with recording disabled (or all inputs gradient-free) the output is
    /// a detached generation-0 variable.
    pub fn apply(&mut self, op: Function, inputs: &[VarId]) -> Result<VarId> {
        let tensors: Vec<&NdArray> = inputs.iter().map(|id| &self.vars[id.0].value).collect();
        let value = op.forward(&tensors)?;

        let record =
            self.grad_enabled && inputs.iter().any(|id| self.vars[id.0].requires_grad);
        let out = self.push_var(value, record, None);
        if record {
            let generation = inputs
                .iter()
                .map(|id| self.vars[id.0].generation)
                .max()
                .unwrap_or(0);
            let fn_id = FnId(self.fns.len());
            self.fns.push(FnNode {
                op,
                inputs: inputs.to_vec(),
                output: out,
                generation,
            });
            self.vars[out.0].creator = Some(fn_id);
            self.vars[out.0].generation = generation + 1;
        }
        Ok(out)
    }

    /// Enable or disable tape recording. Forward evaluation is unaffected;
    /// outputs produced while disabled are detached.
    pub fn set_grad_enabled(&mut self, enabled: bool) {
        self.grad_enabled = enabled;
    }

    /// Whether applications are currently recorded.
    pub fn is_grad_enabled(&self) -> bool {
        self.grad_enabled
    }

    /// The value of a variable.
    pub fn value(&self, id: VarId) -> &NdArray {
        &self.vars[id.0].value
    }

    /// The accumulated gradient of a variable, if backward has reached it.
    pub fn grad(&self, id: VarId) -> Option<&NdArray> {
        self.vars[id.0].grad.as_ref()
    }

    /// Whether gradients flow into this variable.
    pub fn requires_grad(&self, id: VarId) -> bool {
        self.vars[id.0].requires_grad
    }

    /// Topological depth of a variable (0 for leaves and detached outputs).
    pub fn generation(&self, id: VarId) -> usize {
        self.vars[id.0].generation
    }

    /// The application that produced this variable, if recorded.
    pub fn creator(&self, id: VarId) -> Option<FnId> {
        self.vars[id.0].creator
    }

    /// The optional debug name of a variable.
    pub fn name(&self, id: VarId) -> Option<&str> {
        self.vars[id.0].name.as_deref()
    }

    /// Number of variables in the arena.
    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    /// Number of recorded applications.
    pub fn num_fns(&self) -> usize {
        self.fns.len()
    }

    /// Drop every variable and recorded application. Outstanding ids
    /// become invalid.
    pub fn clear(&mut self) {
        self.vars.clear();
        self.fns.clear();
    }
}

// Operator shorthands. Each is a thin wrapper over `apply`.
impl Graph {
    /// Element-wise negation.
    pub fn neg(&mut self, x: VarId) -> Result<VarId> {
        self.apply(Function::Neg, &[x])
    }

    /// Broadcast addition.
    pub fn add(&mut self, a: VarId, b: VarId) -> Result<VarId> {
        self.apply(Function::Add, &[a, b])
    }

    /// Broadcast subtraction.
    pub fn sub(&mut self, a: VarId, b: VarId) -> Result<VarId> {
        self.apply(Function::Sub, &[a, b])
    }

    /// Broadcast multiplication.
    pub fn mul(&mut self, a: VarId, b: VarId) -> Result<VarId> {
        self.apply(Function::Mul, &[a, b])
    }

    /// Broadcast division; near-zero divisors are rejected.
    pub fn div(&mut self, a: VarId, b: VarId) -> Result<VarId> {
        self.apply(Function::Div, &[a, b])
    }

    /// Element-wise power with a constant exponent.
    pub fn pow(&mut self, x: VarId, exponent: f64) -> Result<VarId> {
        self.apply(Function::Pow { exponent }, &[x])
    }

    /// Element-wise square root.
    pub fn sqrt(&mut self, x: VarId) -> Result<VarId> {
        self.apply(Function::Sqrt, &[x])
    }

    /// Element-wise exponential.
    pub fn exp(&mut self, x: VarId) -> Result<VarId> {
        self.apply(Function::Exp, &[x])
    }

    /// Element-wise natural logarithm.
    pub fn log(&mut self, x: VarId) -> Result<VarId> {
        self.apply(Function::Log, &[x])
    }

    /// Element-wise sine.
    pub fn sin(&mut self, x: VarId) -> Result<VarId> {
        self.apply(Function::Sin, &[x])
    }

    /// Element-wise cosine.
    pub fn cos(&mut self, x: VarId) -> Result<VarId> {
        self.apply(Function::Cos, &[x])
    }

    /// Element-wise hyperbolic tangent.
    pub fn tanh(&mut self, x: VarId) -> Result<VarId> {
        self.apply(Function::Tanh, &[x])
    }

    /// Element-wise logistic sigmoid.
    pub fn sigmoid(&mut self, x: VarId) -> Result<VarId> {
        self.apply(Function::Sigmoid, &[x])
    }

    /// Sum along `axis` (all elements when `None`).
    pub fn sum(&mut self, x: VarId, axis: Option<isize>, keepdims: bool) -> Result<VarId> {
        self.apply(Function::Sum { axis, keepdims }, &[x])
    }

    /// Mean along `axis` (all elements when `None`).
    pub fn mean(&mut self, x: VarId, axis: Option<isize>, keepdims: bool) -> Result<VarId> {
        self.apply(Function::Mean { axis, keepdims }, &[x])
    }

    /// Maximum along `axis` (all elements when `None`).
    pub fn max(&mut self, x: VarId, axis: Option<isize>, keepdims: bool) -> Result<VarId> {
        self.apply(Function::Max { axis, keepdims }, &[x])
    }

    /// Minimum along `axis` (all elements when `None`).
    pub fn min(&mut self, x: VarId, axis: Option<isize>, keepdims: bool) -> Result<VarId> {
        self.apply(Function::Min { axis, keepdims }, &[x])
    }

    /// (Batched) matrix multiplication over the last two axes.
    pub fn matmul(&mut self, a: VarId, b: VarId) -> Result<VarId> {
        self.apply(Function::MatMul, &[a, b])
    }

    /// Reshape to `dims`; the element count must be preserved.
    pub fn reshape(&mut self, x: VarId, dims: &[usize]) -> Result<VarId> {
        self.apply(
            Function::Reshape {
                shape: dims.to_vec(),
            },
            &[x],
        )
    }

    /// Swap the last two axes.
    pub fn transpose(&mut self, x: VarId) -> Result<VarId> {
        self.apply(Function::Transpose { perm: None }, &[x])
    }

    /// Reorder axes by an explicit permutation.
    pub fn permute(&mut self, x: VarId, perm: &[usize]) -> Result<VarId> {
        self.apply(
            Function::Transpose {
                perm: Some(perm.to_vec()),
            },
            &[x],
        )
    }

    /// Broadcast expansion to `dims`.
    pub fn broadcast_to(&mut self, x: VarId, dims: &[usize]) -> Result<VarId> {
        self.apply(
            Function::BroadcastTo {
                shape: dims.to_vec(),
            },
            &[x],
        )
    }

    /// 2-D convolution of `x (N,C,H,W)` with kernel `w (OC,C,KH,KW)`.
    pub fn conv2d(
        &mut self,
        x: VarId,
        w: VarId,
        stride: (usize, usize),
        pad: (usize, usize),
    ) -> Result<VarId> {
        self.apply(Function::Conv2d { stride, pad }, &[x, w])
    }

    /// Numerically stable softmax along `axis`.
    pub fn softmax(&mut self, x: VarId, axis: isize) -> Result<VarId> {
        self.apply(Function::Softmax { axis }, &[x])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_is_detached() {
        let mut g = Graph::new();
        let x = g.leaf(NdArray::scalar(1.0));
        assert!(g.requires_grad(x));
        assert_eq!(g.creator(x), None);
        assert_eq!(g.generation(x), 0);
        assert_eq!(g.grad(x), None);
    }

    #[test]
    fn test_apply_records_and_bumps_generation() {
        let mut g = Graph::new();
        let x = g.leaf(NdArray::scalar(2.0));
        let y = g.exp(x).unwrap();
        let z = g.mul(y, y).unwrap();
        assert_eq!(g.generation(x), 0);
        assert_eq!(g.generation(y), 1);
        assert_eq!(g.generation(z), 2);
        assert!(g.creator(z).is_some());
        assert_eq!(g.num_fns(), 2);
    }

    #[test]
    fn test_generation_is_max_of_inputs_plus_one() {
        let mut g = Graph::new();
        let x = g.leaf(NdArray::scalar(1.0));
        let deep = {
            let a = g.exp(x).unwrap();
            g.exp(a).unwrap()
        };
        let y = g.add(deep, x).unwrap();
        assert_eq!(g.generation(deep), 2);
        assert_eq!(g.generation(y), 3);
    }

    #[test]
    fn test_constant_not_recorded() {
        let mut g = Graph::new();
        let c = g.constant(NdArray::scalar(5.0));
        let y = g.neg(c).unwrap();
        assert!(!g.requires_grad(y));
        assert_eq!(g.creator(y), None);
        assert_eq!(g.num_fns(), 0);
        assert_eq!(g.value(y).item().unwrap(), -5.0);
    }

    #[test]
    fn test_requires_grad_contagion() {
        let mut g = Graph::new();
        let x = g.leaf(NdArray::scalar(2.0));
        let c = g.constant(NdArray::scalar(3.0));
        let y = g.mul(x, c).unwrap();
        assert!(g.requires_grad(y));
        assert_eq!(g.num_fns(), 1);
    }

    #[test]
    fn test_grad_disabled_skips_recording() {
        let mut g = Graph::new();
        let x = g.leaf(NdArray::scalar(2.0));
        g.set_grad_enabled(false);
        let y = g.exp(x).unwrap();
        assert!(!g.requires_grad(y));
        assert_eq!(g.creator(y), None);
        assert_eq!(g.num_fns(), 0);
        g.set_grad_enabled(true);
        let z = g.exp(x).unwrap();
        assert!(g.creator(z).is_some());
    }

    #[test]
    fn test_forward_error_leaves_graph_usable() {
        let mut g = Graph::new();
        let a = g.leaf(NdArray::ones(&[2]).unwrap());
        let b = g.leaf(NdArray::ones(&[3]).unwrap());
        assert!(g.add(a, b).is_err());
        // Recording continues to work after the failed application.
        let y = g.add(a, a).unwrap();
        assert_eq!(g.value(y).data(), &[2.0, 2.0]);
    }

    #[test]
    fn test_named_leaf() {
        let mut g = Graph::new();
        let x = g.leaf_named(NdArray::scalar(0.0), "weight");
        assert_eq!(g.name(x), Some("weight"));
    }

    #[test]
    fn test_variable_explicit_requires_grad() {
        let mut g = Graph::new();
        let p = g.variable(NdArray::scalar(1.0), true);
        let c = g.variable(NdArray::scalar(2.0), false);
        assert!(g.requires_grad(p));
        assert!(!g.requires_grad(c));

        // Only the grad-requiring input pulls the application onto the tape.
        let y = g.mul(p, c).unwrap();
        assert!(g.requires_grad(y));
        assert_eq!(g.num_fns(), 1);
        let z = g.neg(c).unwrap();
        assert!(!g.requires_grad(z));
        assert_eq!(g.num_fns(), 1);
    }

    #[test]
    fn test_variable_named_non_grad() {
        let mut g = Graph::new();
        let m = g.variable_named(NdArray::scalar(0.5), "momentum", false);
        assert_eq!(g.name(m), Some("momentum"));
        assert!(!g.requires_grad(m));
    }
}
