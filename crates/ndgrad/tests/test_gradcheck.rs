//! Finite-difference validation of every differentiable operator.
//!
//! Each check builds a scalar loss `sum(op(x))` on a fresh graph, runs
//! the analytic backward pass, and compares against a central-difference
//! numerical gradient computed by re-evaluating the forward pass with
//! perturbed inputs.

use approx::assert_relative_eq;
use ndgrad::{Graph, NdArray, VarId};
use rand::SeedableRng;
use rand::rngs::StdRng;

const EPS: f64 = 1e-6;
const TOL: f64 = 1e-3;

fn rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Central-difference gradient of a scalar-valued function of `x`.
fn numerical_gradient<F>(x: &NdArray, f: F) -> NdArray
where
    F: Fn(&NdArray) -> f64,
{
    let mut grad = NdArray::zeros_like(x);
    for i in 0..x.len() {
        let mut plus = x.clone();
        plus.data_mut()[i] += EPS;
        let mut minus = x.clone();
        minus.data_mut()[i] -= EPS;
        grad.data_mut()[i] = (f(&plus) - f(&minus)) / (2.0 * EPS);
    }
    grad
}

fn assert_grads_close(analytic: &NdArray, numeric: &NdArray) {
    assert_eq!(analytic.shape(), numeric.shape());
    for (a, n) in analytic.data().iter().zip(numeric.data()) {
        assert_relative_eq!(a, n, epsilon = 1e-6, max_relative = TOL);
    }
}

/// Gradcheck a unary construction against `sum(op(x))`.
fn check_unary<F>(x: &NdArray, build: F)
where
    F: Fn(&mut Graph, VarId) -> VarId,
{
    let mut g = Graph::new();
    let id = g.leaf(x.clone());
    let y = build(&mut g, id);
    let loss = g.sum(y, None, false).unwrap();
    g.backward(loss).unwrap();
    let analytic = g.grad(id).unwrap().clone();

    let numeric = numerical_gradient(x, |xv| {
        let mut g = Graph::new();
        let id = g.leaf(xv.clone());
        let y = build(&mut g, id);
        let loss = g.sum(y, None, false).unwrap();
        g.value(loss).item().unwrap()
    });
    assert_grads_close(&analytic, &numeric);
}

/// Gradcheck both inputs of a binary construction against `sum(op(a, b))`.
fn check_binary<F>(a: &NdArray, b: &NdArray, build: F)
where
    F: Fn(&mut Graph, VarId, VarId) -> VarId,
{
    let mut g = Graph::new();
    let (ia, ib) = (g.leaf(a.clone()), g.leaf(b.clone()));
    let y = build(&mut g, ia, ib);
    let loss = g.sum(y, None, false).unwrap();
    g.backward(loss).unwrap();
    let analytic_a = g.grad(ia).unwrap().clone();
    let analytic_b = g.grad(ib).unwrap().clone();

    let eval = |av: &NdArray, bv: &NdArray| {
        let mut g = Graph::new();
        let (ia, ib) = (g.leaf(av.clone()), g.leaf(bv.clone()));
        let y = build(&mut g, ia, ib);
        let loss = g.sum(y, None, false).unwrap();
        g.value(loss).item().unwrap()
    };
    assert_grads_close(&analytic_a, &numerical_gradient(a, |av| eval(av, b)));
    assert_grads_close(&analytic_b, &numerical_gradient(b, |bv| eval(a, bv)));
}

/// Uniform values shifted away from zero, for domain-restricted ops.
fn positive(dims: &[usize], seed: u64) -> NdArray {
    let x = NdArray::random_with_rng(dims, &mut rng(seed)).unwrap();
    NdArray::from_vec(x.data().iter().map(|v| v + 0.5).collect(), dims).unwrap()
}

#[test]
fn gradcheck_neg() {
    let x = NdArray::randn_with_rng(&[2, 3], &mut rng(1)).unwrap();
    check_unary(&x, |g, x| g.neg(x).unwrap());
}

#[test]
fn gradcheck_add_broadcast() {
    let a = NdArray::randn_with_rng(&[2, 3], &mut rng(2)).unwrap();
    let b = NdArray::randn_with_rng(&[3], &mut rng(3)).unwrap();
    check_binary(&a, &b, |g, a, b| g.add(a, b).unwrap());
}

#[test]
fn gradcheck_sub_broadcast() {
    let a = NdArray::randn_with_rng(&[4, 2], &mut rng(4)).unwrap();
    let b = NdArray::randn_with_rng(&[1, 2], &mut rng(5)).unwrap();
    check_binary(&a, &b, |g, a, b| g.sub(a, b).unwrap());
}

#[test]
fn gradcheck_mul_broadcast() {
    let a = NdArray::randn_with_rng(&[2, 3], &mut rng(6)).unwrap();
    let b = NdArray::randn_with_rng(&[2, 1], &mut rng(7)).unwrap();
    check_binary(&a, &b, |g, a, b| g.mul(a, b).unwrap());
}

#[test]
fn gradcheck_div() {
    let a = NdArray::randn_with_rng(&[2, 3], &mut rng(8)).unwrap();
    let b = positive(&[3], 9);
    check_binary(&a, &b, |g, a, b| g.div(a, b).unwrap());
}

#[test]
fn gradcheck_pow() {
    let x = positive(&[2, 2], 10);
    check_unary(&x, |g, x| g.pow(x, 3.0).unwrap());
    check_unary(&x, |g, x| g.pow(x, -1.5).unwrap());
}

#[test]
fn gradcheck_sqrt() {
    let x = positive(&[3, 2], 11);
    check_unary(&x, |g, x| g.sqrt(x).unwrap());
}

#[test]
fn gradcheck_exp() {
    let x = NdArray::randn_with_rng(&[2, 3], &mut rng(12)).unwrap();
    check_unary(&x, |g, x| g.exp(x).unwrap());
}

#[test]
fn gradcheck_log() {
    let x = positive(&[2, 3], 13);
    check_unary(&x, |g, x| g.log(x).unwrap());
}

#[test]
fn gradcheck_trig() {
    let x = NdArray::randn_with_rng(&[3, 3], &mut rng(14)).unwrap();
    check_unary(&x, |g, x| g.sin(x).unwrap());
    check_unary(&x, |g, x| g.cos(x).unwrap());
}

#[test]
fn gradcheck_tanh() {
    let x = NdArray::randn_with_rng(&[2, 4], &mut rng(15)).unwrap();
    check_unary(&x, |g, x| g.tanh(x).unwrap());
}

#[test]
fn gradcheck_sigmoid() {
    let x = NdArray::randn_with_rng(&[2, 4], &mut rng(16)).unwrap();
    check_unary(&x, |g, x| g.sigmoid(x).unwrap());
}

#[test]
fn gradcheck_sum_axis() {
    let x = NdArray::randn_with_rng(&[2, 3, 4], &mut rng(17)).unwrap();
    check_unary(&x, |g, x| g.sum(x, Some(1), false).unwrap());
    check_unary(&x, |g, x| g.sum(x, Some(-1), true).unwrap());
    check_unary(&x, |g, x| g.sum(x, None, false).unwrap());
}

#[test]
fn gradcheck_mean() {
    let x = NdArray::randn_with_rng(&[3, 4], &mut rng(18)).unwrap();
    check_unary(&x, |g, x| g.mean(x, Some(0), false).unwrap());
    check_unary(&x, |g, x| g.mean(x, None, false).unwrap());
}

#[test]
fn gradcheck_max_min() {
    // randn draws make ties (and eps-wide argmax flips) negligible.
    let x = NdArray::randn_with_rng(&[3, 4], &mut rng(19)).unwrap();
    check_unary(&x, |g, x| g.max(x, Some(1), false).unwrap());
    check_unary(&x, |g, x| g.min(x, Some(0), true).unwrap());
    check_unary(&x, |g, x| g.max(x, None, false).unwrap());
}

#[test]
fn gradcheck_matmul() {
    let a = NdArray::randn_with_rng(&[2, 3], &mut rng(20)).unwrap();
    let b = NdArray::randn_with_rng(&[3, 4], &mut rng(21)).unwrap();
    check_binary(&a, &b, |g, a, b| g.matmul(a, b).unwrap());
}

#[test]
fn gradcheck_matmul_batched() {
    let a = NdArray::randn_with_rng(&[2, 2, 3], &mut rng(22)).unwrap();
    let b = NdArray::randn_with_rng(&[2, 3, 2], &mut rng(23)).unwrap();
    check_binary(&a, &b, |g, a, b| g.matmul(a, b).unwrap());
}

#[test]
fn gradcheck_reshape() {
    let x = NdArray::randn_with_rng(&[2, 6], &mut rng(24)).unwrap();
    // Reshape alone is gradient-transparent; compose with a nonlinearity
    // so the check exercises the shape bookkeeping.
    check_unary(&x, |g, x| {
        let r = g.reshape(x, &[3, 4]).unwrap();
        g.tanh(r).unwrap()
    });
}

#[test]
fn gradcheck_transpose_and_permute() {
    let x = NdArray::randn_with_rng(&[2, 3, 4], &mut rng(25)).unwrap();
    check_unary(&x, |g, x| {
        let t = g.transpose(x).unwrap();
        g.sigmoid(t).unwrap()
    });
    check_unary(&x, |g, x| {
        let p = g.permute(x, &[2, 0, 1]).unwrap();
        g.exp(p).unwrap()
    });
}

#[test]
fn gradcheck_broadcast_to() {
    let x = NdArray::randn_with_rng(&[1, 3], &mut rng(26)).unwrap();
    check_unary(&x, |g, x| {
        let b = g.broadcast_to(x, &[4, 3]).unwrap();
        g.tanh(b).unwrap()
    });
}

#[test]
fn gradcheck_conv2d() {
    let x = NdArray::randn_with_rng(&[1, 2, 4, 4], &mut rng(27)).unwrap();
    let w = NdArray::randn_with_rng(&[3, 2, 2, 2], &mut rng(28)).unwrap();
    check_binary(&x, &w, |g, x, w| g.conv2d(x, w, (1, 1), (0, 0)).unwrap());
}

#[test]
fn gradcheck_conv2d_stride_pad() {
    let x = NdArray::randn_with_rng(&[2, 1, 5, 5], &mut rng(29)).unwrap();
    let w = NdArray::randn_with_rng(&[2, 1, 3, 3], &mut rng(30)).unwrap();
    check_binary(&x, &w, |g, x, w| g.conv2d(x, w, (2, 2), (1, 1)).unwrap());
}

#[test]
fn gradcheck_softmax() {
    let x = NdArray::randn_with_rng(&[3, 4], &mut rng(31)).unwrap();
    // sum(softmax) is constant, so weight the output to get a nonzero
    // gradient through the normalization.
    check_unary(&x, |g, x| {
        let s = g.softmax(x, 1).unwrap();
        g.mul(s, s).unwrap()
    });
}

#[test]
fn gradcheck_composite_expression() {
    // loss = sum(tanh(a @ b) / (1 + exp(-a @ b))) exercises fan-out of the
    // matmul result through two nonlinear branches.
    let a = NdArray::randn_with_rng(&[2, 3], &mut rng(32)).unwrap();
    let b = NdArray::randn_with_rng(&[3, 2], &mut rng(33)).unwrap();
    check_binary(&a, &b, |g, a, b| {
        let m = g.matmul(a, b).unwrap();
        let t = g.tanh(m).unwrap();
        let s = g.sigmoid(m).unwrap();
        g.mul(t, s).unwrap()
    });
}
