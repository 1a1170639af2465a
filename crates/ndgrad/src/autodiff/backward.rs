//! Reverse-mode gradient propagation.
//!
//! `backward` seeds the terminal variable with ones and replays the tape
//! in descending generation order. The generation ordering guarantees
//! that every downstream contribution to a variable has been accumulated
//! before its creator runs, so each recorded application is visited
//! exactly once even in diamond-shaped graphs.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::autodiff::graph::{FnId, Graph, VarId};
use crate::error::{Result, TensorError};
use crate::tensor::NdArray;

/// Heap entry ordered by generation (ties broken by recording order so
/// the traversal is deterministic).
#[derive(PartialEq, Eq)]
struct Ready {
    generation: usize,
    id: FnId,
}

impl Ord for Ready {
    fn cmp(&self, other: &Self) -> Ordering {
        self.generation
            .cmp(&other.generation)
            .then_with(|| self.id.0.cmp(&other.id.0))
    }
}

impl PartialOrd for Ready {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Graph {
    /// Accumulate `d(var)/d(input)` into every reachable input's gradient.
    ///
    /// The seed gradient is a ones tensor shaped like `var`. Gradients
    /// accumulate across calls and across fan-out; use
    /// [`clear_all_grads`](Graph::clear_all_grads) between independent
    /// passes. Calling backward on a variable without a creator (a leaf,
    /// or a detached output) is a no-op.
    pub fn backward(&mut self, var: VarId) -> Result<()> {
        let Some(creator) = self.vars[var.0].creator else {
            return Ok(());
        };
        let seed = NdArray::ones_like(&self.vars[var.0].value);
        self.accumulate_grad(var, seed)?;

        let mut seen = vec![false; self.fns.len()];
        let mut heap = BinaryHeap::new();
        seen[creator.0] = true;
        heap.push(Ready {
            generation: self.fns[creator.0].generation,
            id: creator,
        });

        while let Some(Ready { id, .. }) = heap.pop() {
            let (op, inputs, output) = {
                let node = &self.fns[id.0];
                (node.op.clone(), node.inputs.clone(), node.output)
            };
            // The output grad is always present by the time its creator is
            // scheduled; a cleared grad mid-walk means the caller raced us.
            let Some(gy) = self.vars[output.0].grad.clone() else {
                continue;
            };

            let gxs = {
                let tensors: Vec<&NdArray> =
                    inputs.iter().map(|id| &self.vars[id.0].value).collect();
                op.backward(&tensors, &self.vars[output.0].value, &gy)?
            };
            debug_assert_eq!(gxs.len(), inputs.len());

            for (&input, gx) in inputs.iter().zip(gxs) {
                if !self.vars[input.0].requires_grad {
                    continue;
                }
                self.accumulate_grad(input, gx)?;
                if let Some(parent) = self.vars[input.0].creator {
                    if !seen[parent.0] {
                        seen[parent.0] = true;
                        heap.push(Ready {
                            generation: self.fns[parent.0].generation,
                            id: parent,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Add `gx` into the stored gradient of `id`, creating it on first
    /// contribution. A shape disagreement here is a fatal engine error.
    pub(crate) fn accumulate_grad(&mut self, id: VarId, gx: NdArray) -> Result<()> {
        let node = &mut self.vars[id.0];
        match &mut node.grad {
            Some(grad) => {
                if grad.shape() != gx.shape() {
                    return Err(TensorError::ShapeMismatch {
                        op: "accumulate_grad",
                        lhs: grad.dims().to_vec(),
                        rhs: gx.dims().to_vec(),
                    });
                }
                for (acc, v) in grad.data_mut().iter_mut().zip(gx.data()) {
                    *acc += v;
                }
            }
            None => node.grad = Some(gx),
        }
        Ok(())
    }

    /// Reset one variable's gradient to "not yet computed".
    pub fn clear_grad(&mut self, id: VarId) {
        self.vars[id.0].grad = None;
    }

    /// Reset every gradient in the graph. Values and recorded
    /// applications are untouched, so the same tape can be replayed.
    pub fn clear_all_grads(&mut self) {
        for var in &mut self.vars {
            var.grad = None;
        }
    }

    /// Detach one variable from its creator. Its value and id stay valid;
    /// a later backward treats it as a leaf. No-op on leaves.
    pub fn detach(&mut self, id: VarId) {
        self.vars[id.0].creator = None;
        self.vars[id.0].generation = 0;
    }

    /// Sever the entire upstream history of `id`: every creator edge
    /// reachable through its inputs is removed, turning the subgraph's
    /// variables into leaves while their values remain readable.
    pub fn unchain_backward(&mut self, id: VarId) {
        let mut stack = Vec::new();
        if let Some(creator) = self.vars[id.0].creator.take() {
            stack.push(creator);
        }
        self.vars[id.0].generation = 0;
        while let Some(fn_id) = stack.pop() {
            let inputs = self.fns[fn_id.0].inputs.clone();
            for input in inputs {
                if let Some(creator) = self.vars[input.0].creator.take() {
                    stack.push(creator);
                }
                self.vars[input.0].generation = 0;
            }
        }
    }
}
