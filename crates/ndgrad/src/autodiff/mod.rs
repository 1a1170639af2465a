//! Define-by-run reverse-mode automatic differentiation.
//!
//! The forward computation is recorded as it runs: [`Graph::apply`]
//! evaluates an operator eagerly and appends the application to an
//! arena-backed tape. [`Graph::backward`] then walks the tape in
//! descending generation order, accumulating gradients into every
//! variable that requires them.

mod backward;
mod function;
mod graph;

pub use function::Function;
pub use graph::{FnId, Graph, VarId};
