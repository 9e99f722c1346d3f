//! Interface shared by the inner step solvers

use tenfit_core::DenseND;

use crate::error::CpdResult;
use crate::factors::FactorSet;
use crate::workspace::Workspace;

/// Result of one inner solve.
///
/// The step itself is left in `Workspace::cg.solution` and the gradient at
/// the pre-step point in `Workspace::gradient`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InnerStep {
    /// Inner iterations performed; 0 when the solver has no iterations
    pub iterations: usize,
    /// Error model value used by the gain ratio. `None` means the solver has
    /// no model, and the driver uses `‖T‖ · error` at the new point.
    pub predicted_error: Option<f64>,
}

/// Computes the next outer step from the current factors
pub trait InnerSolver {
    /// Fill the workspace step and gradient for outer iteration `iteration`.
    ///
    /// Solvers that update the factors directly (ALS) leave a zero step.
    fn solve(
        &mut self,
        tensor: &DenseND<f64>,
        factors: &mut FactorSet,
        workspace: &mut Workspace,
        damp: f64,
        iteration: usize,
    ) -> CpdResult<InnerStep>;
}
