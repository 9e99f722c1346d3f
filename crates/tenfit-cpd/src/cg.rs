//! Preconditioned conjugate gradient for the damped normal equations
//!
//! Solves `(JᵀJ + damp · Γ) y = −g` in the symmetrically preconditioned
//! form `M A M ŷ = M b`, `y = M ŷ`, with a diagonal `M`. The solve is
//! inexact on purpose: the iteration budget is small early on and grows
//! with the outer iteration.

use scirs2_core::ndarray_ext::{ArrayView1, Zip};
use scirs2_core::random::{rngs::StdRng, thread_rng, Rng, SeedableRng};
use tenfit_core::DenseND;

use crate::error::{CpdError, CpdResult};
use crate::factors::FactorSet;
use crate::inner::{InnerSolver, InnerStep};
use crate::operators::{DampedNormalOperator, JacobianOperator, SymmetricOperator};
use crate::precond::{preconditioner, regularization, DEGENERATE_GUARD};
use crate::workspace::{CgBuffers, Workspace};

/// Summary of one CG run
#[derive(Debug, Clone, PartialEq)]
pub struct CgOutcome {
    pub iterations: usize,
    /// Final squared residual norm of the preconditioned system
    pub residual_norm: f64,
    /// Squared residual norm after each iteration
    pub residual_history: Vec<f64>,
}

/// Run at most `maxiter` preconditioned CG iterations on `op · y = rhs`.
///
/// The solution is written to `buffers.solution`. Iteration stops early when
/// the squared residual norm drops to `tol` or stalls (see [`has_plateaued`]).
///
/// # Errors
///
/// Returns an error if the operands do not match the buffer length.
pub fn preconditioned_cg<A>(
    op: &A,
    precond: &ArrayView1<f64>,
    rhs: &ArrayView1<f64>,
    maxiter: usize,
    tol: f64,
    buffers: &mut CgBuffers,
) -> CpdResult<CgOutcome>
where
    A: SymmetricOperator + ?Sized,
{
    let n = buffers.solution.len();
    if precond.len() != n || rhs.len() != n {
        return Err(CpdError::InvalidOption(format!(
            "CG operands have lengths {} and {}, expected {}",
            precond.len(),
            rhs.len(),
            n
        )));
    }

    let CgBuffers {
        residual,
        direction,
        scaled,
        product,
        iterate,
        solution,
    } = buffers;

    iterate.fill(0.0);
    Zip::from(&mut *residual)
        .and(precond)
        .and(rhs)
        .for_each(|r, &m, &b| *r = m * b);
    direction.assign(&*residual);

    let mut residual_norm = residual.dot(&*residual);
    if residual_norm == 0.0 {
        residual_norm = DEGENERATE_GUARD;
    }

    let window = 2 + maxiter / 5;
    let mut history = Vec::with_capacity(maxiter);

    for _ in 0..maxiter {
        Zip::from(&mut *scaled)
            .and(precond)
            .and(&*direction)
            .for_each(|q, &m, &p| *q = m * p);
        op.apply(&scaled.view(), product)?;
        Zip::from(&mut *product)
            .and(precond)
            .for_each(|z, &m| *z *= m);

        let mut denominator = direction.dot(&*product);
        if denominator == 0.0 {
            denominator = DEGENERATE_GUARD;
        }

        let alpha = residual_norm / denominator;
        iterate.scaled_add(alpha, &*direction);
        residual.scaled_add(-alpha, &*product);

        let updated = residual.dot(&*residual);
        let beta = updated / residual_norm;
        residual_norm = updated;
        Zip::from(&mut *direction)
            .and(&*residual)
            .for_each(|p, &r| *p = r + beta * *p);

        history.push(residual_norm);
        if residual_norm <= tol || has_plateaued(&history, window) {
            break;
        }
    }

    Zip::from(solution)
        .and(precond)
        .and(&*iterate)
        .for_each(|s, &m, &y| *s = m * y);

    Ok(CgOutcome {
        iterations: history.len(),
        residual_norm,
        residual_history: history,
    })
}

/// True when the mean of the last `window` entries is no smaller than the
/// mean of the `window` entries before them
pub fn has_plateaued(history: &[f64], window: usize) -> bool {
    if window == 0 || history.len() < 2 * window {
        return false;
    }
    let end = history.len();
    let mean = |slice: &[f64]| slice.iter().sum::<f64>() / slice.len() as f64;
    let recent = mean(&history[end - window..end]);
    let previous = mean(&history[end - 2 * window..end - window]);
    recent >= previous
}

#[derive(Debug)]
enum Budget {
    Randomized { factor: f64, rng: StdRng },
    Fixed(usize),
}

/// CG inner solver (`cg` and `cg_static`)
#[derive(Debug)]
pub struct CgSolver {
    budget: Budget,
    tol: f64,
}

impl CgSolver {
    /// Budget `1 + ⌊factor · U{⌊1 + it^0.4⌋, …, ⌊2 + it^0.9⌋ − 1}⌋`; `seed = None` draws from entropy
    pub fn randomized(factor: f64, tol: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => {
                let mut thread_rng_instance = thread_rng();
                StdRng::from_rng(&mut thread_rng_instance)
            }
        };
        Self {
            budget: Budget::Randomized { factor, rng },
            tol,
        }
    }

    /// The same budget on every outer iteration
    pub fn fixed(maxiter: usize, tol: f64) -> Self {
        Self {
            budget: Budget::Fixed(maxiter),
            tol,
        }
    }

    /// Iteration budget for outer iteration `iteration`, before the R · Σ dims cap
    pub fn budget(&mut self, iteration: usize) -> usize {
        match &mut self.budget {
            Budget::Fixed(maxiter) => *maxiter,
            Budget::Randomized { factor, rng } => {
                let it = iteration as f64;
                let low = (1.0 + it.powf(0.4)).floor() as usize;
                let high = ((2.0 + it.powf(0.9)).floor() as usize).max(low + 1);
                let draw = rng.random_range(low..high);
                1 + (*factor * draw as f64).floor() as usize
            }
        }
    }
}

impl InnerSolver for CgSolver {
    fn solve(
        &mut self,
        tensor: &DenseND<f64>,
        factors: &mut FactorSet,
        workspace: &mut Workspace,
        damp: f64,
        iteration: usize,
    ) -> CpdResult<InnerStep> {
        let maxiter = self.budget(iteration).min(workspace.layout.len());
        let matrices = factors.matrices();

        workspace.gram.refresh(matrices)?;
        regularization(&workspace.layout, &workspace.gram, &mut workspace.gamma);
        preconditioner(
            &workspace.layout,
            &workspace.gram,
            &workspace.gamma.view(),
            damp,
            &mut workspace.precond,
        );

        let jacobian = JacobianOperator::new(matrices, &workspace.layout, &workspace.gram);
        jacobian.gradient(tensor, &mut workspace.gradient)?;

        let op = DampedNormalOperator::new(jacobian, workspace.gamma.view(), damp);
        // The step for −g is the negated solution for g
        let outcome = preconditioned_cg(
            &op,
            &workspace.precond.view(),
            &workspace.gradient.view(),
            maxiter,
            self.tol,
            &mut workspace.cg,
        )?;
        workspace.cg.solution.mapv_inplace(|v| -v);

        log::trace!(
            "cg: {} iterations (budget {}), residual {:.3e}",
            outcome.iterations,
            maxiter,
            outcome.residual_norm
        );

        Ok(InnerStep {
            iterations: outcome.iterations,
            predicted_error: Some(outcome.residual_norm),
        })
    }
}
