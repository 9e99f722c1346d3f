//! Alternating least squares as an inner method
//!
//! One cyclic sweep over the free modes. Each mode is replaced by the
//! least-squares solution `W_l = MTTKRP_l · P1_l⁻¹` with every other mode
//! held at its latest value. No step vector is produced.

use scirs2_core::ndarray_ext::Array2;
use scirs2_linalg::lstsq;
use tenfit_core::DenseND;
use tenfit_kernels::mttkrp;

use crate::error::CpdResult;
use crate::factors::FactorSet;
use crate::inner::{InnerSolver, InnerStep};
use crate::operators::JacobianOperator;
use crate::workspace::Workspace;

#[derive(Debug, Clone, Copy, Default)]
pub struct AlsSolver;

impl AlsSolver {
    pub fn new() -> Self {
        Self
    }

    /// Update one mode in place and refresh the Gramians that depend on it
    pub fn update_mode(
        tensor: &DenseND<f64>,
        factors: &mut FactorSet,
        workspace: &mut Workspace,
        mode: usize,
    ) -> CpdResult<()> {
        if factors.is_fixed(mode) {
            return Ok(());
        }
        let rhs = {
            let views = factors.views();
            mttkrp(&tensor.view(), &views, mode)?
        };
        let updated = solve_normal_equations(&rhs, &workspace.gram.p1[mode])?;
        factors.set_free(mode, &updated);
        workspace.gram.refresh_mode(factors.matrices(), mode)?;
        Ok(())
    }
}

impl InnerSolver for AlsSolver {
    fn solve(
        &mut self,
        tensor: &DenseND<f64>,
        factors: &mut FactorSet,
        workspace: &mut Workspace,
        _damp: f64,
        _iteration: usize,
    ) -> CpdResult<InnerStep> {
        workspace.gram.refresh(factors.matrices())?;
        {
            let jacobian =
                JacobianOperator::new(factors.matrices(), &workspace.layout, &workspace.gram);
            jacobian.gradient(tensor, &mut workspace.gradient)?;
        }

        for mode in 0..factors.order() {
            Self::update_mode(tensor, factors, workspace, mode)?;
        }

        workspace.cg.solution.fill(0.0);
        Ok(InnerStep {
            iterations: 0,
            predicted_error: None,
        })
    }
}

/// Solve `X · gram = rhs` row by row.
///
/// `gram` is symmetric, so each row solves `gram · xᵢ = rhsᵢ`. A singular
/// system is retried once with a small diagonal shift.
fn solve_normal_equations(rhs: &Array2<f64>, gram: &Array2<f64>) -> CpdResult<Array2<f64>> {
    let (rows, rank) = rhs.dim();
    let mut result = Array2::<f64>::zeros((rows, rank));

    for i in 0..rows {
        let b = rhs.row(i).to_owned();

        let solution = match lstsq(&gram.view(), &b.view(), None) {
            Ok(solution) => solution,
            Err(err) => {
                log::warn!("als: singular Gramian ({}), retrying with a diagonal shift", err);
                let eps = f64::EPSILON * (rank * 10) as f64;
                let mut shifted = gram.clone();
                for k in 0..rank {
                    shifted[[k, k]] += eps;
                }
                lstsq(&shifted.view(), &b.view(), None)?
            }
        };

        result.row_mut(i).assign(&solution.x);
    }

    Ok(result)
}
