//! Damped Gauss-Newton outer loop
//!
//! Each outer iteration asks the selected [`InnerSolver`] for a step,
//! applies it to the flat parameter vector, runs the post-step transforms,
//! re-evaluates the relative error, adapts the damping and checks the stop
//! rules. The best factors seen so far are what the caller gets back.

use std::fmt;

use scirs2_core::ndarray_ext::{Array1, Array2};
use tenfit_core::DenseND;

use crate::als::AlsSolver;
use crate::cg::CgSolver;
use crate::error::{CpdError, CpdResult};
use crate::factors::{FactorSet, ModeFactor};
use crate::inner::InnerSolver;
use crate::operators::relative_error;
use crate::options::{Damping, DgnOptions, InnerMethod};
use crate::transform::transform;
use crate::workspace::{Layout, Workspace};

/// Largest supported tensor order
pub const MAX_ORDER: usize = 12;

/// "Previous error" of the first gain ratio. `init_error` only seeds the
/// best error.
pub const INITIAL_REFERENCE_ERROR: f64 = 1.0;

/// Why the outer loop terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StopReason {
    /// Relative error below `tol`
    RelativeError,
    /// Relative step below `tol_step`
    StepSize,
    /// Error improvement below `tol_improv`
    Improvement,
    /// Gradient infinity norm below `tol_grad`
    Gradient,
    /// Windowed mean of the errors stopped decreasing
    ErrorPlateau,
    /// `maxiter` outer iterations were run
    MaxIterations,
    /// Error blew up past the divergence guard
    Diverged,
}

impl StopReason {
    /// Numeric stop code, 0 to 6
    pub fn code(&self) -> u8 {
        match self {
            StopReason::RelativeError => 0,
            StopReason::StepSize => 1,
            StopReason::Improvement => 2,
            StopReason::Gradient => 3,
            StopReason::ErrorPlateau => 4,
            StopReason::MaxIterations => 5,
            StopReason::Diverged => 6,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            StopReason::RelativeError => "Relative error is small enough.",
            StopReason::StepSize => "Steps are small enough.",
            StopReason::Improvement => "Improvement in the relative error is small enough.",
            StopReason::Gradient => "Gradient is small enough.",
            StopReason::ErrorPlateau => "Average of relative errors increased.",
            StopReason::MaxIterations => "Limit of iterations was reached.",
            StopReason::Diverged => "dGN diverged.",
        }
    }

    /// Whether the run ended because a convergence criterion was met
    pub fn is_converged(&self) -> bool {
        self.code() <= 4
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.code())
    }
}

/// Result of [`dgn`]
///
/// Every per-iteration vector has one entry per outer iteration run.
#[derive(Debug, Clone)]
pub struct DgnOutput {
    /// Factors with the smallest relative error seen, including the start
    pub factors: Vec<Array2<f64>>,
    /// ‖x − x_prev‖ / ‖x_prev‖
    pub step_sizes: Vec<f64>,
    /// Relative error after each iteration
    pub errors: Vec<f64>,
    /// |errors[it] − errors[it − 1]|, errors[0] on the first iteration
    pub improvements: Vec<f64>,
    /// ‖g‖∞ at the point each step was computed from
    pub gradients: Vec<f64>,
    /// Error model value fed to the damping update, `‖T‖ · error` for ALS
    pub predicted_errors: Vec<f64>,
    /// Damping each iteration's inner solve ran with
    pub dampings: Vec<f64>,
    /// Inner iterations per outer iteration (0 for ALS)
    pub inner_iterations: Vec<usize>,
    /// Running minimum of the relative error
    pub best_errors: Vec<f64>,
    pub stop: StopReason,
    pub best_error: f64,
    pub iterations: usize,
}

impl DgnOutput {
    pub fn stop_code(&self) -> u8 {
        self.stop.code()
    }

    /// Relative error of the last iteration
    pub fn final_error(&self) -> Option<f64> {
        self.errors.last().copied()
    }
}

/// Check a problem before any iteration runs.
///
/// # Errors
///
/// - [`CpdError::UnsupportedOrder`] unless the tensor has 2 to 12 modes
/// - [`CpdError::DegenerateDimension`] for a mode of size below 2
/// - [`CpdError::InvalidRank`] for rank 0
/// - [`CpdError::RankAboveBound`] for a third-order tensor with rank above
///   `min(I·J, I·K, J·K)`
/// - [`CpdError::ShapeMismatch`] / [`CpdError::RankMismatch`] for factors
///   that are not `dim_l × rank`
/// - [`CpdError::SymmetryRequiresEqualDims`] for `symm` with unequal dims
/// - [`CpdError::InvalidOption`] for bad option values or initial error
pub fn validate_problem(
    tensor: &DenseND<f64>,
    initial: &[ModeFactor],
    rank: usize,
    init_error: f64,
    options: &DgnOptions,
) -> CpdResult<()> {
    let dims = tensor.shape();
    let order = dims.len();

    if !(2..=MAX_ORDER).contains(&order) {
        return Err(CpdError::UnsupportedOrder(order));
    }
    if let Some((mode, &dim)) = dims.iter().enumerate().find(|(_, &d)| d < 2) {
        return Err(CpdError::DegenerateDimension { mode, dim });
    }
    if rank == 0 {
        return Err(CpdError::InvalidRank(rank));
    }
    if order == 3 {
        let bound = (dims[0] * dims[1]).min(dims[0] * dims[2]).min(dims[1] * dims[2]);
        if rank > bound {
            return Err(CpdError::RankAboveBound { rank, bound });
        }
    }
    if initial.len() != order {
        return Err(CpdError::InvalidOption(format!(
            "expected {} factor matrices, got {}",
            order,
            initial.len()
        )));
    }

    for (mode, factor) in initial.iter().enumerate() {
        let (rows, cols) = factor.matrix().dim();
        if cols != rank {
            return Err(CpdError::RankMismatch {
                mode,
                expected: rank,
                actual: cols,
            });
        }
        if rows != dims[mode] {
            return Err(CpdError::ShapeMismatch {
                mode,
                expected: (dims[mode], rank),
                actual: (rows, cols),
            });
        }
    }

    if options.symm && dims.iter().any(|&d| d != dims[0]) {
        return Err(CpdError::SymmetryRequiresEqualDims(dims.to_vec()));
    }
    if !init_error.is_finite() || init_error < 0.0 {
        return Err(CpdError::InvalidOption(format!(
            "init_error must be finite and non-negative, got {}",
            init_error
        )));
    }

    options.validate()
}

/// Damped Gauss-Newton CPD refinement
///
/// Refines `initial` towards a rank-`rank` CPD of `tensor`. At most one
/// entry of `initial` may be [`ModeFactor::Fixed`]; that mode is returned
/// unchanged.
///
/// # Arguments
///
/// * `tensor` - Tensor to approximate (2 to 12 modes)
/// * `initial` - Starting factor matrices, `dim_l × rank` each
/// * `rank` - Number of rank-one terms
/// * `init_error` - Relative error of `initial`; seeds the best error and
///   the first gain ratio
/// * `options` - Stop rules, damping and inner-method configuration
///
/// # Errors
///
/// Everything [`validate_problem`] rejects. Non-convergence is not an error;
/// it is reported through [`DgnOutput::stop`].
///
/// # Complexity
///
/// Per outer iteration: O(L · R · ∏ dims) for the gradient and error, plus
/// O(k · L² · R² · Σ dims) for k CG iterations.
///
/// # Examples
///
/// ```
/// use tenfit_core::synthetic::{perturb, random_cpd};
/// use tenfit_cpd::{dgn, relative_error, DgnOptions, InnerMethod, ModeFactor};
///
/// let (tensor, exact) = random_cpd(&[4, 4, 4], 2, 1).unwrap();
/// let start = perturb(&exact, 0.05, 2);
/// let init_error = relative_error(&tensor, &start).unwrap();
///
/// let options = DgnOptions::default()
///     .with_init_damp(1e-3)
///     .with_inner_method(InnerMethod::CgStatic);
/// let initial: Vec<ModeFactor> = start.into_iter().map(ModeFactor::from).collect();
/// let out = dgn(&tensor, initial, 2, init_error, &options).unwrap();
///
/// assert!(out.best_error <= init_error);
/// assert_eq!(out.errors.len(), out.iterations);
/// ```
pub fn dgn(
    tensor: &DenseND<f64>,
    initial: Vec<ModeFactor>,
    rank: usize,
    init_error: f64,
    options: &DgnOptions,
) -> CpdResult<DgnOutput> {
    validate_problem(tensor, &initial, rank, init_error, options)?;

    let mut factors = FactorSet::new(initial)?;
    let mut workspace = Workspace::new(Layout::new(
        tensor.shape(),
        rank,
        factors.fixed_mode(),
    ));

    let tensor_norm = tensor.frobenius_norm();
    let plateau = 1 + options.maxiter / 10;
    let mut damp = options.init_damp.initial(tensor.mean_abs());

    let mut cg = CgSolver::randomized(options.cg_factor, options.cg_tol, options.seed);
    let mut cg_static = CgSolver::fixed(options.cg_maxiter, options.cg_tol);
    let mut als = AlsSolver::new();

    let mut x = factors.flatten()?;
    let mut old_x = Array1::<f64>::zeros(x.len());
    let mut error = INITIAL_REFERENCE_ERROR;
    let mut best_error = init_error;
    let mut best_factors = factors.matrices().to_vec();
    let mut stop = StopReason::MaxIterations;

    let capacity = options.maxiter;
    let mut step_sizes = Vec::with_capacity(capacity);
    let mut errors: Vec<f64> = Vec::with_capacity(capacity);
    let mut improvements = Vec::with_capacity(capacity);
    let mut gradients = Vec::with_capacity(capacity);
    let mut predicted_errors = Vec::with_capacity(capacity);
    let mut dampings = Vec::with_capacity(capacity);
    let mut inner_iterations = Vec::with_capacity(capacity);
    let mut best_errors = Vec::with_capacity(capacity);

    let level = if options.display > 1 {
        log::Level::Info
    } else {
        log::Level::Debug
    };

    for it in 0..options.maxiter {
        old_x.assign(&x);
        let old_error = error;

        let method = options.inner_method.at(it);
        let solver: &mut dyn InnerSolver = match method {
            InnerMethod::Cg => &mut cg,
            InnerMethod::CgStatic => &mut cg_static,
            InnerMethod::Als => &mut als,
        };
        let step = solver.solve(tensor, &mut factors, &mut workspace, damp, it)?;

        // ALS updates the factors itself and leaves a zero step
        x = factors.flatten()?;
        x += &workspace.cg.solution;
        factors.unflatten_into(&x.view())?;
        transform(
            &mut factors,
            &options.constraints,
            options.symm,
            options.factors_norm,
        );
        x = factors.flatten()?;

        error = relative_error(tensor, factors.matrices())?;
        if error < best_error {
            best_error = error;
            best_factors = factors.matrices().to_vec();
        }

        let predicted = step.predicted_error.unwrap_or(tensor_norm * error);
        dampings.push(damp);
        damp = next_damping(&options.init_damp, damp, old_error, error, predicted, it);

        let step_size = relative_step(&x, &old_x);
        let gradient_norm = workspace
            .gradient
            .iter()
            .fold(0.0f64, |acc, &g| acc.max(g.abs()));
        let improvement = match errors.last() {
            Some(&previous) => (previous - error).abs(),
            None => error,
        };

        errors.push(error);
        step_sizes.push(step_size);
        improvements.push(improvement);
        gradients.push(gradient_norm);
        predicted_errors.push(predicted);
        inner_iterations.push(step.iterations);
        best_errors.push(best_error);

        log::log!(
            level,
            "dgn {:>5} | {} | error {:.5e} | step {:.5e} | improvement {:.5e} | grad {:.5e} | predicted {:.5e} | inner {}",
            it + 1,
            method,
            error,
            step_size,
            improvement,
            gradient_norm,
            predicted,
            step.iterations
        );

        let snapshot = IterationStats {
            error,
            step_size,
            improvement,
            gradient_norm,
        };
        if let Some(reason) = check_stop(it, &errors, &snapshot, options, tensor_norm, plateau) {
            stop = reason;
            break;
        }
    }

    let iterations = errors.len();
    log::info!(
        "dgn finished after {} iterations, best error {:.5e}: {}",
        iterations,
        best_error,
        stop.message()
    );

    Ok(DgnOutput {
        factors: best_factors,
        step_sizes,
        errors,
        improvements,
        gradients,
        predicted_errors,
        dampings,
        inner_iterations,
        best_errors,
        stop,
        best_error,
        iterations,
    })
}

/// Values of one iteration that the stop rules look at
#[derive(Debug, Clone, Copy)]
struct IterationStats {
    error: f64,
    step_size: f64,
    improvement: f64,
    gradient_norm: f64,
}

/// Damping for the iteration after `iteration`.
///
/// A schedule is read at `iteration`, so iterations 0 and 1 both run with
/// its first entry. The adaptive policy uses the gain
/// ratio `ρ = 2 (old − new) / (old − predicted)`: halve below 0.75, grow by
/// 1.5 above 0.9.
fn next_damping(
    policy: &Damping,
    damp: f64,
    old_error: f64,
    error: f64,
    predicted: f64,
    iteration: usize,
) -> f64 {
    if let Some(scheduled) = policy.scheduled(iteration) {
        return scheduled;
    }

    let gain_ratio = if old_error != predicted {
        2.0 * (old_error - error) / (old_error - predicted)
    } else {
        1.0
    };

    if gain_ratio < 0.75 {
        damp / 2.0
    } else if gain_ratio > 0.9 {
        1.5 * damp
    } else {
        damp
    }
}

fn relative_step(x: &Array1<f64>, old_x: &Array1<f64>) -> f64 {
    let diff = x
        .iter()
        .zip(old_x.iter())
        .map(|(a, b)| (a - b) * (a - b))
        .sum::<f64>()
        .sqrt();
    let scale = old_x.dot(old_x).sqrt();
    if scale > 0.0 {
        diff / scale
    } else {
        diff
    }
}

/// Stop rules, checked in code order from the third iteration on
fn check_stop(
    it: usize,
    errors: &[f64],
    stats: &IterationStats,
    options: &DgnOptions,
    tensor_norm: f64,
    plateau: usize,
) -> Option<StopReason> {
    if it <= 1 {
        return None;
    }
    if stats.error < options.tol {
        return Some(StopReason::RelativeError);
    }
    if stats.step_size < options.tol_step {
        return Some(StopReason::StepSize);
    }
    if stats.improvement < options.tol_improv {
        return Some(StopReason::Improvement);
    }
    if stats.gradient_norm < options.tol_grad {
        return Some(StopReason::Gradient);
    }
    if it > 2 * plateau && it % plateau == 0 {
        let mean = |s: &[f64]| s.iter().sum::<f64>() / s.len() as f64;
        let earlier = mean(&errors[it - 2 * plateau..it - plateau]);
        let recent = mean(&errors[it - plateau..it]);
        if earlier - recent <= options.tol_improv {
            return Some(StopReason::ErrorPlateau);
        }
    }
    if stats.error > tensor_norm.powi(2).max(1.0) / (1e-16 + options.tol) {
        return Some(StopReason::Diverged);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use scirs2_core::ndarray_ext::array;

    fn stats(error: f64) -> IterationStats {
        IterationStats {
            error,
            step_size: 1.0,
            improvement: 1.0,
            gradient_norm: 1.0,
        }
    }

    #[test]
    fn test_stop_codes_and_messages() {
        let all = [
            StopReason::RelativeError,
            StopReason::StepSize,
            StopReason::Improvement,
            StopReason::Gradient,
            StopReason::ErrorPlateau,
            StopReason::MaxIterations,
            StopReason::Diverged,
        ];
        for (code, reason) in all.iter().enumerate() {
            assert_eq!(reason.code() as usize, code);
        }
        assert_eq!(StopReason::Diverged.message(), "dGN diverged.");
        assert!(StopReason::Gradient.is_converged());
        assert!(!StopReason::MaxIterations.is_converged());
        assert!(StopReason::StepSize.to_string().ends_with("(1)"));
    }

    #[test]
    fn test_no_stop_before_third_iteration() {
        let options = DgnOptions::default();
        let tiny = IterationStats {
            error: 0.0,
            step_size: 0.0,
            improvement: 0.0,
            gradient_norm: 0.0,
        };
        assert_eq!(check_stop(0, &[0.0], &tiny, &options, 1.0, 21), None);
        assert_eq!(check_stop(1, &[0.0, 0.0], &tiny, &options, 1.0, 21), None);
        assert_eq!(
            check_stop(2, &[0.0; 3], &tiny, &options, 1.0, 21),
            Some(StopReason::RelativeError)
        );
    }

    #[test]
    fn test_stop_rule_order() {
        let options = DgnOptions::default();
        let mut s = stats(0.5);
        s.step_size = 0.0;
        s.improvement = 0.0;
        assert_eq!(
            check_stop(5, &[0.5; 6], &s, &options, 1.0, 21),
            Some(StopReason::StepSize)
        );
        s.step_size = 1.0;
        assert_eq!(
            check_stop(5, &[0.5; 6], &s, &options, 1.0, 21),
            Some(StopReason::Improvement)
        );
        s.improvement = 1.0;
        s.gradient_norm = 0.0;
        assert_eq!(
            check_stop(5, &[0.5; 6], &s, &options, 1.0, 21),
            Some(StopReason::Gradient)
        );
    }

    #[test]
    fn test_error_plateau() {
        let options = DgnOptions::default().with_maxiter(20);
        let plateau = 1 + 20 / 10;
        // Flat errors over two windows of size 3
        let errors = vec![0.5; 7];
        assert_eq!(
            check_stop(6, &errors, &stats(0.5), &options, 1.0, plateau),
            None
        );
        let errors = vec![0.5; 10];
        assert_eq!(
            check_stop(9, &errors, &stats(0.5), &options, 1.0, plateau),
            Some(StopReason::ErrorPlateau)
        );
        // Still decreasing: no plateau
        let decreasing: Vec<f64> = (0..10).map(|i| 1.0 - 0.05 * i as f64).collect();
        assert_eq!(
            check_stop(9, &decreasing, &stats(0.55), &options, 1.0, plateau),
            None
        );
    }

    #[test]
    fn test_divergence_guard() {
        let options = DgnOptions::default();
        let threshold = 1.0 / (1e-16 + 1e-6);
        assert_eq!(
            check_stop(3, &[1.0; 4], &stats(threshold * 2.0), &options, 0.5, 21),
            Some(StopReason::Diverged)
        );
        assert_eq!(
            check_stop(3, &[1.0; 4], &stats(threshold * 0.5), &options, 0.5, 21),
            None
        );
    }

    #[test]
    fn test_damping_update() {
        let adaptive = Damping::Scaled(1.0);
        // ρ = 2 · 0.1 / 0.1 = 2 → grow
        assert_eq!(next_damping(&adaptive, 1.0, 1.0, 0.9, 0.9, 0), 1.5);
        // ρ = 2 · 0.01 / 0.5 = 0.04 → shrink
        assert_eq!(next_damping(&adaptive, 1.0, 1.0, 0.99, 0.5, 0), 0.5);
        // ρ = 2 · 0.2 / 0.5 = 0.8 → keep
        assert_eq!(next_damping(&adaptive, 1.0, 1.0, 0.8, 0.5, 0), 1.0);
        // old == predicted → ρ = 1 → grow
        assert_eq!(next_damping(&adaptive, 2.0, 0.3, 0.1, 0.3, 0), 3.0);

        let schedule = Damping::Schedule(vec![4.0, 2.0, 1.0]);
        assert_eq!(next_damping(&schedule, 4.0, 1.0, 0.5, 0.5, 0), 4.0);
        assert_eq!(next_damping(&schedule, 4.0, 1.0, 0.5, 0.5, 1), 2.0);
        assert_eq!(next_damping(&schedule, 2.0, 1.0, 0.5, 0.5, 2), 1.0);
        assert_eq!(next_damping(&schedule, 1.0, 1.0, 0.5, 0.5, 9), 1.0);
    }

    #[test]
    fn test_first_gain_ratio_uses_unit_reference() {
        let adaptive = Damping::Scaled(1.0);
        // init_error 0.01, new error 0.005, predicted 0.02:
        // ρ = 2 · 0.995 / 0.98 > 0.9 against the unit reference → grow
        assert_eq!(
            next_damping(&adaptive, 1.0, INITIAL_REFERENCE_ERROR, 0.005, 0.02, 0),
            1.5
        );
        // the same numbers against init_error would give ρ = −1 and shrink
        assert_eq!(next_damping(&adaptive, 1.0, 0.01, 0.005, 0.02, 0), 0.5);
    }

    #[test]
    fn test_relative_step() {
        let old = array![3.0, 4.0];
        let new = array![3.0, 4.5];
        assert!((relative_step(&new, &old) - 0.1).abs() < 1e-12);

        let zero = Array1::<f64>::zeros(2);
        assert!((relative_step(&old, &zero) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_validate_problem() {
        let tensor = DenseND::<f64>::zeros(&[3, 4]);
        let good = vec![
            ModeFactor::Free(Array2::zeros((3, 2))),
            ModeFactor::Free(Array2::zeros((4, 2))),
        ];
        let options = DgnOptions::default();
        assert!(validate_problem(&tensor, &good, 2, 1.0, &options).is_ok());

        assert!(matches!(
            validate_problem(&tensor, &good, 0, 1.0, &options),
            Err(CpdError::InvalidRank(0))
        ));
        assert!(matches!(
            validate_problem(&tensor, &good, 3, 1.0, &options),
            Err(CpdError::RankMismatch { mode: 0, .. })
        ));

        // Third order: rank at most min(I·J, I·K, J·K) = 4 for 2 × 2 × 3
        let cube = DenseND::<f64>::zeros(&[2, 2, 3]);
        let factors = |rank: usize| -> Vec<ModeFactor> {
            [2, 2, 3]
                .iter()
                .map(|&dim| ModeFactor::Free(Array2::zeros((dim, rank))))
                .collect()
        };
        assert!(validate_problem(&cube, &factors(4), 4, 1.0, &options).is_ok());
        assert!(matches!(
            validate_problem(&cube, &factors(5), 5, 1.0, &options),
            Err(CpdError::RankAboveBound { rank: 5, bound: 4 })
        ));

        let swapped = vec![
            ModeFactor::Free(Array2::zeros((4, 2))),
            ModeFactor::Free(Array2::zeros((3, 2))),
        ];
        assert!(matches!(
            validate_problem(&tensor, &swapped, 2, 1.0, &options),
            Err(CpdError::ShapeMismatch { mode: 0, .. })
        ));

        assert!(matches!(
            validate_problem(&tensor, &good, 2, 1.0, &options.clone().with_symmetric(true)),
            Err(CpdError::SymmetryRequiresEqualDims(_))
        ));
        assert!(validate_problem(&tensor, &good, 2, f64::NAN, &options).is_err());

        let vector = DenseND::<f64>::zeros(&[5]);
        assert!(matches!(
            validate_problem(&vector, &good[..1], 2, 1.0, &options),
            Err(CpdError::UnsupportedOrder(1))
        ));

        let thin = DenseND::<f64>::zeros(&[3, 1]);
        let thin_factors = vec![
            ModeFactor::Free(Array2::zeros((3, 1))),
            ModeFactor::Free(Array2::zeros((1, 1))),
        ];
        assert!(matches!(
            validate_problem(&thin, &thin_factors, 1, 1.0, &options),
            Err(CpdError::DegenerateDimension { mode: 1, dim: 1 })
        ));
    }
}
