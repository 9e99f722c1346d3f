//! Integration tests for the damped Gauss-Newton driver
//!
//! These run full `dgn` calls on small synthetic problems with known exact
//! factors and check the stop reasons and diagnostics that come back.

use scirs2_core::ndarray_ext::Array2;
use tenfit_core::synthetic::{perturb, random_cpd, random_factors};
use tenfit_core::DenseND;
use tenfit_cpd::{
    dgn, relative_error, Constraints, CpdError, DgnOptions, InnerMethod, ModeFactor, StopReason,
};

fn free(factors: Vec<Array2<f64>>) -> Vec<ModeFactor> {
    factors.into_iter().map(ModeFactor::from).collect()
}

/// Exact tensor plus a perturbed starting point and its relative error
fn problem(
    dims: &[usize],
    rank: usize,
    seed: u64,
    noise: f64,
) -> (DenseND<f64>, Vec<Array2<f64>>, Vec<Array2<f64>>, f64) {
    let (tensor, exact) = random_cpd(dims, rank, seed).unwrap();
    let start = perturb(&exact, noise, seed + 1000);
    let init_error = relative_error(&tensor, &start).unwrap();
    (tensor, exact, start, init_error)
}

#[test]
fn test_rank1_scenario_converges_with_cg() {
    for seed in 1..4 {
        let (tensor, _, start, init_error) = problem(&[4, 4, 4], 1, seed, 0.01);
        // With the default `c = 1` the damping grows on every good step and
        // these runs end on the step-size rule near 1e-6 instead of on `tol`
        let options = DgnOptions::default().with_init_damp(1e-3).with_seed(seed);

        let out = dgn(&tensor, free(start), 1, init_error, &options).unwrap();

        assert_eq!(out.stop, StopReason::RelativeError, "seed {}", seed);
        assert!(out.iterations < 20);
        assert!(out.best_error < options.tol);
    }
}

#[test]
fn test_rank1_scenario_converges_with_cg_static() {
    let (tensor, _, start, init_error) = problem(&[4, 4, 4], 1, 7, 0.01);
    let options = DgnOptions::default()
        .with_init_damp(1e-3)
        .with_inner_method(InnerMethod::CgStatic);

    let out = dgn(&tensor, free(start), 1, init_error, &options).unwrap();

    assert_eq!(out.stop_code(), 0);
    assert!(out.iterations < 20);
    assert!(out.inner_iterations.iter().all(|&k| (1..=12).contains(&k)));
}

#[test]
fn test_bogus_inner_method_aborts_before_iterating() {
    let result = DgnOptions::default().with_inner_method_name("bogus");
    match result {
        Err(CpdError::UnknownInnerMethod(name)) => assert_eq!(name, "bogus"),
        other => panic!("expected UnknownInnerMethod, got {:?}", other),
    }
}

#[test]
fn test_all_zero_tensor_stops_on_first_check() {
    let tensor = DenseND::<f64>::zeros(&[3, 3, 3]);
    let start = vec![Array2::<f64>::zeros((3, 2)); 3];
    let init_error = relative_error(&tensor, &start).unwrap();
    assert_eq!(init_error, 0.0);

    let out = dgn(&tensor, free(start), 2, init_error, &DgnOptions::default()).unwrap();

    assert!(out.errors.iter().all(|&e| e == 0.0));
    assert_eq!(out.stop, StopReason::RelativeError);
    // Stop rules are first checked on the third iteration
    assert_eq!(out.iterations, 3);
}

#[test]
fn test_single_iteration_reports_iteration_limit() {
    let (tensor, _, start, init_error) = problem(&[3, 4, 2], 2, 5, 0.1);
    let options = DgnOptions::default().with_maxiter(1).with_seed(0);

    let out = dgn(&tensor, free(start), 2, init_error, &options).unwrap();

    assert_eq!(out.iterations, 1);
    assert_eq!(out.errors.len(), 1);
    assert_eq!(out.step_sizes.len(), 1);
    assert_eq!(out.stop, StopReason::MaxIterations);
    assert_eq!(out.stop_code(), 5);
}

#[test]
fn test_exact_start_with_zero_damping_stays_exact() {
    let (tensor, exact) = random_cpd(&[4, 4, 4], 1, 3).unwrap();
    let options = DgnOptions::default()
        .with_maxiter(1)
        .with_init_damp(0.0)
        .with_seed(1);

    let out = dgn(&tensor, free(exact), 1, 0.0, &options).unwrap();

    assert!(out.errors[0] < 1e-10);
}

#[test]
fn test_perturbed_start_with_zero_damping_converges_quickly() {
    for seed in 1..3 {
        let (tensor, _, start, init_error) = problem(&[4, 4, 4], 1, seed, 0.01);
        let options = DgnOptions::default()
            .with_init_damp(0.0)
            .with_tol_step(1e-15)
            .with_tol_improv(1e-15)
            .with_tol_grad(1e-15)
            .with_inner_method(InnerMethod::CgStatic)
            .with_seed(seed);

        let out = dgn(&tensor, free(start), 1, init_error, &options).unwrap();

        // Undamped steps take a 1% perturbation below 1e-8 by the first check
        assert_eq!(out.stop, StopReason::RelativeError, "seed {}", seed);
        assert_eq!(out.iterations, 3, "seed {}", seed);
        assert!(out.errors[1] < 1e-6, "seed {}", seed);
        assert!(out.best_error < 1e-8, "seed {}", seed);
        assert!(out.dampings.iter().all(|&d| d == 0.0));
    }
}

#[test]
fn test_best_errors_are_non_increasing() {
    let (tensor, _, start, init_error) = problem(&[4, 3, 5], 2, 9, 0.3);
    let options = DgnOptions::default().with_maxiter(30).with_seed(4);

    let out = dgn(&tensor, free(start), 2, init_error, &options).unwrap();

    assert_eq!(out.best_errors.len(), out.iterations);
    assert!(out.best_errors[0] <= init_error);
    for pair in out.best_errors.windows(2) {
        assert!(pair[1] <= pair[0]);
    }
    let min = out.errors.iter().copied().fold(init_error, f64::min);
    assert_eq!(out.best_error, min);
}

#[test]
fn test_returned_factors_match_best_error() {
    let (tensor, _, start, init_error) = problem(&[3, 3, 4], 2, 13, 0.2);
    let options = DgnOptions::default()
        .with_maxiter(15)
        .with_init_damp(1e-2)
        .with_seed(2);

    let out = dgn(&tensor, free(start), 2, init_error, &options).unwrap();

    let recomputed = relative_error(&tensor, &out.factors).unwrap();
    assert!((recomputed - out.best_error).abs() <= 1e-12 * out.best_error.max(1.0));
}

#[test]
fn test_fixed_mode_is_returned_unchanged() {
    let (tensor, exact, start, _) = problem(&[4, 3, 3], 2, 17, 0.05);
    let mut initial = free(start.clone());
    initial[1] = ModeFactor::Fixed(exact[1].clone());
    let mut starting = start;
    starting[1] = exact[1].clone();
    let init_error = relative_error(&tensor, &starting).unwrap();

    let options = DgnOptions::default()
        .with_init_damp(1e-3)
        .with_inner_method(InnerMethod::CgStatic)
        .with_maxiter(20);
    let out = dgn(&tensor, initial, 2, init_error, &options).unwrap();

    assert_eq!(out.factors[1], exact[1]);
    assert!(out.best_error < init_error);
}

#[test]
fn test_fixed_mode_in_four_mode_tensor() {
    let (tensor, exact, start, _) = problem(&[3, 2, 3, 2], 1, 19, 0.05);
    let mut initial = free(start.clone());
    initial[3] = ModeFactor::Fixed(exact[3].clone());
    let mut starting = start;
    starting[3] = exact[3].clone();
    let init_error = relative_error(&tensor, &starting).unwrap();

    let options = DgnOptions::default()
        .with_init_damp(1e-3)
        .with_maxiter(10)
        .with_seed(8);
    let out = dgn(&tensor, initial, 1, init_error, &options).unwrap();

    assert_eq!(out.factors[3], exact[3]);
}

#[test]
fn test_als_inner_method_improves_fit() {
    let (tensor, _, start, init_error) = problem(&[4, 5, 3], 2, 23, 0.2);
    let options = DgnOptions::default()
        .with_inner_method(InnerMethod::Als)
        .with_maxiter(10);

    let out = dgn(&tensor, free(start), 2, init_error, &options).unwrap();

    assert!(out.best_error < init_error);
    assert!(out.inner_iterations.iter().all(|&k| k == 0));
    // Without a step model the predicted error is ‖T‖ times the achieved one
    let norm = tensor.frobenius_norm();
    for (predicted, error) in out.predicted_errors.iter().zip(&out.errors) {
        assert!((predicted - norm * error).abs() <= 1e-12 * norm);
    }
}

#[test]
fn test_per_iteration_inner_methods() {
    let (tensor, _, start, init_error) = problem(&[4, 4, 3], 2, 29, 0.1);
    let options = DgnOptions::default()
        .with_inner_methods(vec![InnerMethod::Als, InnerMethod::CgStatic])
        .with_init_damp(1e-3)
        .with_maxiter(8);

    let out = dgn(&tensor, free(start), 2, init_error, &options).unwrap();

    assert_eq!(out.inner_iterations[0], 0);
    assert!(out.inner_iterations[1..].iter().all(|&k| k > 0));
}

#[test]
fn test_four_mode_problem_converges() {
    let (tensor, _, start, init_error) = problem(&[3, 4, 3, 2], 2, 31, 0.01);
    let options = DgnOptions::default()
        .with_init_damp(1e-3)
        .with_inner_method(InnerMethod::CgStatic)
        .with_maxiter(50)
        .with_tol_step(1e-9)
        .with_tol_improv(1e-9)
        .with_tol_grad(1e-9);

    let out = dgn(&tensor, free(start), 2, init_error, &options).unwrap();

    assert!(out.stop.is_converged(), "stopped with {}", out.stop);
    assert!(out.best_error < 1e-5);
}

#[test]
fn test_damping_schedule_runs() {
    let (tensor, _, start, init_error) = problem(&[3, 3, 3], 1, 37, 0.05);
    let options = DgnOptions::default()
        .with_damping_schedule(vec![1e-2, 1e-3, 1e-4])
        .with_maxiter(6)
        .with_tol(0.0)
        .with_tol_step(0.0)
        .with_tol_improv(0.0)
        .with_tol_grad(0.0)
        .with_seed(3);

    let out = dgn(&tensor, free(start), 1, init_error, &options).unwrap();

    assert!(out.best_error < init_error);
    assert!(out.dampings.len() >= 4);
    // Iterations 0 and 1 share the first entry, then iteration k uses entry k - 1
    assert_eq!(&out.dampings[..4], &[1e-2, 1e-2, 1e-3, 1e-4]);
    assert!(out.dampings[4..].iter().all(|&d| d == 1e-4));
}

#[test]
fn test_symmetric_factors_stay_equal() {
    let a = random_factors(&[3], 2, 41).unwrap().remove(0);
    let exact = vec![a.clone(), a.clone(), a];
    let views: Vec<_> = exact.iter().map(|f| f.view()).collect();
    let tensor = DenseND::cpd2tens(&views).unwrap();

    let shared = perturb(&exact[..1], 0.05, 42).remove(0);
    let start = vec![shared.clone(), shared.clone(), shared];
    let init_error = relative_error(&tensor, &start).unwrap();

    let options = DgnOptions::default()
        .with_symmetric(true)
        .with_init_damp(1e-3)
        .with_maxiter(10)
        .with_seed(5);
    let out = dgn(&tensor, free(start), 2, init_error, &options).unwrap();

    assert_eq!(out.factors[0], out.factors[1]);
    assert_eq!(out.factors[1], out.factors[2]);
}

#[test]
fn test_symmetric_requires_equal_dims() {
    let (tensor, _, start, init_error) = problem(&[3, 4, 3], 1, 43, 0.1);
    let options = DgnOptions::default().with_symmetric(true);
    assert!(matches!(
        dgn(&tensor, free(start), 1, init_error, &options),
        Err(CpdError::SymmetryRequiresEqualDims(_))
    ));
}

#[test]
fn test_box_constraints_hold_on_output() {
    let (_, exact) = random_cpd(&[3, 4, 3], 2, 47).unwrap();
    let positive: Vec<Array2<f64>> = exact.iter().map(|f| f.mapv(f64::abs)).collect();
    let views: Vec<_> = positive.iter().map(|f| f.view()).collect();
    let tensor = DenseND::cpd2tens(&views).unwrap();

    let start: Vec<Array2<f64>> = perturb(&positive, 0.1, 48)
        .into_iter()
        .map(|f| f.mapv(f64::abs))
        .collect();
    let init_error = relative_error(&tensor, &start).unwrap();

    let options = DgnOptions::default()
        .with_constraints(Constraints::new(0.0, 10.0, 0.0))
        .with_maxiter(10)
        .with_seed(6);
    let out = dgn(&tensor, free(start), 2, init_error, &options).unwrap();

    for factor in &out.factors {
        assert!(factor.iter().all(|&v| (0.0..=10.0).contains(&v)));
    }
}

#[test]
fn test_shape_errors_are_reported() {
    let (tensor, _, mut start, init_error) = problem(&[3, 4, 2], 2, 53, 0.1);
    start[2] = Array2::zeros((5, 2));
    assert!(matches!(
        dgn(&tensor, free(start), 2, init_error, &DgnOptions::default()),
        Err(CpdError::ShapeMismatch { mode: 2, .. })
    ));
}
