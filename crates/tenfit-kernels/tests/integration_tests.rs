//! Integration tests for tenfit-kernels
//!
//! Cross-checks the kernels against the dense tensor type from tenfit-core.

use scirs2_core::ndarray_ext::{s, Array1, Array2};
use tenfit_core::synthetic::random_cpd;
use tenfit_core::DenseND;
use tenfit_kernels::*;

#[test]
fn test_mttkrp_equals_unfold_times_khatri_rao() {
    let (tensor, factors) = random_cpd(&[3, 4, 5], 2, 17).unwrap();
    let views: Vec<_> = factors.iter().map(|f| f.view()).collect();

    for mode in 0..3 {
        let unfolded = tensor.unfold(mode).unwrap();
        let kr = khatri_rao_chain(&views, &[mode]).unwrap();
        let expected = unfolded.dot(&kr);
        let result = mttkrp(&tensor.view(), &views, mode).unwrap();

        for (a, b) in result.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-10);
        }
    }
}

#[test]
fn test_exact_cpd_normal_equations() {
    // For an exact CPD, MTTKRP_n = W_n · (∘_{k≠n} W_kᵀ W_k)
    let (tensor, factors) = random_cpd(&[4, 3, 2, 3], 3, 5).unwrap();
    let views: Vec<_> = factors.iter().map(|f| f.view()).collect();
    let grams = gramians(&views);

    for mode in 0..4 {
        let lhs = mttkrp(&tensor.view(), &views, mode).unwrap();
        let p1 = hadamard_of_gramians(&grams, &[mode]).unwrap();
        let rhs = factors[mode].dot(&p1);
        for (a, b) in lhs.iter().zip(rhs.iter()) {
            assert!((a - b).abs() < 1e-9 * (1.0 + b.abs()));
        }
    }
}

#[test]
fn test_frobenius_norm_from_gramians() {
    let (tensor, factors) = random_cpd(&[3, 3, 3], 2, 29).unwrap();
    let views: Vec<_> = factors.iter().map(|f| f.view()).collect();
    let grams = gramians(&views);

    let all = hadamard_of_gramians(&grams, &[]).unwrap();
    let norm_sq = tensor.frobenius_norm().powi(2);
    assert!((all.sum() - norm_sq).abs() < 1e-9 * norm_sq.max(1.0));
}

#[test]
fn test_flat_vector_blocks() {
    let factors = [
        Array2::from_shape_fn((3, 2), |(i, r)| (i * 10 + r) as f64),
        Array2::from_shape_fn((4, 2), |(i, r)| (100 + i * 10 + r) as f64),
    ];
    let offsets = block_offsets(&[3, 4], 2);
    let mut flat = Array1::<f64>::zeros(offsets[2]);
    for (mode, factor) in factors.iter().enumerate() {
        let mut block = flat.slice_mut(s![offsets[mode]..offsets[mode + 1]]);
        vec_into(&factor.view(), &mut block).unwrap();
    }

    // Entry W_1[2, 1] sits at offset_1 + 1 * 4 + 2
    assert_eq!(flat[6 + 4 + 2], 121.0);

    for (mode, factor) in factors.iter().enumerate() {
        let block = flat.slice(s![offsets[mode]..offsets[mode + 1]]);
        let rebuilt = unvec(&block, factor.nrows(), 2).unwrap();
        assert_eq!(&rebuilt, factor);
    }
}

#[test]
fn test_kernels_on_ones_tensor() {
    let tensor = DenseND::<f64>::ones(&[2, 3, 4]);
    let factors = [
        Array2::<f64>::ones((2, 1)),
        Array2::<f64>::ones((3, 1)),
        Array2::<f64>::ones((4, 1)),
    ];
    let views: Vec<_> = factors.iter().map(|f| f.view()).collect();
    let v = mttkrp(&tensor.view(), &views, 0).unwrap();
    assert_eq!(v[[0, 0]], 12.0);
    assert_eq!(v[[1, 0]], 12.0);
}
