//! Property-based tests for the Gauss-Newton operators
//!
//! These tests use proptest to check algebraic properties of the implicit
//! normal-equations operator that hold for any factor matrices.

#[cfg(test)]
mod tests {
    use crate::{
        preconditioner, regularization, transform, Constraints, DampedNormalOperator, FactorSet,
        GramCache, JacobianOperator, Layout, SymmetricOperator,
    };
    use proptest::prelude::*;
    use scirs2_core::ndarray_ext::{Array1, Array2};
    use tenfit_core::synthetic::random_factors;
    use tenfit_core::DenseND;

    // Operator checks build dense references, keep the case count small
    fn proptest_config() -> ProptestConfig {
        ProptestConfig {
            cases: 24,
            ..ProptestConfig::default()
        }
    }

    fn dims_strategy() -> impl Strategy<Value = Vec<usize>> {
        prop::collection::vec(2usize..5, 2..5)
    }

    fn setup(dims: &[usize], rank: usize, seed: u64) -> (Vec<Array2<f64>>, Layout, GramCache) {
        let factors = random_factors(dims, rank, seed).unwrap();
        let layout = Layout::new(dims, rank, None);
        let mut gram = GramCache::new(dims.len(), rank);
        gram.refresh(&factors).unwrap();
        (factors, layout, gram)
    }

    fn sample_vector(len: usize, phase: f64) -> Array1<f64> {
        Array1::from_shape_fn(len, |i| (i as f64 * 0.7 + phase).sin())
    }

    proptest! {
        #![proptest_config(proptest_config())]

        // Property: uᵀ(JᵀJ v) = vᵀ(JᵀJ u)
        #[test]
        fn matvec_is_symmetric(
            dims in dims_strategy(),
            rank in 1usize..4,
            seed in 0u64..1000,
        ) {
            let (factors, layout, gram) = setup(&dims, rank, seed);
            let op = JacobianOperator::new(&factors, &layout, &gram);

            let u = sample_vector(layout.len(), 0.3);
            let v = sample_vector(layout.len(), 1.9);
            let mut au = Array1::<f64>::zeros(layout.len());
            let mut av = Array1::<f64>::zeros(layout.len());
            op.matvec(&u.view(), &mut au).unwrap();
            op.matvec(&v.view(), &mut av).unwrap();

            let lhs = u.dot(&av);
            let rhs = v.dot(&au);
            let scale = lhs.abs().max(rhs.abs()).max(1.0);
            prop_assert!((lhs - rhs).abs() <= 1e-9 * scale);
        }

        // Property: vᵀ(JᵀJ v) = ‖J v‖² ≥ 0
        #[test]
        fn matvec_is_positive_semidefinite(
            dims in dims_strategy(),
            rank in 1usize..4,
            seed in 0u64..1000,
            phase in -3.0f64..3.0,
        ) {
            let (factors, layout, gram) = setup(&dims, rank, seed);
            let op = JacobianOperator::new(&factors, &layout, &gram);

            let v = sample_vector(layout.len(), phase);
            let mut av = Array1::<f64>::zeros(layout.len());
            op.matvec(&v.view(), &mut av).unwrap();

            let quad = v.dot(&av);
            prop_assert!(quad >= -1e-9 * av.dot(&av).sqrt().max(1.0));
        }

        // Property: M⁻² is the diagonal of JᵀJ + damp·Γ
        #[test]
        fn preconditioner_inverts_damped_diagonal(
            dims in prop::collection::vec(2usize..4, 3..4),
            rank in 1usize..3,
            seed in 0u64..1000,
            damp in 0.0f64..2.0,
        ) {
            let (factors, layout, gram) = setup(&dims, rank, seed);
            let mut gamma = Array1::<f64>::zeros(layout.len());
            let mut m = Array1::<f64>::zeros(layout.len());
            regularization(&layout, &gram, &mut gamma);
            preconditioner(&layout, &gram, &gamma.view(), damp, &mut m);

            let jac = JacobianOperator::new(&factors, &layout, &gram);
            let op = DampedNormalOperator::new(jac, gamma.view(), damp);
            let mut unit = Array1::<f64>::zeros(layout.len());
            let mut column = Array1::<f64>::zeros(layout.len());
            for i in 0..layout.len() {
                unit.fill(0.0);
                unit[i] = 1.0;
                op.apply(&unit.view(), &mut column).unwrap();
                let expected = column[i];
                prop_assume!(expected > 1e-6);
                let got = 1.0 / (m[i] * m[i]);
                prop_assert!((got - expected).abs() <= 1e-9 * expected.max(1.0));
            }
        }

        // Property: norm balancing leaves the reconstruction unchanged
        #[test]
        fn balancing_preserves_reconstruction(
            dims in dims_strategy(),
            rank in 1usize..4,
            seed in 0u64..1000,
        ) {
            let factors = random_factors(&dims, rank, seed).unwrap();
            let mut set = FactorSet::from_matrices(factors).unwrap();
            let before = DenseND::cpd2tens(&set.views()).unwrap();

            transform(&mut set, &Constraints::default(), false, 1e12);

            let after = DenseND::cpd2tens(&set.views()).unwrap();
            let diff = before.sub_checked(&after).unwrap().frobenius_norm();
            prop_assert!(diff <= 1e-9 * before.frobenius_norm().max(1.0));
        }
    }
}
