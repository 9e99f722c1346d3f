//! Post-step transforms of the free factors
//!
//! Applied after every outer step, in this order: box constraints,
//! symmetrization, norm balancing. Fixed modes are never touched.

use scirs2_core::ndarray_ext::{Array2, Axis};

use crate::factors::FactorSet;
use crate::options::Constraints;

/// Apply every enabled transform to `factors`
pub fn transform(factors: &mut FactorSet, constraints: &Constraints, symm: bool, factors_norm: f64) {
    if constraints.is_active() {
        for factor in factors.free_factors_mut() {
            apply_constraints(factor, constraints);
        }
    }
    if symm {
        symmetrize(factors);
    }
    if factors_norm > 0.0 {
        balance_norms(factors, factors_norm);
    }
}

/// Clamp into `[low, upp]`, or squash out-of-range entries through a sigmoid
pub fn apply_constraints(factor: &mut Array2<f64>, constraints: &Constraints) {
    let Constraints { low, upp, factor: slope } = *constraints;
    if slope == 0.0 {
        factor.mapv_inplace(|w| w.clamp(low, upp));
        return;
    }

    let mid = 0.5 * (low + upp);
    let width = upp - low;
    factor.mapv_inplace(|w| {
        if w < low || w > upp {
            low + width / (1.0 + (-slope * (w - mid)).exp())
        } else {
            w
        }
    });
}

/// Replace every free factor by the mean of all factors
fn symmetrize(factors: &mut FactorSet) {
    let matrices = factors.matrices();
    let mut mean = Array2::<f64>::zeros(matrices[0].raw_dim());
    for m in matrices {
        mean += m;
    }
    mean /= matrices.len() as f64;

    for factor in factors.free_factors_mut() {
        factor.assign(&mean);
    }
}

/// Equalize column norms of each rank-one term across the free modes, then
/// cap them at `cap`
fn balance_norms(factors: &mut FactorSet, cap: f64) {
    let rank = factors.rank();
    let free: Vec<usize> = (0..factors.order())
        .filter(|&mode| !factors.is_fixed(mode))
        .collect();
    if free.is_empty() {
        return;
    }

    let norms: Vec<Vec<f64>> = free
        .iter()
        .map(|&mode| column_norms(&factors.matrices()[mode]))
        .collect();

    let mut scales = vec![vec![1.0; rank]; free.len()];
    for r in 0..rank {
        if norms.iter().any(|n| n[r] == 0.0) {
            continue;
        }
        let log_mean = norms.iter().map(|n| n[r].ln()).sum::<f64>() / free.len() as f64;
        let target = log_mean.exp().min(cap);
        for (k, n) in norms.iter().enumerate() {
            scales[k][r] = target / n[r];
        }
    }

    for (factor, scale) in factors.free_factors_mut().zip(&scales) {
        for (mut column, &s) in factor.axis_iter_mut(Axis(1)).zip(scale) {
            column *= s;
        }
    }
}

fn column_norms(factor: &Array2<f64>) -> Vec<f64> {
    factor
        .axis_iter(Axis(1))
        .map(|c| c.dot(&c).sqrt())
        .collect()
}
