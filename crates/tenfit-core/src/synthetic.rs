//! Seeded synthetic CPD problems
//!
//! Helpers that build exact low-rank tensors together with the factor
//! matrices that generated them. Everything takes an explicit seed so the
//! same call always yields the same problem.

use anyhow::Result;
use scirs2_core::ndarray_ext::Array2;
use scirs2_core::random::{rngs::StdRng, Distribution, RandNormal as Normal, Rng, SeedableRng};

use crate::DenseND;

/// Draw one `dim × rank` factor per entry of `dims` with standard normal entries.
pub fn random_factors(dims: &[usize], rank: usize, seed: u64) -> Result<Vec<Array2<f64>>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal =
        Normal::new(0.0, 1.0).map_err(|e| anyhow::anyhow!("Invalid normal distribution: {}", e))?;

    let factors = dims
        .iter()
        .map(|&dim| Array2::from_shape_fn((dim, rank), |_| normal.sample(&mut rng)))
        .collect();

    Ok(factors)
}

/// Build an exact rank-`rank` tensor of shape `dims`.
///
/// Returns the tensor and the factors it was reconstructed from.
///
/// # Examples
///
/// ```
/// use tenfit_core::synthetic::random_cpd;
///
/// let (tensor, factors) = random_cpd(&[3, 4, 5], 2, 7).unwrap();
/// assert_eq!(tensor.shape(), &[3, 4, 5]);
/// assert_eq!(factors.len(), 3);
/// assert_eq!(factors[1].shape(), &[4, 2]);
/// ```
pub fn random_cpd(
    dims: &[usize],
    rank: usize,
    seed: u64,
) -> Result<(DenseND<f64>, Vec<Array2<f64>>)> {
    if dims.is_empty() {
        anyhow::bail!("At least one mode is required");
    }
    if rank == 0 {
        anyhow::bail!("Rank must be at least 1");
    }

    let factors = random_factors(dims, rank, seed)?;
    let views: Vec<_> = factors.iter().map(|f| f.view()).collect();
    let tensor = DenseND::cpd2tens(&views)?;

    Ok((tensor, factors))
}

/// Copy of `factors` with every entry shifted by uniform noise in `[-scale, scale]`.
pub fn perturb(factors: &[Array2<f64>], scale: f64, seed: u64) -> Vec<Array2<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    factors
        .iter()
        .map(|factor| {
            let mut noisy = factor.clone();
            if scale > 0.0 {
                noisy.mapv_inplace(|x| x + rng.random_range(-scale..scale));
            }
            noisy
        })
        .collect()
}
