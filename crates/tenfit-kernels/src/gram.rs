//! Gramians of factor matrices and Hadamard products of Gramians
//!
//! For a factor W (I × R), the Gramian is Wᵀ W (R × R). The CPD normal
//! equations only ever touch the tensor through MTTKRP; everything else is
//! expressed as Hadamard products of these small R × R matrices.

use scirs2_core::ndarray_ext::{Array2, ArrayView2};
use scirs2_core::numeric::Float;

use crate::error::{KernelError, KernelResult};
use crate::hadamard::hadamard_inplace;

/// Gramian Wᵀ W of a single factor matrix
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::array;
/// use tenfit_kernels::gramian;
///
/// let w = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
/// let g = gramian(&w.view());
/// assert_eq!(g[[0, 0]], 35.0);
/// assert_eq!(g[[0, 1]], 44.0);
/// assert_eq!(g[[1, 0]], 44.0);
/// ```
pub fn gramian<T>(factor: &ArrayView2<T>) -> Array2<T>
where
    T: Float + 'static,
{
    factor.t().dot(factor)
}

/// Gramians of every factor, in mode order
pub fn gramians<T>(factors: &[ArrayView2<T>]) -> Vec<Array2<T>>
where
    T: Float + Send + Sync + 'static,
{
    #[cfg(feature = "parallel")]
    {
        use scirs2_core::parallel_ops::*;
        factors.par_iter().map(|factor| gramian(factor)).collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        factors.iter().map(|factor| gramian(factor)).collect()
    }
}

/// Hadamard product of every Gramian whose mode is not in `skip`.
///
/// With no Gramians left the result is the all-ones R × R matrix, the
/// identity of the Hadamard product.
///
/// # Errors
///
/// Returns an error if `grams` is empty or the Gramians are not all R × R.
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::array;
/// use tenfit_kernels::hadamard_of_gramians;
///
/// let g0 = array![[2.0, 1.0], [1.0, 2.0]];
/// let g1 = array![[3.0, 0.5], [0.5, 3.0]];
/// let g2 = array![[4.0, 0.0], [0.0, 4.0]];
/// let p = hadamard_of_gramians(&[g0, g1, g2], &[2]).unwrap();
/// assert_eq!(p, array![[6.0, 0.5], [0.5, 6.0]]);
/// ```
pub fn hadamard_of_gramians<T>(grams: &[Array2<T>], skip: &[usize]) -> KernelResult<Array2<T>>
where
    T: Float,
{
    if grams.is_empty() {
        return Err(KernelError::EmptyInput {
            operation: "hadamard_of_gramians",
            parameter: "grams",
        });
    }
    KernelError::check_skip("hadamard_of_gramians", skip, grams.len())?;

    let rank = grams[0].nrows();
    let mut product = Array2::<T>::ones((rank, rank));

    for (mode, gram) in grams.iter().enumerate() {
        if gram.shape() != [rank, rank] {
            return Err(KernelError::NonSquareGramian {
                mode,
                rank,
                shape: gram.shape().to_vec(),
            });
        }
        if skip.contains(&mode) {
            continue;
        }
        hadamard_inplace(&mut product.view_mut(), &gram.view())?;
    }

    Ok(product)
}
