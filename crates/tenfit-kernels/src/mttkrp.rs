//! MTTKRP (Matricized Tensor Times Khatri-Rao Product)
//!
//! For tensor X and factor matrices {W₀, ..., W_{N-1}}, computes:
//!
//! V = X_(mode) × (W₀ ⊙ ... ⊙ W_(mode-1) ⊙ W_(mode+1) ⊙ ... ⊙ W_{N-1})
//!
//! Where X_(mode) is the mode-n matricization and ⊙ is the Khatri-Rao product.
//! In the Gauss-Newton gradient this is the only term that reads the tensor.
//!
//! # SciRS2 Integration
//!
//! All array operations use `scirs2_core::ndarray_ext`.

use scirs2_core::ndarray_ext::{Array2, ArrayView, ArrayView2, IxDyn};
use scirs2_core::numeric::Float;

use crate::error::{KernelError, KernelResult};
use crate::khatri_rao::khatri_rao_chain;

/// Compute MTTKRP for one mode
///
/// # Arguments
///
/// * `tensor` - Input tensor with N dimensions
/// * `factors` - Factor matrices, one for each mode
/// * `mode` - The mode to compute MTTKRP for (0-indexed)
///
/// # Returns
///
/// Matrix with shape (I_mode, R) where R is the CP rank
///
/// # Errors
///
/// Returns error if:
/// - Mode is out of bounds
/// - Factor matrix shapes don't match tensor dimensions
/// - Factor matrices have different numbers of columns (rank)
///
/// # Complexity
///
/// Time: O(R × ∏ᵢ Iᵢ)
/// Space: O(R × ∏ᵢ≠ₘₒ₋ᵈₑ Iᵢ) for the Khatri-Rao product
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::{Array, Array2};
/// use tenfit_kernels::mttkrp;
///
/// let tensor = Array::from_shape_vec(
///     vec![2, 3, 4],
///     (0..24).map(|x| x as f64).collect()
/// ).unwrap();
///
/// let u1 = Array2::<f64>::ones((2, 2));
/// let u2 = Array2::<f64>::ones((3, 2));
/// let u3 = Array2::<f64>::ones((4, 2));
///
/// let result = mttkrp(&tensor.view(), &[u1.view(), u2.view(), u3.view()], 1).unwrap();
/// assert_eq!(result.shape(), &[3, 2]);
/// // With all-ones factors each row is the sum of the matching mode-1 slice
/// assert_eq!(result[[0, 0]], 0.0 + 1.0 + 2.0 + 3.0 + 12.0 + 13.0 + 14.0 + 15.0);
/// ```
pub fn mttkrp<T>(
    tensor: &ArrayView<T, IxDyn>,
    factors: &[ArrayView2<T>],
    mode: usize,
) -> KernelResult<Array2<T>>
where
    T: Float + Send + Sync + 'static,
{
    validate_factors("mttkrp", tensor.shape(), factors)?;

    if mode >= tensor.ndim() {
        return Err(KernelError::InvalidMode {
            operation: "mttkrp",
            mode,
            order: tensor.ndim(),
        });
    }

    let unfolded = unfold_view(tensor, mode)?;
    let kr = khatri_rao_chain(factors, &[mode])?;

    Ok(unfolded.dot(&kr))
}

/// MTTKRP for every mode, in mode order
///
/// # Errors
///
/// Same conditions as [`mttkrp`].
pub fn mttkrp_all_modes<T>(
    tensor: &ArrayView<T, IxDyn>,
    factors: &[ArrayView2<T>],
) -> KernelResult<Vec<Array2<T>>>
where
    T: Float + Send + Sync + 'static,
{
    validate_factors("mttkrp_all_modes", tensor.shape(), factors)?;
    (0..tensor.ndim())
        .map(|mode| mttkrp(tensor, factors, mode))
        .collect()
}

fn validate_factors<T>(
    operation: &'static str,
    tensor_shape: &[usize],
    factors: &[ArrayView2<T>],
) -> KernelResult<()> {
    if factors.len() != tensor_shape.len() {
        return Err(KernelError::FactorCount {
            operation,
            expected: tensor_shape.len(),
            actual: factors.len(),
        });
    }
    if factors.is_empty() {
        return Err(KernelError::EmptyInput {
            operation,
            parameter: "factors",
        });
    }

    let cp_rank = factors[0].ncols();
    for (mode, factor) in factors.iter().enumerate() {
        if factor.ncols() != cp_rank {
            return Err(KernelError::RankMismatch {
                operation,
                index: mode,
                expected: cp_rank,
                actual: factor.ncols(),
            });
        }
        if factor.nrows() != tensor_shape[mode] {
            return Err(KernelError::FactorRows {
                operation,
                mode,
                expected: tensor_shape[mode],
                actual: factor.nrows(),
            });
        }
    }

    Ok(())
}

/// Unfold a tensor view along `mode` (mode first, other modes in forward order)
fn unfold_view<T>(tensor: &ArrayView<T, IxDyn>, mode: usize) -> KernelResult<Array2<T>>
where
    T: Clone,
{
    let shape = tensor.shape();
    let mode_size = shape[mode];
    let other_size: usize = shape
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != mode)
        .map(|(_, &s)| s)
        .product();

    let mut perm: Vec<usize> = Vec::with_capacity(shape.len());
    perm.push(mode);
    perm.extend((0..shape.len()).filter(|&i| i != mode));

    let permuted = tensor.clone().permuted_axes(IxDyn(&perm));
    let contiguous = permuted.as_standard_layout().into_owned();
    contiguous
        .into_shape_with_order((mode_size, other_size))
        .map_err(|e| KernelError::Unfold {
            mode,
            reason: e.to_string(),
        })
}
