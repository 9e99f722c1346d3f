//! Khatri-Rao (column-wise Kronecker) product
//!
//! For A (I × R) and B (J × R), A ⊙ B is the (I·J × R) matrix whose column r
//! is `A[:, r] ⊗ B[:, r]`. Row `i * J + j` holds `A[i, r] * B[j, r]`, so the
//! first operand varies slowest. Chained products over several factors use the
//! same rule and therefore line up with the column order of
//! `DenseND::unfold`.
//!
//! # SciRS2 Integration
//!
//! All array operations use `scirs2_core::ndarray_ext`.

use scirs2_core::ndarray_ext::{Array2, ArrayView2};
use scirs2_core::numeric::Num;

use crate::error::{KernelError, KernelResult};

/// Row count from which [`khatri_rao_chain`] switches to the parallel kernel.
#[cfg(feature = "parallel")]
pub const PARALLEL_ROW_THRESHOLD: usize = 4096;

/// Compute the Khatri-Rao product of two matrices
///
/// # Errors
///
/// Returns [`KernelError::RankMismatch`] if the column counts differ.
///
/// # Complexity
///
/// Time: O(I × J × R)
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::array;
/// use tenfit_kernels::khatri_rao;
///
/// let a = array![[1.0, 2.0], [3.0, 4.0]];
/// let b = array![[5.0, 6.0], [7.0, 8.0]];
/// let c = khatri_rao(&a.view(), &b.view()).unwrap();
/// assert_eq!(c.shape(), &[4, 2]);
/// assert_eq!(c[[2, 0]], 15.0); // a[1,0] * b[0,0]
/// ```
pub fn khatri_rao<T>(a: &ArrayView2<T>, b: &ArrayView2<T>) -> KernelResult<Array2<T>>
where
    T: Clone + Num,
{
    let (i, k1) = (a.nrows(), a.ncols());
    let (j, k2) = (b.nrows(), b.ncols());

    if k1 != k2 {
        return Err(KernelError::RankMismatch {
            operation: "khatri_rao",
            index: 1,
            expected: k1,
            actual: k2,
        });
    }

    let mut result = Array2::<T>::zeros((i * j, k1));

    for col_idx in 0..k1 {
        let a_col = a.column(col_idx);
        let b_col = b.column(col_idx);

        for (row_a_idx, a_val) in a_col.iter().enumerate() {
            for (row_b_idx, b_val) in b_col.iter().enumerate() {
                result[[row_a_idx * j + row_b_idx, col_idx]] = a_val.clone() * b_val.clone();
            }
        }
    }

    Ok(result)
}

/// Parallel Khatri-Rao product; columns are filled concurrently
#[cfg(feature = "parallel")]
pub fn khatri_rao_parallel<T>(a: &ArrayView2<T>, b: &ArrayView2<T>) -> KernelResult<Array2<T>>
where
    T: Clone + Num + Send + Sync,
{
    use scirs2_core::ndarray_ext::Axis;
    use scirs2_core::parallel_ops::*;

    let (i, k1) = (a.nrows(), a.ncols());
    let (j, k2) = (b.nrows(), b.ncols());

    if k1 != k2 {
        return Err(KernelError::RankMismatch {
            operation: "khatri_rao_parallel",
            index: 1,
            expected: k1,
            actual: k2,
        });
    }

    let mut result = Array2::<T>::zeros((i * j, k1));

    result
        .axis_iter_mut(Axis(1))
        .into_par_iter()
        .enumerate()
        .for_each(|(col_idx, mut result_col)| {
            let a_col = a.column(col_idx);
            let b_col = b.column(col_idx);

            for (row_a_idx, a_val) in a_col.iter().enumerate() {
                for (row_b_idx, b_val) in b_col.iter().enumerate() {
                    result_col[row_a_idx * j + row_b_idx] = a_val.clone() * b_val.clone();
                }
            }
        });

    Ok(result)
}

/// Khatri-Rao product of every factor whose index is not in `skip`.
///
/// Factors are combined in forward order, so for `skip = [n]` the result
/// matches the columns of the mode-n unfolding. When every factor is skipped
/// the result is a `1 × R` row of ones.
///
/// # Errors
///
/// Returns an error if `factors` is empty or the factors disagree on rank.
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::Array2;
/// use tenfit_kernels::khatri_rao_chain;
///
/// let factors = vec![
///     Array2::<f64>::ones((2, 3)),
///     Array2::<f64>::ones((4, 3)),
///     Array2::<f64>::ones((5, 3)),
/// ];
/// let views: Vec<_> = factors.iter().map(|f| f.view()).collect();
/// let kr = khatri_rao_chain(&views, &[1]).unwrap();
/// assert_eq!(kr.shape(), &[10, 3]);
/// ```
pub fn khatri_rao_chain<T>(factors: &[ArrayView2<T>], skip: &[usize]) -> KernelResult<Array2<T>>
where
    T: Clone + Num + Send + Sync,
{
    if factors.is_empty() {
        return Err(KernelError::EmptyInput {
            operation: "khatri_rao_chain",
            parameter: "factors",
        });
    }
    KernelError::check_skip("khatri_rao_chain", skip, factors.len())?;

    let rank = factors[0].ncols();
    for (idx, factor) in factors.iter().enumerate() {
        if factor.ncols() != rank {
            return Err(KernelError::RankMismatch {
                operation: "khatri_rao_chain",
                index: idx,
                expected: rank,
                actual: factor.ncols(),
            });
        }
    }

    let mut result = Array2::<T>::ones((1, rank));
    for (idx, factor) in factors.iter().enumerate() {
        if skip.contains(&idx) {
            continue;
        }
        result = khatri_rao_step(&result.view(), factor)?;
    }

    Ok(result)
}

#[cfg(feature = "parallel")]
fn khatri_rao_step<T>(acc: &ArrayView2<T>, next: &ArrayView2<T>) -> KernelResult<Array2<T>>
where
    T: Clone + Num + Send + Sync,
{
    if acc.nrows() * next.nrows() >= PARALLEL_ROW_THRESHOLD {
        khatri_rao_parallel(acc, next)
    } else {
        khatri_rao(acc, next)
    }
}

#[cfg(not(feature = "parallel"))]
fn khatri_rao_step<T>(acc: &ArrayView2<T>, next: &ArrayView2<T>) -> KernelResult<Array2<T>>
where
    T: Clone + Num + Send + Sync,
{
    khatri_rao(acc, next)
}
