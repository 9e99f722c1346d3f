//! Hadamard (element-wise) product of matrices
//!
//! # SciRS2 Integration
//!
//! All array operations use `scirs2_core::ndarray_ext`.

use scirs2_core::ndarray_ext::{Array2, ArrayView2, ArrayViewMut2, Zip};
use scirs2_core::numeric::Num;

use crate::error::{KernelError, KernelResult};

/// Compute the Hadamard (element-wise) product of two matrices
///
/// # Errors
///
/// Returns [`KernelError::ShapeMismatch`] if the shapes differ.
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::array;
/// use tenfit_kernels::hadamard;
///
/// let a = array![[1.0, 2.0], [3.0, 4.0]];
/// let b = array![[5.0, 6.0], [7.0, 8.0]];
/// let c = hadamard(&a.view(), &b.view()).unwrap();
/// assert_eq!(c[[0, 1]], 12.0);
/// assert_eq!(c[[1, 1]], 32.0);
/// ```
pub fn hadamard<T>(a: &ArrayView2<T>, b: &ArrayView2<T>) -> KernelResult<Array2<T>>
where
    T: Clone + Num,
{
    check_same_shape("hadamard", a.shape(), b.shape())?;

    let mut result = a.to_owned();
    Zip::from(&mut result).and(b).for_each(|r, b_elem| {
        *r = r.clone() * b_elem.clone();
    });

    Ok(result)
}

/// In-place Hadamard product `a ← a ∘ b`
///
/// Avoids the allocation of [`hadamard`]; used to accumulate products of
/// Gramians.
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::array;
/// use tenfit_kernels::hadamard_inplace;
///
/// let mut a = array![[1.0, 2.0], [3.0, 4.0]];
/// let b = array![[5.0, 6.0], [7.0, 8.0]];
/// hadamard_inplace(&mut a.view_mut(), &b.view()).unwrap();
/// assert_eq!(a[[0, 0]], 5.0);
/// ```
pub fn hadamard_inplace<T>(a: &mut ArrayViewMut2<T>, b: &ArrayView2<T>) -> KernelResult<()>
where
    T: Clone + Num,
{
    check_same_shape("hadamard_inplace", a.shape(), b.shape())?;

    Zip::from(&mut *a).and(b).for_each(|a_elem, b_elem| {
        *a_elem = a_elem.clone() * b_elem.clone();
    });

    Ok(())
}

fn check_same_shape(operation: &'static str, a: &[usize], b: &[usize]) -> KernelResult<()> {
    if a != b {
        return Err(KernelError::ShapeMismatch {
            operation,
            left: a.to_vec(),
            right: b.to_vec(),
        });
    }
    Ok(())
}
