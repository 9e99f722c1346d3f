//! Column-major vectorization of factor matrices
//!
//! The Gauss-Newton solver works on one flat parameter vector that
//! concatenates every factor matrix. Each factor W (I × R) occupies a block of
//! length I·R laid out column by column: entry `W[i, r]` lives at
//! `offset + r * I + i`.

use scirs2_core::ndarray_ext::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2};

use crate::error::{KernelError, KernelResult};

/// Write `matrix` column-major into `out`
///
/// # Errors
///
/// Returns an error if `out.len() != rows * cols`.
pub fn vec_into<T>(matrix: &ArrayView2<T>, out: &mut ArrayViewMut1<T>) -> KernelResult<()>
where
    T: Clone,
{
    let (rows, cols) = matrix.dim();
    KernelError::check_block("vec_into", out.len(), rows, cols)?;

    // Transposed view iterates column by column
    for (slot, value) in out.iter_mut().zip(matrix.t().iter()) {
        *slot = value.clone();
    }

    Ok(())
}

/// Column-major vectorization of a matrix
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::array;
/// use tenfit_kernels::vectorize;
///
/// let w = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
/// assert_eq!(vectorize(&w.view()), array![1.0, 3.0, 5.0, 2.0, 4.0, 6.0]);
/// ```
pub fn vectorize<T>(matrix: &ArrayView2<T>) -> Array1<T>
where
    T: Clone,
{
    matrix.t().iter().cloned().collect()
}

/// Rebuild a `rows × cols` matrix from a column-major block
///
/// # Errors
///
/// Returns an error if `block.len() != rows * cols`.
pub fn unvec<T>(block: &ArrayView1<T>, rows: usize, cols: usize) -> KernelResult<Array2<T>>
where
    T: Clone,
{
    KernelError::check_block("unvec", block.len(), rows, cols)?;
    Ok(Array2::from_shape_fn((rows, cols), |(i, r)| {
        block[r * rows + i].clone()
    }))
}

/// Overwrite `out` with the column-major block `block`
///
/// # Errors
///
/// Returns an error if the block length does not match the shape of `out`.
pub fn unvec_into<T>(block: &ArrayView1<T>, out: &mut ArrayViewMut2<T>) -> KernelResult<()>
where
    T: Clone,
{
    let (rows, cols) = out.dim();
    KernelError::check_block("unvec_into", block.len(), rows, cols)?;
    for ((i, r), slot) in out.indexed_iter_mut() {
        *slot = block[r * rows + i].clone();
    }
    Ok(())
}

/// Start offset of every factor block for factors of the given row counts
/// and shared column count `rank`. The final entry is the total length.
///
/// # Examples
///
/// ```
/// use tenfit_kernels::block_offsets;
///
/// assert_eq!(block_offsets(&[3, 4, 5], 2), vec![0, 6, 14, 24]);
/// ```
pub fn block_offsets(dims: &[usize], rank: usize) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(dims.len() + 1);
    let mut acc = 0usize;
    offsets.push(acc);
    for &dim in dims {
        acc += dim * rank;
        offsets.push(acc);
    }
    offsets
}
