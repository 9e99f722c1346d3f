//! Dense tensor type definition and the operations used by the CPD engine
//!
//! `DenseND<T>` wraps a dynamic-dimensionality `scirs2_core::ndarray_ext`
//! array stored in C-contiguous (row-major) order.

use anyhow::Result;
use scirs2_core::ndarray_ext::{Array, Array2, ArrayView, ArrayView2, ArrayViewMut, IxDyn};
use scirs2_core::numeric::{Float, Num};
use std::fmt;

/// Dense N-dimensional tensor backed by scirs2_core's ndarray
///
/// # Examples
///
/// ```
/// use tenfit_core::DenseND;
///
/// let tensor = DenseND::<f64>::zeros(&[2, 3, 4]);
/// assert_eq!(tensor.shape(), &[2, 3, 4]);
/// assert_eq!(tensor.len(), 24);
/// ```
#[derive(Clone, PartialEq)]
pub struct DenseND<T> {
    /// Underlying ndarray storage (via scirs2_core)
    pub(crate) data: Array<T, IxDyn>,
}

impl<T> DenseND<T>
where
    T: Clone + Num,
{
    /// Create a tensor from an existing ndarray
    pub fn from_array(array: Array<T, IxDyn>) -> Self {
        Self { data: array }
    }

    /// Create a tensor from a vector with given shape
    ///
    /// # Arguments
    ///
    /// * `vec` - Flattened data in row-major order
    /// * `shape` - Target shape
    ///
    /// # Examples
    ///
    /// ```
    /// use tenfit_core::DenseND;
    ///
    /// let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
    /// let tensor = DenseND::from_vec(data, &[2, 3]).unwrap();
    /// assert_eq!(tensor.shape(), &[2, 3]);
    /// ```
    pub fn from_vec(vec: Vec<T>, shape: &[usize]) -> Result<Self> {
        let total: usize = shape.iter().product();
        if vec.len() != total {
            anyhow::bail!(
                "Shape {:?} requires {} elements, but got {}",
                shape,
                total,
                vec.len()
            );
        }
        let array = Array::from_shape_vec(IxDyn(shape), vec)?;
        Ok(Self { data: array })
    }

    /// Create a tensor filled with zeros
    pub fn zeros(shape: &[usize]) -> Self {
        Self {
            data: Array::zeros(IxDyn(shape)),
        }
    }

    /// Create a tensor filled with ones
    pub fn ones(shape: &[usize]) -> Self {
        Self {
            data: Array::ones(IxDyn(shape)),
        }
    }

    /// Create a tensor filled with `value`
    pub fn from_elem(shape: &[usize], value: T) -> Self {
        Self {
            data: Array::from_elem(IxDyn(shape), value),
        }
    }

    /// Number of modes (order) of the tensor
    pub fn rank(&self) -> usize {
        self.data.ndim()
    }

    /// Shape of the tensor
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Total number of elements
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the tensor has zero elements
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Immutable view of the underlying array
    pub fn view(&self) -> ArrayView<'_, T, IxDyn> {
        self.data.view()
    }

    /// Mutable view of the underlying array
    pub fn view_mut(&mut self) -> ArrayViewMut<'_, T, IxDyn> {
        self.data.view_mut()
    }

    /// Borrow the underlying array
    pub fn as_array(&self) -> &Array<T, IxDyn> {
        &self.data
    }

    /// Consume the tensor and return the underlying array
    pub fn into_array(self) -> Array<T, IxDyn> {
        self.data
    }

    /// Element-wise difference `self - other`
    ///
    /// # Errors
    ///
    /// Returns an error if the shapes differ.
    pub fn sub_checked(&self, other: &Self) -> Result<Self> {
        if self.shape() != other.shape() {
            anyhow::bail!(
                "Cannot subtract tensors of shapes {:?} and {:?}",
                self.shape(),
                other.shape()
            );
        }
        Ok(Self {
            data: &self.data - &other.data,
        })
    }

    /// Unfold (matricize) the tensor along a specific mode.
    ///
    /// The result has shape `(I_mode, ∏_{k≠mode} I_k)`. Columns enumerate the
    /// remaining modes in forward order, last mode fastest.
    ///
    /// # Errors
    ///
    /// Returns an error if `mode` is out of bounds.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenfit_core::DenseND;
    ///
    /// let tensor = DenseND::from_vec((0..24).map(|x| x as f64).collect(), &[2, 3, 4]).unwrap();
    /// let x1 = tensor.unfold(1).unwrap();
    /// assert_eq!(x1.shape(), &[3, 8]);
    /// // Row j holds T[i, j, k] with (i, k) in row-major order
    /// assert_eq!(x1[[1, 0]], 4.0);
    /// assert_eq!(x1[[1, 5]], 17.0);
    /// ```
    pub fn unfold(&self, mode: usize) -> Result<Array2<T>> {
        if mode >= self.rank() {
            anyhow::bail!("Mode {} out of bounds for rank {}", mode, self.rank());
        }

        let shape = self.shape();
        let rows = shape[mode];
        let cols: usize = shape
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != mode)
            .map(|(_, &s)| s)
            .product();

        let perm = mode_first_permutation(self.rank(), mode);
        let permuted = self.data.view().permuted_axes(IxDyn(&perm));
        let contiguous = permuted.as_standard_layout().into_owned();
        let unfolded = contiguous.into_shape_with_order((rows, cols))?;

        Ok(unfolded)
    }

    /// Fold a matrix back into a tensor; the inverse of [`DenseND::unfold`].
    ///
    /// # Errors
    ///
    /// Returns an error if `mode` is out of bounds or the matrix does not have
    /// the shape of the mode-`mode` unfolding of `shape`.
    pub fn fold(matrix: &ArrayView2<T>, shape: &[usize], mode: usize) -> Result<Self> {
        if mode >= shape.len() {
            anyhow::bail!("Mode {} out of bounds for target shape {:?}", mode, shape);
        }
        let rows = shape[mode];
        let cols: usize = shape
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != mode)
            .map(|(_, &s)| s)
            .product();
        if matrix.shape() != [rows, cols] {
            anyhow::bail!(
                "Matrix of shape {:?} cannot be folded into {:?} along mode {} (expected [{}, {}])",
                matrix.shape(),
                shape,
                mode,
                rows,
                cols
            );
        }

        let perm = mode_first_permutation(shape.len(), mode);
        let permuted_shape: Vec<usize> = perm.iter().map(|&p| shape[p]).collect();
        let flat: Vec<T> = matrix.iter().cloned().collect();
        let permuted = Array::from_shape_vec(IxDyn(&permuted_shape), flat)?;

        let mut inverse = vec![0usize; perm.len()];
        for (i, &p) in perm.iter().enumerate() {
            inverse[p] = i;
        }
        let restored = permuted.permuted_axes(IxDyn(&inverse));

        Ok(Self {
            data: restored.as_standard_layout().into_owned(),
        })
    }

    /// Reconstruct the tensor Σᵣ W₀[:,r] ⊗ W₁[:,r] ⊗ … ⊗ W_{N-1}[:,r]
    ///
    /// The shape of the result is given by the row counts of the factors.
    ///
    /// # Complexity
    ///
    /// Time: O(R × N × ∏ᵢ Iᵢ)
    ///
    /// # Errors
    ///
    /// Returns an error if no factors are given or their column counts differ.
    ///
    /// # Examples
    ///
    /// ```
    /// use scirs2_core::ndarray_ext::array;
    /// use tenfit_core::DenseND;
    ///
    /// let a = array![[1.0], [2.0]];
    /// let b = array![[3.0], [4.0], [5.0]];
    /// let t = DenseND::cpd2tens(&[a.view(), b.view()]).unwrap();
    /// assert_eq!(t.shape(), &[2, 3]);
    /// assert_eq!(t[&[1, 2][..]], 10.0);
    /// ```
    pub fn cpd2tens(factors: &[ArrayView2<T>]) -> Result<Self> {
        if factors.is_empty() {
            anyhow::bail!("At least one factor matrix is required for reconstruction");
        }
        let rank = factors[0].ncols();
        for (mode, factor) in factors.iter().enumerate() {
            if factor.ncols() != rank {
                anyhow::bail!(
                    "Factor matrix {} has {} columns, expected {}",
                    mode,
                    factor.ncols(),
                    rank
                );
            }
        }

        let shape: Vec<usize> = factors.iter().map(|f| f.nrows()).collect();
        let n_modes = shape.len();
        let total: usize = shape.iter().product();
        let mut data = vec![T::zero(); total];
        let mut index = vec![0usize; n_modes];

        for (linear, value) in data.iter_mut().enumerate() {
            // Linear index -> multi-index (row-major)
            let mut remaining = linear;
            for mode in (0..n_modes).rev() {
                index[mode] = remaining % shape[mode];
                remaining /= shape[mode];
            }

            let mut acc = T::zero();
            for r in 0..rank {
                let mut term = T::one();
                for (mode, factor) in factors.iter().enumerate() {
                    term = term * factor[[index[mode], r]].clone();
                }
                acc = acc + term;
            }
            *value = acc;
        }

        Self::from_vec(data, &shape)
    }
}

impl<T> DenseND<T>
where
    T: Float,
{
    /// Frobenius norm ‖X‖_F = sqrt(Σ x²)
    pub fn frobenius_norm(&self) -> T {
        self.data
            .iter()
            .fold(T::zero(), |acc, &x| acc + x * x)
            .sqrt()
    }

    /// Mean of the absolute values of all entries (zero for an empty tensor)
    pub fn mean_abs(&self) -> T {
        if self.data.is_empty() {
            return T::zero();
        }
        let total = self.data.iter().fold(T::zero(), |acc, &x| acc + x.abs());
        let count = T::from(self.data.len()).unwrap_or_else(T::one);
        total / count
    }

    /// Largest absolute entry (zero for an empty tensor)
    pub fn max_abs(&self) -> T {
        self.data
            .iter()
            .fold(T::zero(), |acc, &x| if x.abs() > acc { x.abs() } else { acc })
    }
}

/// Axis order `[mode, 0, 1, …, mode-1, mode+1, …, n-1]`
fn mode_first_permutation(n_modes: usize, mode: usize) -> Vec<usize> {
    let mut perm: Vec<usize> = Vec::with_capacity(n_modes);
    perm.push(mode);
    perm.extend((0..mode).chain((mode + 1)..n_modes));
    perm
}

impl<T> std::ops::Index<&[usize]> for DenseND<T> {
    type Output = T;
    fn index(&self, index: &[usize]) -> &Self::Output {
        &self.data[IxDyn(index)]
    }
}

impl<T> std::ops::IndexMut<&[usize]> for DenseND<T> {
    fn index_mut(&mut self, index: &[usize]) -> &mut Self::Output {
        &mut self.data[IxDyn(index)]
    }
}

impl<T: fmt::Debug + Clone + Num> fmt::Debug for DenseND<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DenseND")
            .field("shape", &self.shape())
            .field("rank", &self.rank())
            .field("data", &self.data)
            .finish()
    }
}
