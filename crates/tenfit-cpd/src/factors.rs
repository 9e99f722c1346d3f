//! Factor matrices and the flat parameter vector
//!
//! The optimizer works on `x`, the concatenation of every factor's
//! column-major flattening. [`cpd2x`] and [`x2cpd`] convert between the two
//! representations losslessly.

use scirs2_core::ndarray_ext::{s, Array1, Array2, ArrayView1, ArrayView2};
use tenfit_kernels::{block_offsets, unvec, unvec_into, vec_into};

use crate::error::{CpdError, CpdResult};

/// One mode's factor matrix, tagged with whether the optimizer may update it
#[derive(Debug, Clone, PartialEq)]
pub enum ModeFactor {
    Free(Array2<f64>),
    /// Held at its initial value for the whole run
    Fixed(Array2<f64>),
}

impl ModeFactor {
    pub fn matrix(&self) -> &Array2<f64> {
        match self {
            ModeFactor::Free(m) | ModeFactor::Fixed(m) => m,
        }
    }

    pub fn into_matrix(self) -> Array2<f64> {
        match self {
            ModeFactor::Free(m) | ModeFactor::Fixed(m) => m,
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self, ModeFactor::Fixed(_))
    }
}

impl From<Array2<f64>> for ModeFactor {
    fn from(matrix: Array2<f64>) -> Self {
        ModeFactor::Free(matrix)
    }
}

/// Factor matrices of a rank-R CPD with at most one fixed mode
#[derive(Debug, Clone, PartialEq)]
pub struct FactorSet {
    factors: Vec<Array2<f64>>,
    fixed: Option<usize>,
}

impl FactorSet {
    /// Build a factor set from tagged modes.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no modes, the column counts differ, or
    /// more than one mode is fixed.
    pub fn new(modes: Vec<ModeFactor>) -> CpdResult<Self> {
        if modes.is_empty() {
            return Err(CpdError::UnsupportedOrder(0));
        }

        let rank = modes[0].matrix().ncols();
        let mut fixed = None;
        for (mode, factor) in modes.iter().enumerate() {
            if factor.matrix().ncols() != rank {
                return Err(CpdError::RankMismatch {
                    mode,
                    expected: rank,
                    actual: factor.matrix().ncols(),
                });
            }
            if factor.is_fixed() {
                if let Some(previous) = fixed {
                    return Err(CpdError::InvalidOption(format!(
                        "at most one mode may be fixed, found modes {} and {}",
                        previous, mode
                    )));
                }
                fixed = Some(mode);
            }
        }

        Ok(Self {
            factors: modes.into_iter().map(ModeFactor::into_matrix).collect(),
            fixed,
        })
    }

    /// Factor set in which every mode is free
    pub fn from_matrices(factors: Vec<Array2<f64>>) -> CpdResult<Self> {
        Self::new(factors.into_iter().map(ModeFactor::Free).collect())
    }

    pub fn order(&self) -> usize {
        self.factors.len()
    }

    pub fn rank(&self) -> usize {
        self.factors[0].ncols()
    }

    pub fn dims(&self) -> Vec<usize> {
        self.factors.iter().map(|f| f.nrows()).collect()
    }

    pub fn fixed_mode(&self) -> Option<usize> {
        self.fixed
    }

    pub fn is_fixed(&self, mode: usize) -> bool {
        self.fixed == Some(mode)
    }

    /// Length of the flat parameter vector, R · Σ dims
    pub fn num_params(&self) -> usize {
        self.factors.iter().map(|f| f.len()).sum()
    }

    pub fn matrices(&self) -> &[Array2<f64>] {
        &self.factors
    }

    pub fn views(&self) -> Vec<ArrayView2<'_, f64>> {
        self.factors.iter().map(|f| f.view()).collect()
    }

    /// Replace a free mode's matrix. Fixed modes are left untouched.
    pub(crate) fn set_free(&mut self, mode: usize, matrix: &Array2<f64>) {
        if !self.is_fixed(mode) {
            self.factors[mode].assign(matrix);
        }
    }

    /// Mutable access to every free factor
    pub(crate) fn free_factors_mut(&mut self) -> impl Iterator<Item = &mut Array2<f64>> + '_ {
        let fixed = self.fixed;
        self.factors
            .iter_mut()
            .enumerate()
            .filter(move |(mode, _)| Some(*mode) != fixed)
            .map(|(_, f)| f)
    }

    /// Flat parameter vector of the current factors
    pub fn flatten(&self) -> CpdResult<Array1<f64>> {
        cpd2x(&self.factors)
    }

    /// Write a flat vector back into the free factors; fixed modes keep their value
    ///
    /// # Errors
    ///
    /// Returns an error if `x` does not have length R · Σ dims.
    pub fn unflatten_into(&mut self, x: &ArrayView1<f64>) -> CpdResult<()> {
        if x.len() != self.num_params() {
            return Err(CpdError::InvalidOption(format!(
                "flat vector has length {}, expected {}",
                x.len(),
                self.num_params()
            )));
        }
        let offsets = block_offsets(&self.dims(), self.rank());
        let fixed = self.fixed;
        for (mode, factor) in self.factors.iter_mut().enumerate() {
            if Some(mode) == fixed {
                continue;
            }
            let block = x.slice(s![offsets[mode]..offsets[mode + 1]]);
            unvec_into(&block, &mut factor.view_mut())?;
        }
        Ok(())
    }

    pub fn into_matrices(self) -> Vec<Array2<f64>> {
        self.factors
    }

    /// Back to tagged modes, preserving which one is fixed
    pub fn into_modes(self) -> Vec<ModeFactor> {
        let fixed = self.fixed;
        self.factors
            .into_iter()
            .enumerate()
            .map(|(mode, f)| {
                if Some(mode) == fixed {
                    ModeFactor::Fixed(f)
                } else {
                    ModeFactor::Free(f)
                }
            })
            .collect()
    }
}

/// Concatenate column-major flattenings of `factors`
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::array;
/// use tenfit_cpd::{cpd2x, x2cpd};
///
/// let a = array![[1.0, 2.0], [3.0, 4.0]];
/// let b = array![[5.0, 6.0]];
/// let x = cpd2x(&[a.clone(), b.clone()]).unwrap();
/// assert_eq!(x.to_vec(), vec![1.0, 3.0, 2.0, 4.0, 5.0, 6.0]);
///
/// let back = x2cpd(&x.view(), &[2, 1], 2).unwrap();
/// assert_eq!(back, vec![a, b]);
/// ```
pub fn cpd2x(factors: &[Array2<f64>]) -> CpdResult<Array1<f64>> {
    let dims: Vec<usize> = factors.iter().map(|f| f.nrows()).collect();
    let rank = factors.first().map(|f| f.ncols()).unwrap_or(0);
    let offsets = block_offsets(&dims, rank);

    let mut x = Array1::<f64>::zeros(offsets[dims.len()]);
    for (mode, factor) in factors.iter().enumerate() {
        let mut block = x.slice_mut(s![offsets[mode]..offsets[mode + 1]]);
        vec_into(&factor.view(), &mut block)?;
    }
    Ok(x)
}

/// Split a flat vector into factor matrices of the given row counts
pub fn x2cpd(x: &ArrayView1<f64>, dims: &[usize], rank: usize) -> CpdResult<Vec<Array2<f64>>> {
    let offsets = block_offsets(dims, rank);
    if x.len() != offsets[dims.len()] {
        return Err(CpdError::InvalidOption(format!(
            "flat vector has length {}, expected {}",
            x.len(),
            offsets[dims.len()]
        )));
    }
    dims.iter()
        .enumerate()
        .map(|(mode, &dim)| -> CpdResult<Array2<f64>> {
            let block = x.slice(s![offsets[mode]..offsets[mode + 1]]);
            Ok(unvec(&block, dim, rank)?)
        })
        .collect()
}
