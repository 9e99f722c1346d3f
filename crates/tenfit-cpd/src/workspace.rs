//! Buffers owned by one Gauss-Newton run
//!
//! A [`Workspace`] is created once per call of [`crate::dgn`] and reused in
//! place on every outer iteration. Nothing in it outlives the call.

use std::ops::Range;

use scirs2_core::ndarray_ext::{Array1, Array2};
use tenfit_kernels::{block_offsets, gramian, hadamard_of_gramians};

use crate::error::CpdResult;

/// Shape of the flat parameter vector
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub dims: Vec<usize>,
    pub rank: usize,
    pub offsets: Vec<usize>,
    pub fixed: Option<usize>,
}

impl Layout {
    pub fn new(dims: &[usize], rank: usize, fixed: Option<usize>) -> Self {
        Self {
            dims: dims.to_vec(),
            rank,
            offsets: block_offsets(dims, rank),
            fixed,
        }
    }

    /// Number of modes L
    pub fn order(&self) -> usize {
        self.dims.len()
    }

    /// R · Σ dims
    pub fn len(&self) -> usize {
        self.offsets[self.dims.len()]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index range of a mode's block in the flat vector
    pub fn block(&self, mode: usize) -> Range<usize> {
        self.offsets[mode]..self.offsets[mode + 1]
    }

    pub fn is_fixed(&self, mode: usize) -> bool {
        self.fixed == Some(mode)
    }
}

/// Gramians and their Hadamard products, rebuilt once per outer iteration
#[derive(Debug, Clone)]
pub struct GramCache {
    /// Gr_l = W_lᵀ W_l
    pub grams: Vec<Array2<f64>>,
    /// P1_l = ∘_{k≠l} Gr_k
    pub p1: Vec<Array2<f64>>,
    /// P2_lk = ∘_{m∉{l,k}} Gr_m; the diagonal l = k is unused
    pub p2: Vec<Vec<Array2<f64>>>,
}

impl GramCache {
    pub fn new(order: usize, rank: usize) -> Self {
        let ones = Array2::<f64>::ones((rank, rank));
        Self {
            grams: vec![ones.clone(); order],
            p1: vec![ones.clone(); order],
            p2: vec![vec![ones; order]; order],
        }
    }

    /// Recompute every Gramian product from `factors`
    pub fn refresh(&mut self, factors: &[Array2<f64>]) -> CpdResult<()> {
        for (slot, factor) in self.grams.iter_mut().zip(factors) {
            slot.assign(&gramian(&factor.view()));
        }

        let order = self.grams.len();
        for l in 0..order {
            self.p1[l].assign(&hadamard_of_gramians(&self.grams, &[l])?);
            for k in 0..order {
                if k != l {
                    self.p2[l][k].assign(&hadamard_of_gramians(&self.grams, &[l, k])?);
                }
            }
        }
        Ok(())
    }

    /// Update the Gramian of one mode and every product that depends on it
    pub fn refresh_mode(&mut self, factors: &[Array2<f64>], mode: usize) -> CpdResult<()> {
        self.grams[mode].assign(&gramian(&factors[mode].view()));
        let order = self.grams.len();
        for l in 0..order {
            if l != mode {
                self.p1[l].assign(&hadamard_of_gramians(&self.grams, &[l])?);
            }
        }
        Ok(())
    }

    /// Largest absolute entry over all P1 matrices
    pub fn max_abs_p1(&self) -> f64 {
        self.p1
            .iter()
            .flat_map(|p| p.iter())
            .fold(0.0, |acc: f64, &v| acc.max(v.abs()))
    }
}

/// Vectors of the inner conjugate-gradient iteration
#[derive(Debug, Clone)]
pub struct CgBuffers {
    pub residual: Array1<f64>,
    pub direction: Array1<f64>,
    /// M · direction
    pub scaled: Array1<f64>,
    /// M · A · M · direction
    pub product: Array1<f64>,
    /// Iterate in preconditioned coordinates
    pub iterate: Array1<f64>,
    /// M · iterate, the step handed back to the outer loop
    pub solution: Array1<f64>,
}

impl CgBuffers {
    pub fn new(len: usize) -> Self {
        Self {
            residual: Array1::zeros(len),
            direction: Array1::zeros(len),
            scaled: Array1::zeros(len),
            product: Array1::zeros(len),
            iterate: Array1::zeros(len),
            solution: Array1::zeros(len),
        }
    }
}

/// All buffers of one run
#[derive(Debug, Clone)]
pub struct Workspace {
    pub layout: Layout,
    pub gram: GramCache,
    /// Tikhonov diagonal Γ, one entry per parameter
    pub gamma: Array1<f64>,
    /// Diagonal preconditioner M
    pub precond: Array1<f64>,
    pub gradient: Array1<f64>,
    pub cg: CgBuffers,
}

impl Workspace {
    pub fn new(layout: Layout) -> Self {
        let len = layout.len();
        let gram = GramCache::new(layout.order(), layout.rank);
        Self {
            layout,
            gram,
            gamma: Array1::zeros(len),
            precond: Array1::ones(len),
            gradient: Array1::zeros(len),
            cg: CgBuffers::new(len),
        }
    }
}
