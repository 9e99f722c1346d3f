//! Residual, gradient and Gauss-Newton matrix-vector products
//!
//! The Jacobian J of r(x) = T − T_approx(x) is never formed. Everything is
//! expressed through Gramians and MTTKRP:
//!
//! - gradient block l: `g_l = W_l · P1_l − MTTKRP_l(T)`
//! - `(JᵀJ v)_l = W_l · Σ_{k≠l} P2_lk ∘ (D_kᵀ W_k) + D_l · P1_l`
//!
//! where `D_k` is block k of `v` seen as a `dim_k × R` matrix.
//! For L = 3 both are hand-unrolled over the three modes.

use scirs2_core::ndarray_ext::{s, Array1, Array2, ArrayView1};
use tenfit_core::DenseND;
use tenfit_kernels::{khatri_rao, mttkrp, unvec, vec_into};

use crate::error::CpdResult;
use crate::workspace::{GramCache, Layout};

/// Symmetric linear operator applied by the conjugate-gradient solver
pub trait SymmetricOperator {
    fn apply(&self, v: &ArrayView1<f64>, out: &mut Array1<f64>) -> CpdResult<()>;
}

/// Implicit Jacobian of the CPD residual at fixed factors
#[derive(Debug, Clone, Copy)]
pub struct JacobianOperator<'a> {
    factors: &'a [Array2<f64>],
    layout: &'a Layout,
    gram: &'a GramCache,
}

impl<'a> JacobianOperator<'a> {
    /// `gram` must have been refreshed from `factors`
    pub fn new(factors: &'a [Array2<f64>], layout: &'a Layout, gram: &'a GramCache) -> Self {
        Self {
            factors,
            layout,
            gram,
        }
    }

    /// Gradient Jᵀr into `out`; the block of a fixed mode is zero
    pub fn gradient(&self, tensor: &DenseND<f64>, out: &mut Array1<f64>) -> CpdResult<()> {
        if self.layout.order() == 3 {
            self.gradient_order3(tensor, out)
        } else {
            self.gradient_generic(tensor, out)
        }
    }

    /// JᵀJ v into `out`; the block of a fixed mode is zero
    pub fn matvec(&self, v: &ArrayView1<f64>, out: &mut Array1<f64>) -> CpdResult<()> {
        if self.layout.order() == 3 {
            self.matvec_order3(v, out)
        } else {
            self.matvec_generic(v, out)
        }
    }

    pub fn gradient_generic(&self, tensor: &DenseND<f64>, out: &mut Array1<f64>) -> CpdResult<()> {
        let views: Vec<_> = self.factors.iter().map(|f| f.view()).collect();
        let tensor_view = tensor.view();

        let block_for = |mode: usize| -> CpdResult<Array2<f64>> {
            let v = mttkrp(&tensor_view, &views, mode)?;
            Ok(self.factors[mode].dot(&self.gram.p1[mode]) - &v)
        };

        #[cfg(feature = "parallel")]
        let blocks: Vec<Array2<f64>> = {
            use scirs2_core::parallel_ops::*;
            (0..self.layout.order())
                .into_par_iter()
                .map(block_for)
                .collect::<CpdResult<_>>()?
        };

        #[cfg(not(feature = "parallel"))]
        let blocks: Vec<Array2<f64>> = (0..self.layout.order())
            .map(block_for)
            .collect::<CpdResult<_>>()?;

        self.write_blocks(&blocks, out)
    }

    pub fn gradient_order3(&self, tensor: &DenseND<f64>, out: &mut Array1<f64>) -> CpdResult<()> {
        let [w0, w1, w2] = [&self.factors[0], &self.factors[1], &self.factors[2]];
        let [g0, g1, g2] = [&self.gram.grams[0], &self.gram.grams[1], &self.gram.grams[2]];

        let t0 = tensor.unfold(0)?;
        let t1 = tensor.unfold(1)?;
        let t2 = tensor.unfold(2)?;

        let kr12 = khatri_rao(&w1.view(), &w2.view())?;
        let kr02 = khatri_rao(&w0.view(), &w2.view())?;
        let kr01 = khatri_rao(&w0.view(), &w1.view())?;

        let blocks = [
            w0.dot(&(g1 * g2)) - t0.dot(&kr12),
            w1.dot(&(g0 * g2)) - t1.dot(&kr02),
            w2.dot(&(g0 * g1)) - t2.dot(&kr01),
        ];

        self.write_blocks(&blocks, out)
    }

    pub fn matvec_generic(&self, v: &ArrayView1<f64>, out: &mut Array1<f64>) -> CpdResult<()> {
        let order = self.layout.order();
        let d = self.split(v)?;
        let dw: Vec<Array2<f64>> = (0..order)
            .map(|k| d[k].t().dot(&self.factors[k]))
            .collect();

        let rank = self.layout.rank;
        let mut blocks = Vec::with_capacity(order);
        for l in 0..order {
            let mut cross = Array2::<f64>::zeros((rank, rank));
            for k in 0..order {
                if k != l {
                    cross += &(&self.gram.p2[l][k] * &dw[k]);
                }
            }
            blocks.push(self.factors[l].dot(&cross) + d[l].dot(&self.gram.p1[l]));
        }

        self.write_blocks(&blocks, out)
    }

    pub fn matvec_order3(&self, v: &ArrayView1<f64>, out: &mut Array1<f64>) -> CpdResult<()> {
        let d = self.split(v)?;
        let [w0, w1, w2] = [&self.factors[0], &self.factors[1], &self.factors[2]];
        let [g0, g1, g2] = [&self.gram.grams[0], &self.gram.grams[1], &self.gram.grams[2]];

        let dw0 = d[0].t().dot(w0);
        let dw1 = d[1].t().dot(w1);
        let dw2 = d[2].t().dot(w2);

        let blocks = [
            w0.dot(&(g2 * &dw1 + g1 * &dw2)) + d[0].dot(&(g1 * g2)),
            w1.dot(&(g2 * &dw0 + g0 * &dw2)) + d[1].dot(&(g0 * g2)),
            w2.dot(&(g1 * &dw0 + g0 * &dw1)) + d[2].dot(&(g0 * g1)),
        ];

        self.write_blocks(&blocks, out)
    }

    /// Blocks of `v` as `dim_l × R` matrices
    fn split(&self, v: &ArrayView1<f64>) -> CpdResult<Vec<Array2<f64>>> {
        (0..self.layout.order())
            .map(|mode| -> CpdResult<Array2<f64>> {
                let range = self.layout.block(mode);
                let block = v.slice(s![range.start..range.end]);
                Ok(unvec(&block, self.layout.dims[mode], self.layout.rank)?)
            })
            .collect()
    }

    fn write_blocks(&self, blocks: &[Array2<f64>], out: &mut Array1<f64>) -> CpdResult<()> {
        for (mode, block) in blocks.iter().enumerate() {
            let range = self.layout.block(mode);
            let mut target = out.slice_mut(s![range.start..range.end]);
            if self.layout.is_fixed(mode) {
                target.fill(0.0);
            } else {
                vec_into(&block.view(), &mut target)?;
            }
        }
        Ok(())
    }
}

impl SymmetricOperator for JacobianOperator<'_> {
    fn apply(&self, v: &ArrayView1<f64>, out: &mut Array1<f64>) -> CpdResult<()> {
        self.matvec(v, out)
    }
}

/// `JᵀJ + damp · Γ`, the matrix of the damped normal equations
#[derive(Debug, Clone, Copy)]
pub struct DampedNormalOperator<'a> {
    jacobian: JacobianOperator<'a>,
    gamma: ArrayView1<'a, f64>,
    damp: f64,
}

impl<'a> DampedNormalOperator<'a> {
    pub fn new(jacobian: JacobianOperator<'a>, gamma: ArrayView1<'a, f64>, damp: f64) -> Self {
        Self {
            jacobian,
            gamma,
            damp,
        }
    }
}

impl SymmetricOperator for DampedNormalOperator<'_> {
    fn apply(&self, v: &ArrayView1<f64>, out: &mut Array1<f64>) -> CpdResult<()> {
        self.jacobian.matvec(v, out)?;
        let damp = self.damp;
        out.iter_mut()
            .zip(self.gamma.iter().zip(v.iter()))
            .for_each(|(o, (&g, &x))| *o += damp * g * x);
        Ok(())
    }
}

/// r = T − T_approx
pub fn residual(tensor: &DenseND<f64>, factors: &[Array2<f64>]) -> CpdResult<DenseND<f64>> {
    let views: Vec<_> = factors.iter().map(|f| f.view()).collect();
    let approx = DenseND::cpd2tens(&views)?;
    Ok(tensor.sub_checked(&approx)?)
}

/// ‖T − T_approx‖ / ‖T‖, or the absolute error when ‖T‖ = 0
pub fn relative_error(tensor: &DenseND<f64>, factors: &[Array2<f64>]) -> CpdResult<f64> {
    let norm = tensor.frobenius_norm();
    let denominator = if norm > 0.0 { norm } else { 1.0 };
    Ok(residual(tensor, factors)?.frobenius_norm() / denominator)
}
