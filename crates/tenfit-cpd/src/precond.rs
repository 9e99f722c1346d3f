//! Tikhonov regularization and block-Jacobi preconditioner
//!
//! Both are constant inside a column of a factor block: entry `(i, r)` of
//! mode `l` gets the value computed from `P1_l[r, r]`.

use scirs2_core::ndarray_ext::{s, Array1, ArrayView1};

use crate::workspace::{GramCache, Layout};

/// Replacement for zero diagonals and denominators
pub const DEGENERATE_GUARD: f64 = 1e-6;

/// Fill `gamma` with `Γ[l, r] = max|P1| · sqrt(P1_l[r, r])`
pub fn regularization(layout: &Layout, gram: &GramCache, gamma: &mut Array1<f64>) {
    let scale = gram.max_abs_p1();
    fill_by_column(layout, gamma, |mode, col| {
        let value = scale * gram.p1[mode][[col, col]].max(0.0).sqrt();
        if value == 0.0 {
            DEGENERATE_GUARD
        } else {
            value
        }
    });
}

/// Fill `out` with `M = 1 / sqrt(P1_l[r, r] + damp · Γ[l, r])`
pub fn preconditioner(
    layout: &Layout,
    gram: &GramCache,
    gamma: &ArrayView1<f64>,
    damp: f64,
    out: &mut Array1<f64>,
) {
    fill_by_column(layout, out, |mode, col| {
        let g = gamma[layout.offsets[mode] + col * layout.dims[mode]];
        let denominator = gram.p1[mode][[col, col]] + damp * g;
        let denominator = if denominator <= 0.0 {
            DEGENERATE_GUARD
        } else {
            denominator
        };
        1.0 / denominator.sqrt()
    });
}

fn fill_by_column<F>(layout: &Layout, out: &mut Array1<f64>, mut value: F)
where
    F: FnMut(usize, usize) -> f64,
{
    for mode in 0..layout.order() {
        let dim = layout.dims[mode];
        let start = layout.offsets[mode];
        for col in 0..layout.rank {
            let v = value(mode, col);
            let begin = start + col * dim;
            out.slice_mut(s![begin..begin + dim]).fill(v);
        }
    }
}
