//! # tenfit-cpd - Damped Gauss-Newton CPD refinement
//!
//! Refines a rank-R Canonical Polyadic Decomposition
//!
//! ```text
//! T ≈ Σᵣ W₀[:, r] ⊗ W₁[:, r] ⊗ ... ⊗ W_{L-1}[:, r]
//! ```
//!
//! from a starting point, by damped Gauss-Newton iterations on the flat
//! parameter vector of all factor matrices.
//!
//! ## Overview
//!
//! - [`dgn`]: the outer loop, with seven stop rules and best-point tracking
//! - [`JacobianOperator`]: gradient `Jᵀr` and normal-equations products
//!   `JᵀJ·v` from Gramians and MTTKRP, never forming J
//! - [`regularization`] / [`preconditioner`]: diagonal Tikhonov term Γ and
//!   block-Jacobi preconditioner M
//! - [`preconditioned_cg`]: inexact CG on `(JᵀJ + damp·Γ) y = −g` with a
//!   residual-plateau exit
//! - Inner methods: [`CgSolver`] (`cg`, `cg_static`) and [`AlsSolver`] (`als`)
//! - [`transform`]: box constraints, symmetrization and norm balancing
//!
//! ## Quick Start
//!
//! ```
//! use tenfit_core::synthetic::{perturb, random_cpd};
//! use tenfit_cpd::{dgn, relative_error, DgnOptions, ModeFactor};
//!
//! let (tensor, exact) = random_cpd(&[5, 4, 3], 2, 3)?;
//! let start = perturb(&exact, 0.1, 4);
//! let init_error = relative_error(&tensor, &start)?;
//!
//! let options = DgnOptions::default().with_init_damp(1e-3).with_seed(0);
//! let initial = start.into_iter().map(ModeFactor::from).collect();
//! let out = dgn(&tensor, initial, 2, init_error, &options)?;
//!
//! println!("{} after {} iterations", out.stop, out.iterations);
//! println!("Best relative error: {:.3e}", out.best_error);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Holding one mode fixed
//!
//! Wrap exactly one starting factor in [`ModeFactor::Fixed`]. Its gradient
//! and step blocks are zero and the returned factor is the input, bit for bit.
//!
//! ## Feature Flags
//!
//! - `parallel` (default): per-mode gradient blocks and Khatri-Rao products
//!   computed in parallel via `scirs2_core::parallel_ops`
//! - `serde`: `Serialize`/`Deserialize` for [`DgnOptions`] and [`StopReason`]
//!
//! ## SciRS2 Integration
//!
//! Arrays come from `scirs2_core::ndarray_ext`, randomness from
//! `scirs2_core::random`, least-squares solves from `scirs2_linalg`.
//!
//! ## References
//!
//! - Kolda & Bader (2009), "Tensor Decompositions and Applications"
//! - Tichavský, Phan & Cichocki (2013), "A further improvement of a fast
//!   damped Gauss-Newton algorithm for CANDECOMP-PARAFAC tensor decomposition"

#![deny(warnings)]

pub mod als;
pub mod cg;
pub mod error;
pub mod factors;
pub mod gauss_newton;
pub mod inner;
pub mod operators;
pub mod options;
pub mod precond;
pub mod transform;
pub mod workspace;

#[cfg(test)]
mod property_tests;

// Re-exports
pub use als::AlsSolver;
pub use cg::{has_plateaued, preconditioned_cg, CgOutcome, CgSolver};
pub use error::{CpdError, CpdResult};
pub use factors::{cpd2x, x2cpd, FactorSet, ModeFactor};
pub use gauss_newton::{
    dgn, validate_problem, DgnOutput, StopReason, INITIAL_REFERENCE_ERROR, MAX_ORDER,
};
pub use inner::{InnerSolver, InnerStep};
pub use operators::{
    relative_error, residual, DampedNormalOperator, JacobianOperator, SymmetricOperator,
};
pub use options::{Constraints, Damping, DgnOptions, InnerMethod, InnerMethods};
pub use precond::{preconditioner, regularization, DEGENERATE_GUARD};
pub use transform::{apply_constraints, transform};
pub use workspace::{CgBuffers, GramCache, Layout, Workspace};
