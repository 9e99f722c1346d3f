//! # tenfit-core
//!
//! Core dense tensor type for tenfit.
//!
//! This crate provides the pieces the CPD engine reads its input through:
//!
//! - **Dense tensor representation** ([`DenseND`]) in C-contiguous layout
//! - **Matricization** (unfold/fold) along any mode
//! - **CP reconstruction** ([`DenseND::cpd2tens`]) from factor matrices
//! - **Synthetic problems** ([`synthetic::random_cpd`]) with a seeded RNG
//!
//! ## SciRS2 Integration
//!
//! All arrays are `scirs2_core::ndarray_ext` arrays and all randomness goes
//! through `scirs2_core::random`. Direct use of `ndarray` or `rand` is avoided.
//!
//! ## Quick Start
//!
//! ```
//! use tenfit_core::DenseND;
//!
//! let tensor = DenseND::<f64>::ones(&[2, 3, 4]);
//! assert_eq!(tensor.shape(), &[2, 3, 4]);
//! assert_eq!(tensor.rank(), 3);
//!
//! // Mode-1 unfolding: rows are mode-1 fibers
//! let unfolded = tensor.unfold(1).unwrap();
//! assert_eq!(unfolded.shape(), &[3, 8]);
//! ```
//!
//! ## Unfolding Convention
//!
//! The mode-n unfolding puts mode n on the rows and the remaining modes, in
//! forward order with the last one varying fastest, on the columns. The
//! Khatri-Rao products in `tenfit-kernels` use the matching ordering, so
//! `X_(n) · (U₀ ⊙ … ⊙ U_{n-1} ⊙ U_{n+1} ⊙ … ⊙ U_{N-1})` is the MTTKRP.

#![deny(warnings)]

pub mod dense;
pub mod synthetic;


pub use dense::DenseND;
