//! # tenfit-kernels
//!
//! Dense linear-algebra kernels behind the tenfit CPD engine.
//!
//! ## Overview
//!
//! - **Khatri-Rao product** - Column-wise Kronecker product (serial & parallel),
//!   and chained over a subset of factors
//! - **Hadamard product** - Element-wise multiplication (allocating & in-place)
//! - **Gramians** - WᵀW per factor and Hadamard products of Gramians
//! - **MTTKRP** - Matricized tensor times Khatri-Rao product
//! - **Vectorization** - Column-major factor blocks of the flat parameter vector
//!
//! ## Quick Start
//!
//! ```rust
//! use scirs2_core::ndarray_ext::Array2;
//! use tenfit_core::DenseND;
//! use tenfit_kernels::{gramians, hadamard_of_gramians, khatri_rao, mttkrp};
//!
//! let a = Array2::<f64>::ones((10, 5));
//! let b = Array2::<f64>::ones((8, 5));
//! let kr = khatri_rao(&a.view(), &b.view()).unwrap();
//! assert_eq!(kr.shape(), &[80, 5]);
//!
//! let tensor = DenseND::<f64>::ones(&[3, 4, 5]);
//! let factors = vec![
//!     Array2::<f64>::ones((3, 2)),
//!     Array2::<f64>::ones((4, 2)),
//!     Array2::<f64>::ones((5, 2)),
//! ];
//! let views: Vec<_> = factors.iter().map(|f| f.view()).collect();
//! let v = mttkrp(&tensor.view(), &views, 1).unwrap();
//! assert_eq!(v.shape(), &[4, 2]);
//!
//! // Hadamard of the Gramians of modes 0 and 2
//! let grams = gramians(&views);
//! let p = hadamard_of_gramians(&grams, &[1]).unwrap();
//! assert_eq!(p[[0, 0]], 15.0);
//! ```
//!
//! ## Features
//!
//! - `parallel` (default) - Parallel Khatri-Rao and Gramian kernels via
//!   `scirs2_core::parallel_ops`
//!
//! ## SciRS2 Integration
//!
//! This crate uses `scirs2-core` for all array operations and numerical computations.
//! Direct use of `ndarray`, `rand`, or `num-traits` is avoided.

#![deny(warnings)]

pub mod error;
pub mod gram;
pub mod hadamard;
pub mod khatri_rao;
pub mod mttkrp;
pub mod vectorize;


// Re-exports
pub use error::{KernelError, KernelResult};
pub use gram::*;
pub use hadamard::*;
pub use khatri_rao::*;
pub use mttkrp::*;
pub use vectorize::*;
