//! # tenfit - CP decomposition by damped Gauss-Newton
//!
//! This is the **meta crate** that re-exports all tenfit components for
//! convenient access.
//!
//! ## Quick Start
//!
//! ```
//! use tenfit::prelude::*;
//!
//! let (tensor, exact) = random_cpd(&[6, 5, 4], 3, 11)?;
//! let start = perturb(&exact, 0.05, 12);
//! let init_error = relative_error(&tensor, &start)?;
//!
//! let options = DgnOptions::default()
//!     .with_init_damp(1e-3)
//!     .with_inner_method(InnerMethod::CgStatic)
//!     .with_maxiter(50);
//! let initial = start.into_iter().map(ModeFactor::from).collect();
//! let out = dgn(&tensor, initial, 3, init_error, &options)?;
//!
//! assert_eq!(out.factors.len(), 3);
//! assert!(out.best_error <= init_error);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Components
//!
//! ### Dense tensors ([`core`])
//!
//! `DenseND`, mode-n unfold/fold, CP reconstruction and seeded synthetic
//! problems.
//!
//! ```
//! use tenfit::core::DenseND;
//!
//! let tensor = DenseND::<f64>::ones(&[2, 3, 4]);
//! assert_eq!(tensor.unfold(2).unwrap().shape(), &[4, 6]);
//! ```
//!
//! ### Kernels ([`kernels`])
//!
//! Khatri-Rao, Hadamard, Gramians, MTTKRP and factor-block vectorization.
//!
//! ### Gauss-Newton engine ([`cpd`])
//!
//! `dgn`, the implicit Jacobian operators, preconditioned CG, ALS and the
//! post-step transforms.
//!
//! ## Feature Flags
//!
//! - `parallel` (default): parallel kernels in `tenfit-kernels` and `tenfit-cpd`
//! - `serde`: serializable `DgnOptions` and `StopReason`

#![deny(warnings)]

// Re-export all components
pub use tenfit_core as core;
pub use tenfit_cpd as cpd;
pub use tenfit_kernels as kernels;

pub mod prelude {
    //! Prelude module for convenient imports
    //!
    //! # Example
    //!
    //! ```
    //! use tenfit::prelude::*;
    //!
    //! let options = DgnOptions::default().with_inner_method(InnerMethod::Als);
    //! assert_eq!(options.inner_method.at(0), InnerMethod::Als);
    //! ```

    // Core types
    pub use crate::core::synthetic::{perturb, random_cpd};
    pub use crate::core::DenseND;

    // Common kernels
    pub use crate::kernels::{gramian, hadamard, khatri_rao, mttkrp};

    // Gauss-Newton engine
    pub use crate::cpd::{
        cpd2x, dgn, relative_error, x2cpd, Constraints, CpdError, Damping, DgnOptions,
        DgnOutput, InnerMethod, InnerMethods, ModeFactor, StopReason,
    };
}
