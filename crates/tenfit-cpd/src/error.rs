//! Error type of the CPD engine

use scirs2_linalg::LinalgError;
use tenfit_kernels::KernelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CpdError {
    #[error("Invalid rank: {0}")]
    InvalidRank(usize),

    #[error("Rank {rank} exceeds min(I·J, I·K, J·K) = {bound} of a third-order tensor")]
    RankAboveBound { rank: usize, bound: usize },

    #[error("Unsupported tensor order {0}: expected between 2 and 12 modes")]
    UnsupportedOrder(usize),

    #[error("Mode {mode} has dimension {dim}: every dimension must be at least 2")]
    DegenerateDimension { mode: usize, dim: usize },

    #[error("Factor {mode} has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        mode: usize,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Factor {mode} has {actual} columns, expected rank {expected}")]
    RankMismatch {
        mode: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Unknown inner method '{0}': must be 'cg', 'cg_static' or 'als'")]
    UnknownInnerMethod(String),

    #[error("Invalid option: {0}")]
    InvalidOption(String),

    #[error("Symmetric CPD requires equal dimensions, got {0:?}")]
    SymmetryRequiresEqualDims(Vec<usize>),

    #[error("Kernel error: {0}")]
    Kernel(#[from] KernelError),

    #[error("Linear algebra error: {0}")]
    Linalg(#[from] LinalgError),

    #[error("Tensor error: {0}")]
    Tensor(String),
}

impl From<anyhow::Error> for CpdError {
    fn from(err: anyhow::Error) -> Self {
        CpdError::Tensor(err.to_string())
    }
}

pub type CpdResult<T> = Result<T, CpdError>;
