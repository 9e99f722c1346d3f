//! Errors reported by the kernels
//!
//! Each variant names the kernel that failed and carries the sizes that did
//! not fit, so callers can report them without parsing a message.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum KernelError {
    /// A flat block does not hold exactly `rows × cols` entries
    #[error("{operation}: block of length {len} cannot hold a {rows} × {cols} matrix")]
    BlockLength {
        operation: &'static str,
        rows: usize,
        cols: usize,
        len: usize,
    },

    #[error("{operation}: operand shapes {left:?} and {right:?} differ")]
    ShapeMismatch {
        operation: &'static str,
        left: Vec<usize>,
        right: Vec<usize>,
    },

    #[error("{operation}: factor {index} has {actual} columns, expected rank {expected}")]
    RankMismatch {
        operation: &'static str,
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("{operation}: {actual} factor matrices for a tensor with {expected} modes")]
    FactorCount {
        operation: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{operation}: factor {mode} has {actual} rows, tensor mode {mode} has size {expected}")]
    FactorRows {
        operation: &'static str,
        mode: usize,
        expected: usize,
        actual: usize,
    },

    /// A mode index past the tensor order
    #[error("{operation}: mode {mode} out of range for order {order}")]
    InvalidMode {
        operation: &'static str,
        mode: usize,
        order: usize,
    },

    /// A skipped mode that does not exist
    #[error("{operation}: cannot skip mode {mode} of {order}")]
    SkipOutOfRange {
        operation: &'static str,
        mode: usize,
        order: usize,
    },

    #[error("Gramian of mode {mode} has shape {shape:?}, expected {rank} × {rank}")]
    NonSquareGramian {
        mode: usize,
        rank: usize,
        shape: Vec<usize>,
    },

    #[error("{operation}: no {parameter} given")]
    EmptyInput {
        operation: &'static str,
        parameter: &'static str,
    },

    #[error("unfold along mode {mode} failed: {reason}")]
    Unfold { mode: usize, reason: String },
}

pub type KernelResult<T> = Result<T, KernelError>;

impl KernelError {
    /// Error unless `len == rows * cols`
    pub fn check_block(
        operation: &'static str,
        len: usize,
        rows: usize,
        cols: usize,
    ) -> KernelResult<()> {
        if len == rows * cols {
            Ok(())
        } else {
            Err(KernelError::BlockLength {
                operation,
                rows,
                cols,
                len,
            })
        }
    }

    /// Error unless every mode in `skip` is below `order`
    pub fn check_skip(operation: &'static str, skip: &[usize], order: usize) -> KernelResult<()> {
        match skip.iter().find(|&&mode| mode >= order) {
            Some(&mode) => Err(KernelError::SkipOutOfRange {
                operation,
                mode,
                order,
            }),
            None => Ok(()),
        }
    }
}
