//! Linear algebra back ends.
//!
//! This module provides the two numeric primitives the elimination engine
//! consumes:
//! - Dense partial QR of an augmented system `[A_F A_S | b]` (nalgebra),
//!   used once per discrete assignment per elimination step
//! - Sparse Cholesky on the normal equations (faer), used to solve a whole
//!   Gaussian factor graph at its optimum

use faer::Mat;
use faer::sparse::SparseColMat;
use thiserror::Error;

pub mod cholesky;
pub mod qr;

pub use cholesky::SparseCholeskySolver;
pub use qr::{PartialElimination, eliminate_augmented};

/// Result type for linear algebra operations
pub type LinAlgResult<T> = Result<T, LinAlgError>;

/// Errors raised by the linear algebra back ends
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinAlgError {
    /// Matrix factorization failed
    #[error("Factorization failed: {0}")]
    FactorizationFailed(String),

    /// A pivot fell below the singularity tolerance
    #[error("Singular matrix: {0}")]
    SingularMatrix(String),

    /// Sparse matrix could not be assembled
    #[error("Sparse matrix creation failed: {0}")]
    SparseMatrixCreation(String),

    /// Conversion between storage layouts failed
    #[error("Matrix conversion failed: {0}")]
    MatrixConversion(String),

    /// Dimensions or arguments were inconsistent
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Solver for the least-squares normal equations `AᵀA x = Aᵀb`.
pub trait SparseLinearSolver: Send {
    fn solve_normal_equation(
        &mut self,
        rhs: &Mat<f64>,
        jacobians: &SparseColMat<usize, f64>,
    ) -> LinAlgResult<Mat<f64>>;
}
