use std::ops::Mul;

use faer::linalg::solvers::Solve;
use faer::sparse::SparseColMat;
use faer::sparse::linalg::solvers::{Llt, SymbolicLlt};
use faer::{Mat, Side};
use tracing::debug;

use super::{LinAlgError, LinAlgResult, SparseLinearSolver};

/// Sparse Cholesky solver for `AᵀA x = Aᵀb`.
#[derive(Debug, Clone, Default)]
pub struct SparseCholeskySolver;

impl SparseCholeskySolver {
    pub fn new() -> Self {
        Self
    }
}

impl SparseLinearSolver for SparseCholeskySolver {
    fn solve_normal_equation(
        &mut self,
        rhs: &Mat<f64>,
        jacobians: &SparseColMat<usize, f64>,
    ) -> LinAlgResult<Mat<f64>> {
        if rhs.nrows() != jacobians.nrows() {
            return Err(LinAlgError::InvalidInput(format!(
                "rhs has {} rows, jacobian has {}",
                rhs.nrows(),
                jacobians.nrows()
            )));
        }
        let jt = jacobians
            .transpose()
            .to_col_major()
            .map_err(|e| LinAlgError::MatrixConversion(format!("Transpose failed: {:?}", e)))?;
        let hessian = jt.mul(jacobians);
        let gradient = jacobians.transpose().mul(rhs);

        let sym = SymbolicLlt::try_new(hessian.symbolic(), Side::Lower).map_err(|e| {
            LinAlgError::FactorizationFailed(format!("Symbolic Cholesky failed: {:?}", e))
        })?;

        match Llt::try_new_with_symbolic(sym, hessian.as_ref(), Side::Lower) {
            Ok(cholesky) => Ok(cholesky.solve(&gradient)),
            Err(e) => {
                debug!("Cholesky factorization failed: {:?}", e);
                Err(LinAlgError::SingularMatrix(format!(
                    "normal equations are not positive definite: {:?}",
                    e
                )))
            }
        }
    }
}
