use super::Factor;
use nalgebra::{DMatrix, DVector};

/// Relative measurement between two vector variables.
///
/// # Mathematical Formulation
///
/// Given two states `x_i` and `x_j` in Rⁿ and a measured displacement `z_ij`:
///
/// ```text
/// r = (x_j − x_i) − z_ij
/// ```
///
/// The Jacobian is the `n × 2n` matrix `[−I | I]`.
///
/// # Use Cases
///
/// - Odometry between consecutive states of a 1D or 2D robot
/// - The per-mode motion models of a switching system, where each mode
///   carries its own `z_ij` (e.g. 0 for "still", 1 for "moving")
///
/// # Example
///
/// ```
/// use hybrid_solver::factors::{BetweenFactor, Factor};
/// use nalgebra::dvector;
///
/// let moving = BetweenFactor::scalar(1.0);
/// let (residual, jacobian) = moving.linearize(&[dvector![1.0], dvector![2.5]], true);
/// assert_eq!(residual[0], 0.5);
/// assert_eq!(jacobian.map(|j| j.ncols()), Some(2));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BetweenFactor {
    /// Measured displacement `x_j − x_i`
    pub measured: DVector<f64>,
}

impl BetweenFactor {
    pub fn new(measured: DVector<f64>) -> Self {
        BetweenFactor { measured }
    }

    pub fn scalar(measured: f64) -> Self {
        BetweenFactor::new(DVector::from_element(1, measured))
    }
}

impl Factor for BetweenFactor {
    fn linearize(
        &self,
        params: &[DVector<f64>],
        compute_jacobian: bool,
    ) -> (DVector<f64>, Option<DMatrix<f64>>) {
        let residual = (&params[1] - &params[0]) - &self.measured;

        let jacobian = if compute_jacobian {
            let dof = self.measured.len();
            let mut jacobian = DMatrix::<f64>::zeros(dof, 2 * dof);
            for i in 0..dof {
                jacobian[(i, i)] = -1.0;
                jacobian[(i, i + dof)] = 1.0;
            }
            Some(jacobian)
        } else {
            None
        };
        (residual, jacobian)
    }

    fn get_dimension(&self) -> usize {
        self.measured.len()
    }

    fn variable_dims(&self) -> Vec<usize> {
        vec![self.measured.len(); 2]
    }
}
