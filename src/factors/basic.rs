//! Prior factors on vector variables.
//!
//! A prior pulls a single variable toward a target value:
//! ```text
//! r(x) = x − x_prior
//! ```

use nalgebra::{DMatrix, DVector};

use super::Factor;

#[derive(Debug, Clone, PartialEq)]
pub struct PriorFactor {
    /// Target value
    pub prior: DVector<f64>,
}

impl PriorFactor {
    pub fn new(prior: DVector<f64>) -> Self {
        PriorFactor { prior }
    }

    /// Scalar prior, the common case for one-dimensional states.
    pub fn scalar(value: f64) -> Self {
        PriorFactor::new(DVector::from_element(1, value))
    }
}

impl Factor for PriorFactor {
    fn linearize(
        &self,
        params: &[DVector<f64>],
        compute_jacobian: bool,
    ) -> (DVector<f64>, Option<DMatrix<f64>>) {
        let residual = &params[0] - &self.prior;
        let jacobian = compute_jacobian.then(|| DMatrix::identity(self.prior.len(), self.prior.len()));
        (residual, jacobian)
    }

    fn get_dimension(&self) -> usize {
        self.prior.len()
    }

    fn variable_dims(&self) -> Vec<usize> {
        vec![self.prior.len()]
    }
}
