//! Gaussian noise models.
//!
//! A noise model whitens residuals and Jacobians so that the linearized
//! factor has unit covariance: `‖r‖²_Σ = ‖W r‖²` with `WᵀW = Σ⁻¹`.

use nalgebra::{DMatrix, DVector};

use crate::error::{HybridError, HybridResult};

#[derive(Debug, Clone, PartialEq)]
pub enum NoiseModel {
    /// Identity covariance
    Unit(usize),
    /// `σ² I`
    Isotropic { dim: usize, sigma: f64 },
    /// Per-component standard deviations
    Diagonal(DVector<f64>),
    /// Full covariance given through its upper triangular square-root
    /// information `W` (`WᵀW = Σ⁻¹`)
    Gaussian(DMatrix<f64>),
}

impl NoiseModel {
    pub fn unit(dim: usize) -> Self {
        NoiseModel::Unit(dim)
    }

    pub fn isotropic(dim: usize, sigma: f64) -> HybridResult<Self> {
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(HybridError::InvalidInput(format!(
                "isotropic sigma must be positive, got {sigma}"
            )));
        }
        Ok(NoiseModel::Isotropic { dim, sigma })
    }

    pub fn diagonal(sigmas: DVector<f64>) -> HybridResult<Self> {
        if sigmas.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
            return Err(HybridError::InvalidInput(
                "diagonal sigmas must be positive".to_string(),
            ));
        }
        Ok(NoiseModel::Diagonal(sigmas))
    }

    /// From an information matrix `Ω = Σ⁻¹`.
    pub fn from_information(information: DMatrix<f64>) -> HybridResult<Self> {
        if !information.is_square() {
            return Err(HybridError::InvalidInput(
                "information matrix must be square".to_string(),
            ));
        }
        let l = information
            .cholesky()
            .ok_or_else(|| {
                HybridError::LinearAlgebra(
                    "Information matrix is not positive definite".to_string(),
                )
            })?
            .l();
        Ok(NoiseModel::Gaussian(l.transpose()))
    }

    pub fn from_covariance(covariance: DMatrix<f64>) -> HybridResult<Self> {
        let information = covariance.try_inverse().ok_or_else(|| {
            HybridError::LinearAlgebra("Covariance matrix is singular".to_string())
        })?;
        Self::from_information(information)
    }

    pub fn dim(&self) -> usize {
        match self {
            NoiseModel::Unit(dim) => *dim,
            NoiseModel::Isotropic { dim, .. } => *dim,
            NoiseModel::Diagonal(sigmas) => sigmas.len(),
            NoiseModel::Gaussian(sqrt_information) => sqrt_information.nrows(),
        }
    }

    pub fn whiten_vector(&self, v: &DVector<f64>) -> DVector<f64> {
        match self {
            NoiseModel::Unit(_) => v.clone(),
            NoiseModel::Isotropic { sigma, .. } => v / *sigma,
            NoiseModel::Diagonal(sigmas) => v.component_div(sigmas),
            NoiseModel::Gaussian(w) => w * v,
        }
    }

    pub fn whiten_matrix(&self, m: &DMatrix<f64>) -> DMatrix<f64> {
        match self {
            NoiseModel::Unit(_) => m.clone(),
            NoiseModel::Isotropic { sigma, .. } => m / *sigma,
            NoiseModel::Diagonal(sigmas) => {
                let mut out = m.clone();
                for (i, mut row) in out.row_iter_mut().enumerate() {
                    row /= sigmas[i];
                }
                out
            }
            NoiseModel::Gaussian(w) => w * m,
        }
    }

    /// `½‖W r‖²`
    pub fn error(&self, residual: &DVector<f64>) -> f64 {
        0.5 * self.whiten_vector(residual).norm_squared()
    }
}
