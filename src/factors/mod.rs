//! Nonlinear factors
//!
//! This module provides the residual/Jacobian interface the engine
//! linearizes, a small set of vector-space factors, noise models, and the
//! keyed [`NonlinearFactor`] that ties a factor to its variables.
//!
//! # Module Structure
//!
//! - `basic`: priors on a single vector variable
//! - `between_factor`: relative measurements between two vector variables
//! - `noise_model`: Gaussian noise models used for whitening
//! - `nonlinear_factor`: keyed, whitened factors that linearize into
//!   [`JacobianFactor`](crate::linear::JacobianFactor)s

use std::fmt;

use nalgebra::{DMatrix, DVector};

pub mod basic;
pub mod between_factor;
pub mod noise_model;
pub mod nonlinear_factor;

pub use basic::PriorFactor;
pub use between_factor::BetweenFactor;
pub use noise_model::NoiseModel;
pub use nonlinear_factor::NonlinearFactor;

/// Residual and Jacobian evaluation for a measurement model.
///
/// `params` holds one vector per connected variable, in key order. The
/// Jacobian, when requested, is the horizontal concatenation of the
/// per-variable blocks `[∂r/∂x_0 | ∂r/∂x_1 | ...]`.
pub trait Factor: fmt::Debug + Send + Sync {
    fn linearize(
        &self,
        params: &[DVector<f64>],
        compute_jacobian: bool,
    ) -> (DVector<f64>, Option<DMatrix<f64>>);

    /// Residual dimension
    fn get_dimension(&self) -> usize;

    /// Expected dimension of each connected variable
    fn variable_dims(&self) -> Vec<usize>;
}
