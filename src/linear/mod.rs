//! Linear Gaussian factors, conditionals and graphs
//!
//! Everything here is already whitened: noise models are folded into `A`
//! and `b` at linearization time.

pub mod gaussian_conditional;
pub mod gaussian_factor_graph;
pub mod jacobian_factor;

pub use gaussian_conditional::GaussianConditional;
pub use gaussian_factor_graph::{GaussianElimination, GaussianFactorGraph};
pub use jacobian_factor::JacobianFactor;
