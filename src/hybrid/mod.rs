//! Hybrid discrete/continuous factor graphs and their exact elimination
//!
//! # Module Structure
//!
//! - `hybrid_factor`: the closed sum type of factor kinds
//! - `mixture_factor`: nonlinear and Gaussian mixtures selected by mode
//! - `gaussian_mixture`: mode-selected Gaussian conditionals
//! - `factor_graph`: the typed container, linearization and summation
//! - `elimination`: one hybrid elimination step and its configuration
//! - `elimination_tree`: structure of an elimination over an ordering
//! - `bayes_net`: hybrid conditionals and the Bayes network
//! - `incremental`: snapshot-based incremental updates

pub mod bayes_net;
pub mod elimination;
pub mod elimination_tree;
pub mod factor_graph;
pub mod gaussian_mixture;
pub mod hybrid_factor;
pub mod incremental;
pub mod mixture_factor;

pub use bayes_net::{HybridBayesNet, HybridConditional};
pub use elimination::{EliminationConfig, eliminate_hybrid};
pub use elimination_tree::{EliminationNode, EliminationTree};
pub use factor_graph::{GaussianSum, HybridFactorGraph};
pub use gaussian_mixture::GaussianMixture;
pub use hybrid_factor::{FactorKind, HybridFactor, MixtureFactor};
pub use incremental::InferenceState;
pub use mixture_factor::{GaussianMixtureFactor, NonlinearMixtureFactor};
