pub mod core;
pub mod discrete;
pub mod error;
pub mod factors;
pub mod hybrid;
pub mod linalg;
pub mod linear;
pub mod logger;

pub use crate::core::{DiscreteKey, Key, Ordering, Symbol, Values, format_key, format_keys, m, x};
pub use discrete::{DecisionTree, DecisionTreeFactor, DiscreteConditional, DiscreteFactor, DiscreteValues};
pub use error::{HybridError, HybridResult};
pub use hybrid::{
    EliminationConfig, GaussianMixture, GaussianMixtureFactor, HybridBayesNet, HybridConditional,
    HybridFactor, HybridFactorGraph, InferenceState, NonlinearMixtureFactor, eliminate_hybrid,
};
pub use linear::{GaussianConditional, GaussianFactorGraph, JacobianFactor};
pub use logger::{init_logger, init_logger_with_level};
