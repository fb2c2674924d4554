//! The closed set of factor kinds a hybrid graph can hold.

use std::fmt;
use std::sync::Arc;

use crate::core::key::{DiscreteKey, Key};
use crate::discrete::{DecisionTreeFactor, DiscreteConditional, DiscreteFactor};
use crate::factors::NonlinearFactor;
use crate::hybrid::gaussian_mixture::GaussianMixture;
use crate::hybrid::mixture_factor::{GaussianMixtureFactor, NonlinearMixtureFactor};
use crate::linear::{GaussianConditional, JacobianFactor};

/// Runtime kind of a factor, used for routing and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FactorKind {
    Nonlinear,
    Discrete,
    Gaussian,
    NonlinearMixture,
    GaussianMixture,
}

impl fmt::Display for FactorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FactorKind::Nonlinear => "nonlinear",
            FactorKind::Discrete => "discrete",
            FactorKind::Gaussian => "gaussian",
            FactorKind::NonlinearMixture => "nonlinear mixture",
            FactorKind::GaussianMixture => "gaussian mixture",
        };
        f.write_str(name)
    }
}

/// A factor spanning continuous and discrete keys.
#[derive(Debug, Clone)]
pub enum MixtureFactor {
    Nonlinear(Arc<NonlinearMixtureFactor>),
    Gaussian(Arc<GaussianMixtureFactor>),
}

impl MixtureFactor {
    pub fn keys(&self) -> &[Key] {
        match self {
            MixtureFactor::Nonlinear(f) => f.keys(),
            MixtureFactor::Gaussian(f) => f.keys(),
        }
    }

    pub fn discrete_keys(&self) -> &[DiscreteKey] {
        match self {
            MixtureFactor::Nonlinear(f) => f.discrete_keys(),
            MixtureFactor::Gaussian(f) => f.discrete_keys(),
        }
    }

    pub fn kind(&self) -> FactorKind {
        match self {
            MixtureFactor::Nonlinear(_) => FactorKind::NonlinearMixture,
            MixtureFactor::Gaussian(_) => FactorKind::GaussianMixture,
        }
    }
}

/// Any factor a [`HybridFactorGraph`](super::HybridFactorGraph) accepts.
#[derive(Debug, Clone)]
pub enum HybridFactor {
    Nonlinear(Arc<NonlinearFactor>),
    Discrete(Arc<DiscreteFactor>),
    Gaussian(Arc<JacobianFactor>),
    Mixture(MixtureFactor),
}

impl HybridFactor {
    pub fn kind(&self) -> FactorKind {
        match self {
            HybridFactor::Nonlinear(_) => FactorKind::Nonlinear,
            HybridFactor::Discrete(_) => FactorKind::Discrete,
            HybridFactor::Gaussian(_) => FactorKind::Gaussian,
            HybridFactor::Mixture(m) => m.kind(),
        }
    }

    /// Continuous keys in the factor's own order.
    pub fn continuous_keys(&self) -> Vec<Key> {
        match self {
            HybridFactor::Nonlinear(f) => f.keys().to_vec(),
            HybridFactor::Discrete(_) => Vec::new(),
            HybridFactor::Gaussian(f) => f.keys().to_vec(),
            HybridFactor::Mixture(m) => m.keys().to_vec(),
        }
    }

    pub fn discrete_keys(&self) -> Vec<DiscreteKey> {
        match self {
            HybridFactor::Nonlinear(_) | HybridFactor::Gaussian(_) => Vec::new(),
            HybridFactor::Discrete(f) => f.discrete_keys().to_vec(),
            HybridFactor::Mixture(m) => m.discrete_keys().to_vec(),
        }
    }

    /// Continuous keys followed by discrete keys.
    pub fn keys(&self) -> Vec<Key> {
        let mut keys = self.continuous_keys();
        keys.extend(self.discrete_keys().iter().map(|dk| dk.key));
        keys
    }

    pub fn involves(&self, key: Key) -> bool {
        self.keys().contains(&key)
    }
}

impl From<NonlinearFactor> for HybridFactor {
    fn from(factor: NonlinearFactor) -> Self {
        HybridFactor::Nonlinear(Arc::new(factor))
    }
}

impl From<DiscreteFactor> for HybridFactor {
    fn from(factor: DiscreteFactor) -> Self {
        HybridFactor::Discrete(Arc::new(factor))
    }
}

impl From<DecisionTreeFactor> for HybridFactor {
    fn from(factor: DecisionTreeFactor) -> Self {
        HybridFactor::Discrete(Arc::new(factor.into()))
    }
}

impl From<DiscreteConditional> for HybridFactor {
    fn from(conditional: DiscreteConditional) -> Self {
        HybridFactor::Discrete(Arc::new(conditional.into()))
    }
}

impl From<JacobianFactor> for HybridFactor {
    fn from(factor: JacobianFactor) -> Self {
        HybridFactor::Gaussian(Arc::new(factor))
    }
}

impl From<Arc<JacobianFactor>> for HybridFactor {
    fn from(factor: Arc<JacobianFactor>) -> Self {
        HybridFactor::Gaussian(factor)
    }
}

impl From<NonlinearMixtureFactor> for HybridFactor {
    fn from(factor: NonlinearMixtureFactor) -> Self {
        HybridFactor::Mixture(MixtureFactor::Nonlinear(Arc::new(factor)))
    }
}

impl From<GaussianMixtureFactor> for HybridFactor {
    fn from(factor: GaussianMixtureFactor) -> Self {
        HybridFactor::Mixture(MixtureFactor::Gaussian(Arc::new(factor)))
    }
}

impl From<MixtureFactor> for HybridFactor {
    fn from(factor: MixtureFactor) -> Self {
        HybridFactor::Mixture(factor)
    }
}

/// A conditional re-enters a graph as its unnormalized potential.
impl From<&GaussianConditional> for HybridFactor {
    fn from(conditional: &GaussianConditional) -> Self {
        HybridFactor::Gaussian(Arc::new(conditional.to_factor()))
    }
}

impl TryFrom<&GaussianMixture> for HybridFactor {
    type Error = crate::error::HybridError;

    fn try_from(mixture: &GaussianMixture) -> Result<Self, Self::Error> {
        Ok(mixture.to_factor()?.into())
    }
}
