//! Hybrid conditionals and the Bayes network produced by elimination.

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::core::key::{DiscreteKey, Key};
use crate::core::values::Values;
use crate::discrete::assignment::DiscreteValues;
use crate::error::HybridResult;
use crate::hybrid::gaussian_mixture::GaussianMixture;
use crate::hybrid::hybrid_factor::HybridFactor;
use crate::linear::GaussianConditional;

/// A conditional on continuous frontals, either fixed or selected by mode.
#[derive(Debug, Clone)]
pub enum HybridConditional {
    Gaussian(Arc<GaussianConditional>),
    Mixture(Arc<GaussianMixture>),
}

impl HybridConditional {
    pub fn frontals(&self) -> &[Key] {
        match self {
            HybridConditional::Gaussian(c) => c.frontals(),
            HybridConditional::Mixture(c) => c.frontals(),
        }
    }

    pub fn continuous_parents(&self) -> &[Key] {
        match self {
            HybridConditional::Gaussian(c) => c.parents(),
            HybridConditional::Mixture(c) => c.continuous_parents(),
        }
    }

    pub fn discrete_parents(&self) -> &[DiscreteKey] {
        match self {
            HybridConditional::Gaussian(_) => &[],
            HybridConditional::Mixture(c) => c.discrete_parents(),
        }
    }

    /// Continuous parents (ascending) followed by discrete parents
    /// (descending).
    pub fn parents(&self) -> Vec<Key> {
        match self {
            HybridConditional::Gaussian(c) => c.parents().to_vec(),
            HybridConditional::Mixture(c) => c.parents(),
        }
    }

    pub fn is_mixture(&self) -> bool {
        matches!(self, HybridConditional::Mixture(_))
    }

    /// The Gaussian branch active under `assignment`.
    pub fn conditional_at(
        &self,
        assignment: &DiscreteValues,
    ) -> HybridResult<&Arc<GaussianConditional>> {
        match self {
            HybridConditional::Gaussian(c) => Ok(c),
            HybridConditional::Mixture(c) => c.conditional_at(assignment),
        }
    }

    pub fn log_density(&self, values: &Values, assignment: &DiscreteValues) -> HybridResult<f64> {
        self.conditional_at(assignment)?.log_density(values)
    }

    /// Re-express as a factor so it can be eliminated again.
    pub fn to_factor(&self) -> HybridResult<HybridFactor> {
        match self {
            HybridConditional::Gaussian(c) => Ok(HybridFactor::from(c.as_ref())),
            HybridConditional::Mixture(c) => HybridFactor::try_from(c.as_ref()),
        }
    }

    pub fn equals(&self, other: &HybridConditional, tol: f64) -> bool {
        match (self, other) {
            (HybridConditional::Gaussian(a), HybridConditional::Gaussian(b)) => a.equals(b, tol),
            (HybridConditional::Mixture(a), HybridConditional::Mixture(b)) => a.equals(b, tol),
            _ => false,
        }
    }
}

impl From<GaussianConditional> for HybridConditional {
    fn from(conditional: GaussianConditional) -> Self {
        HybridConditional::Gaussian(Arc::new(conditional))
    }
}

impl From<GaussianMixture> for HybridConditional {
    fn from(mixture: GaussianMixture) -> Self {
        HybridConditional::Mixture(Arc::new(mixture))
    }
}

impl fmt::Display for HybridConditional {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HybridConditional::Gaussian(c) => write!(f, "{c}"),
            HybridConditional::Mixture(c) => write!(f, "{c}"),
        }
    }
}

/// Conditionals in elimination order.
///
/// The continuous parents of every conditional are frontals of a later
/// conditional or variables that were left uneliminated.
#[derive(Debug, Clone, Default)]
pub struct HybridBayesNet {
    conditionals: Vec<HybridConditional>,
}

impl HybridBayesNet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, conditional: impl Into<HybridConditional>) {
        self.conditionals.push(conditional.into());
    }

    pub fn size(&self) -> usize {
        self.conditionals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditionals.is_empty()
    }

    pub fn at(&self, index: usize) -> Option<&HybridConditional> {
        self.conditionals.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HybridConditional> {
        self.conditionals.iter()
    }

    /// Frontal keys of every conditional, in elimination order.
    pub fn frontal_keys(&self) -> Vec<Key> {
        self.conditionals
            .iter()
            .flat_map(|c| c.frontals().iter().copied())
            .collect()
    }

    /// Continuous MAP under a fixed mode assignment.
    pub fn optimize(&self, assignment: &DiscreteValues) -> HybridResult<Values> {
        self.optimize_given(assignment, Values::new())
    }

    /// Back-substitution seeded with values for uneliminated parents.
    pub fn optimize_given(
        &self,
        assignment: &DiscreteValues,
        mut given: Values,
    ) -> HybridResult<Values> {
        for conditional in self.conditionals.iter().rev() {
            let solved = conditional.conditional_at(assignment)?.solve(&given)?;
            trace!("back-substituted {}", conditional);
            given.extend(solved);
        }
        Ok(given)
    }

    /// `Σ log p(F_i | S_i, M)` at a continuous and discrete point.
    pub fn log_density(&self, values: &Values, assignment: &DiscreteValues) -> HybridResult<f64> {
        self.conditionals
            .iter()
            .map(|c| c.log_density(values, assignment))
            .sum()
    }

    /// Negative log density of the continuous part under `assignment`.
    pub fn error(&self, values: &Values, assignment: &DiscreteValues) -> HybridResult<f64> {
        Ok(-self.log_density(values, assignment)?)
    }

    pub fn evaluate(&self, values: &Values, assignment: &DiscreteValues) -> HybridResult<f64> {
        Ok(self.log_density(values, assignment)?.exp())
    }

    pub fn equals(&self, other: &HybridBayesNet, tol: f64) -> bool {
        self.size() == other.size()
            && self
                .conditionals
                .iter()
                .zip(&other.conditionals)
                .all(|(a, b)| a.equals(b, tol))
    }
}

impl FromIterator<HybridConditional> for HybridBayesNet {
    fn from_iter<I: IntoIterator<Item = HybridConditional>>(iter: I) -> Self {
        HybridBayesNet {
            conditionals: iter.into_iter().collect(),
        }
    }
}

impl Extend<HybridConditional> for HybridBayesNet {
    fn extend<I: IntoIterator<Item = HybridConditional>>(&mut self, iter: I) {
        self.conditionals.extend(iter);
    }
}

impl fmt::Display for HybridBayesNet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "HybridBayesNet of size {}", self.size())?;
        for (i, c) in self.conditionals.iter().enumerate() {
            writeln!(f, "  [{i}] {c}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::key::{m, x};
    use crate::discrete::decision_tree::DecisionTree;
    use nalgebra::{DMatrix, dmatrix, dvector};

    const TOLERANCE: f64 = 1e-12;

    fn chain() -> Result<HybridBayesNet, Box<dyn std::error::Error>> {
        // x1 - x2 = 1 under m1 = 0, x1 - x2 = 2 under m1 = 1; x2 = 3
        let branch = |d: f64| -> HybridResult<Arc<GaussianConditional>> {
            Ok(Arc::new(GaussianConditional::new(
                vec![(x(1), 1)],
                vec![(x(2), 1)],
                dmatrix![1.0],
                dmatrix![-1.0],
                dvector![d],
            )?))
        };
        let tree =
            DecisionTree::from_leaves(&[DiscreteKey::new(m(1), 2)], vec![branch(1.0)?, branch(2.0)?])?;
        let mut bn = HybridBayesNet::new();
        bn.push(GaussianMixture::new(tree)?);
        bn.push(GaussianConditional::new(
            vec![(x(2), 1)],
            vec![],
            dmatrix![1.0],
            DMatrix::zeros(1, 0),
            dvector![3.0],
        )?);
        Ok(bn)
    }

    #[test]
    fn test_optimize_back_substitutes_in_reverse() -> Result<(), Box<dyn std::error::Error>> {
        let bn = chain()?;
        assert_eq!(bn.size(), 2);
        assert_eq!(bn.frontal_keys(), vec![x(1), x(2)]);

        let mut assignment = DiscreteValues::new();
        assignment.insert(m(1), 1);
        let solution = bn.optimize(&assignment)?;
        assert!((solution.at(x(2))?[0] - 3.0).abs() < TOLERANCE);
        assert!((solution.at(x(1))?[0] - 5.0).abs() < TOLERANCE);
        Ok(())
    }

    #[test]
    fn test_parents_order_and_mixture_flag() -> Result<(), Box<dyn std::error::Error>> {
        let bn = chain()?;
        let first = bn.at(0).ok_or("missing conditional")?;
        assert!(first.is_mixture());
        assert_eq!(first.parents(), vec![x(2), m(1)]);
        assert!(!bn.at(1).ok_or("missing conditional")?.is_mixture());
        assert!(bn.equals(&chain()?, TOLERANCE));
        Ok(())
    }

    #[test]
    fn test_error_at_optimum_is_normalizer() -> Result<(), Box<dyn std::error::Error>> {
        let bn = chain()?;
        let mut assignment = DiscreteValues::new();
        assignment.insert(m(1), 0);
        let solution = bn.optimize(&assignment)?;
        // Unit R blocks: each conditional contributes ½ ln 2π.
        let expected = (2.0 * std::f64::consts::PI).ln();
        assert!((bn.error(&solution, &assignment)? - expected).abs() < TOLERANCE);
        assert!((bn.evaluate(&solution, &assignment)? - (-expected).exp()).abs() < TOLERANCE);
        Ok(())
    }

    #[test]
    fn test_optimize_requires_mode() -> Result<(), Box<dyn std::error::Error>> {
        let bn = chain()?;
        assert!(bn.optimize(&DiscreteValues::new()).is_err());
        Ok(())
    }
}
