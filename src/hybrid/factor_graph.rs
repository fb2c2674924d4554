//! The typed hybrid factor container.
//!
//! Factors are routed on insertion into one of four ordered
//! sub-collections by their runtime kind. Every pass over the container
//! (linearization, summation, elimination) returns new outputs and leaves
//! the input untouched; factors themselves are shared through `Arc`.

use std::collections::BTreeSet;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::core::key::{DiscreteKey, Key};
use crate::core::ordering::Ordering;
use crate::core::values::Values;
use crate::discrete::assignment::{DiscreteValues, cartesian_product, merge_discrete_keys};
use crate::discrete::decision_tree::DecisionTree;
use crate::discrete::factor::{DecisionTreeFactor, DiscreteFactor};
use crate::error::{HybridError, HybridResult};
use crate::factors::NonlinearFactor;
use crate::hybrid::bayes_net::HybridBayesNet;
use crate::hybrid::elimination::{EliminationConfig, eliminate_hybrid};
use crate::hybrid::elimination_tree::EliminationTree;
use crate::hybrid::hybrid_factor::{HybridFactor, MixtureFactor};
use crate::hybrid::mixture_factor::GaussianMixtureFactor;
use crate::linear::{GaussianFactorGraph, JacobianFactor};

/// Heterogeneous factor graph with one sub-collection per factor kind.
#[derive(Debug, Clone, Default)]
pub struct HybridFactorGraph {
    nonlinear: Vec<Arc<NonlinearFactor>>,
    discrete: Vec<Arc<DiscreteFactor>>,
    gaussian: Vec<Arc<JacobianFactor>>,
    hybrid: Vec<MixtureFactor>,
}

impl HybridFactorGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a factor to the sub-collection of its kind.
    pub fn push_back(&mut self, factor: impl Into<HybridFactor>) {
        match factor.into() {
            HybridFactor::Nonlinear(f) => self.nonlinear.push(f),
            HybridFactor::Discrete(f) => self.discrete.push(f),
            HybridFactor::Gaussian(f) => self.gaussian.push(f),
            HybridFactor::Mixture(f) => self.hybrid.push(f),
        }
    }

    pub fn push_nonlinear(&mut self, factor: Arc<NonlinearFactor>) {
        self.nonlinear.push(factor);
    }

    pub fn push_discrete(&mut self, factor: Arc<DiscreteFactor>) {
        self.discrete.push(factor);
    }

    pub fn push_gaussian(&mut self, factor: Arc<JacobianFactor>) {
        self.gaussian.push(factor);
    }

    pub fn push_mixture(&mut self, factor: MixtureFactor) {
        self.hybrid.push(factor);
    }

    /// Total number of factors across all kinds.
    pub fn size(&self) -> usize {
        self.nonlinear.len() + self.discrete.len() + self.gaussian.len() + self.hybrid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn clear(&mut self) {
        self.nonlinear.clear();
        self.discrete.clear();
        self.gaussian.clear();
        self.hybrid.clear();
    }

    pub fn nonlinear_graph(&self) -> &[Arc<NonlinearFactor>] {
        &self.nonlinear
    }

    pub fn discrete_graph(&self) -> &[Arc<DiscreteFactor>] {
        &self.discrete
    }

    pub fn gaussian_graph(&self) -> &[Arc<JacobianFactor>] {
        &self.gaussian
    }

    pub fn hybrid_graph(&self) -> &[MixtureFactor] {
        &self.hybrid
    }

    /// Every factor, kind by kind: nonlinear, discrete, Gaussian, hybrid.
    pub fn iter(&self) -> impl Iterator<Item = HybridFactor> + '_ {
        self.nonlinear
            .iter()
            .cloned()
            .map(HybridFactor::Nonlinear)
            .chain(self.discrete.iter().cloned().map(HybridFactor::Discrete))
            .chain(self.gaussian.iter().cloned().map(HybridFactor::Gaussian))
            .chain(self.hybrid.iter().cloned().map(HybridFactor::Mixture))
    }

    pub fn continuous_keys(&self) -> BTreeSet<Key> {
        self.iter().flat_map(|f| f.continuous_keys()).collect()
    }

    /// Every discrete key, sorted descending.
    pub fn discrete_keys(&self) -> HybridResult<Vec<DiscreteKey>> {
        let lists: Vec<Vec<DiscreteKey>> = self.iter().map(|f| f.discrete_keys()).collect();
        merge_discrete_keys(lists.iter().map(|l| l.as_slice()))
    }

    /// `ordering` without the keys this graph uses as discrete modes.
    pub(crate) fn continuous_ordering(&self, ordering: &Ordering) -> Ordering {
        let modes: BTreeSet<Key> = self
            .iter()
            .flat_map(|f| f.discrete_keys())
            .map(|dk| dk.key)
            .collect();
        Ordering::new(ordering.iter().filter(|k| !modes.contains(k)).collect())
    }

    /// Linearize every nonlinear factor and nonlinear mixture at `values`.
    ///
    /// Discrete and already-linear factors are shared with the result.
    pub fn linearize(&self, values: &Values) -> HybridResult<HybridFactorGraph> {
        let gaussian = self
            .nonlinear
            .par_iter()
            .map(|f| f.linearize(values).map(Arc::new))
            .collect::<HybridResult<Vec<_>>>()?;
        let hybrid = self
            .hybrid
            .par_iter()
            .map(|f| match f {
                MixtureFactor::Nonlinear(m) => Ok(MixtureFactor::Gaussian(Arc::new(
                    m.linearize(values)?,
                ))),
                MixtureFactor::Gaussian(_) => Ok(f.clone()),
            })
            .collect::<HybridResult<Vec<_>>>()?;
        debug!(
            "linearized {} nonlinear and {} hybrid factors",
            self.nonlinear.len(),
            self.hybrid.len()
        );

        let mut linear = HybridFactorGraph {
            nonlinear: Vec::new(),
            discrete: self.discrete.clone(),
            gaussian: self.gaussian.clone(),
            hybrid,
        };
        linear.gaussian.extend(gaussian);
        Ok(linear)
    }

    /// Mode-indexed Gaussian graphs: the pure Gaussian factors followed by
    /// the selected component of every mixture.
    pub fn sum(&self) -> HybridResult<GaussianSum> {
        if !self.nonlinear.is_empty() {
            return Err(HybridError::unsupported("sum", "nonlinear"));
        }
        if !self.discrete.is_empty() {
            return Err(HybridError::unsupported("sum", "discrete"));
        }
        let mut mixtures = Vec::with_capacity(self.hybrid.len());
        for factor in &self.hybrid {
            match factor {
                MixtureFactor::Gaussian(m) => mixtures.push(m.clone()),
                MixtureFactor::Nonlinear(_) => {
                    return Err(HybridError::unsupported("sum", &factor.kind().to_string()));
                }
            }
        }
        let discrete_keys = merge_discrete_keys(mixtures.iter().map(|m| m.discrete_keys()))?;
        Ok(GaussianSum {
            gaussian: self.gaussian.clone(),
            mixtures,
            discrete_keys,
        })
    }

    /// `exp(−E(x*))` per mode assignment, where `x*` minimizes the selected
    /// Gaussian graph's error `E`.
    pub fn to_decision_tree_factor(&self) -> HybridResult<DecisionTreeFactor> {
        let sum = self.sum()?;
        let keys = sum.discrete_keys().to_vec();
        let leaves = cartesian_product(&keys)?
            .par_iter()
            .map(|assignment| {
                let graph = sum.at(assignment)?;
                let optimum = graph.optimize()?;
                graph.prob_prime(&optimum)
            })
            .collect::<HybridResult<Vec<f64>>>()?;
        Ok(DecisionTreeFactor::from_tree(DecisionTree::from_leaves(
            &keys, leaves,
        )?))
    }

    /// Normalized product of the discrete factors.
    pub fn discrete_posterior(&self) -> HybridResult<DecisionTreeFactor> {
        if let Some(other) = self.iter().find(|f| !matches!(f, HybridFactor::Discrete(_))) {
            return Err(HybridError::unsupported("discrete_posterior", &other.kind().to_string()));
        }
        let mut product = DecisionTreeFactor::from_tree(DecisionTree::leaf(1.0));
        for factor in &self.discrete {
            product = product.product(&factor.to_decision_tree_factor())?;
        }
        product.normalize()
    }

    /// Total negative log potential at a continuous and discrete point.
    pub fn error(&self, values: &Values, assignment: &DiscreteValues) -> HybridResult<f64> {
        let mut total = 0.0;
        for f in &self.nonlinear {
            total += f.error(values)?;
        }
        for f in &self.discrete {
            total -= f.evaluate(assignment)?.ln();
        }
        for f in &self.gaussian {
            total += f.error(values)?;
        }
        for f in &self.hybrid {
            total += match f {
                MixtureFactor::Nonlinear(m) => m.error(values, assignment)?,
                MixtureFactor::Gaussian(m) => m.error(values, assignment)?,
            };
        }
        Ok(total)
    }

    pub fn eliminate_partial_sequential(
        &self,
        ordering: &Ordering,
    ) -> HybridResult<(HybridBayesNet, HybridFactorGraph)> {
        self.eliminate_partial_sequential_with_config(ordering, &EliminationConfig::default())
    }

    /// Eliminate the keys of `ordering` one at a time.
    ///
    /// Returns the conditionals in elimination order and the remaining
    /// factors: everything not touching the ordering plus the residuals.
    pub fn eliminate_partial_sequential_with_config(
        &self,
        ordering: &Ordering,
        config: &EliminationConfig,
    ) -> HybridResult<(HybridBayesNet, HybridFactorGraph)> {
        if !self.nonlinear.is_empty() {
            return Err(HybridError::unsupported("eliminate", "nonlinear"));
        }
        if let Some(m) = self
            .hybrid
            .iter()
            .find(|m| matches!(m, MixtureFactor::Nonlinear(_)))
        {
            return Err(HybridError::unsupported("eliminate", &m.kind().to_string()));
        }
        if !ordering.is_unique() {
            return Err(HybridError::InvalidInput(format!(
                "ordering [{ordering}] repeats a key"
            )));
        }
        let ordering = &self.continuous_ordering(ordering);
        let etree = EliminationTree::new(self, ordering)?;
        info!(
            "eliminating {} variables from {} factors ({} tree roots)",
            ordering.len(),
            self.size(),
            etree.roots().len()
        );

        let mut bayes_net = HybridBayesNet::new();
        let mut working: Vec<HybridFactor> = self.iter().collect();
        for key in ordering.iter() {
            let (involved, rest): (Vec<_>, Vec<_>) = working
                .into_iter()
                .partition(|f| f.involves(key));
            working = rest;
            let local: HybridFactorGraph = involved.into_iter().collect();
            let (conditional, residual) = eliminate_hybrid(&local, &[key], config)?;
            bayes_net.push(conditional);
            working.extend(residual);
        }
        Ok((bayes_net, working.into_iter().collect()))
    }
}

impl FromIterator<HybridFactor> for HybridFactorGraph {
    fn from_iter<I: IntoIterator<Item = HybridFactor>>(iter: I) -> Self {
        let mut graph = HybridFactorGraph::new();
        graph.extend(iter);
        graph
    }
}

impl Extend<HybridFactor> for HybridFactorGraph {
    fn extend<I: IntoIterator<Item = HybridFactor>>(&mut self, iter: I) {
        for factor in iter {
            self.push_back(factor);
        }
    }
}

/// Result of [`HybridFactorGraph::sum`]: a pure function from a mode
/// assignment to the Gaussian graph selected by it.
#[derive(Debug, Clone)]
pub struct GaussianSum {
    gaussian: Vec<Arc<JacobianFactor>>,
    mixtures: Vec<Arc<GaussianMixtureFactor>>,
    discrete_keys: Vec<DiscreteKey>,
}

impl GaussianSum {
    /// Mode keys of the mixtures, sorted descending.
    pub fn discrete_keys(&self) -> &[DiscreteKey] {
        &self.discrete_keys
    }

    /// Number of factors in every selected graph.
    pub fn size(&self) -> usize {
        self.gaussian.len() + self.mixtures.len()
    }

    pub fn at(&self, assignment: &DiscreteValues) -> HybridResult<GaussianFactorGraph> {
        let mut graph = GaussianFactorGraph::with_capacity(self.size());
        for f in &self.gaussian {
            graph.push(f.clone());
        }
        for m in &self.mixtures {
            graph.push(m.component_at(assignment)?.clone());
        }
        Ok(graph)
    }

    pub fn as_fn(&self) -> impl Fn(&DiscreteValues) -> HybridResult<GaussianFactorGraph> + '_ {
        move |assignment| self.at(assignment)
    }

    /// One selected graph per assignment, as a decision tree.
    pub fn to_tree(&self) -> HybridResult<DecisionTree<GaussianFactorGraph>> {
        DecisionTree::try_from_fn(&self.discrete_keys, |assignment| self.at(assignment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::key::{m, x};
    use crate::discrete::factor::DiscreteConditional;
    use crate::factors::{BetweenFactor, NoiseModel, PriorFactor};
    use crate::hybrid::mixture_factor::NonlinearMixtureFactor;
    use nalgebra::{dmatrix, dvector};

    const TOLERANCE: f64 = 1e-12;

    fn small_graph() -> Result<HybridFactorGraph, Box<dyn std::error::Error>> {
        let noise = NoiseModel::isotropic(1, 1.0)?;
        let mut graph = HybridFactorGraph::new();
        graph.push_back(NonlinearFactor::new(
            vec![x(1)],
            PriorFactor::scalar(0.0),
            noise.clone(),
        )?);
        graph.push_back(NonlinearMixtureFactor::new(
            vec![DiscreteKey::new(m(1), 2)],
            vec![
                NonlinearFactor::new(vec![x(1), x(2)], BetweenFactor::scalar(0.0), noise.clone())?,
                NonlinearFactor::new(vec![x(1), x(2)], BetweenFactor::scalar(1.0), noise)?,
            ],
        )?);
        graph.push_back(DiscreteConditional::from_spec(
            DiscreteKey::new(m(1), 2),
            &[],
            "1/3",
        )?);
        graph.push_back(JacobianFactor::new(vec![(x(2), dmatrix![1.0])], dvector![1.0])?);
        Ok(graph)
    }

    fn point() -> Values {
        [(x(1), dvector![0.0]), (x(2), dvector![0.0])]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_push_back_routes_by_kind() -> Result<(), Box<dyn std::error::Error>> {
        let graph = small_graph()?;
        assert_eq!(graph.size(), 4);
        assert_eq!(graph.nonlinear_graph().len(), 1);
        assert_eq!(graph.hybrid_graph().len(), 1);
        assert_eq!(graph.discrete_graph().len(), 1);
        assert_eq!(graph.gaussian_graph().len(), 1);
        assert_eq!(graph.iter().count(), graph.size());
        assert_eq!(graph.continuous_keys().into_iter().collect::<Vec<_>>(), vec![x(1), x(2)]);
        assert_eq!(graph.discrete_keys()?, vec![DiscreteKey::new(m(1), 2)]);
        Ok(())
    }

    #[test]
    fn test_linearize_shares_untouched_factors() -> Result<(), Box<dyn std::error::Error>> {
        let graph = small_graph()?;
        let linear = graph.linearize(&point())?;
        assert!(linear.nonlinear_graph().is_empty());
        assert_eq!(linear.gaussian_graph().len(), 2);
        assert!(Arc::ptr_eq(&linear.discrete_graph()[0], &graph.discrete_graph()[0]));
        assert!(Arc::ptr_eq(&linear.gaussian_graph()[0], &graph.gaussian_graph()[0]));
        assert!(matches!(linear.hybrid_graph()[0], MixtureFactor::Gaussian(_)));
        // Input is untouched.
        assert_eq!(graph.nonlinear_graph().len(), 1);
        Ok(())
    }

    #[test]
    fn test_linearize_missing_value() -> Result<(), Box<dyn std::error::Error>> {
        let graph = small_graph()?;
        let partial: Values = [(x(1), dvector![0.0])].into_iter().collect();
        assert!(matches!(
            graph.linearize(&partial),
            Err(HybridError::Linearization { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_sum_rejects_nonlinear_and_discrete() -> Result<(), Box<dyn std::error::Error>> {
        let graph = small_graph()?;
        assert!(matches!(
            graph.sum(),
            Err(HybridError::UnsupportedFactorKind { .. })
        ));
        let linear = graph.linearize(&point())?;
        assert!(matches!(
            linear.sum(),
            Err(HybridError::UnsupportedFactorKind { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_sum_selects_components() -> Result<(), Box<dyn std::error::Error>> {
        let linear = small_graph()?.linearize(&point())?;
        let mut continuous = HybridFactorGraph::new();
        for f in linear.gaussian_graph() {
            continuous.push_gaussian(f.clone());
        }
        for f in linear.hybrid_graph() {
            continuous.push_mixture(f.clone());
        }

        let sum = continuous.sum()?;
        assert_eq!(sum.discrete_keys(), &[DiscreteKey::new(m(1), 2)]);
        let select = sum.as_fn();
        for assignment in cartesian_product(sum.discrete_keys())? {
            assert_eq!(select(&assignment)?.len(), 3);
        }
        assert_eq!(sum.to_tree()?.leaf_count(), 2);
        Ok(())
    }

    #[test]
    fn test_error_adds_every_kind() -> Result<(), Box<dyn std::error::Error>> {
        let graph = small_graph()?;
        let values: Values = [(x(1), dvector![0.0]), (x(2), dvector![1.0])]
            .into_iter()
            .collect();
        let mut assignment = DiscreteValues::new();
        assignment.insert(m(1), 1);
        // prior 0, between 0 under m1 = 1, p(m1 = 1) = 3/4, x2 = 1 exact
        let expected = -(0.75_f64).ln();
        assert!((graph.error(&values, &assignment)? - expected).abs() < TOLERANCE);
        Ok(())
    }

    #[test]
    fn test_discrete_posterior() -> Result<(), Box<dyn std::error::Error>> {
        let mut graph = HybridFactorGraph::new();
        graph.push_back(DecisionTreeFactor::new(&[DiscreteKey::new(m(1), 2)], vec![1.0, 3.0])?);
        graph.push_back(DecisionTreeFactor::new(&[DiscreteKey::new(m(1), 2)], vec![2.0, 2.0])?);
        let posterior = graph.discrete_posterior()?;
        assert!((posterior.table()?[1] - 0.75).abs() < TOLERANCE);

        assert!(small_graph()?.discrete_posterior().is_err());
        Ok(())
    }

    #[test]
    fn test_eliminate_rejects_nonlinear() -> Result<(), Box<dyn std::error::Error>> {
        let graph = small_graph()?;
        assert!(matches!(
            graph.eliminate_partial_sequential(&Ordering::new(vec![x(1)])),
            Err(HybridError::UnsupportedFactorKind { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_eliminate_partial_keeps_unordered_scope() -> Result<(), Box<dyn std::error::Error>> {
        let linear = small_graph()?.linearize(&point())?;
        let (bn, remaining) = linear.eliminate_partial_sequential(&Ordering::new(vec![x(1)]))?;
        assert_eq!(bn.size(), 1);
        assert_eq!(bn.frontal_keys(), vec![x(1)]);
        assert_eq!(
            remaining.continuous_keys().into_iter().collect::<Vec<_>>(),
            vec![x(2)]
        );
        // The discrete prior is carried through unchanged.
        assert_eq!(remaining.discrete_graph().len(), 1);
        Ok(())
    }
}
