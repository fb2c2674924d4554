//! Incremental hybrid inference.
//!
//! [`InferenceState`] is an immutable snapshot of a Bayes network and the
//! residual graph left by the last elimination. [`InferenceState::update`]
//! folds new factors in by re-eliminating only the conditionals they
//! affect, and returns the next snapshot.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info};

use crate::core::key::{Key, format_keys};
use crate::core::ordering::Ordering;
use crate::error::HybridResult;
use crate::hybrid::bayes_net::HybridBayesNet;
use crate::hybrid::elimination::EliminationConfig;
use crate::hybrid::factor_graph::HybridFactorGraph;

#[derive(Debug, Clone, Default)]
pub struct InferenceState {
    bayes_net: HybridBayesNet,
    residual: HybridFactorGraph,
    config: EliminationConfig,
}

impl InferenceState {
    /// Empty state; the first [`update`](Self::update) is a batch
    /// elimination.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EliminationConfig) -> Self {
        InferenceState {
            config,
            ..Self::default()
        }
    }

    pub fn from_parts(bayes_net: HybridBayesNet, residual: HybridFactorGraph) -> Self {
        InferenceState {
            bayes_net,
            residual,
            config: EliminationConfig::default(),
        }
    }

    pub fn bayes_net(&self) -> &HybridBayesNet {
        &self.bayes_net
    }

    pub fn residual(&self) -> &HybridFactorGraph {
        &self.residual
    }

    pub fn config(&self) -> &EliminationConfig {
        &self.config
    }

    /// Add `new_factors` and eliminate `ordering`.
    ///
    /// Conditionals whose frontals are touched by the new factors or named
    /// in `ordering` are turned back into factors, together with every
    /// conditional their continuous parents depend on. Their frontals that
    /// `ordering` omits are eliminated first, in their previous order.
    /// Residual factors touching the same keys are pulled in as well.
    /// Everything else is carried over unchanged.
    pub fn update(
        &self,
        new_factors: &HybridFactorGraph,
        ordering: &Ordering,
    ) -> HybridResult<InferenceState> {
        let mut affected: BTreeSet<Key> = new_factors.continuous_keys();
        affected.extend(ordering.iter());

        let reinjected = self.conditionals_to_reinject(&affected);
        debug!(
            "update touches [{}], re-injecting {} of {} conditionals",
            format_keys(&affected.iter().copied().collect::<Vec<_>>()),
            reinjected.len(),
            self.bayes_net.size()
        );

        let mut graph = new_factors.clone();
        let mut kept = HybridBayesNet::new();
        let mut full_ordering = Ordering::default();
        for (index, conditional) in self.bayes_net.iter().enumerate() {
            if reinjected.contains(&index) {
                graph.push_back(conditional.to_factor()?);
                for key in conditional.frontals() {
                    if !ordering.contains(*key) {
                        full_ordering.push(*key);
                    }
                }
            } else {
                kept.push(conditional.clone());
            }
        }
        for key in ordering.iter() {
            full_ordering.push(key);
        }

        let mut untouched = HybridFactorGraph::new();
        let mut pulled = 0;
        for factor in self.residual.iter() {
            if factor.continuous_keys().iter().any(|k| affected.contains(k)) {
                graph.push_back(factor);
                pulled += 1;
            } else {
                untouched.push_back(factor);
            }
        }

        let (bayes_net, residual) =
            graph.eliminate_partial_sequential_with_config(&full_ordering, &self.config)?;
        info!(
            "incremental update: kept {} conditionals, pulled {} residual factors, eliminated [{}]",
            kept.size(),
            pulled,
            full_ordering
        );

        kept.extend(bayes_net.iter().cloned());
        untouched.extend(residual.iter());
        Ok(InferenceState {
            bayes_net: kept,
            residual: untouched,
            config: self.config,
        })
    }

    /// Indices of the conditionals whose frontals meet `affected`, closed
    /// over the conditionals that own their continuous parents.
    fn conditionals_to_reinject(&self, affected: &BTreeSet<Key>) -> BTreeSet<usize> {
        let owner: HashMap<Key, usize> = self
            .bayes_net
            .iter()
            .enumerate()
            .flat_map(|(i, c)| c.frontals().iter().map(move |k| (*k, i)))
            .collect();

        let mut selected = BTreeSet::new();
        let mut stack: Vec<usize> = self
            .bayes_net
            .iter()
            .enumerate()
            .filter(|(_, c)| c.frontals().iter().any(|k| affected.contains(k)))
            .map(|(i, _)| i)
            .collect();
        while let Some(index) = stack.pop() {
            if !selected.insert(index) {
                continue;
            }
            if let Some(conditional) = self.bayes_net.at(index) {
                stack.extend(
                    conditional
                        .continuous_parents()
                        .iter()
                        .filter_map(|k| owner.get(k).copied())
                        .filter(|i| !selected.contains(i)),
                );
            }
        }
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::key::x;
    use crate::linear::JacobianFactor;
    use nalgebra::{dmatrix, dvector};

    const TOLERANCE: f64 = 1e-9;

    fn between(i: Key, j: Key, z: f64) -> HybridResult<JacobianFactor> {
        JacobianFactor::new(vec![(i, dmatrix![-1.0]), (j, dmatrix![1.0])], dvector![z])
    }

    fn measurement(k: Key, z: f64) -> HybridResult<JacobianFactor> {
        JacobianFactor::new(vec![(k, dmatrix![1.0])], dvector![z])
    }

    #[test]
    fn test_update_matches_batch() -> Result<(), Box<dyn std::error::Error>> {
        let mut first = HybridFactorGraph::new();
        first.push_back(measurement(x(1), 0.0)?);
        first.push_back(between(x(1), x(2), 1.0)?);
        let mut second = HybridFactorGraph::new();
        second.push_back(between(x(2), x(3), 1.0)?);
        second.push_back(measurement(x(3), 2.5)?);

        let state = InferenceState::new()
            .update(&first, &Ordering::new(vec![x(1), x(2)]))?
            .update(&second, &Ordering::new(vec![x(3)]))?;

        let mut all = first.clone();
        all.extend(second.iter());
        let (batch, _) = all.eliminate_partial_sequential(&Ordering::new(vec![x(1), x(2), x(3)]))?;

        assert!(state.bayes_net().equals(&batch, TOLERANCE));
        assert!(state.residual().is_empty());
        Ok(())
    }

    #[test]
    fn test_reinjection_follows_parents() -> Result<(), Box<dyn std::error::Error>> {
        let mut graph = HybridFactorGraph::new();
        graph.push_back(measurement(x(1), 0.0)?);
        graph.push_back(between(x(1), x(2), 1.0)?);
        graph.push_back(between(x(2), x(3), 1.0)?);
        let state = InferenceState::new().update(&graph, &Ordering::new(vec![x(2), x(1), x(3)]))?;

        // p(x2 | x1, x3) needs p(x1 | x3), which needs p(x3).
        let affected: BTreeSet<Key> = [x(2)].into_iter().collect();
        let selected = state.conditionals_to_reinject(&affected);
        assert_eq!(selected.into_iter().collect::<Vec<_>>(), vec![0, 1, 2]);

        let affected: BTreeSet<Key> = [x(3)].into_iter().collect();
        let selected = state.conditionals_to_reinject(&affected);
        assert_eq!(selected.into_iter().collect::<Vec<_>>(), vec![2]);
        Ok(())
    }

    #[test]
    fn test_untouched_residual_is_carried() -> Result<(), Box<dyn std::error::Error>> {
        let mut graph = HybridFactorGraph::new();
        graph.push_back(measurement(x(1), 0.0)?);
        graph.push_back(measurement(x(9), 4.0)?);
        let state = InferenceState::new().update(&graph, &Ordering::new(vec![x(1)]))?;
        assert_eq!(state.residual().size(), 1);

        let mut more = HybridFactorGraph::new();
        more.push_back(between(x(1), x(2), 1.0)?);
        let next = state.update(&more, &Ordering::new(vec![x(2)]))?;
        // x1 was re-eliminated ahead of x2; x9 stays in the residual.
        assert_eq!(next.bayes_net().frontal_keys(), vec![x(1), x(2)]);
        assert_eq!(
            next.residual().continuous_keys().into_iter().collect::<Vec<_>>(),
            vec![x(9)]
        );
        Ok(())
    }
}
