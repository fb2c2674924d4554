//! One step of hybrid elimination.
//!
//! For every assignment of the mode keys present in the local graph, the
//! selected Gaussian factors are eliminated jointly by dense QR. The
//! per-branch conditionals and residuals are then assembled into decision
//! trees over those modes.

use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::key::{Key, format_key, format_keys};
use crate::core::values::Values;
use crate::discrete::assignment::{DiscreteValues, cartesian_product, format_assignment};
use crate::discrete::decision_tree::DecisionTree;
use crate::discrete::factor::DecisionTreeFactor;
use crate::error::{HybridError, HybridResult};
use crate::hybrid::bayes_net::HybridConditional;
use crate::hybrid::factor_graph::HybridFactorGraph;
use crate::hybrid::gaussian_mixture::GaussianMixture;
use crate::hybrid::hybrid_factor::HybridFactor;
use crate::hybrid::mixture_factor::GaussianMixtureFactor;
use crate::linear::GaussianElimination;

/// Knobs for hybrid elimination.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EliminationConfig {
    /// Eliminate the branches of one step on the rayon pool.
    pub parallel: bool,
    /// Relative pivot threshold below which a branch is reported singular.
    pub singular_tolerance: f64,
    /// Merge identical branches of the produced trees.
    pub canonicalize: bool,
}

impl Default for EliminationConfig {
    fn default() -> Self {
        EliminationConfig {
            parallel: true,
            singular_tolerance: 1e-9,
            canonicalize: false,
        }
    }
}

impl EliminationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_singular_tolerance(mut self, tolerance: f64) -> Self {
        self.singular_tolerance = tolerance;
        self
    }

    pub fn with_canonicalize(mut self, canonicalize: bool) -> Self {
        self.canonicalize = canonicalize;
        self
    }
}

/// Eliminate `frontals` from a graph of Gaussian and Gaussian-mixture
/// factors.
///
/// Returns the conditional on the frontals and the residual over the
/// separator and the modes involved. There is no residual when nothing is
/// left to carry: empty separator and no modes.
pub fn eliminate_hybrid(
    graph: &HybridFactorGraph,
    frontals: &[Key],
    config: &EliminationConfig,
) -> HybridResult<(HybridConditional, Option<HybridFactor>)> {
    let sum = graph.sum()?;
    for key in frontals {
        if !graph.iter().any(|f| f.continuous_keys().contains(key)) {
            return Err(HybridError::DisconnectedVariable(format_key(*key)));
        }
    }

    let modes = sum.discrete_keys().to_vec();
    let assignments = cartesian_product(&modes)?;
    let tolerance = config.singular_tolerance;
    let eliminate_branch = |assignment: &DiscreteValues| -> HybridResult<GaussianElimination> {
        sum.at(assignment)?
            .eliminate(frontals, tolerance)
            .map_err(|e| match e {
                HybridError::SingularSystem { reason, .. } => HybridError::SingularSystem {
                    assignment: format_assignment(assignment),
                    reason,
                },
                other => other,
            })
    };
    let branches: Vec<GaussianElimination> = if config.parallel {
        assignments
            .par_iter()
            .map(eliminate_branch)
            .collect::<HybridResult<_>>()?
    } else {
        assignments
            .iter()
            .map(eliminate_branch)
            .collect::<HybridResult<_>>()?
    };

    let separator = branches
        .first()
        .map(|b| b.residual.keys().to_vec())
        .unwrap_or_default();
    debug!(
        "eliminated {} over {} branch(es), separator [{}]",
        format_keys(frontals),
        branches.len(),
        format_keys(&separator)
    );

    if modes.is_empty() {
        let Some(branch) = branches.into_iter().next() else {
            return Err(HybridError::InvalidInput(
                "elimination produced no branch".to_string(),
            ));
        };
        let residual = if separator.is_empty() {
            None
        } else {
            Some(HybridFactor::from(branch.residual))
        };
        return Ok((branch.conditional.into(), residual));
    }

    let (conditionals, residuals): (Vec<_>, Vec<_>) = branches
        .into_iter()
        .map(|b| (Arc::new(b.conditional), Arc::new(b.residual)))
        .unzip();

    let mut conditional_tree = DecisionTree::from_leaves(&modes, conditionals)?;
    if config.canonicalize {
        conditional_tree = conditional_tree.canonicalize();
    }
    let conditional = GaussianMixture::new(conditional_tree)?;

    let residual = if separator.is_empty() {
        // Nothing continuous remains: each branch's residual is a constant
        // in negative-log space, turned into a probability table.
        let empty = Values::new();
        let leaves = residuals
            .iter()
            .map(|r| Ok((-r.error(&empty)?).exp()))
            .collect::<HybridResult<Vec<f64>>>()?;
        let mut factor = DecisionTreeFactor::new(&modes, leaves)?;
        if config.canonicalize {
            factor = factor.canonicalize();
        }
        HybridFactor::from(factor)
    } else {
        let mut mixture = GaussianMixtureFactor::from_tree(DecisionTree::from_leaves(
            &modes, residuals,
        )?)?;
        if config.canonicalize {
            mixture = mixture.canonicalize();
        }
        HybridFactor::from(mixture)
    };
    Ok((conditional.into(), Some(residual)))
}
