//! Mixture factors: one continuous factor per discrete mode.

use std::fmt;
use std::sync::Arc;

use crate::core::key::{DiscreteKey, Key, format_keys};
use crate::core::values::Values;
use crate::discrete::assignment::{DiscreteValues, assignment_count};
use crate::discrete::decision_tree::DecisionTree;
use crate::error::{HybridError, HybridResult};
use crate::factors::NonlinearFactor;
use crate::linear::JacobianFactor;

fn check_component_count(discrete_keys: &[DiscreteKey], given: usize) -> HybridResult<()> {
    let expected = assignment_count(discrete_keys)?;
    if expected != given {
        return Err(HybridError::InvalidInput(format!(
            "mixture over {expected} modes given {given} components"
        )));
    }
    Ok(())
}

fn check_shared_scope<'a, I>(keys: &[Key], others: I) -> HybridResult<()>
where
    I: IntoIterator<Item = &'a [Key]>,
{
    for other in others {
        if other != keys {
            return Err(HybridError::InvalidInput(format!(
                "mixture components disagree on scope: [{}] vs [{}]",
                format_keys(keys),
                format_keys(other)
            )));
        }
    }
    Ok(())
}

/// Selects a [`NonlinearFactor`] per assignment of its mode keys.
///
/// Every component constrains the same continuous keys.
#[derive(Debug, Clone)]
pub struct NonlinearMixtureFactor {
    keys: Vec<Key>,
    discrete_keys: Vec<DiscreteKey>,
    components: DecisionTree<Arc<NonlinearFactor>>,
}

impl NonlinearMixtureFactor {
    /// `components` are listed in lexicographic order over `discrete_keys`.
    pub fn new(
        discrete_keys: Vec<DiscreteKey>,
        components: Vec<NonlinearFactor>,
    ) -> HybridResult<Self> {
        check_component_count(&discrete_keys, components.len())?;
        let keys = components
            .first()
            .map(|c| c.keys().to_vec())
            .unwrap_or_default();
        check_shared_scope(&keys, components.iter().map(|c| c.keys()))?;
        let components = DecisionTree::from_leaves(
            &discrete_keys,
            components.into_iter().map(Arc::new).collect(),
        )?;
        Ok(NonlinearMixtureFactor {
            keys,
            discrete_keys,
            components,
        })
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn discrete_keys(&self) -> &[DiscreteKey] {
        &self.discrete_keys
    }

    pub fn component_at(&self, assignment: &DiscreteValues) -> HybridResult<&Arc<NonlinearFactor>> {
        self.components.evaluate(assignment)
    }

    pub fn error(&self, values: &Values, assignment: &DiscreteValues) -> HybridResult<f64> {
        self.component_at(assignment)?.error(values)
    }

    /// Linearize every component at `values`.
    pub fn linearize(&self, values: &Values) -> HybridResult<GaussianMixtureFactor> {
        let components = self
            .components
            .try_map(|component| component.linearize(values).map(Arc::new))?;
        Ok(GaussianMixtureFactor {
            keys: self.keys.clone(),
            discrete_keys: self.discrete_keys.clone(),
            components,
        })
    }
}

/// Selects a [`JacobianFactor`] per assignment of its mode keys.
#[derive(Debug, Clone)]
pub struct GaussianMixtureFactor {
    keys: Vec<Key>,
    discrete_keys: Vec<DiscreteKey>,
    components: DecisionTree<Arc<JacobianFactor>>,
}

impl GaussianMixtureFactor {
    /// `components` are listed in lexicographic order over `discrete_keys`.
    pub fn new(
        discrete_keys: Vec<DiscreteKey>,
        components: Vec<JacobianFactor>,
    ) -> HybridResult<Self> {
        check_component_count(&discrete_keys, components.len())?;
        let tree = DecisionTree::from_leaves(
            &discrete_keys,
            components.into_iter().map(Arc::new).collect(),
        )?;
        Self::from_tree(tree)
    }

    /// Wrap an existing tree. Discrete keys are taken from the tree.
    pub fn from_tree(components: DecisionTree<Arc<JacobianFactor>>) -> HybridResult<Self> {
        let keys = components
            .leaves()
            .next()
            .map(|c| c.keys().to_vec())
            .unwrap_or_default();
        check_shared_scope(&keys, components.leaves().map(|c| c.keys()))?;
        Ok(GaussianMixtureFactor {
            keys,
            discrete_keys: components.keys().to_vec(),
            components,
        })
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn discrete_keys(&self) -> &[DiscreteKey] {
        &self.discrete_keys
    }

    pub fn components(&self) -> &DecisionTree<Arc<JacobianFactor>> {
        &self.components
    }

    pub fn component_at(&self, assignment: &DiscreteValues) -> HybridResult<&Arc<JacobianFactor>> {
        self.components.evaluate(assignment)
    }

    pub fn error(&self, values: &Values, assignment: &DiscreteValues) -> HybridResult<f64> {
        self.component_at(assignment)?.error(values)
    }

    /// Merge equal components.
    pub fn canonicalize(&self) -> Self {
        GaussianMixtureFactor {
            keys: self.keys.clone(),
            discrete_keys: self.discrete_keys.clone(),
            components: self.components.canonicalize(),
        }
    }
}

impl fmt::Display for GaussianMixtureFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let modes: Vec<String> = self.discrete_keys.iter().map(|dk| dk.to_string()).collect();
        write!(
            f,
            "GaussianMixtureFactor({}; {})",
            format_keys(&self.keys),
            modes.join(", ")
        )
    }
}
