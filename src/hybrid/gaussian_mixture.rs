//! Gaussian mixture conditionals.

use std::fmt;
use std::sync::Arc;

use crate::core::key::{DiscreteKey, Key, format_keys};
use crate::core::values::Values;
use crate::discrete::assignment::{DiscreteValues, cartesian_product};
use crate::discrete::decision_tree::DecisionTree;
use crate::error::{HybridError, HybridResult};
use crate::hybrid::mixture_factor::GaussianMixtureFactor;
use crate::linear::GaussianConditional;

/// `p(F | S, M)`: one [`GaussianConditional`] per assignment of the
/// discrete parents `M`, all sharing the frontals `F` and continuous
/// parents `S`.
#[derive(Debug, Clone)]
pub struct GaussianMixture {
    frontals: Vec<Key>,
    continuous_parents: Vec<Key>,
    conditionals: DecisionTree<Arc<GaussianConditional>>,
}

impl GaussianMixture {
    pub fn new(conditionals: DecisionTree<Arc<GaussianConditional>>) -> HybridResult<Self> {
        let (frontals, continuous_parents) = match conditionals.leaves().next() {
            Some(first) => (first.frontals().to_vec(), first.parents().to_vec()),
            None => {
                return Err(HybridError::InvalidInput(
                    "mixture conditional without components".to_string(),
                ));
            }
        };
        for c in conditionals.leaves() {
            if c.frontals() != frontals.as_slice() || c.parents() != continuous_parents.as_slice()
            {
                return Err(HybridError::InvalidInput(format!(
                    "mixture components disagree: {} vs p({} | {})",
                    c,
                    format_keys(&frontals),
                    format_keys(&continuous_parents)
                )));
            }
        }
        Ok(GaussianMixture {
            frontals,
            continuous_parents,
            conditionals,
        })
    }

    pub fn frontals(&self) -> &[Key] {
        &self.frontals
    }

    pub fn continuous_parents(&self) -> &[Key] {
        &self.continuous_parents
    }

    pub fn discrete_parents(&self) -> &[DiscreteKey] {
        self.conditionals.keys()
    }

    /// Continuous parents followed by discrete parents.
    pub fn parents(&self) -> Vec<Key> {
        self.continuous_parents
            .iter()
            .copied()
            .chain(self.discrete_parents().iter().map(|dk| dk.key))
            .collect()
    }

    pub fn conditionals(&self) -> &DecisionTree<Arc<GaussianConditional>> {
        &self.conditionals
    }

    pub fn conditional_at(
        &self,
        assignment: &DiscreteValues,
    ) -> HybridResult<&Arc<GaussianConditional>> {
        self.conditionals.evaluate(assignment)
    }

    pub fn solve(&self, parents: &Values, assignment: &DiscreteValues) -> HybridResult<Values> {
        self.conditional_at(assignment)?.solve(parents)
    }

    pub fn log_density(&self, values: &Values, assignment: &DiscreteValues) -> HybridResult<f64> {
        self.conditional_at(assignment)?.log_density(values)
    }

    /// The mixture as a factor over frontals, continuous and discrete parents.
    pub fn to_factor(&self) -> HybridResult<GaussianMixtureFactor> {
        GaussianMixtureFactor::from_tree(self.conditionals.map(|c| Arc::new(c.to_factor())))
    }

    /// Same mode keys and every branch equal within `tol`.
    pub fn equals(&self, other: &GaussianMixture, tol: f64) -> bool {
        if self.discrete_parents() != other.discrete_parents() {
            return false;
        }
        cartesian_product(self.discrete_parents()).is_ok_and(|all| {
            all.iter().all(|assignment| {
                match (self.conditional_at(assignment), other.conditional_at(assignment)) {
                    (Ok(a), Ok(b)) => a.equals(b, tol),
                    _ => false,
                }
            })
        })
    }
}

impl fmt::Display for GaussianMixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "p({} | {})",
            format_keys(&self.frontals),
            format_keys(&self.parents())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::key::{m, x};
    use nalgebra::{dmatrix, dvector};

    fn branch(d: f64) -> Arc<GaussianConditional> {
        Arc::new(
            GaussianConditional::new(
                vec![(x(1), 1)],
                vec![(x(2), 1)],
                dmatrix![1.0],
                dmatrix![-1.0],
                dvector![d],
            )
            .expect("valid conditional"),
        )
    }

    #[test]
    fn test_parents_continuous_then_discrete() -> Result<(), Box<dyn std::error::Error>> {
        let tree = DecisionTree::from_leaves(
            &[DiscreteKey::new(m(1), 2)],
            vec![branch(0.0), branch(1.0)],
        )?;
        let mixture = GaussianMixture::new(tree)?;
        assert_eq!(mixture.parents(), vec![x(2), m(1)]);
        assert_eq!(mixture.conditionals().leaf_count(), 2);

        let parents: Values = [(x(2), dvector![2.0])].into_iter().collect();
        let mut assignment = DiscreteValues::new();
        assignment.insert(m(1), 1);
        // x1 - x2 = 1
        assert!((mixture.solve(&parents, &assignment)?.at(x(1))?[0] - 3.0).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_to_factor_keeps_modes() -> Result<(), Box<dyn std::error::Error>> {
        let tree = DecisionTree::from_leaves(
            &[DiscreteKey::new(m(1), 2)],
            vec![branch(0.0), branch(1.0)],
        )?;
        let factor = GaussianMixture::new(tree)?.to_factor()?;
        assert_eq!(factor.keys(), &[x(1), x(2)]);
        assert_eq!(factor.discrete_keys(), &[DiscreteKey::new(m(1), 2)]);
        Ok(())
    }

    #[test]
    fn test_rejects_mismatched_branches() -> Result<(), Box<dyn std::error::Error>> {
        let other = Arc::new(GaussianConditional::new(
            vec![(x(3), 1)],
            vec![],
            dmatrix![1.0],
            nalgebra::DMatrix::zeros(1, 0),
            dvector![0.0],
        )?);
        let tree =
            DecisionTree::from_leaves(&[DiscreteKey::new(m(1), 2)], vec![branch(0.0), other])?;
        assert!(GaussianMixture::new(tree).is_err());
        Ok(())
    }
}
