//! Discrete factors and conditionals.
//!
//! Only the table algebra the hybrid engine needs is provided: evaluation,
//! products, summing keys out, normalization and argmax.

use std::fmt;

use crate::core::key::{DiscreteKey, Key, format_key};
use crate::discrete::assignment::{
    DiscreteValues, assignment_count, cartesian_product, format_assignment,
    merge_discrete_keys,
};
use crate::discrete::decision_tree::DecisionTree;
use crate::error::{HybridError, HybridResult};

/// Non-negative potential over discrete keys backed by a decision tree.
#[derive(Debug, Clone)]
pub struct DecisionTreeFactor {
    tree: DecisionTree<f64>,
}

impl DecisionTreeFactor {
    /// Table in lexicographic order over `keys`.
    pub fn new(keys: &[DiscreteKey], table: Vec<f64>) -> HybridResult<Self> {
        if let Some(bad) = table.iter().find(|v| !(v.is_finite() && **v >= 0.0)) {
            return Err(HybridError::InvalidInput(format!(
                "discrete potential must be finite and non-negative, got {bad}"
            )));
        }
        Ok(DecisionTreeFactor {
            tree: DecisionTree::from_leaves(keys, table)?,
        })
    }

    pub fn from_tree(tree: DecisionTree<f64>) -> Self {
        DecisionTreeFactor { tree }
    }

    pub fn discrete_keys(&self) -> &[DiscreteKey] {
        self.tree.keys()
    }

    pub fn keys(&self) -> Vec<Key> {
        self.tree.keys().iter().map(|dk| dk.key).collect()
    }

    pub fn tree(&self) -> &DecisionTree<f64> {
        &self.tree
    }

    pub fn evaluate(&self, values: &DiscreteValues) -> HybridResult<f64> {
        self.tree.evaluate(values).copied()
    }

    /// Values in lexicographic order over [`Self::discrete_keys`].
    pub fn table(&self) -> HybridResult<Vec<f64>> {
        cartesian_product(self.discrete_keys())?
            .iter()
            .map(|values| self.evaluate(values))
            .collect()
    }

    pub fn product(&self, other: &DecisionTreeFactor) -> HybridResult<DecisionTreeFactor> {
        Ok(DecisionTreeFactor {
            tree: self.tree.apply(&other.tree, |a, b| a * b)?,
        })
    }

    /// Sum out every key not in `keep`.
    pub fn marginal(&self, keep: &[Key]) -> HybridResult<DecisionTreeFactor> {
        let kept: Vec<DiscreteKey> = self
            .discrete_keys()
            .iter()
            .filter(|dk| keep.contains(&dk.key))
            .copied()
            .collect();
        let summed: Vec<DiscreteKey> = self
            .discrete_keys()
            .iter()
            .filter(|dk| !keep.contains(&dk.key))
            .copied()
            .collect();
        let others = cartesian_product(&summed)?;
        let tree = DecisionTree::try_from_fn(&kept, |values| {
            let mut total = 0.0;
            for rest in &others {
                let mut full = values.clone();
                full.extend(rest.iter().map(|(k, v)| (*k, *v)));
                total += self.evaluate(&full)?;
            }
            Ok::<f64, HybridError>(total)
        })?;
        Ok(DecisionTreeFactor { tree })
    }

    pub fn sum(&self) -> HybridResult<f64> {
        Ok(self.table()?.iter().sum())
    }

    /// Scale so the table sums to one.
    pub fn normalize(&self) -> HybridResult<DecisionTreeFactor> {
        let total = self.sum()?;
        if total <= 0.0 {
            return Err(HybridError::InvalidInput(
                "cannot normalize a discrete factor with zero mass".to_string(),
            ));
        }
        Ok(DecisionTreeFactor {
            tree: self.tree.map(|v| v / total),
        })
    }

    /// Most probable assignment and its value. Ties resolve to the first
    /// assignment in lexicographic order.
    pub fn argmax(&self) -> HybridResult<(DiscreteValues, f64)> {
        let mut best: Option<(DiscreteValues, f64)> = None;
        for values in cartesian_product(self.discrete_keys())? {
            let value = self.evaluate(&values)?;
            if best.as_ref().is_none_or(|(_, b)| value > *b) {
                best = Some((values, value));
            }
        }
        best.ok_or_else(|| HybridError::InvalidInput("empty discrete factor".to_string()))
    }

    pub fn canonicalize(&self) -> DecisionTreeFactor {
        DecisionTreeFactor {
            tree: self.tree.canonicalize(),
        }
    }

    pub fn equals(&self, other: &DecisionTreeFactor, tol: f64) -> bool {
        let keys = match merge_discrete_keys([self.discrete_keys(), other.discrete_keys()]) {
            Ok(keys) => keys,
            Err(_) => return false,
        };
        cartesian_product(&keys).is_ok_and(|all| {
            all.iter().all(|values| match (self.evaluate(values), other.evaluate(values)) {
                (Ok(a), Ok(b)) => (a - b).abs() <= tol,
                _ => false,
            })
        })
    }
}

impl fmt::Display for DecisionTreeFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.discrete_keys().iter().map(|dk| dk.to_string()).collect();
        writeln!(f, "DecisionTreeFactor({})", keys.join(", "))?;
        let Ok(all) = cartesian_product(self.discrete_keys()) else {
            return writeln!(f, "  <assignment space too large>");
        };
        for values in all {
            match self.evaluate(&values) {
                Ok(v) => writeln!(f, "  [{}] = {v}", format_assignment(&values))?,
                Err(e) => writeln!(f, "  [{}] = <{e}>", format_assignment(&values))?,
            }
        }
        Ok(())
    }
}

/// `P(frontal | parents)` stored as a normalized table over
/// `frontal, parents...`.
#[derive(Debug, Clone)]
pub struct DiscreteConditional {
    frontal: DiscreteKey,
    parents: Vec<DiscreteKey>,
    factor: DecisionTreeFactor,
}

impl DiscreteConditional {
    /// Parse a specification such as `"1/2 3/2"`.
    ///
    /// Each whitespace separated row is the unnormalized distribution of
    /// `frontal` for one parent assignment, rows enumerated in
    /// lexicographic order over `parents`.
    pub fn from_spec(
        frontal: DiscreteKey,
        parents: &[DiscreteKey],
        spec: &str,
    ) -> HybridResult<Self> {
        let rows: Vec<Vec<f64>> = spec
            .split_whitespace()
            .map(|row| {
                row.split('/')
                    .map(|v| {
                        v.parse::<f64>().map_err(|e| {
                            HybridError::InvalidInput(format!("bad entry '{v}' in '{spec}': {e}"))
                        })
                    })
                    .collect::<HybridResult<Vec<f64>>>()
            })
            .collect::<HybridResult<_>>()?;

        let parent_count = assignment_count(parents)?;
        if rows.len() != parent_count {
            return Err(HybridError::InvalidInput(format!(
                "'{spec}' has {} rows, expected {parent_count}",
                rows.len()
            )));
        }
        let mut normalized = Vec::with_capacity(rows.len());
        for row in rows {
            if row.len() != frontal.cardinality {
                return Err(HybridError::InvalidInput(format!(
                    "row of '{spec}' has {} entries, {} needs {}",
                    row.len(),
                    format_key(frontal.key),
                    frontal.cardinality
                )));
            }
            let total: f64 = row.iter().sum();
            if total <= 0.0 || row.iter().any(|v| *v < 0.0) {
                return Err(HybridError::InvalidInput(format!(
                    "row of '{spec}' is not a valid distribution"
                )));
            }
            normalized.push(row.into_iter().map(|v| v / total).collect::<Vec<_>>());
        }

        let mut keys = vec![frontal];
        keys.extend_from_slice(parents);
        let tree = DecisionTree::from_fn(&keys, |values| {
            let parent_index = parents
                .iter()
                .fold(0, |acc, dk| acc * dk.cardinality + values[&dk.key]);
            normalized[parent_index][values[&frontal.key]]
        });

        Ok(DiscreteConditional {
            frontal,
            parents: parents.to_vec(),
            factor: DecisionTreeFactor::from_tree(tree),
        })
    }

    pub fn frontal(&self) -> DiscreteKey {
        self.frontal
    }

    pub fn parents(&self) -> &[DiscreteKey] {
        &self.parents
    }

    pub fn evaluate(&self, values: &DiscreteValues) -> HybridResult<f64> {
        self.factor.evaluate(values)
    }

    pub fn as_factor(&self) -> &DecisionTreeFactor {
        &self.factor
    }
}

/// Any discrete-only factor.
#[derive(Debug, Clone)]
pub enum DiscreteFactor {
    Table(DecisionTreeFactor),
    Conditional(DiscreteConditional),
}

impl DiscreteFactor {
    pub fn discrete_keys(&self) -> &[DiscreteKey] {
        match self {
            DiscreteFactor::Table(f) => f.discrete_keys(),
            DiscreteFactor::Conditional(c) => c.as_factor().discrete_keys(),
        }
    }

    pub fn keys(&self) -> Vec<Key> {
        self.discrete_keys().iter().map(|dk| dk.key).collect()
    }

    pub fn evaluate(&self, values: &DiscreteValues) -> HybridResult<f64> {
        match self {
            DiscreteFactor::Table(f) => f.evaluate(values),
            DiscreteFactor::Conditional(c) => c.evaluate(values),
        }
    }

    pub fn to_decision_tree_factor(&self) -> DecisionTreeFactor {
        match self {
            DiscreteFactor::Table(f) => f.clone(),
            DiscreteFactor::Conditional(c) => c.as_factor().clone(),
        }
    }
}

impl From<DecisionTreeFactor> for DiscreteFactor {
    fn from(factor: DecisionTreeFactor) -> Self {
        DiscreteFactor::Table(factor)
    }
}

impl From<DiscreteConditional> for DiscreteFactor {
    fn from(conditional: DiscreteConditional) -> Self {
        DiscreteFactor::Conditional(conditional)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::key::m;

    const TOLERANCE: f64 = 1e-12;

    fn mode(k: u64) -> DiscreteKey {
        DiscreteKey::new(m(k), 2)
    }

    #[test]
    fn test_conditional_from_spec() -> Result<(), Box<dyn std::error::Error>> {
        let cond = DiscreteConditional::from_spec(mode(2), &[mode(1)], "1/2 3/2")?;
        let mut values = DiscreteValues::new();
        values.insert(m(1), 0);
        values.insert(m(2), 0);
        assert!((cond.evaluate(&values)? - 1.0 / 3.0).abs() < TOLERANCE);
        values.insert(m(1), 1);
        values.insert(m(2), 1);
        assert!((cond.evaluate(&values)? - 0.4).abs() < TOLERANCE);
        assert_eq!(cond.as_factor().keys(), vec![m(2), m(1)]);
        Ok(())
    }

    #[test]
    fn test_conditional_rejects_bad_spec() {
        assert!(DiscreteConditional::from_spec(mode(2), &[mode(1)], "1/2").is_err());
        assert!(DiscreteConditional::from_spec(mode(1), &[], "1/x").is_err());
        assert!(DiscreteConditional::from_spec(mode(1), &[], "1/2/3").is_err());
    }

    #[test]
    fn test_product_and_marginal() -> Result<(), Box<dyn std::error::Error>> {
        let prior = DiscreteConditional::from_spec(mode(1), &[], "1/1")?;
        let transition = DiscreteConditional::from_spec(mode(2), &[mode(1)], "1/2 3/2")?;
        let joint = prior.as_factor().product(transition.as_factor())?;
        assert!((joint.sum()? - 1.0).abs() < TOLERANCE);

        let p_m2 = joint.marginal(&[m(2)])?;
        let table = p_m2.table()?;
        // P(m2=0) = 0.5 * 1/3 + 0.5 * 3/5
        assert!((table[0] - (0.5 / 3.0 + 0.3)).abs() < TOLERANCE);
        assert!((table[0] + table[1] - 1.0).abs() < TOLERANCE);
        Ok(())
    }

    #[test]
    fn test_normalize_and_argmax() -> Result<(), Box<dyn std::error::Error>> {
        let factor = DecisionTreeFactor::new(&[mode(2), mode(1)], vec![1.0, 2.0, 4.0, 1.0])?;
        let normalized = factor.normalize()?;
        assert!((normalized.sum()? - 1.0).abs() < TOLERANCE);

        let (best, value) = factor.argmax()?;
        assert_eq!(best[&m(2)], 1);
        assert_eq!(best[&m(1)], 0);
        assert_eq!(value, 4.0);
        Ok(())
    }

    #[test]
    fn test_rejects_negative_potential() {
        assert!(DecisionTreeFactor::new(&[mode(1)], vec![1.0, -1.0]).is_err());
    }

    #[test]
    fn test_zero_mass_cannot_normalize() -> Result<(), Box<dyn std::error::Error>> {
        let factor = DecisionTreeFactor::new(&[mode(1)], vec![0.0, 0.0])?;
        assert!(factor.normalize().is_err());
        Ok(())
    }
}
