//! Collections of linear Gaussian factors.

use std::collections::{BTreeMap, BTreeSet};
use std::f64::consts::PI;
use std::sync::Arc;

use faer::Mat;
use faer::sparse::{SparseColMat, Triplet};
use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::core::key::{Key, format_key, format_keys};
use crate::core::values::Values;
use crate::error::{HybridError, HybridResult};
use crate::linalg::{LinAlgError, SparseCholeskySolver, SparseLinearSolver, eliminate_augmented};
use crate::linear::gaussian_conditional::GaussianConditional;
use crate::linear::jacobian_factor::JacobianFactor;

/// Result of eliminating frontal keys from a Gaussian graph.
#[derive(Debug, Clone)]
pub struct GaussianElimination {
    pub conditional: GaussianConditional,
    /// Marginal over the separator. Has no columns when the separator is
    /// empty, in which case `b` holds the unexplained whitened error.
    pub residual: JacobianFactor,
}

/// Ordered list of shared linear factors.
#[derive(Debug, Clone, Default)]
pub struct GaussianFactorGraph {
    factors: Vec<Arc<JacobianFactor>>,
}

impl GaussianFactorGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        GaussianFactorGraph {
            factors: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, factor: Arc<JacobianFactor>) {
        self.factors.push(factor);
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    pub fn at(&self, index: usize) -> Option<&Arc<JacobianFactor>> {
        self.factors.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<JacobianFactor>> {
        self.factors.iter()
    }

    pub fn keys(&self) -> BTreeSet<Key> {
        self.factors
            .iter()
            .flat_map(|f| f.keys().iter().copied())
            .collect()
    }

    /// Dimension of every key, checked for consistency across factors.
    pub fn key_dims(&self) -> HybridResult<BTreeMap<Key, usize>> {
        let mut dims = BTreeMap::new();
        for factor in &self.factors {
            for (key, dim) in factor.keys().iter().zip(factor.dims()) {
                match dims.insert(*key, *dim) {
                    Some(previous) if previous != *dim => {
                        return Err(HybridError::InvalidInput(format!(
                            "{} has dimension {previous} and {dim} in different factors",
                            format_key(*key)
                        )));
                    }
                    _ => {}
                }
            }
        }
        Ok(dims)
    }

    /// Sum of the factors' constant terms.
    pub fn constant(&self) -> f64 {
        self.factors.iter().map(|f| f.constant()).sum()
    }

    pub fn error(&self, values: &Values) -> HybridResult<f64> {
        self.factors.iter().map(|f| f.error(values)).sum()
    }

    /// Unnormalized probability `exp(−error)`.
    pub fn prob_prime(&self, values: &Values) -> HybridResult<f64> {
        Ok((-self.error(values)?).exp())
    }

    /// Least-squares solution through the sparse Cholesky back end.
    pub fn optimize(&self) -> HybridResult<Values> {
        self.optimize_with(&mut SparseCholeskySolver::new())
    }

    pub fn optimize_with<S: SparseLinearSolver>(&self, solver: &mut S) -> HybridResult<Values> {
        let dims = self.key_dims()?;
        let mut offsets = BTreeMap::new();
        let mut total = 0;
        for (key, dim) in &dims {
            offsets.insert(*key, total);
            total += dim;
        }
        if total == 0 {
            return Ok(Values::new());
        }

        let rows: usize = self.factors.iter().map(|f| f.rows()).sum();
        let mut triplets = Vec::new();
        let mut rhs = Mat::zeros(rows, 1);
        let mut row = 0;
        for factor in &self.factors {
            let mut col = 0;
            for (key, dim) in factor.keys().iter().zip(factor.dims()) {
                let global = offsets[key];
                for j in 0..*dim {
                    for i in 0..factor.rows() {
                        let v = factor.a()[(i, col + j)];
                        if v != 0.0 {
                            triplets.push(Triplet::new(row + i, global + j, v));
                        }
                    }
                }
                col += dim;
            }
            for i in 0..factor.rows() {
                rhs[(row + i, 0)] = factor.b()[i];
            }
            row += factor.rows();
        }

        let jacobian = SparseColMat::try_new_from_triplets(rows, total, &triplets)
            .map_err(|e| LinAlgError::SparseMatrixCreation(format!("{:?}", e)))?;
        let solution = solver.solve_normal_equation(&rhs, &jacobian)?;

        let mut values = Values::new();
        for (key, dim) in &dims {
            let offset = offsets[key];
            values.insert(*key, DVector::from_fn(*dim, |i, _| solution[(offset + i, 0)]));
        }
        Ok(values)
    }

    /// Jointly eliminate `frontals` by dense QR.
    ///
    /// The separator is every other key in the graph, in ascending order.
    /// The residual carries `Σc + ln|det R| − (n_F/2) ln 2π`, which is the
    /// exact marginal over the separator rather than its max.
    pub fn eliminate(
        &self,
        frontals: &[Key],
        tolerance: f64,
    ) -> HybridResult<GaussianElimination> {
        let dims = self.key_dims()?;
        let mut frontal_terms = Vec::with_capacity(frontals.len());
        for key in frontals {
            let dim = dims
                .get(key)
                .copied()
                .ok_or_else(|| HybridError::DisconnectedVariable(format_key(*key)))?;
            frontal_terms.push((*key, dim));
        }
        let separator: Vec<(Key, usize)> = dims
            .iter()
            .filter(|(k, _)| !frontals.contains(*k))
            .map(|(k, d)| (*k, *d))
            .collect();

        let mut offsets = BTreeMap::new();
        let mut total = 0;
        for (key, dim) in frontal_terms.iter().chain(&separator) {
            offsets.insert(*key, total);
            total += dim;
        }
        let frontal_dim: usize = frontal_terms.iter().map(|(_, d)| d).sum();

        let rows: usize = self.factors.iter().map(|f| f.rows()).sum();
        let mut ab = DMatrix::zeros(rows, total + 1);
        let mut row = 0;
        for factor in &self.factors {
            let n = factor.rows();
            for (position, key) in factor.keys().iter().enumerate() {
                let block = factor.block(position);
                ab.view_mut((row, offsets[key]), (n, block.ncols()))
                    .copy_from(&block);
            }
            ab.view_mut((row, total), (n, 1)).copy_from(factor.b());
            row += n;
        }

        let partial = eliminate_augmented(&ab, frontal_dim, tolerance).map_err(|e| match e {
            LinAlgError::SingularMatrix(reason) => HybridError::SingularSystem {
                assignment: String::new(),
                reason: format!("eliminating {}: {reason}", format_keys(frontals)),
            },
            other => other.into(),
        })?;

        let constant = self.constant() + partial.log_det_r()
            - 0.5 * frontal_dim as f64 * (2.0 * PI).ln();
        debug!(
            "eliminated {} from {} factors, separator [{}], residual rows {}",
            format_keys(frontals),
            self.len(),
            format_keys(&separator.iter().map(|(k, _)| *k).collect::<Vec<_>>()),
            partial.b_rem.len()
        );

        let residual = JacobianFactor::from_parts(
            separator.iter().map(|(k, _)| *k).collect(),
            separator.iter().map(|(_, d)| *d).collect(),
            partial.a_rem,
            partial.b_rem,
            constant,
        );
        let conditional =
            GaussianConditional::new(frontal_terms, separator, partial.r, partial.s, partial.d)?;
        Ok(GaussianElimination {
            conditional,
            residual,
        })
    }
}

impl FromIterator<Arc<JacobianFactor>> for GaussianFactorGraph {
    fn from_iter<I: IntoIterator<Item = Arc<JacobianFactor>>>(iter: I) -> Self {
        GaussianFactorGraph {
            factors: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::key::x;
    use nalgebra::{dmatrix, dvector};

    const TOLERANCE: f64 = 1e-10;

    fn chain() -> HybridResult<GaussianFactorGraph> {
        // x1 = 0, x2 - x1 = 1, x2 = 2 (all unit noise)
        Ok([
            JacobianFactor::new(vec![(x(1), dmatrix![1.0])], dvector![0.0])?,
            JacobianFactor::new(
                vec![(x(1), dmatrix![-1.0]), (x(2), dmatrix![1.0])],
                dvector![1.0],
            )?,
            JacobianFactor::new(vec![(x(2), dmatrix![1.0])], dvector![2.0])?,
        ]
        .into_iter()
        .map(Arc::new)
        .collect())
    }

    #[test]
    fn test_optimize_chain() -> Result<(), Box<dyn std::error::Error>> {
        let graph = chain()?;
        let solution = graph.optimize()?;
        // [2 -1; -1 2] x = [-1; 3]
        assert!((solution.at(x(1))?[0] - 1.0 / 3.0).abs() < TOLERANCE);
        assert!((solution.at(x(2))?[0] - 5.0 / 3.0).abs() < TOLERANCE);
        Ok(())
    }

    #[test]
    fn test_eliminate_preserves_joint_density() -> Result<(), Box<dyn std::error::Error>> {
        let graph = chain()?;
        let result = graph.eliminate(&[x(1)], 1e-9)?;
        assert_eq!(result.conditional.frontals(), &[x(1)]);
        assert_eq!(result.conditional.parents(), &[x(2)]);
        assert_eq!(result.residual.keys(), &[x(2)]);

        // p(x1 | x2) * marginal(x2) integrates the joint exactly, so at any
        // point: error(graph) = -log p(x1|x2) + error(residual).
        let values: Values = [(x(1), dvector![0.3]), (x(2), dvector![-0.7])]
            .into_iter()
            .collect();
        let joint = graph.error(&values)?;
        let split = -result.conditional.log_density(&values)? + result.residual.error(&values)?;
        assert!((joint - split).abs() < TOLERANCE);
        Ok(())
    }

    #[test]
    fn test_eliminate_all_leaves_scalar_residual() -> Result<(), Box<dyn std::error::Error>> {
        let graph = chain()?;
        let result = graph.eliminate(&[x(1), x(2)], 1e-9)?;
        assert!(result.residual.keys().is_empty());
        assert_eq!(result.conditional.frontal_dim(), 2);

        // The residual's error is the graph error at the optimum plus the
        // log normalizer, so it is independent of any point.
        let optimum = graph.optimize()?;
        let expected = graph.error(&optimum)? + result.conditional.log_normalization_constant();
        assert!((result.residual.error(&Values::new())? - expected).abs() < TOLERANCE);
        Ok(())
    }

    #[test]
    fn test_eliminate_disconnected_key() -> Result<(), Box<dyn std::error::Error>> {
        let graph = chain()?;
        assert!(matches!(
            graph.eliminate(&[x(9)], 1e-9),
            Err(HybridError::DisconnectedVariable(_))
        ));
        Ok(())
    }

    #[test]
    fn test_eliminate_underdetermined_is_singular() -> Result<(), Box<dyn std::error::Error>> {
        // Only x2 - x1 = 1: x1 cannot be determined jointly with x2.
        let graph: GaussianFactorGraph = [JacobianFactor::new(
            vec![(x(1), dmatrix![-1.0]), (x(2), dmatrix![1.0])],
            dvector![1.0],
        )?]
        .into_iter()
        .map(Arc::new)
        .collect();
        assert!(matches!(
            graph.eliminate(&[x(1), x(2)], 1e-9),
            Err(HybridError::SingularSystem { .. })
        ));
        Ok(())
    }
}
