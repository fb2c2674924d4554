//! Gaussian conditional densities `p(F | S)`.

use std::f64::consts::PI;
use std::fmt;
use std::hash::Hasher;

use nalgebra::{DMatrix, DVector};

use crate::core::key::{Key, format_keys};
use crate::core::values::Values;
use crate::discrete::decision_tree::{LeafHash, hash_f64_slice};
use crate::error::{HybridError, HybridResult};
use crate::linear::jacobian_factor::JacobianFactor;

/// `p(F | S) = |det R| (2π)^(-n/2) exp(-½‖R F + S s − d‖²)`
///
/// `R` is upper triangular with a strictly positive diagonal, which makes
/// the representation unique for a given density.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianConditional {
    frontals: Vec<Key>,
    frontal_dims: Vec<usize>,
    parents: Vec<Key>,
    parent_dims: Vec<usize>,
    r: DMatrix<f64>,
    s: DMatrix<f64>,
    d: DVector<f64>,
}

impl GaussianConditional {
    pub fn new(
        frontals: Vec<(Key, usize)>,
        parents: Vec<(Key, usize)>,
        r: DMatrix<f64>,
        s: DMatrix<f64>,
        d: DVector<f64>,
    ) -> HybridResult<Self> {
        let (frontals, frontal_dims): (Vec<Key>, Vec<usize>) = frontals.into_iter().unzip();
        let (parents, parent_dims): (Vec<Key>, Vec<usize>) = parents.into_iter().unzip();
        let nf: usize = frontal_dims.iter().sum();
        let ns: usize = parent_dims.iter().sum();
        if r.shape() != (nf, nf) || s.shape() != (nf, ns) || d.len() != nf {
            return Err(HybridError::InvalidInput(format!(
                "conditional on {} has R {:?}, S {:?}, d {} for {nf} frontal and {ns} parent dims",
                format_keys(&frontals),
                r.shape(),
                s.shape(),
                d.len()
            )));
        }
        if (0..nf).any(|i| r[(i, i)] <= 0.0) {
            return Err(HybridError::InvalidInput(
                "conditional R must have a positive diagonal".to_string(),
            ));
        }
        Ok(GaussianConditional {
            frontals,
            frontal_dims,
            parents,
            parent_dims,
            r,
            s,
            d,
        })
    }

    pub fn frontals(&self) -> &[Key] {
        &self.frontals
    }

    pub fn parents(&self) -> &[Key] {
        &self.parents
    }

    pub fn frontal_dims(&self) -> &[usize] {
        &self.frontal_dims
    }

    pub fn parent_dims(&self) -> &[usize] {
        &self.parent_dims
    }

    pub fn r(&self) -> &DMatrix<f64> {
        &self.r
    }

    pub fn s(&self) -> &DMatrix<f64> {
        &self.s
    }

    pub fn d(&self) -> &DVector<f64> {
        &self.d
    }

    pub fn frontal_dim(&self) -> usize {
        self.r.nrows()
    }

    /// `ln |det R| − (n/2) ln 2π`
    pub fn log_normalization_constant(&self) -> f64 {
        let log_det: f64 = self.r.diagonal().iter().map(|v| v.ln()).sum();
        log_det - 0.5 * self.frontal_dim() as f64 * (2.0 * PI).ln()
    }

    fn parent_vector(&self, values: &Values) -> HybridResult<DVector<f64>> {
        let ns: usize = self.parent_dims.iter().sum();
        let mut stacked = DVector::zeros(ns);
        let mut offset = 0;
        for (key, dim) in self.parents.iter().zip(&self.parent_dims) {
            let v = values.at(*key)?;
            if v.len() != *dim {
                return Err(HybridError::InvalidInput(format!(
                    "parent value has dimension {}, expected {dim}",
                    v.len()
                )));
            }
            stacked.rows_mut(offset, *dim).copy_from(v);
            offset += dim;
        }
        Ok(stacked)
    }

    /// Most probable frontal values given the parents, by back-substitution.
    pub fn solve(&self, parents: &Values) -> HybridResult<Values> {
        let rhs = &self.d - &self.s * self.parent_vector(parents)?;
        let x = self.r.solve_upper_triangular(&rhs).ok_or_else(|| {
            HybridError::SingularSystem {
                assignment: String::new(),
                reason: format!("back-substitution for {}", format_keys(&self.frontals)),
            }
        })?;
        let mut out = Values::new();
        let mut offset = 0;
        for (key, dim) in self.frontals.iter().zip(&self.frontal_dims) {
            out.insert(*key, x.rows(offset, *dim).into_owned());
            offset += dim;
        }
        Ok(out)
    }

    /// `½‖R F + S s − d‖²` at `values` (frontals and parents).
    pub fn error(&self, values: &Values) -> HybridResult<f64> {
        Ok(0.5 * self.to_factor().residual(values)?.norm_squared())
    }

    pub fn log_density(&self, values: &Values) -> HybridResult<f64> {
        Ok(self.log_normalization_constant() - self.error(values)?)
    }

    /// The conditional as an unnormalized potential over frontals ∪ parents.
    ///
    /// The factor's constant is `−ln` of the normalizer, so its error is the
    /// conditional's negative log density.
    pub fn to_factor(&self) -> JacobianFactor {
        let nf = self.frontal_dim();
        let ns = self.s.ncols();
        let mut a = DMatrix::zeros(nf, nf + ns);
        a.view_mut((0, 0), (nf, nf)).copy_from(&self.r);
        a.view_mut((0, nf), (nf, ns)).copy_from(&self.s);
        JacobianFactor::from_parts(
            self.frontals.iter().chain(&self.parents).copied().collect(),
            self.frontal_dims
                .iter()
                .chain(&self.parent_dims)
                .copied()
                .collect(),
            a,
            self.d.clone(),
            -self.log_normalization_constant(),
        )
    }

    pub fn equals(&self, other: &GaussianConditional, tol: f64) -> bool {
        self.frontals == other.frontals
            && self.parents == other.parents
            && self.frontal_dims == other.frontal_dims
            && self.parent_dims == other.parent_dims
            && (&self.r - &other.r).amax() <= tol
            && (&self.s - &other.s).amax() <= tol
            && (&self.d - &other.d).amax() <= tol
    }
}

impl LeafHash for GaussianConditional {
    fn leaf_hash<H: Hasher>(&self, state: &mut H) {
        for key in self.frontals.iter().chain(&self.parents) {
            state.write_u64(*key);
        }
        hash_f64_slice(self.r.as_slice(), state);
        hash_f64_slice(self.s.as_slice(), state);
        hash_f64_slice(self.d.as_slice(), state);
    }
}

impl fmt::Display for GaussianConditional {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "p({} | {})",
            format_keys(&self.frontals),
            format_keys(&self.parents)
        )
    }
}
