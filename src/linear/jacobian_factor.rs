//! Whitened linear Gaussian factors.

use std::fmt;
use std::hash::Hasher;

use nalgebra::{DMatrix, DMatrixView, DVector};

use crate::core::key::{Key, format_key, format_keys};
use crate::core::values::Values;
use crate::discrete::decision_tree::{LeafHash, hash_f64_slice};
use crate::error::{HybridError, HybridResult};

/// Linear factor `exp(-(½‖A x − b‖² + c))`.
///
/// `A` is stored as one matrix whose column blocks follow `keys`; every
/// block has `rows()` rows. The constant `c` carries normalization terms
/// from marginalized variables and is what keeps discrete inference exact
/// when a factor is selected per mode.
#[derive(Debug, Clone, PartialEq)]
pub struct JacobianFactor {
    keys: Vec<Key>,
    dims: Vec<usize>,
    a: DMatrix<f64>,
    b: DVector<f64>,
    constant: f64,
}

impl JacobianFactor {
    /// Build from one block per key. All blocks must share the row count of `b`.
    pub fn new(terms: Vec<(Key, DMatrix<f64>)>, b: DVector<f64>) -> HybridResult<Self> {
        let rows = b.len();
        let mut keys = Vec::with_capacity(terms.len());
        let mut dims = Vec::with_capacity(terms.len());
        for (key, block) in &terms {
            if block.nrows() != rows {
                return Err(HybridError::InvalidInput(format!(
                    "block for {} has {} rows, b has {rows}",
                    format_key(*key),
                    block.nrows()
                )));
            }
            if keys.contains(key) {
                return Err(HybridError::InvalidInput(format!(
                    "{} appears twice in one factor",
                    format_key(*key)
                )));
            }
            keys.push(*key);
            dims.push(block.ncols());
        }
        let total: usize = dims.iter().sum();
        let mut a = DMatrix::zeros(rows, total);
        let mut offset = 0;
        for (_, block) in &terms {
            a.view_mut((0, offset), (rows, block.ncols())).copy_from(block);
            offset += block.ncols();
        }
        Ok(JacobianFactor {
            keys,
            dims,
            a,
            b,
            constant: 0.0,
        })
    }

    pub(crate) fn from_parts(
        keys: Vec<Key>,
        dims: Vec<usize>,
        a: DMatrix<f64>,
        b: DVector<f64>,
        constant: f64,
    ) -> Self {
        JacobianFactor {
            keys,
            dims,
            a,
            b,
            constant,
        }
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn rows(&self) -> usize {
        self.b.len()
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    pub fn a(&self) -> &DMatrix<f64> {
        &self.a
    }

    pub fn b(&self) -> &DVector<f64> {
        &self.b
    }

    /// Column block for the `position`-th key.
    pub fn block(&self, position: usize) -> DMatrixView<'_, f64> {
        let offset: usize = self.dims[..position].iter().sum();
        self.a.view((0, offset), (self.rows(), self.dims[position]))
    }

    /// Whitened residual `A x − b`.
    pub fn residual(&self, values: &Values) -> HybridResult<DVector<f64>> {
        let mut r = -self.b.clone();
        for (position, key) in self.keys.iter().enumerate() {
            let x = values.at(*key)?;
            if x.len() != self.dims[position] {
                return Err(HybridError::InvalidInput(format!(
                    "{} has dimension {}, factor expects {}",
                    format_key(*key),
                    x.len(),
                    self.dims[position]
                )));
            }
            r += self.block(position) * x;
        }
        Ok(r)
    }

    /// `½‖A x − b‖² + c`
    pub fn error(&self, values: &Values) -> HybridResult<f64> {
        Ok(0.5 * self.residual(values)?.norm_squared() + self.constant)
    }

    pub fn equals(&self, other: &JacobianFactor, tol: f64) -> bool {
        self.keys == other.keys
            && self.dims == other.dims
            && self.a.shape() == other.a.shape()
            && (&self.a - &other.a).amax() <= tol
            && (&self.b - &other.b).amax() <= tol
            && (self.constant - other.constant).abs() <= tol
    }
}

impl LeafHash for JacobianFactor {
    fn leaf_hash<H: Hasher>(&self, state: &mut H) {
        for key in &self.keys {
            state.write_u64(*key);
        }
        hash_f64_slice(self.a.as_slice(), state);
        hash_f64_slice(self.b.as_slice(), state);
        self.constant.leaf_hash(state);
    }
}

impl fmt::Display for JacobianFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "JacobianFactor({}; {} rows, c = {:.6})",
            format_keys(&self.keys),
            self.rows(),
            self.constant
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::key::x;
    use nalgebra::{dmatrix, dvector};

    #[test]
    fn test_error_with_constant() -> Result<(), Box<dyn std::error::Error>> {
        // x2 - x1 = 1
        let factor = JacobianFactor::from_parts(
            vec![x(1), x(2)],
            vec![1, 1],
            dmatrix![-1.0, 1.0],
            dvector![1.0],
            0.25,
        );
        let values: Values = [(x(1), dvector![0.0]), (x(2), dvector![3.0])]
            .into_iter()
            .collect();
        assert!((factor.error(&values)? - (0.5 * 4.0 + 0.25)).abs() < 1e-12);
        assert_eq!(factor.dims(), &[1, 1]);
        assert_eq!(factor.block(1)[(0, 0)], 1.0);
        Ok(())
    }

    #[test]
    fn test_rejects_mismatched_rows() {
        let result = JacobianFactor::new(vec![(x(1), dmatrix![1.0; 2.0])], dvector![1.0]);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_value_is_error() -> Result<(), Box<dyn std::error::Error>> {
        let factor = JacobianFactor::new(vec![(x(1), dmatrix![1.0])], dvector![0.0])?;
        assert!(factor.error(&Values::new()).is_err());
        Ok(())
    }

    #[test]
    fn test_constant_only_factor() -> Result<(), Box<dyn std::error::Error>> {
        let factor = JacobianFactor::from_parts(
            Vec::new(),
            Vec::new(),
            DMatrix::zeros(0, 0),
            DVector::zeros(0),
            1.5,
        );
        assert_eq!(factor.rows(), 0);
        assert!((factor.error(&Values::new())? - 1.5).abs() < 1e-12);
        Ok(())
    }
}
