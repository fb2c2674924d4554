use std::fmt;
use std::sync::Arc;

use nalgebra::DVector;

use super::{Factor, NoiseModel};
use crate::core::key::{Key, format_key, format_keys};
use crate::core::values::Values;
use crate::error::{HybridError, HybridResult};
use crate::linear::JacobianFactor;

/// A measurement model bound to its variables and noise model.
///
/// Linearizing at a point produces the whitened [`JacobianFactor`] for the
/// update `δx`, i.e. `A = W J` and `b = −W r`.
#[derive(Clone)]
pub struct NonlinearFactor {
    keys: Vec<Key>,
    factor: Arc<dyn Factor>,
    noise: NoiseModel,
}

impl NonlinearFactor {
    pub fn new<F: Factor + 'static>(
        keys: Vec<Key>,
        factor: F,
        noise: NoiseModel,
    ) -> HybridResult<Self> {
        let dims = factor.variable_dims();
        if dims.len() != keys.len() {
            return Err(HybridError::InvalidInput(format!(
                "factor connects {} variables but {} keys were given",
                dims.len(),
                keys.len()
            )));
        }
        if noise.dim() != factor.get_dimension() {
            return Err(HybridError::InvalidInput(format!(
                "noise model of dimension {} for residual of dimension {}",
                noise.dim(),
                factor.get_dimension()
            )));
        }
        Ok(NonlinearFactor {
            keys,
            factor: Arc::new(factor),
            noise,
        })
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn noise_model(&self) -> &NoiseModel {
        &self.noise
    }

    pub fn dim(&self) -> usize {
        self.factor.get_dimension()
    }

    fn params(&self, values: &Values) -> HybridResult<Vec<DVector<f64>>> {
        let dims = self.factor.variable_dims();
        self.keys
            .iter()
            .zip(dims)
            .map(|(key, dim)| {
                let value = values.get(*key).ok_or_else(|| HybridError::Linearization {
                    key: format_key(*key),
                    factor: self.to_string(),
                })?;
                if value.len() != dim {
                    return Err(HybridError::InvalidInput(format!(
                        "{} has dimension {}, {} expects {dim}",
                        format_key(*key),
                        value.len(),
                        self
                    )));
                }
                Ok(value.clone())
            })
            .collect()
    }

    /// `½‖W r(x)‖²`
    pub fn error(&self, values: &Values) -> HybridResult<f64> {
        let (residual, _) = self.factor.linearize(&self.params(values)?, false);
        Ok(self.noise.error(&residual))
    }

    pub fn linearize(&self, values: &Values) -> HybridResult<JacobianFactor> {
        let params = self.params(values)?;
        let (residual, jacobian) = self.factor.linearize(&params, true);
        let jacobian = jacobian.ok_or_else(|| {
            HybridError::InvalidInput(format!("{self} returned no Jacobian"))
        })?;

        let whitened_jacobian = self.noise.whiten_matrix(&jacobian);
        let b = -self.noise.whiten_vector(&residual);

        let mut terms = Vec::with_capacity(self.keys.len());
        let mut col = 0;
        for (key, param) in self.keys.iter().zip(&params) {
            let dim = param.len();
            terms.push((*key, whitened_jacobian.columns(col, dim).into_owned()));
            col += dim;
        }
        JacobianFactor::new(terms, b)
    }
}

impl fmt::Debug for NonlinearFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NonlinearFactor")
            .field("keys", &format_keys(&self.keys))
            .field("factor", &self.factor)
            .field("noise", &self.noise)
            .finish()
    }
}

impl fmt::Display for NonlinearFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NonlinearFactor({})", format_keys(&self.keys))
    }
}
