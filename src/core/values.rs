//! Continuous variable assignments.

use std::collections::BTreeMap;

use nalgebra::DVector;

use crate::core::key::{Key, format_key};
use crate::error::{HybridError, HybridResult};

/// Map from continuous key to its vector value.
///
/// Used both as a linearization point and as the container for solutions
/// of a linear system (where each entry is a delta).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Values {
    values: BTreeMap<Key, DVector<f64>>,
}

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: Key, value: DVector<f64>) -> Option<DVector<f64>> {
        self.values.insert(key, value)
    }

    pub fn get(&self, key: Key) -> Option<&DVector<f64>> {
        self.values.get(&key)
    }

    /// Like [`Values::get`] but reports the missing key as an error.
    pub fn at(&self, key: Key) -> HybridResult<&DVector<f64>> {
        self.values.get(&key).ok_or_else(|| {
            HybridError::InvalidInput(format!("no value for {}", format_key(key)))
        })
    }

    pub fn contains(&self, key: Key) -> bool {
        self.values.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.values.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Key, &DVector<f64>)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }

    /// Insert every entry of `other`, overwriting existing keys.
    pub fn extend(&mut self, other: Values) {
        self.values.extend(other.values);
    }

    /// Elementwise `self + delta` for the keys present in both.
    pub fn retract(&self, delta: &Values) -> HybridResult<Values> {
        let mut out = self.clone();
        for (key, step) in delta.iter() {
            if let Some(value) = out.values.get_mut(&key) {
                if value.len() != step.len() {
                    return Err(HybridError::InvalidInput(format!(
                        "dimension mismatch for {}: {} vs {}",
                        format_key(key),
                        value.len(),
                        step.len()
                    )));
                }
                *value += step;
            }
        }
        Ok(out)
    }
}

impl FromIterator<(Key, DVector<f64>)> for Values {
    fn from_iter<I: IntoIterator<Item = (Key, DVector<f64>)>>(iter: I) -> Self {
        Values {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::key::x;
    use nalgebra::dvector;

    #[test]
    fn test_values_at_reports_missing_key() {
        let values: Values = [(x(1), dvector![1.0])].into_iter().collect();
        assert!(values.at(x(1)).is_ok());
        match values.at(x(2)) {
            Err(HybridError::InvalidInput(msg)) => assert!(msg.contains("x2")),
            other => panic!("Expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn test_retract_adds_delta() -> Result<(), Box<dyn std::error::Error>> {
        let values: Values = [(x(1), dvector![1.0, 2.0]), (x(2), dvector![0.0])]
            .into_iter()
            .collect();
        let delta: Values = [(x(1), dvector![0.5, -1.0])].into_iter().collect();
        let updated = values.retract(&delta)?;
        assert_eq!(updated.at(x(1))?, &dvector![1.5, 1.0]);
        assert_eq!(updated.at(x(2))?, &dvector![0.0]);
        Ok(())
    }
}
