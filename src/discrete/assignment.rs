//! Discrete assignment space.
//!
//! Assignments are enumerated lexicographically over a list of
//! [`DiscreteKey`]s with the first key most significant. Every table and
//! decision tree in the crate uses this order for its leaves.

use std::collections::BTreeMap;

use crate::core::key::{DiscreteKey, Key, format_key};
use crate::error::{HybridError, HybridResult};

/// Mapping from discrete key to a value in `[0, cardinality)`.
pub type DiscreteValues = BTreeMap<Key, usize>;

/// Number of joint assignments of `keys`; `InvalidInput` when it does not
/// fit in `usize`.
pub fn assignment_count(keys: &[DiscreteKey]) -> HybridResult<usize> {
    keys.iter()
        .try_fold(1_usize, |acc, k| acc.checked_mul(k.cardinality))
        .ok_or_else(|| {
            let names: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
            HybridError::InvalidInput(format!(
                "assignment space of [{}] overflows",
                names.join(", ")
            ))
        })
}

/// All joint assignments of `keys` in lexicographic order.
pub fn cartesian_product(keys: &[DiscreteKey]) -> HybridResult<Vec<DiscreteValues>> {
    let total = assignment_count(keys)?;
    Ok((0..total).map(|index| assignment_at(keys, index)).collect())
}

/// The `index`-th assignment in lexicographic order.
pub fn assignment_at(keys: &[DiscreteKey], mut index: usize) -> DiscreteValues {
    let mut values = DiscreteValues::new();
    for dk in keys.iter().rev() {
        values.insert(dk.key, index % dk.cardinality);
        index /= dk.cardinality;
    }
    values
}

/// Lexicographic index of `values` restricted to `keys`.
pub fn assignment_index(keys: &[DiscreteKey], values: &DiscreteValues) -> HybridResult<usize> {
    let mut index = 0;
    for dk in keys {
        let value = value_of(dk, values)?;
        index = index * dk.cardinality + value;
    }
    Ok(index)
}

/// Value of one key, checked against its cardinality.
pub fn value_of(dk: &DiscreteKey, values: &DiscreteValues) -> HybridResult<usize> {
    let value = *values
        .get(&dk.key)
        .ok_or_else(|| HybridError::MissingDiscreteKey(format_key(dk.key)))?;
    if value >= dk.cardinality {
        return Err(HybridError::InvalidInput(format!(
            "value {value} out of range for {dk}"
        )));
    }
    Ok(value)
}

/// Union of several key lists sorted by descending key.
///
/// The same key appearing with two cardinalities is an error.
pub fn merge_discrete_keys<'a, I>(lists: I) -> HybridResult<Vec<DiscreteKey>>
where
    I: IntoIterator<Item = &'a [DiscreteKey]>,
{
    let mut merged: BTreeMap<Key, usize> = BTreeMap::new();
    for list in lists {
        for dk in list {
            match merged.get(&dk.key) {
                Some(&card) if card != dk.cardinality => {
                    return Err(HybridError::InvalidInput(format!(
                        "{} used with cardinalities {} and {}",
                        format_key(dk.key),
                        card,
                        dk.cardinality
                    )));
                }
                _ => {
                    merged.insert(dk.key, dk.cardinality);
                }
            }
        }
    }
    Ok(merged
        .into_iter()
        .rev()
        .map(|(key, cardinality)| DiscreteKey { key, cardinality })
        .collect())
}

pub fn format_assignment(values: &DiscreteValues) -> String {
    values
        .iter()
        .map(|(k, v)| format!("{}={}", format_key(*k), v))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::key::m;

    #[test]
    fn test_cartesian_product_is_lexicographic() -> Result<(), Box<dyn std::error::Error>> {
        let keys = [DiscreteKey::new(m(2), 2), DiscreteKey::new(m(1), 3)];
        let all = cartesian_product(&keys)?;
        assert_eq!(all.len(), 6);
        assert_eq!(all[0][&m(2)], 0);
        assert_eq!(all[0][&m(1)], 0);
        assert_eq!(all[1][&m(1)], 1);
        assert_eq!(all[3][&m(2)], 1);
        assert_eq!(all[3][&m(1)], 0);

        for (index, values) in all.iter().enumerate() {
            assert_eq!(assignment_index(&keys, values).ok(), Some(index));
        }
        Ok(())
    }

    #[test]
    fn test_empty_keys_have_single_assignment() -> Result<(), Box<dyn std::error::Error>> {
        let all = cartesian_product(&[])?;
        assert_eq!(all.len(), 1);
        assert!(all[0].is_empty());
        Ok(())
    }

    #[test]
    fn test_assignment_count_overflow_is_error() {
        // 2^64 binary modes do not fit in usize.
        let keys: Vec<DiscreteKey> = (1..=64).map(|i| DiscreteKey::new(m(i), 2)).collect();
        assert!(matches!(
            assignment_count(&keys),
            Err(HybridError::InvalidInput(_))
        ));
        assert!(matches!(cartesian_product(&keys), Err(HybridError::InvalidInput(_))));
        assert_eq!(assignment_count(&keys[..10]).ok(), Some(1024));
    }

    #[test]
    fn test_value_of_checks_range_and_presence() {
        let dk = DiscreteKey::new(m(1), 2);
        let mut values = DiscreteValues::new();
        assert!(matches!(
            value_of(&dk, &values),
            Err(HybridError::MissingDiscreteKey(_))
        ));
        values.insert(m(1), 2);
        assert!(matches!(
            value_of(&dk, &values),
            Err(HybridError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_merge_discrete_keys_sorts_descending() -> Result<(), Box<dyn std::error::Error>> {
        let a = [DiscreteKey::new(m(1), 2)];
        let b = [DiscreteKey::new(m(2), 2), DiscreteKey::new(m(1), 2)];
        let merged = merge_discrete_keys([&a[..], &b[..]])?;
        assert_eq!(merged, vec![DiscreteKey::new(m(2), 2), DiscreteKey::new(m(1), 2)]);

        let bad = [DiscreteKey::new(m(1), 3)];
        assert!(merge_discrete_keys([&a[..], &bad[..]]).is_err());
        Ok(())
    }
}
