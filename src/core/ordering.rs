//! Elimination orderings.

use std::collections::HashMap;

use crate::core::key::{Key, format_keys};

/// An ordered sequence of continuous keys to eliminate.
///
/// The ordering may be a prefix of the graph's variables, in which case the
/// remaining variables stay in the residual graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ordering {
    keys: Vec<Key>,
}

impl Ordering {
    pub fn new(keys: Vec<Key>) -> Self {
        Ordering { keys }
    }

    pub fn push(&mut self, key: Key) {
        self.keys.push(key);
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn iter(&self) -> impl Iterator<Item = Key> + '_ {
        self.keys.iter().copied()
    }

    pub fn contains(&self, key: Key) -> bool {
        self.keys.contains(&key)
    }

    /// Position of every key, for first-eliminated lookups.
    pub fn positions(&self) -> HashMap<Key, usize> {
        self.keys.iter().enumerate().map(|(i, k)| (*k, i)).collect()
    }

    /// Returns true when no key appears twice.
    pub fn is_unique(&self) -> bool {
        self.positions().len() == self.keys.len()
    }
}

impl From<Vec<Key>> for Ordering {
    fn from(keys: Vec<Key>) -> Self {
        Ordering::new(keys)
    }
}

impl FromIterator<Key> for Ordering {
    fn from_iter<I: IntoIterator<Item = Key>>(iter: I) -> Self {
        Ordering::new(iter.into_iter().collect())
    }
}

impl std::fmt::Display for Ordering {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", format_keys(&self.keys))
    }
}
