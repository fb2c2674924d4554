//! Decision-diagram valued maps.
//!
//! A [`DecisionTree`] maps a discrete assignment to a payload. Nodes live in
//! an arena and refer to each other by [`NodeId`], so a canonicalized tree
//! is a DAG in which identical leaves and identical sub-trees are stored
//! once. Evaluation never depends on whether a tree was canonicalized.
//!
//! # Leaf order
//!
//! Trees built with [`DecisionTree::from_leaves`] take their leaves in the
//! lexicographic order of [`cartesian_product`](super::cartesian_product),
//! first key most significant.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::convert::Infallible;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::core::key::{DiscreteKey, Key};
use crate::discrete::assignment::{
    DiscreteValues, assignment_count, merge_discrete_keys, value_of,
};
use crate::error::{HybridError, HybridResult};

/// Index of a node in a tree's arena
pub type NodeId = usize;

/// Structural hash of a leaf payload.
///
/// Two payloads that compare equal must hash equal. Canonicalization uses
/// the hash to bucket candidate leaves and `PartialEq` to confirm a merge.
pub trait LeafHash {
    fn leaf_hash<H: Hasher>(&self, state: &mut H);
}

impl LeafHash for f64 {
    fn leaf_hash<H: Hasher>(&self, state: &mut H) {
        // -0.0 == 0.0
        let bits = if *self == 0.0 { 0 } else { self.to_bits() };
        state.write_u64(bits);
    }
}

impl<T: LeafHash> LeafHash for Arc<T> {
    fn leaf_hash<H: Hasher>(&self, state: &mut H) {
        (**self).leaf_hash(state)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node<T> {
    Leaf(T),
    Choice {
        key: DiscreteKey,
        branches: Vec<NodeId>,
    },
}

/// Map from discrete assignments to values of type `T`.
#[derive(Debug, Clone)]
pub struct DecisionTree<T> {
    nodes: Vec<Node<T>>,
    root: NodeId,
    keys: Vec<DiscreteKey>,
}

impl<T> DecisionTree<T> {
    /// A constant tree over no keys.
    pub fn leaf(value: T) -> Self {
        DecisionTree {
            nodes: vec![Node::Leaf(value)],
            root: 0,
            keys: Vec::new(),
        }
    }

    /// Build from one value per assignment, in lexicographic order.
    pub fn from_leaves(keys: &[DiscreteKey], leaves: Vec<T>) -> HybridResult<Self> {
        let expected = assignment_count(keys)?;
        if leaves.len() != expected {
            return Err(HybridError::InvalidInput(format!(
                "decision tree over {} assignments given {} leaves",
                expected,
                leaves.len()
            )));
        }
        let mut leaves = leaves.into_iter();
        Self::try_from_fn(keys, |_| {
            leaves
                .next()
                .ok_or_else(|| HybridError::InvalidInput("ran out of leaves".to_string()))
        })
    }

    pub fn from_fn<F>(keys: &[DiscreteKey], mut f: F) -> Self
    where
        F: FnMut(&DiscreteValues) -> T,
    {
        match Self::try_from_fn(keys, |values| Ok::<T, Infallible>(f(values))) {
            Ok(tree) => tree,
            Err(never) => match never {},
        }
    }

    /// Build by calling `f` once per assignment, in lexicographic order.
    pub fn try_from_fn<E, F>(keys: &[DiscreteKey], mut f: F) -> Result<Self, E>
    where
        F: FnMut(&DiscreteValues) -> Result<T, E>,
    {
        let mut nodes = Vec::new();
        let mut current = DiscreteValues::new();
        let root = Self::build(keys, 0, &mut current, &mut f, &mut nodes)?;
        Ok(DecisionTree {
            nodes,
            root,
            keys: keys.to_vec(),
        })
    }

    fn build<E, F>(
        keys: &[DiscreteKey],
        level: usize,
        current: &mut DiscreteValues,
        f: &mut F,
        nodes: &mut Vec<Node<T>>,
    ) -> Result<NodeId, E>
    where
        F: FnMut(&DiscreteValues) -> Result<T, E>,
    {
        if level == keys.len() {
            nodes.push(Node::Leaf(f(&*current)?));
            return Ok(nodes.len() - 1);
        }
        let dk = keys[level];
        let mut branches = Vec::with_capacity(dk.cardinality);
        for value in 0..dk.cardinality {
            current.insert(dk.key, value);
            branches.push(Self::build(keys, level + 1, current, f, nodes)?);
        }
        current.remove(&dk.key);
        nodes.push(Node::Choice { key: dk, branches });
        Ok(nodes.len() - 1)
    }

    /// Keys the tree was built over, most significant first.
    pub fn keys(&self) -> &[DiscreteKey] {
        &self.keys
    }

    /// Value at `values`. Extra keys in the assignment are ignored.
    pub fn evaluate(&self, values: &DiscreteValues) -> HybridResult<&T> {
        let mut id = self.root;
        loop {
            match &self.nodes[id] {
                Node::Leaf(value) => return Ok(value),
                Node::Choice { key, branches } => {
                    id = branches[value_of(key, values)?];
                }
            }
        }
    }

    /// True when the root is a leaf, i.e. the map is constant.
    pub fn is_leaf(&self) -> bool {
        matches!(self.nodes[self.root], Node::Leaf(_))
    }


    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of stored leaves. Equals the assignment count until the tree
    /// is canonicalized.
    pub fn leaf_count(&self) -> usize {
        self.leaves().count()
    }

    pub fn leaves(&self) -> impl Iterator<Item = &T> {
        self.nodes.iter().filter_map(|node| match node {
            Node::Leaf(value) => Some(value),
            Node::Choice { .. } => None,
        })
    }

    /// Same structure, every leaf transformed by `f`. Shared leaves stay
    /// shared.
    pub fn map<U, F>(&self, mut f: F) -> DecisionTree<U>
    where
        F: FnMut(&T) -> U,
    {
        match self.try_map(|value| Ok::<U, Infallible>(f(value))) {
            Ok(tree) => tree,
            Err(never) => match never {},
        }
    }

    pub fn try_map<U, E, F>(&self, mut f: F) -> Result<DecisionTree<U>, E>
    where
        F: FnMut(&T) -> Result<U, E>,
    {
        let mut nodes = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            nodes.push(match node {
                Node::Leaf(value) => Node::Leaf(f(value)?),
                Node::Choice { key, branches } => Node::Choice {
                    key: *key,
                    branches: branches.clone(),
                },
            });
        }
        Ok(DecisionTree {
            nodes,
            root: self.root,
            keys: self.keys.clone(),
        })
    }

    /// Pointwise combination over the union of both key sets.
    pub fn apply<U, V, F>(&self, other: &DecisionTree<U>, mut f: F) -> HybridResult<DecisionTree<V>>
    where
        F: FnMut(&T, &U) -> V,
    {
        let keys = merge_discrete_keys([self.keys(), other.keys()])?;
        DecisionTree::try_from_fn(&keys, |values| {
            Ok(f(self.evaluate(values)?, other.evaluate(values)?))
        })
    }
}

impl<T: LeafHash + PartialEq + Clone> DecisionTree<T> {
    /// Merge equal leaves and collapse choices whose branches all lead to
    /// the same node. The declared keys are kept.
    pub fn canonicalize(&self) -> Self {
        let mut canon = Canonicalizer {
            nodes: Vec::new(),
            leaves: HashMap::new(),
            choices: HashMap::new(),
            memo: HashMap::new(),
        };
        let root = canon.visit(&self.nodes, self.root);
        DecisionTree {
            nodes: canon.nodes,
            root,
            keys: self.keys.clone(),
        }
    }
}

struct Canonicalizer<T> {
    nodes: Vec<Node<T>>,
    leaves: HashMap<u64, Vec<NodeId>>,
    choices: HashMap<(Key, Vec<NodeId>), NodeId>,
    memo: HashMap<NodeId, NodeId>,
}

impl<T: LeafHash + PartialEq + Clone> Canonicalizer<T> {
    fn visit(&mut self, source: &[Node<T>], id: NodeId) -> NodeId {
        if let Some(&done) = self.memo.get(&id) {
            return done;
        }
        let new_id = match &source[id] {
            Node::Leaf(value) => self.intern_leaf(value),
            Node::Choice { key, branches } => {
                let children: Vec<NodeId> =
                    branches.iter().map(|b| self.visit(source, *b)).collect();
                if children.iter().all(|c| *c == children[0]) {
                    children[0]
                } else if let Some(&existing) = self.choices.get(&(key.key, children.clone())) {
                    existing
                } else {
                    self.nodes.push(Node::Choice {
                        key: *key,
                        branches: children.clone(),
                    });
                    let created = self.nodes.len() - 1;
                    self.choices.insert((key.key, children), created);
                    created
                }
            }
        };
        self.memo.insert(id, new_id);
        new_id
    }

    fn intern_leaf(&mut self, value: &T) -> NodeId {
        let mut hasher = DefaultHasher::new();
        value.leaf_hash(&mut hasher);
        let hash = hasher.finish();
        let bucket = self.leaves.entry(hash).or_default();
        for &candidate in bucket.iter() {
            if let Node::Leaf(existing) = &self.nodes[candidate] {
                if existing == value {
                    return candidate;
                }
            }
        }
        self.nodes.push(Node::Leaf(value.clone()));
        let created = self.nodes.len() - 1;
        bucket.push(created);
        created
    }
}

/// Hash helper for payloads made of keys and floating point blocks.
pub(crate) fn hash_f64_slice<H: Hasher>(values: &[f64], state: &mut H) {
    values.len().hash(state);
    for v in values {
        v.leaf_hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::key::m;
    use crate::discrete::assignment::cartesian_product;

    fn two_modes() -> Vec<DiscreteKey> {
        vec![DiscreteKey::new(m(2), 2), DiscreteKey::new(m(1), 2)]
    }

    #[test]
    fn test_from_leaves_evaluates_in_lexicographic_order() -> Result<(), Box<dyn std::error::Error>>
    {
        let keys = two_modes();
        let tree = DecisionTree::from_leaves(&keys, vec![0.0, 1.0, 2.0, 3.0])?;
        for (index, values) in cartesian_product(&keys)?.iter().enumerate() {
            assert_eq!(*tree.evaluate(values)?, index as f64);
        }
        assert_eq!(tree.leaf_count(), 4);
        assert!(!tree.is_leaf());
        Ok(())
    }

    #[test]
    fn test_from_leaves_rejects_wrong_count() {
        let result = DecisionTree::from_leaves(&two_modes(), vec![1.0, 2.0]);
        assert!(matches!(result, Err(HybridError::InvalidInput(_))));
    }

    #[test]
    fn test_evaluate_missing_key() -> Result<(), Box<dyn std::error::Error>> {
        let tree = DecisionTree::from_leaves(&two_modes(), vec![0.0, 1.0, 2.0, 3.0])?;
        let mut values = DiscreteValues::new();
        values.insert(m(2), 1);
        assert!(matches!(
            tree.evaluate(&values),
            Err(HybridError::MissingDiscreteKey(_))
        ));
        Ok(())
    }

    #[test]
    fn test_canonicalize_merges_equal_leaves() -> Result<(), Box<dyn std::error::Error>> {
        let keys = two_modes();
        // Depends only on m1.
        let tree = DecisionTree::from_leaves(&keys, vec![5.0, 7.0, 5.0, 7.0])?;
        let canonical = tree.canonicalize();

        assert_eq!(canonical.leaf_count(), 2);
        // One choice on m1; the m2 choice collapsed.
        assert_eq!(canonical.node_count(), 3);
        for values in cartesian_product(&keys)? {
            assert_eq!(tree.evaluate(&values)?, canonical.evaluate(&values)?);
        }
        Ok(())
    }

    #[test]
    fn test_canonicalize_constant_tree_becomes_leaf() -> Result<(), Box<dyn std::error::Error>> {
        let tree = DecisionTree::from_leaves(&two_modes(), vec![0.0, -0.0, 0.0, 0.0])?;
        let canonical = tree.canonicalize();
        assert!(canonical.is_leaf());
        assert_eq!(*canonical.evaluate(&DiscreteValues::new())?, 0.0);
        Ok(())
    }

    #[test]
    fn test_map_preserves_structure() -> Result<(), Box<dyn std::error::Error>> {
        let keys = two_modes();
        let tree = DecisionTree::from_fn(&keys, |v| v[&m(2)] * 10 + v[&m(1)]);
        let doubled = tree.map(|v| 2 * v);
        for values in cartesian_product(&keys)? {
            assert_eq!(*doubled.evaluate(&values)?, 2 * tree.evaluate(&values)?);
        }
        Ok(())
    }

    #[test]
    fn test_apply_over_key_union() -> Result<(), Box<dyn std::error::Error>> {
        let a = DecisionTree::from_leaves(&[DiscreteKey::new(m(1), 2)], vec![1.0, 2.0])?;
        let b = DecisionTree::from_leaves(&[DiscreteKey::new(m(2), 2)], vec![10.0, 20.0])?;
        let sum = a.apply(&b, |x, y| x + y)?;
        assert_eq!(sum.keys(), &two_modes()[..]);

        let mut values = DiscreteValues::new();
        values.insert(m(1), 1);
        values.insert(m(2), 0);
        assert_eq!(*sum.evaluate(&values)?, 12.0);
        Ok(())
    }
}
