//! Elimination tree over an ordering.
//!
//! One node per ordered continuous key. A factor lives at the node of its
//! first-eliminated key, and node `j` is the parent of `i` when eliminating
//! `i` leaves a residual that `j` is the first to consume. Built with the
//! path-compressed ancestor sweep; no numeric work happens here.

use std::collections::BTreeSet;

use crate::core::key::{Key, format_key};
use crate::core::ordering::Ordering;
use crate::error::{HybridError, HybridResult};
use crate::hybrid::factor_graph::HybridFactorGraph;
use crate::hybrid::hybrid_factor::HybridFactor;

#[derive(Debug, Clone)]
pub struct EliminationNode {
    pub key: Key,
    pub factors: Vec<HybridFactor>,
    pub children: Vec<usize>,
    pub parent: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct EliminationTree {
    nodes: Vec<EliminationNode>,
    roots: Vec<usize>,
    remaining: Vec<HybridFactor>,
}

impl EliminationTree {
    /// Keys the graph uses as discrete modes are dropped from `ordering`;
    /// only continuous keys get nodes.
    pub fn new(graph: &HybridFactorGraph, ordering: &Ordering) -> HybridResult<Self> {
        let ordering = &graph.continuous_ordering(ordering);
        let positions = ordering.positions();
        let n = ordering.len();

        let mut nodes: Vec<EliminationNode> = ordering
            .iter()
            .map(|key| EliminationNode {
                key,
                factors: Vec::new(),
                children: Vec::new(),
                parent: None,
            })
            .collect();
        let mut remaining = Vec::new();
        // Ordered positions each position shares a factor with.
        let mut neighbors: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];

        for factor in graph.iter() {
            let mut involved: Vec<usize> = factor
                .continuous_keys()
                .iter()
                .filter_map(|k| positions.get(k).copied())
                .collect();
            involved.sort_unstable();
            involved.dedup();
            match involved.first() {
                Some(&first) => {
                    for &i in &involved {
                        for &j in &involved {
                            if i < j {
                                neighbors[j].insert(i);
                            }
                        }
                    }
                    nodes[first].factors.push(factor);
                }
                None => remaining.push(factor),
            }
        }

        // A key with no assigned factor and no earlier neighbor is touched
        // by nothing at all.
        for (position, node) in nodes.iter().enumerate() {
            if node.factors.is_empty() && neighbors[position].is_empty() {
                return Err(HybridError::DisconnectedVariable(format_key(node.key)));
            }
        }

        let mut ancestor: Vec<Option<usize>> = vec![None; n];
        for j in 0..n {
            for &i in &neighbors[j] {
                let mut r = i;
                while let Some(a) = ancestor[r] {
                    if a == j {
                        break;
                    }
                    ancestor[r] = Some(j);
                    r = a;
                }
                if ancestor[r].is_none() {
                    ancestor[r] = Some(j);
                    nodes[r].parent = Some(j);
                }
            }
        }

        let mut roots = Vec::new();
        for i in 0..n {
            let parent = nodes[i].parent;
            match parent {
                Some(p) => nodes[p].children.push(i),
                None => roots.push(i),
            }
        }
        Ok(EliminationTree {
            nodes,
            roots,
            remaining,
        })
    }

    pub fn nodes(&self) -> &[EliminationNode] {
        &self.nodes
    }

    /// Indices of the nodes without a parent.
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// Factors touching no ordered key.
    pub fn remaining_factors(&self) -> &[HybridFactor] {
        &self.remaining
    }
}
