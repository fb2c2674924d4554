//! Discrete variables, decision trees and discrete factors
//!
//! - `assignment`: Cartesian-product enumeration of discrete keys
//! - `decision_tree`: arena backed decision diagrams with canonicalization
//! - `factor`: potential tables and conditionals over discrete keys

pub mod assignment;
pub mod decision_tree;
pub mod factor;

pub use assignment::{
    DiscreteValues, assignment_at, assignment_count, assignment_index, cartesian_product,
    format_assignment, merge_discrete_keys,
};
pub use decision_tree::{DecisionTree, LeafHash, NodeId};
pub use factor::{DecisionTreeFactor, DiscreteConditional, DiscreteFactor};
