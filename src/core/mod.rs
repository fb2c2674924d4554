//! Core building blocks shared by every layer of the solver
//!
//! - Variable keys and the `x(k)`/`m(k)` symbol shorthands
//! - Continuous values (linearization points and solutions)
//! - Elimination orderings

pub mod key;
pub mod ordering;
pub mod values;

pub use key::{DiscreteKey, Key, Symbol, format_key, format_keys, m, symbol, x};
pub use ordering::Ordering;
pub use values::Values;
