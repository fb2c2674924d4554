//! Error types for the hybrid-solver library
//!
//! This module provides the main error and result types used throughout the library.
//! All errors use the `thiserror` crate for automatic trait implementations.

use crate::linalg::LinAlgError;
use thiserror::Error;

/// Main result type used throughout the hybrid-solver library
pub type HybridResult<T> = Result<T, HybridError>;

/// Main error type for the hybrid-solver library
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HybridError {
    /// The linearization point does not cover a factor's scope
    #[error("Linearization error: variable {key} missing for factor {factor}")]
    Linearization { key: String, factor: String },

    /// An ordered variable has no incident factor
    #[error("Disconnected variable: {0} has no incident factor")]
    DisconnectedVariable(String),

    /// A per-assignment linear system was rank deficient
    #[error("Singular system under assignment [{assignment}]: {reason}")]
    SingularSystem { assignment: String, reason: String },

    /// An operation was handed a factor kind it cannot process
    #[error("Unsupported factor kind: {operation} cannot process {kind} factors")]
    UnsupportedFactorKind { operation: String, kind: String },

    /// A discrete key required for evaluation is absent from the assignment
    #[error("Missing discrete key: {0}")]
    MissingDiscreteKey(String),

    /// Invalid input parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Linear algebra related errors
    #[error("Linear algebra error: {0}")]
    LinearAlgebra(String),
}

impl HybridError {
    pub(crate) fn unsupported(operation: &str, kind: &str) -> Self {
        HybridError::UnsupportedFactorKind {
            operation: operation.to_string(),
            kind: kind.to_string(),
        }
    }
}

impl From<LinAlgError> for HybridError {
    fn from(err: LinAlgError) -> Self {
        HybridError::LinearAlgebra(err.to_string())
    }
}
