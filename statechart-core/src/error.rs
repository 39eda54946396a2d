//! Core error types.

use crate::value::ValueType;
use thiserror::Error;

/// Errors from the statechart core.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid chart definition: {reason}")]
    InvalidChart { reason: String },

    #[error("unknown variable: {name}")]
    UnknownVariable { name: String },

    #[error("type mismatch for variable '{name}': expected {expected}, got {actual}")]
    TypeMismatch {
        name: String,
        expected: ValueType,
        actual: ValueType,
    },

    #[error("unresolvable target: no start-node chain reaches a leaf from '{node}'")]
    UnresolvableTarget { node: String },

    #[error("action '{name}' failed: {reason}")]
    ActionFailed { name: String, reason: String },

    #[error("predicate '{name}' failed: {reason}")]
    PredicateFailed { name: String, reason: String },

    #[error("condition transitions did not settle within {limit} iterations")]
    StabilizationOverflow { limit: usize },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Returns an error code suitable for protocol responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::InvalidChart { .. } => "INVALID_CHART",
            CoreError::UnknownVariable { .. } => "VARIABLE_NOT_FOUND",
            CoreError::TypeMismatch { .. } => "TYPE_MISMATCH",
            CoreError::UnresolvableTarget { .. } => "UNRESOLVABLE_TARGET",
            CoreError::ActionFailed { .. } => "ACTION_FAILED",
            CoreError::PredicateFailed { .. } => "PREDICATE_FAILED",
            CoreError::StabilizationOverflow { .. } => "STABILIZATION_OVERFLOW",
            CoreError::Json(_) => "BAD_REQUEST",
        }
    }
}
