//! Core domain errors.

use thiserror::Error;

/// Core domain errors for regharness.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Work item not found in a manifest.
    #[error("Work item not found: {0}")]
    ItemNotFound(String),

    /// Invalid node state transition.
    #[error("Invalid node state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}
