//! Core domain errors.

use thiserror::Error;

/// Core domain errors for fleetrun.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The selector resolved to no hosts.
    #[error("No hosts matched selector '{0}'")]
    EmptyHostSet(String),

    /// Invalid run phase transition.
    #[error("Invalid phase transition: {from} -> {to}")]
    InvalidPhaseTransition { from: String, to: String },

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
