//! Executor error types.

use thiserror::Error;

use crate::validation::FieldViolation;

/// Why a transaction could not be executed.
#[derive(Debug, Clone, Error)]
pub enum ExecuteError {
    #[error("wallet not connected")]
    NotConnected,

    #[error("invalid parameters: {}", join(.0))]
    InvalidParameters(Vec<FieldViolation>),

    #[error("transaction build failed: {0}")]
    BuildFailed(String),

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("submission failed: {0}")]
    SubmitFailed(String),
}

impl ExecuteError {
    /// Returns `true` if the user can fix the problem and try again as-is
    /// (connect the wallet, correct the input).
    pub fn is_user_correctable(&self) -> bool {
        matches!(self, Self::NotConnected | Self::InvalidParameters(_))
    }
}

fn join(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
