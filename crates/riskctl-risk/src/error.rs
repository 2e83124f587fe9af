//! Risk error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RiskError {
    /// Input data that cannot be evaluated (zero quantity, negative parameter).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Threshold or calculator configuration that cannot be applied.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

pub type RiskResult<T> = Result<T, RiskError>;
